use std::fmt;

use serde::{Deserialize, Serialize};

/// 连接表单中可选的传感器，目前只有 Kionix 在设备端有命令模块
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Imp,
    Kionix,
}

impl SensorKind {
    pub const ALL: [SensorKind; 2] = [SensorKind::Imp, SensorKind::Kionix];

    pub fn name(&self) -> &'static str {
        match self {
            SensorKind::Imp => "IMP",
            SensorKind::Kionix => "kionix",
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, SensorKind::Kionix)
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 满量程，单位 g
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScaleRange {
    G2,
    G4,
    G8,
    G16,
}

impl ScaleRange {
    pub const ALL: [ScaleRange; 4] = [ScaleRange::G2, ScaleRange::G4, ScaleRange::G8, ScaleRange::G16];

    pub fn g(&self) -> u8 {
        match self {
            ScaleRange::G2 => 2,
            ScaleRange::G4 => 4,
            ScaleRange::G8 => 8,
            ScaleRange::G16 => 16,
        }
    }

    pub fn from_g(g: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.g() == g)
    }

    pub fn limit(&self) -> f64 {
        self.g() as f64
    }
}

impl fmt::Display for ScaleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.g())
    }
}

/// 传感器输出速率。标签供界面选择，速率码是设备端 `API.odr` 表的键
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputRate {
    Hz0_781,
    Hz1_563,
    Hz3_125,
    Hz6_25,
    Hz12_5,
    Hz25,
    Hz50,
    Hz100,
    Hz200,
    Hz400,
    Hz800,
    Hz1600,
}

impl OutputRate {
    pub const ALL: [OutputRate; 12] = [
        OutputRate::Hz0_781,
        OutputRate::Hz1_563,
        OutputRate::Hz3_125,
        OutputRate::Hz6_25,
        OutputRate::Hz12_5,
        OutputRate::Hz25,
        OutputRate::Hz50,
        OutputRate::Hz100,
        OutputRate::Hz200,
        OutputRate::Hz400,
        OutputRate::Hz800,
        OutputRate::Hz1600,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            OutputRate::Hz0_781 => "0.781",
            OutputRate::Hz1_563 => "1.563",
            OutputRate::Hz3_125 => "3.125",
            OutputRate::Hz6_25 => "6.25",
            OutputRate::Hz12_5 => "12.5",
            OutputRate::Hz25 => "25",
            OutputRate::Hz50 => "50",
            OutputRate::Hz100 => "100",
            OutputRate::Hz200 => "200",
            OutputRate::Hz400 => "400",
            OutputRate::Hz800 => "800",
            OutputRate::Hz1600 => "1600",
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            OutputRate::Hz0_781 => 1,
            OutputRate::Hz1_563 => 2,
            OutputRate::Hz3_125 => 4,
            OutputRate::Hz6_25 => 8,
            OutputRate::Hz12_5 => 16,
            OutputRate::Hz25 => 32,
            OutputRate::Hz50 => 64,
            OutputRate::Hz100 => 128,
            OutputRate::Hz200 => 256,
            OutputRate::Hz400 => 512,
            OutputRate::Hz800 => 1024,
            OutputRate::Hz1600 => 2048,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|r| r.label() == label)
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.code() == code)
    }
}

impl fmt::Display for OutputRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.label())
    }
}

/// 一次连接所需的全部参数，创建后不再修改
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SensorConfig {
    pub kind: SensorKind,
    pub scale: ScaleRange,
    pub rate: OutputRate,
    pub port: String,
}

impl SensorConfig {
    pub fn new(kind: SensorKind, scale: ScaleRange, rate: OutputRate, port: impl Into<String>) -> Self {
        Self {
            kind,
            scale,
            rate,
            port: port.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_label_code_table() {
        assert_eq!(OutputRate::from_label("100"), Some(OutputRate::Hz100));
        assert_eq!(OutputRate::from_label(" 0.781 "), Some(OutputRate::Hz0_781));
        assert_eq!(OutputRate::Hz100.code(), 128);
        assert_eq!(OutputRate::Hz50.code(), 64);
        assert_eq!(OutputRate::Hz1600.code(), 2048);
        assert_eq!(OutputRate::from_label("33"), None);
    }

    #[test]
    fn test_codes_round_trip_through_table() {
        for rate in OutputRate::ALL {
            assert_eq!(OutputRate::from_code(rate.code()), Some(rate));
        }
    }

    #[test]
    fn test_scale_from_g() {
        assert_eq!(ScaleRange::from_g(8), Some(ScaleRange::G8));
        assert_eq!(ScaleRange::from_g(3), None);
        assert_eq!(ScaleRange::G16.limit(), 16.0);
    }

    #[test]
    fn test_only_kionix_supported() {
        assert!(SensorKind::Kionix.is_supported());
        assert!(!SensorKind::Imp.is_supported());
        assert_eq!(SensorKind::Kionix.to_string(), "kionix");
    }
}
