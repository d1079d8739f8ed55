//! 应用状态管理模块
//! 界面表单与提示信息，会话本身由 SessionController 持有

use crate::types::{OutputRate, ScaleRange, SensorConfig, SensorKind};

/// 连接表单
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionForm {
    pub sensor: SensorKind,
    pub scale: ScaleRange,
    pub rate: OutputRate,
    pub port: String,
}

impl ConnectionForm {
    pub fn from_config(config: &SensorConfig) -> Self {
        Self {
            sensor: config.kind,
            scale: config.scale,
            rate: config.rate,
            port: config.port.clone(),
        }
    }

    /// 端口两端的空白会被去掉
    pub fn to_config(&self) -> SensorConfig {
        SensorConfig::new(self.sensor, self.scale, self.rate, self.port.trim())
    }
}

/// 记录状态
#[derive(Debug, Clone, Default)]
pub struct RecordingForm {
    pub path: String,
    pub status: String,
}

/// 全部界面状态
#[derive(Debug, Clone)]
pub struct AppState {
    pub connection: ConnectionForm,
    pub recording: RecordingForm,
    pub status_message: String,
    /// 致命错误弹窗，确认后清除
    pub error_popup: Option<String>,
}

impl AppState {
    pub fn new(defaults: &SensorConfig, record_path: String) -> Self {
        Self {
            connection: ConnectionForm::from_config(defaults),
            recording: RecordingForm {
                path: record_path,
                status: String::new(),
            },
            status_message: "Disconnected".to_string(),
            error_popup: None,
        }
    }

    /// 只保留第一条未确认的错误
    pub fn show_error(&mut self, message: String) {
        if self.error_popup.is_none() {
            self.error_popup = Some(message);
        }
    }

    pub fn dismiss_error(&mut self) {
        self.error_popup = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_roundtrip_trims_port() {
        let config = SensorConfig::new(SensorKind::Kionix, ScaleRange::G4, OutputRate::Hz400, "/dev/ttyACM0");
        let mut form = ConnectionForm::from_config(&config);
        form.port = "  /dev/ttyACM0 ".to_string();
        assert_eq!(form.to_config(), config);
    }

    #[test]
    fn test_error_popup_keeps_first() {
        let config = SensorConfig::new(SensorKind::Kionix, ScaleRange::G8, OutputRate::Hz50, "COM3");
        let mut state = AppState::new(&config, "data.csv".to_string());
        state.show_error("first".to_string());
        state.show_error("second".to_string());
        assert_eq!(state.error_popup.as_deref(), Some("first"));
        state.dismiss_error();
        assert!(state.error_popup.is_none());
    }
}
