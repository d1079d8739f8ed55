//! 应用配置管理模块
//! 集中管理所有配置项，提供默认值和配置验证

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aggregator::RangePolicy;
use crate::session::SessionSettings;
use crate::types::{OutputRate, ScaleRange, SensorConfig, SensorKind};

/// 配置文件路径的环境变量
pub const CONFIG_ENV_VAR: &str = "SENSELINK_CONFIG";

/// 主配置结构
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub serial: SerialConfig,
    pub acquisition: AcquisitionConfig,
    pub plot: PlotConfig,
    pub defaults: DefaultsConfig,
}

/// 窗口配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: f32,
    pub height: f32,
    pub title: String,
    pub resizable: bool,
    pub vsync: bool,
    pub hardware_acceleration: bool,
}

/// 串口配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub idle_poll_ms: u64,
    /// 断开前中断序列后的等待时间
    pub settle_ms: u64,
}

/// 采集与显示管线配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub tick_interval_ms: u64,
    pub display_horizon_seconds: f64,
    pub out_of_range: RangePolicy,
    pub sample_channel_capacity: usize,
    pub record_channel_capacity: usize,
}

/// 绘图配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub plot_height: f32,
    pub line_width: f32,
    pub show_legend: bool,
    pub allow_drag: bool,
    pub allow_zoom: bool,
    pub colors: PlotColors,
}

/// 绘图颜色配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotColors {
    pub x_axis: [u8; 3],
    pub y_axis: [u8; 3],
    pub z_axis: [u8; 3],
}

/// 界面启动时的默认选择
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub sensor: SensorKind,
    pub scale_g: u8,
    pub rate_label: String,
    pub port: String,
    pub record_path: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            title: "SenseLink - Accelerometer Viewer".to_string(),
            resizable: true,
            vsync: true,
            hardware_acceleration: true,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            read_timeout_ms: 1000,
            idle_poll_ms: 10,
            settle_ms: 1000,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 200,
            display_horizon_seconds: 5.0,
            out_of_range: RangePolicy::Drop,
            sample_channel_capacity: 5000,
            record_channel_capacity: 5000,
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            plot_height: 400.0,
            line_width: 1.5,
            show_legend: true,
            allow_drag: false,
            allow_zoom: false,
            colors: PlotColors::default(),
        }
    }
}

impl Default for PlotColors {
    fn default() -> Self {
        Self {
            x_axis: [255, 0, 0], // 红色
            y_axis: [0, 160, 0], // 绿色
            z_axis: [0, 0, 255], // 蓝色
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            sensor: SensorKind::Kionix,
            scale_g: 8,
            rate_label: OutputRate::Hz50.label().to_string(),
            port: default_port().to_string(),
            record_path: "data.csv".to_string(),
        }
    }
}

fn default_port() -> &'static str {
    if cfg!(windows) {
        "COM3"
    } else {
        "/dev/ttyACM0"
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;

        std::fs::write(path, content).map_err(ConfigError::IoError)?;

        Ok(())
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width <= 0.0 || self.window.height <= 0.0 {
            return Err(ConfigError::ValidationError("Window dimensions must be positive".to_string()));
        }

        if self.serial.baud_rate == 0 {
            return Err(ConfigError::ValidationError("Baud rate must be positive".to_string()));
        }

        if self.serial.read_timeout_ms == 0 {
            return Err(ConfigError::ValidationError("Read timeout must be positive".to_string()));
        }

        // 采集线程空闲时至少休眠 1 ms，避免空转
        if self.serial.idle_poll_ms == 0 {
            return Err(ConfigError::ValidationError("Idle poll interval must be at least 1 ms".to_string()));
        }

        if self.acquisition.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationError("Tick interval must be positive".to_string()));
        }

        if !(self.acquisition.display_horizon_seconds > 0.0) || !self.acquisition.display_horizon_seconds.is_finite() {
            return Err(ConfigError::ValidationError("Display horizon must be a positive number of seconds".to_string()));
        }

        if self.acquisition.sample_channel_capacity == 0 || self.acquisition.record_channel_capacity == 0 {
            return Err(ConfigError::ValidationError("Channel capacities must be positive".to_string()));
        }

        if ScaleRange::from_g(self.defaults.scale_g).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "Unsupported scale range {}g, expected one of 2, 4, 8, 16",
                self.defaults.scale_g
            )));
        }

        if OutputRate::from_label(&self.defaults.rate_label).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "Unknown data output rate {:?}",
                self.defaults.rate_label
            )));
        }

        Ok(())
    }

    /// 转换为会话参数
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            baud_rate: self.serial.baud_rate,
            read_timeout: Duration::from_millis(self.serial.read_timeout_ms),
            idle_poll: Duration::from_millis(self.serial.idle_poll_ms),
            settle: Duration::from_millis(self.serial.settle_ms),
            tick_interval: Duration::from_millis(self.acquisition.tick_interval_ms),
            display_horizon: Duration::from_secs_f64(self.acquisition.display_horizon_seconds),
            range_policy: self.acquisition.out_of_range,
            sample_capacity: self.acquisition.sample_channel_capacity,
            record_capacity: self.acquisition.record_channel_capacity,
        }
    }

    /// 界面默认选择对应的传感器配置，仅在 validate 通过后可靠
    pub fn default_sensor_config(&self) -> SensorConfig {
        SensorConfig::new(
            self.defaults.sensor,
            ScaleRange::from_g(self.defaults.scale_g).unwrap_or(ScaleRange::G8),
            OutputRate::from_label(&self.defaults.rate_label).unwrap_or(OutputRate::Hz50),
            self.defaults.port.clone(),
        )
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(toml::de::Error),
    #[error("Serialize error: {0}")]
    SerializeError(toml::ser::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// 配置管理器
pub struct ConfigManager {
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// 创建配置管理器
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            config_path: None,
        }
    }

    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = AppConfig::load_from_file(&path)?;
        Ok(Self {
            config,
            config_path: Some(path.as_ref().to_path_buf()),
        })
    }

    /// 按环境变量加载配置，未设置时使用默认值
    ///
    /// 设置了路径但文件不存在时同样使用默认值，保存时写入该路径。
    pub fn from_env() -> Result<Self, ConfigError> {
        let Some(path) = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from) else {
            log::info!("{} not set, using default configuration", CONFIG_ENV_VAR);
            return Ok(Self::new());
        };

        if !path.exists() {
            log::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self {
                config: AppConfig::default(),
                config_path: Some(path),
            });
        }

        let manager = Self::load_from_file(&path)?;
        log::info!("Configuration loaded from {}", path.display());
        Ok(manager)
    }

    /// 获取当前配置
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// 获取可变配置
    pub fn get_config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// 保存配置
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.config_path {
            self.config.validate()?;
            self.config.save_to_file(path)?;
        }
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
