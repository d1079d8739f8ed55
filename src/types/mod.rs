pub mod sample;
pub mod sensor_config;
pub mod tasks;

pub use sample::{DisplayPoint, Sample};
pub use sensor_config::{OutputRate, ScaleRange, SensorConfig, SensorKind};
pub use tasks::{RecordHeader, RecordSummary, RecordTask};
