//! 通过 MicroPython REPL 串口采集加速度计数据
//!
//! 会话控制器打开链路，依次完成导入、初始化、身份校验和串流握手，
//! 然后把链路交给采集线程。样本经有界通道进入抽取显示窗口，
//! 记录时同时送入 CSV 写入线程。

pub mod aggregator;
pub mod app;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logger;
pub mod plotter;
pub mod protocol;
pub mod recorder;
pub mod session;
pub mod transport;
pub mod types;
pub mod utils;

pub use aggregator::{decimation_factor, DecimationAggregator, DisplayWindow, RangePolicy};
pub use error::{SessionError, SessionResult};
pub use protocol::ProtocolState;
pub use session::{SessionController, SessionSettings};
pub use types::{OutputRate, Sample, ScaleRange, SensorConfig, SensorKind};
