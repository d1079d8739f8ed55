use std::path::PathBuf;

use super::Sample;

/// 发送给记录线程的任务
#[derive(Clone, Debug)]
pub enum RecordTask {
    Append(Sample),
    Stop,
}

/// 记录文件顶部的表头信息
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    pub sensor_name: String,
    pub scale_range: String,
    pub serial_port: String,
    pub path: PathBuf,
}

impl RecordHeader {
    pub fn new(
        sensor_name: impl Into<String>,
        scale_range: impl Into<String>,
        serial_port: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sensor_name: sensor_name.into(),
            scale_range: scale_range.into(),
            serial_port: serial_port.into(),
            path: path.into(),
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// 一次记录结束后的结果
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordSummary {
    pub path: PathBuf,
    pub rows_written: usize,
    pub write_errors: usize,
    pub dropped: usize,
}

impl RecordSummary {
    pub fn message(&self) -> String {
        if self.write_errors == 0 && self.dropped == 0 {
            format!("Data saved to file: {} ({} rows)", self.path.display(), self.rows_written)
        } else {
            format!(
                "Data saved to file: {} ({} rows, {} write errors, {} dropped)",
                self.path.display(),
                self.rows_written,
                self.write_errors,
                self.dropped
            )
        }
    }
}
