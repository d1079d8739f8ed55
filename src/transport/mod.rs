//! 按行访问设备 REPL
//!
//! 对端没有帧结构，所有内容都是以 `\r\n` 结尾的文本。
//! `read_line` 最多等待一个读超时，供握手使用；
//! `poll_line` 只读取已到达的字节，供采集线程在空闲休眠之间使用。

pub mod scripted;
pub mod serial;

pub use scripted::{ScriptStep, ScriptedTransport, TransportLog};
pub use serial::SerialEndpoint;

use crate::error::TransportError;

/// Ctrl+C，中止 REPL 上正在运行的命令
pub const ETX: u8 = 0x03;
/// Ctrl+D，REPL 软复位
pub const EOT: u8 = 0x04;

pub trait LineTransport: Send {
    /// 最多等待一个读超时获取完整的一行
    /// 返回去掉首尾空白的行，没有完整行时返回 `None`
    fn read_line(&mut self) -> Result<Option<String>, TransportError>;

    /// 已有完整行时返回，不等待
    fn poll_line(&mut self) -> Result<Option<String>, TransportError>;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// 丢弃已接收但未读取的数据
    fn clear_input(&mut self) -> Result<(), TransportError>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// 端点名称，用于日志和记录表头
    fn name(&self) -> &str;

    fn send_interrupt(&mut self) -> Result<(), TransportError> {
        self.write_all(&[ETX])?;
        self.write_all(&[EOT])
    }
}

/// 从接收缓冲区头部切出完整的行
pub(crate) fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    let end = pending.iter().position(|&b| b == b'\n')?;
    let raw: Vec<u8> = pending.drain(..=end).collect();
    Some(String::from_utf8_lossy(&raw).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_line_trims_crlf() {
        let mut pending = b">>> import API\r\n0.1 0.2".to_vec();
        assert_eq!(take_line(&mut pending).as_deref(), Some(">>> import API"));
        assert_eq!(pending, b"0.1 0.2".to_vec());
        assert_eq!(take_line(&mut pending), None);
    }

    #[test]
    fn test_take_line_blank_line() {
        let mut pending = b"\r\nrest".to_vec();
        assert_eq!(take_line(&mut pending).as_deref(), Some(""));
    }

    #[test]
    fn test_default_interrupt_writes_etx_then_eot() {
        let transport = ScriptedTransport::new(Vec::<ScriptStep>::new());
        let log = transport.log();
        let mut transport = transport;
        transport.send_interrupt().unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.writes, vec![vec![ETX], vec![EOT]]);
        assert_eq!(log.interrupt_count(), 1);
    }
}
