//! 设备 REPL 上的请求与应答
//!
//! REPL 在输出结果前会以 `>>> ` 提示符回显每一行输入，
//! 因此每个握手步骤都是写一条命令，再逐字比较随后的行。
//! 没有帧结构可以重新同步，任何不匹配都会终止本次连接。

pub mod commands;
pub mod handshake;

use std::fmt;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

pub use commands::{ReplCommand, IDENTITY_OK, MODULE, PROMPT};
pub use handshake::Handshake;

use crate::transport::LineTransport;

/// 拒绝某一行的握手步骤
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandshakeStage {
    ImportEcho,
    InitEcho,
    IdentityCheck,
    StreamEcho,
}

impl HandshakeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeStage::ImportEcho => "import-echo-mismatch",
            HandshakeStage::InitEcho => "init-echo-mismatch",
            HandshakeStage::IdentityCheck => "identity-check-failed",
            HandshakeStage::StreamEcho => "stream-echo-mismatch",
        }
    }
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    Desync(HandshakeStage),
    Transport,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Desync(stage) => stage.as_str(),
            FailureReason::Transport => "transport-error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 连接级协议状态，只向前推进，`Failed` 为终态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolState {
    Idle,
    Draining,
    ImportSent,
    InitSent,
    IdentitySent,
    StreamArmed,
    Streaming,
    Failed(FailureReason),
}

impl ProtocolState {
    pub fn is_failed(&self) -> bool {
        matches!(self, ProtocolState::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProtocolState::Idle => "Idle",
            ProtocolState::Draining => "Draining",
            ProtocolState::ImportSent => "Import sent",
            ProtocolState::InitSent => "Init sent",
            ProtocolState::IdentitySent => "Identity checked",
            ProtocolState::StreamArmed => "Stream armed",
            ProtocolState::Streaming => "Streaming",
            ProtocolState::Failed(_) => "Failed",
        }
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolState::Failed(reason) => write!(f, "Failed({})", reason),
            other => f.write_str(other.label()),
        }
    }
}

/// 中止 REPL 上正在运行的命令并释放串口
///
/// 所有失败路径和主动断开都会调用，与握手进行到哪一步无关。
/// 出错只记录日志。
pub fn teardown<T: LineTransport + ?Sized>(transport: &mut T, settle: Duration) {
    if !transport.is_open() {
        debug!("Teardown skipped, {} already closed", transport.name());
        return;
    }

    info!("Tearing down link on {}", transport.name());
    if let Err(e) = transport.send_interrupt() {
        warn!("Failed to send interrupt sequence: {}", e);
    }
    if let Err(e) = transport.clear_input() {
        warn!("Failed to clear input buffer: {}", e);
    }
    if !settle.is_zero() {
        thread::sleep(settle);
    }
    transport.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;

    #[test]
    fn test_teardown_interrupts_clears_and_closes() {
        let mut transport = ScriptedTransport::new(["0 0 1"]);
        let log = transport.log();

        teardown(&mut transport, Duration::ZERO);

        let log = log.lock().unwrap();
        assert_eq!(log.interrupt_count(), 1);
        assert_eq!(log.clears, 1);
        assert!(log.closed);
    }

    #[test]
    fn test_teardown_on_closed_transport_is_noop() {
        let mut transport = ScriptedTransport::new(Vec::<&str>::new());
        let log = transport.log();
        teardown(&mut transport, Duration::ZERO);
        teardown(&mut transport, Duration::ZERO);
        assert_eq!(log.lock().unwrap().interrupt_count(), 1);
    }

    #[test]
    fn test_failure_reason_tags() {
        assert_eq!(
            ProtocolState::Failed(FailureReason::Desync(HandshakeStage::IdentityCheck)).to_string(),
            "Failed(identity-check-failed)"
        );
        assert_eq!(FailureReason::Transport.as_str(), "transport-error");
    }
}
