use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::{FailureReason, HandshakeStage};

/// 串口传输错误，对会话是致命的
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open serial port {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),

    #[error("endpoint is closed")]
    Closed,
}

/// 回显或身份校验与握手预期不一致
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("handshake failed at {stage}: expected {expected:?}, received {received:?}")]
pub struct ProtocolDesyncError {
    pub stage: HandshakeStage,
    pub expected: String,
    pub received: Option<String>,
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Desync(#[from] ProtocolDesyncError),

    #[error("handshake already failed: {0}")]
    Terminal(FailureReason),
}

/// 不是三个数值的遥测行，由采集线程就地丢弃
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed sample {line:?}: {reason}")]
pub struct MalformedSampleError {
    pub line: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to create record file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write record row: {0}")]
    Write(#[from] std::io::Error),

    #[error("recording is already active")]
    AlreadyRecording,

    #[error("recorder thread is not running")]
    WriterGone,
}

/// 会话控制器对外报告的统一错误类型
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Desync(#[from] ProtocolDesyncError),

    #[error("sensor {0} is under development, please select a different sensor type")]
    UnsupportedSensor(String),

    #[error("handshake aborted: {0}")]
    Aborted(FailureReason),

    #[error("session is already connected")]
    AlreadyConnected,

    #[error("session is not connected")]
    NotConnected,

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl SessionError {
    /// 失败阶段的简短标签，用于界面提示
    pub fn stage(&self) -> &'static str {
        match self {
            SessionError::Transport(_) => "transport-error",
            SessionError::Desync(e) => e.stage.as_str(),
            SessionError::Aborted(reason) => reason.as_str(),
            SessionError::UnsupportedSensor(_) => "unsupported-sensor",
            SessionError::AlreadyConnected => "already-connected",
            SessionError::NotConnected => "not-connected",
            SessionError::Persistence(_) => "persistence-error",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Transport(_) | SessionError::Desync(_) | SessionError::Aborted(_)
        )
    }
}

impl From<HandshakeError> for SessionError {
    fn from(e: HandshakeError) -> Self {
        match e {
            HandshakeError::Transport(e) => SessionError::Transport(e),
            HandshakeError::Desync(e) => SessionError::Desync(e),
            HandshakeError::Terminal(reason) => SessionError::Aborted(reason),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_tags() {
        let desync = SessionError::from(ProtocolDesyncError {
            stage: HandshakeStage::IdentityCheck,
            expected: "True".to_string(),
            received: Some("False".to_string()),
        });
        assert_eq!(desync.stage(), "identity-check-failed");
        assert!(desync.is_fatal());

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged");
        let transport = SessionError::from(TransportError::from(io));
        assert_eq!(transport.stage(), "transport-error");
        assert!(transport.is_fatal());

        let persistence = SessionError::from(PersistenceError::AlreadyRecording);
        assert!(!persistence.is_fatal());
    }

    #[test]
    fn test_desync_message_names_stage() {
        let err = ProtocolDesyncError {
            stage: HandshakeStage::InitEcho,
            expected: ">>> API.init_sensor(API.acc_range[8],API.odr[64])".to_string(),
            received: None,
        };
        assert!(err.to_string().contains("init-echo-mismatch"));
    }
}
