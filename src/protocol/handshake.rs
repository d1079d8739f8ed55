use log::{debug, info, warn};

use super::{FailureReason, HandshakeStage, ProtocolState, ReplCommand, IDENTITY_OK};
use crate::error::{HandshakeError, ProtocolDesyncError};
use crate::transport::LineTransport;
use crate::types::{OutputRate, ScaleRange, SensorConfig};

/// 发送第一条命令前最多丢弃的欢迎信息行数
/// 一直有输出的设备交由导入回显校验判定失败
const MAX_BANNER_LINES: usize = 256;

/// 驱动一次连接从 `Idle` 到 `StreamArmed`，每个状态一次交互
pub struct Handshake<'a, T: LineTransport + ?Sized> {
    transport: &'a mut T,
    scale: ScaleRange,
    rate: OutputRate,
    state: ProtocolState,
}

impl<'a, T: LineTransport + ?Sized> Handshake<'a, T> {
    pub fn new(transport: &'a mut T, config: &SensorConfig) -> Self {
        Self {
            transport,
            scale: config.scale,
            rate: config.rate,
            state: ProtocolState::Idle,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// 执行当前状态对应的交互并进入下一状态
    ///
    /// `StreamArmed` 与 `Streaming` 保持不变；已失败的握手返回 `HandshakeError::Terminal`
    pub fn step(&mut self) -> Result<ProtocolState, HandshakeError> {
        let result = match self.state {
            ProtocolState::Idle => self.drain_banner().map(|_| ProtocolState::Draining),
            ProtocolState::Draining => self
                .exchange(ReplCommand::ImportModule)
                .map(|_| ProtocolState::ImportSent),
            ProtocolState::ImportSent => self
                .exchange(ReplCommand::InitSensor {
                    scale: self.scale,
                    rate: self.rate,
                })
                .map(|_| ProtocolState::InitSent),
            ProtocolState::InitSent => self.check_identity().map(|_| ProtocolState::IdentitySent),
            ProtocolState::IdentitySent => self
                .exchange(ReplCommand::StartStreaming { scale: self.scale })
                .map(|_| ProtocolState::StreamArmed),
            ProtocolState::StreamArmed | ProtocolState::Streaming => return Ok(self.state),
            ProtocolState::Failed(reason) => return Err(HandshakeError::Terminal(reason)),
        };

        match result {
            Ok(next) => {
                info!("Handshake: {} -> {}", self.state, next);
                self.state = next;
                Ok(next)
            }
            Err(e) => {
                let reason = match &e {
                    HandshakeError::Desync(d) => FailureReason::Desync(d.stage),
                    HandshakeError::Transport(_) => FailureReason::Transport,
                    HandshakeError::Terminal(r) => *r,
                };
                warn!("Handshake failed in state {}: {}", self.state, e);
                self.state = ProtocolState::Failed(reason);
                Err(e)
            }
        }
    }

    /// 逐步执行直到串流就绪或某一步失败
    pub fn run(&mut self) -> Result<(), HandshakeError> {
        loop {
            match self.step()? {
                ProtocolState::StreamArmed | ProtocolState::Streaming => return Ok(()),
                _ => continue,
            }
        }
    }

    /// 交给采集线程前的最后一步
    pub fn mark_streaming(&mut self) {
        if self.state == ProtocolState::StreamArmed {
            self.state = ProtocolState::Streaming;
        }
    }

    fn drain_banner(&mut self) -> Result<(), HandshakeError> {
        let mut discarded = 0;
        while let Some(line) = self.transport.read_line()? {
            if line.is_empty() {
                break;
            }
            debug!("Banner: {}", line);
            discarded += 1;
            if discarded >= MAX_BANNER_LINES {
                warn!("Device kept talking after {} banner lines, continuing", discarded);
                break;
            }
        }
        debug!("Drained {} banner lines", discarded);
        Ok(())
    }

    fn exchange(&mut self, command: ReplCommand) -> Result<(), HandshakeError> {
        self.transport.write_all(&command.wire())?;
        let line = self.transport.read_line()?;

        match line {
            Some(ref echo) if command.echo_matches(echo) => Ok(()),
            received => Err(ProtocolDesyncError {
                stage: command.stage(),
                expected: match command {
                    ReplCommand::ImportModule => command.text(),
                    _ => command.expected_echo(),
                },
                received,
            }
            .into()),
        }
    }

    /// 回显匹配后才读取身份校验结果
    fn check_identity(&mut self) -> Result<(), HandshakeError> {
        self.exchange(ReplCommand::CheckIdentity)?;

        match self.transport.read_line()? {
            Some(ref answer) if answer == IDENTITY_OK => Ok(()),
            received => Err(ProtocolDesyncError {
                stage: HandshakeStage::IdentityCheck,
                expected: IDENTITY_OK.to_string(),
                received,
            }
            .into()),
        }
    }
}
