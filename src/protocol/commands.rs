use super::HandshakeStage;
use crate::types::{OutputRate, ScaleRange};

/// REPL 回显命令时的提示符
pub const PROMPT: &str = ">>> ";
/// 设备端命令模块名
pub const MODULE: &str = "API";
/// 身份校验成功时的返回行
pub const IDENTITY_OK: &str = "True";

/// 握手过程中输入 REPL 的命令
///
/// 预期回显与命令文本由同一个值生成，完全一致的回显一定匹配
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplCommand {
    ImportModule,
    InitSensor { scale: ScaleRange, rate: OutputRate },
    CheckIdentity,
    StartStreaming { scale: ScaleRange },
}

impl ReplCommand {
    pub fn text(&self) -> String {
        match self {
            ReplCommand::ImportModule => format!("import {}", MODULE),
            ReplCommand::InitSensor { scale, rate } => format!(
                "{m}.init_sensor({m}.acc_range[{}],{m}.odr[{}])",
                scale.g(),
                rate.code(),
                m = MODULE
            ),
            ReplCommand::CheckIdentity => format!("{}.check_who_am_i()", MODULE),
            ReplCommand::StartStreaming { scale } => format!("{}.read_accel({})", MODULE, scale.g()),
        }
    }

    /// 实际写出的字节，以 `\r\n` 结尾
    pub fn wire(&self) -> Vec<u8> {
        format!("{}\r\n", self.text()).into_bytes()
    }

    pub fn expected_echo(&self) -> String {
        format!("{}{}", PROMPT, self.text())
    }

    /// 导入命令的回显只检查是否包含命令文本，其余回显必须完全一致
    pub fn echo_matches(&self, line: &str) -> bool {
        match self {
            ReplCommand::ImportModule => line.contains(&self.text()),
            _ => line == self.expected_echo(),
        }
    }

    pub fn stage(&self) -> HandshakeStage {
        match self {
            ReplCommand::ImportModule => HandshakeStage::ImportEcho,
            ReplCommand::InitSensor { .. } => HandshakeStage::InitEcho,
            ReplCommand::CheckIdentity => HandshakeStage::IdentityCheck,
            ReplCommand::StartStreaming { .. } => HandshakeStage::StreamEcho,
        }
    }
}
