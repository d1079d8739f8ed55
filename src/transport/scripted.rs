use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::{Arc, Mutex};

use super::{LineTransport, EOT, ETX};
use crate::error::TransportError;

/// 模拟设备的一步脚本动作
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptStep {
    Line(String),
    /// 读超时前没有数据
    Silence,
    /// 串口故障，例如线缆被拔出
    Fail(ErrorKind),
}

impl From<&str> for ScriptStep {
    fn from(line: &str) -> Self {
        ScriptStep::Line(line.to_string())
    }
}

impl From<String> for ScriptStep {
    fn from(line: String) -> Self {
        ScriptStep::Line(line)
    }
}

/// 链路上的全部操作记录，通过 `log()` 共享
#[derive(Debug, Default)]
pub struct TransportLog {
    pub writes: Vec<Vec<u8>>,
    pub clears: usize,
    pub closed: bool,
}

impl TransportLog {
    /// ETX 后紧跟 EOT 的次数
    pub fn interrupt_count(&self) -> usize {
        self.writes
            .windows(2)
            .filter(|w| w[0] == [ETX] && w[1] == [EOT])
            .count()
    }

    /// 写出的命令行，不含行结束符
    pub fn commands(&self) -> Vec<String> {
        self.writes
            .iter()
            .filter(|w| w.ends_with(b"\r\n"))
            .map(|w| String::from_utf8_lossy(w).trim().to_string())
            .collect()
    }
}

/// 按脚本回放文本行的内存 REPL
///
/// 使用 `echoing()` 时，每条写出的命令会先以 `>>> ` 提示符回显，
/// 再返回下一条脚本行，与真实 REPL 一致
pub struct ScriptedTransport {
    script: VecDeque<ScriptStep>,
    echoes: VecDeque<String>,
    echo_commands: bool,
    log: Arc<Mutex<TransportLog>>,
    open: bool,
}

impl ScriptedTransport {
    pub fn new<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ScriptStep>,
    {
        Self {
            script: script.into_iter().map(Into::into).collect(),
            echoes: VecDeque::new(),
            echo_commands: false,
            log: Arc::new(Mutex::new(TransportLog::default())),
            open: true,
        }
    }

    pub fn echoing<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ScriptStep>,
    {
        let mut transport = Self::new(script);
        transport.echo_commands = true;
        transport
    }

    pub fn log(&self) -> Arc<Mutex<TransportLog>> {
        Arc::clone(&self.log)
    }

    pub fn remaining(&self) -> usize {
        self.script.len() + self.echoes.len()
    }

    fn with_log<R>(&self, f: impl FnOnce(&mut TransportLog) -> R) -> R {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut log)
    }

    fn next_step(&mut self) -> Result<Option<String>, TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        if let Some(echo) = self.echoes.pop_front() {
            return Ok(Some(echo));
        }
        match self.script.pop_front() {
            Some(ScriptStep::Line(line)) => Ok(Some(line.trim().to_string())),
            Some(ScriptStep::Silence) | None => Ok(None),
            Some(ScriptStep::Fail(kind)) => Err(std::io::Error::new(kind, "scripted failure").into()),
        }
    }
}

impl LineTransport for ScriptedTransport {
    fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        self.next_step()
    }

    fn poll_line(&mut self) -> Result<Option<String>, TransportError> {
        self.next_step()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        if self.echo_commands && bytes.ends_with(b"\r\n") {
            let command = String::from_utf8_lossy(bytes).trim().to_string();
            self.echoes.push_back(format!(">>> {}", command));
        }
        self.with_log(|log| log.writes.push(bytes.to_vec()));
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        self.echoes.clear();
        self.with_log(|log| log.clears += 1);
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.with_log(|log| log.closed = true);
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
