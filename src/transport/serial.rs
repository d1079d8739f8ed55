use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serialport::{ClearBuffer, SerialPort};

use super::{take_line, LineTransport};
use crate::error::TransportError;

const READ_CHUNK: usize = 256;

/// 已打开的串口，以及读超时和未接收完整的行
pub struct SerialEndpoint {
    port: Option<Box<dyn SerialPort>>,
    path: String,
    timeout: Duration,
    pending: Vec<u8>,
}

impl SerialEndpoint {
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|source| TransportError::Open {
                path: path.to_string(),
                source,
            })?;

        let mut endpoint = Self {
            port: Some(port),
            path: path.to_string(),
            timeout,
            pending: Vec::with_capacity(READ_CHUNK),
        };
        endpoint.clear_input()?;

        info!("Serial port {} opened at {} baud", path, baud_rate);
        Ok(endpoint)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 最多读取 `max` 字节到缓冲区，串口超时视为读到 0 字节
    fn fill(&mut self, max: usize) -> Result<usize, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        let mut buf = [0u8; READ_CHUNK];
        let max = max.clamp(1, READ_CHUNK);

        match port.read(&mut buf[..max]) {
            Ok(n) => {
                self.pending.extend_from_slice(&buf[..n]);
                Ok(n)
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl LineTransport for SerialEndpoint {
    fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(line) = take_line(&mut self.pending) {
                return Ok(Some(line));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            self.fill(READ_CHUNK)?;
        }
    }

    fn poll_line(&mut self) -> Result<Option<String>, TransportError> {
        if let Some(line) = take_line(&mut self.pending) {
            return Ok(Some(line));
        }

        let available = self
            .port
            .as_ref()
            .ok_or(TransportError::Closed)?
            .bytes_to_read()? as usize;
        if available == 0 {
            return Ok(None);
        }

        self.fill(available)?;
        Ok(take_line(&mut self.pending))
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.pending.clear();
        let port = self.port.as_ref().ok_or(TransportError::Closed)?;
        port.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Serial port {} closed", self.path);
        } else {
            debug!("Serial port {} already closed", self.path);
        }
        if !self.pending.is_empty() {
            warn!("Discarding {} unread bytes from {}", self.pending.len(), self.path);
            self.pending.clear();
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn name(&self) -> &str {
        &self.path
    }
}
