//! 连接生命周期：握手、采集、聚合、记录与断开

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver};
use log::{debug, error, info, warn};

use crate::aggregator::{DecimationAggregator, RangePolicy};
use crate::error::{PersistenceError, SessionError, SessionResult, TransportError};
use crate::ingest::{IngestStats, IngestWorker};
use crate::protocol::{teardown, FailureReason, Handshake, ProtocolState};
use crate::recorder::RecordingHandle;
use crate::transport::{LineTransport, SerialEndpoint};
use crate::types::{DisplayPoint, RecordHeader, RecordSummary, Sample, SensorConfig};

/// 会话的时间与缓冲参数
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSettings {
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub idle_poll: Duration,
    pub settle: Duration,
    pub tick_interval: Duration,
    pub display_horizon: Duration,
    pub range_policy: RangePolicy,
    pub sample_capacity: usize,
    pub record_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            read_timeout: Duration::from_secs(1),
            idle_poll: Duration::from_millis(10),
            settle: Duration::from_secs(1),
            tick_interval: Duration::from_millis(200),
            display_horizon: Duration::from_secs(5),
            range_policy: RangePolicy::Drop,
            sample_capacity: 5000,
            record_capacity: 5000,
        }
    }
}

/// 仅在串流期间存在的资源
struct ActiveSession {
    config: SensorConfig,
    worker: IngestWorker,
    samples: Receiver<Sample>,
    stats: Arc<IngestStats>,
    started: Instant,
    last_tick: Option<Instant>,
}

pub struct SessionController {
    settings: SessionSettings,
    state: ProtocolState,
    active: Option<ActiveSession>,
    aggregator: Option<DecimationAggregator>,
    recording: Option<RecordingHandle>,
    /// 内部原因结束的记录，等待界面取走
    finished_recording: Option<RecordSummary>,
}

impl SessionController {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            state: ProtocolState::Idle,
            active: None,
            aggregator: None,
            recording: None,
            finished_recording: None,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// 下次连接时生效
    pub fn set_settings(&mut self, settings: SessionSettings) {
        self.settings = settings;
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn config(&self) -> Option<&SensorConfig> {
        self.active.as_ref().map(|a| &a.config)
    }

    pub fn stats(&self) -> Option<Arc<IngestStats>> {
        self.active.as_ref().map(|a| Arc::clone(&a.stats))
    }

    pub fn aggregator(&self) -> Option<&DecimationAggregator> {
        self.aggregator.as_ref()
    }

    pub fn display_points(&self) -> Vec<DisplayPoint> {
        self.aggregator.as_ref().map(|a| a.snapshot()).unwrap_or_default()
    }

    /// 串流开始至今的时长
    pub fn elapsed(&self) -> Option<Duration> {
        self.active.as_ref().map(|a| a.started.elapsed())
    }

    pub fn recording_path(&self) -> Option<&PathBuf> {
        self.recording.as_ref().map(|r| &r.header().path)
    }

    /// 打开配置的串口并完成握手进入串流
    pub fn connect(&mut self, config: &SensorConfig) -> SessionResult<()> {
        self.check_can_connect(config)?;

        let endpoint = SerialEndpoint::open(&config.port, self.settings.baud_rate, self.settings.read_timeout)?;
        self.attach(Box::new(endpoint), config)
    }

    /// 在已打开的链路上握手并启动采集线程
    ///
    /// 任何失败路径都恰好执行一次断开流程，不留下运行中的线程
    pub fn attach(&mut self, mut transport: Box<dyn LineTransport>, config: &SensorConfig) -> SessionResult<()> {
        if let Err(e) = self.check_can_connect(config) {
            // 被拒绝的链路同样需要释放
            teardown(transport.as_mut(), self.settings.settle);
            return Err(e);
        }

        info!(
            "Connecting {} on {} (scale ±{}g, rate {})",
            config.kind, transport.name(), config.scale, config.rate
        );

        let mut handshake = Handshake::new(transport.as_mut(), config);
        let outcome = handshake.run();
        handshake.mark_streaming();
        self.state = handshake.state();

        if let Err(e) = outcome {
            let err = SessionError::from(e);
            error!("Connect failed at {}: {}", err.stage(), err);
            teardown(transport.as_mut(), self.settings.settle);
            return Err(err);
        }

        let started = Instant::now();
        let (sender, samples) = bounded(self.settings.sample_capacity.max(1));
        let worker = match IngestWorker::spawn(transport, sender, started, self.settings.idle_poll) {
            Ok(worker) => worker,
            Err(e) => {
                error!("Failed to spawn ingest worker: {}", e.source);
                match e.transport {
                    Some(mut transport) => teardown(transport.as_mut(), self.settings.settle),
                    None => warn!("Transport lost while spawning ingest worker"),
                }
                self.state = ProtocolState::Failed(FailureReason::Transport);
                return Err(SessionError::Transport(e.source.into()));
            }
        };

        self.aggregator = Some(DecimationAggregator::new(
            config.rate.code(),
            config.scale,
            self.settings.display_horizon,
            self.settings.range_policy,
        ));
        self.active = Some(ActiveSession {
            config: config.clone(),
            stats: worker.stats(),
            worker,
            samples,
            started,
            last_tick: None,
        });

        info!("Streaming started");
        Ok(())
    }

    fn check_can_connect(&self, config: &SensorConfig) -> SessionResult<()> {
        if !config.kind.is_supported() {
            return Err(SessionError::UnsupportedSensor(config.kind.name().to_string()));
        }
        if self.is_connected() {
            return Err(SessionError::AlreadyConnected);
        }
        Ok(())
    }

    /// 周期驱动，由界面线程调用
    ///
    /// 采集线程退出后的第一次调用返回一次致命错误。
    /// 只有到达刷新间隔时才执行聚合。
    pub fn tick(&mut self, now: Instant) -> Option<SessionError> {
        let active = self.active.as_mut()?;

        if active.worker.is_finished() {
            return self.reap_worker();
        }

        if let Some(last) = active.last_tick {
            if now.saturating_duration_since(last) < self.settings.tick_interval {
                return None;
            }
        }
        active.last_tick = Some(now);

        let batch: Vec<Sample> = active.samples.try_iter().collect();
        let elapsed = now.saturating_duration_since(active.started);

        if let Some(recording) = &self.recording {
            let mut gone = false;
            for sample in &batch {
                if let Err(e) = recording.append(*sample) {
                    warn!("Recording stopped: {}", e);
                    gone = true;
                    break;
                }
            }
            if gone {
                self.finish_recording_internally();
            }
        }

        if let Some(aggregator) = self.aggregator.as_mut() {
            let emitted = aggregator.tick(elapsed, batch);
            if emitted > 0 {
                debug!("Tick at {:.3}s: {} new points", elapsed.as_secs_f64(), emitted);
            }
        }
        None
    }

    /// 采集线程自行退出：断开链路并报告原因
    fn reap_worker(&mut self) -> Option<SessionError> {
        let active = self.active.take()?;
        self.finish_recording_internally();

        let Some(mut exit) = active.worker.stop() else {
            error!("Ingest worker lost the transport, nothing to tear down");
            self.state = ProtocolState::Failed(FailureReason::Transport);
            return Some(SessionError::Transport(TransportError::Closed));
        };
        teardown(exit.transport.as_mut(), self.settings.settle);

        match exit.error.take() {
            Some(e) => {
                error!("Streaming failed: {}", e);
                self.state = ProtocolState::Failed(FailureReason::Transport);
                Some(SessionError::Transport(e))
            }
            None => {
                warn!("Ingest worker exited without error");
                self.state = ProtocolState::Idle;
                None
            }
        }
    }

    /// 停止全部工作并释放串口，可重复调用
    pub fn disconnect(&mut self) {
        let recorded = self.stop_recording();

        match self.active.take() {
            Some(active) => {
                info!("Disconnecting from {}", active.config.port);
                match active.worker.stop() {
                    Some(mut exit) => teardown(exit.transport.as_mut(), self.settings.settle),
                    None => warn!("Ingest worker lost the transport, nothing to tear down"),
                }
            }
            None if recorded.is_none() => debug!("Disconnect requested while not connected"),
            None => {}
        }

        if let Some(aggregator) = self.aggregator.as_mut() {
            aggregator.clear();
        }
        self.aggregator = None;
        self.state = ProtocolState::Idle;
    }

    /// 开始把原始样本写入 `path`，返回前表头已写入
    ///
    /// 只记录此刻之后采集的样本
    pub fn start_recording(&mut self, path: impl Into<PathBuf>) -> SessionResult<()> {
        let active = self.active.as_ref().ok_or(SessionError::NotConnected)?;
        if self.recording.is_some() {
            return Err(PersistenceError::AlreadyRecording.into());
        }

        let header = RecordHeader::new(
            active.config.kind.name(),
            active.config.scale.to_string(),
            active.config.port.clone(),
            path,
        );
        let since = active.started.elapsed();
        self.recording = Some(RecordingHandle::start(header, self.settings.record_capacity, since)?);
        self.finished_recording = None;
        Ok(())
    }

    pub fn stop_recording(&mut self) -> Option<RecordSummary> {
        self.recording.take().map(RecordingHandle::stop)
    }

    /// 取走因写入线程退出或链路断开而自动结束的记录结果
    pub fn take_finished_recording(&mut self) -> Option<RecordSummary> {
        self.finished_recording.take()
    }

    fn finish_recording_internally(&mut self) {
        if let Some(summary) = self.stop_recording() {
            warn!("Recording ended without a stop request: {}", summary.message());
            self.finished_recording = Some(summary);
        }
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.disconnect();
    }
}
