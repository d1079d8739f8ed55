//! 遥测数据采集：把设备输出的 `x y z` 文本行转换为带时间戳的样本

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender, TrySendError};
use log::{debug, error, info};

use crate::error::{MalformedSampleError, TransportError};
use crate::transport::LineTransport;
use crate::types::Sample;

/// 解析一行遥测数据
///
/// 只接受恰好三个以空白分隔的有限数值
pub fn parse_telemetry_line(line: &str) -> Result<[f64; 3], MalformedSampleError> {
    let malformed = |reason: String| MalformedSampleError {
        line: line.to_string(),
        reason,
    };

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 3 {
        return Err(malformed(format!("expected 3 fields, found {}", tokens.len())));
    }

    let mut values = [0.0; 3];
    for (value, token) in values.iter_mut().zip(&tokens) {
        let parsed: f64 = token
            .parse()
            .map_err(|e| malformed(format!("{:?} is not a number: {}", token, e)))?;
        if !parsed.is_finite() {
            return Err(malformed(format!("{:?} is not finite", token)));
        }
        *value = parsed;
    }
    Ok(values)
}

/// 采集线程与界面共享的计数器
#[derive(Debug, Default)]
pub struct IngestStats {
    pub published: AtomicU64,
    pub malformed: AtomicU64,
    pub dropped: AtomicU64,
}

impl IngestStats {
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// 线程结束时交还的链路，以及导致结束的错误
pub struct IngestExit {
    pub transport: Box<dyn LineTransport>,
    pub error: Option<TransportError>,
}

/// 线程创建失败，链路原样交还给调用方
pub struct SpawnError {
    pub transport: Option<Box<dyn LineTransport>>,
    pub source: io::Error,
}

impl std::fmt::Debug for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnError")
            .field("transport", &self.transport.as_ref().map(|t| t.name().to_string()))
            .field("source", &self.source)
            .finish()
    }
}

/// 串流期间轮询链路的独立线程
///
/// 线程运行期间独占链路。停止是协作式的：每轮循环检查标志，
/// `poll_line` 不阻塞，所以线程在一个空闲间隔内退出。
/// 线程内的 panic 会被捕获，链路仍然交还，保证断开流程可以执行。
pub struct IngestWorker {
    handle: Option<JoinHandle<Option<IngestExit>>>,
    stop: Arc<AtomicBool>,
    stats: Arc<IngestStats>,
}

impl IngestWorker {
    pub fn spawn(
        transport: Box<dyn LineTransport>,
        sender: Sender<Sample>,
        session_start: Instant,
        idle_poll: Duration,
    ) -> Result<Self, SpawnError> {
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(IngestStats::default());

        // 通过通道移交链路，线程创建失败时还能取回
        let (handoff_tx, handoff_rx) = bounded::<Box<dyn LineTransport>>(1);
        if let Err(e) = handoff_tx.try_send(transport) {
            return Err(SpawnError {
                transport: Some(e.into_inner()),
                source: io::Error::other("transport handoff failed"),
            });
        }

        let worker_rx = handoff_rx.clone();
        let worker_stop = Arc::clone(&stop);
        let worker_stats = Arc::clone(&stats);
        let spawned = thread::Builder::new().name("ingest".to_string()).spawn(move || {
            let Ok(mut transport) = worker_rx.recv() else {
                error!("Ingest worker started without a transport");
                return None;
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                run_ingest(transport.as_mut(), &sender, session_start, idle_poll, &worker_stop, &worker_stats)
            }));
            let error = match outcome {
                Ok(error) => error,
                Err(_) => {
                    error!("Ingest worker panicked, handing transport back for teardown");
                    Some(TransportError::Io(io::Error::other("ingest worker panicked")))
                }
            };
            Some(IngestExit { transport, error })
        });

        match spawned {
            Ok(handle) => Ok(Self {
                handle: Some(handle),
                stop,
                stats,
            }),
            Err(source) => Err(SpawnError {
                transport: handoff_rx.try_recv().ok(),
                source,
            }),
        }
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// 线程已返回（主动停止或链路出错）
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// 通知线程停止并等待其结束
    pub fn stop(mut self) -> Option<IngestExit> {
        self.stop.store(true, Ordering::Relaxed);
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(exit) => exit,
            Err(_) => {
                error!("Ingest worker died outside the guarded loop, transport lost");
                None
            }
        }
    }
}

impl Drop for IngestWorker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// 采集主循环，返回导致退出的链路错误
fn run_ingest(
    transport: &mut dyn LineTransport,
    sender: &Sender<Sample>,
    session_start: Instant,
    idle_poll: Duration,
    stop: &AtomicBool,
    stats: &IngestStats,
) -> Option<TransportError> {
    info!("Ingest worker started on {}", transport.name());

    while !stop.load(Ordering::Relaxed) {
        let line = match transport.poll_line() {
            Ok(Some(line)) => line,
            Ok(None) => {
                thread::sleep(idle_poll);
                continue;
            }
            Err(e) => {
                error!("Ingest worker stopping on transport error: {}", e);
                return Some(e);
            }
        };

        if line.is_empty() {
            continue;
        }

        match parse_telemetry_line(&line) {
            Ok([x, y, z]) => {
                let sample = Sample::new(session_start.elapsed(), x, y, z);
                match sender.try_send(sample) {
                    Ok(()) => {
                        stats.published.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(TrySendError::Full(_)) => {
                        // 队列已满，丢弃并计数，不阻塞
                        stats.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        // 通道断开表示控制器已释放，退出
                        info!("Sample channel disconnected, ingest worker exiting");
                        break;
                    }
                }
            }
            Err(e) => {
                stats.malformed.fetch_add(1, Ordering::Relaxed);
                debug!("Discarding {}", e);
            }
        }
    }

    info!(
        "Ingest worker exiting: {} published, {} malformed, {} dropped",
        stats.published(),
        stats.malformed(),
        stats.dropped()
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ScriptStep, ScriptedTransport};
    use approx::assert_relative_eq;
    use crossbeam_channel::bounded;

    #[test]
    fn test_parse_valid_line() {
        let [x, y, z] = parse_telemetry_line("0.0039 -0.998 1.5e-2").unwrap();
        assert_relative_eq!(x, 0.0039);
        assert_relative_eq!(y, -0.998);
        assert_relative_eq!(z, 0.015);
    }

    #[test]
    fn test_parse_tolerates_extra_whitespace() {
        assert!(parse_telemetry_line("  1.0\t2.0   3.0 ").is_ok());
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        for line in ["1.0 abc", "1.0 2.0", "1.0 2.0 3.0 4.0", "", "(1.0, 2.0, 3.0)", "nan 0 0", "1 inf 0"] {
            assert!(parse_telemetry_line(line).is_err(), "{:?} should be rejected", line);
        }
    }

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn test_worker_publishes_and_skips_malformed() {
        let transport = ScriptedTransport::new(["0.1 0.2 0.3", "1.0 abc", "", "1.0 2.0", "0.4 0.5 0.6"]);
        let (tx, rx) = bounded(16);
        let worker =
            IngestWorker::spawn(Box::new(transport), tx, Instant::now(), Duration::from_millis(1)).unwrap();
        let stats = worker.stats();

        assert!(wait_until(Duration::from_secs(2), || stats.published() == 2));
        let exit = worker.stop().unwrap();
        assert!(exit.error.is_none());

        let samples: Vec<Sample> = rx.try_iter().collect();
        assert_eq!(samples.len(), 2);
        assert_relative_eq!(samples[0].x, 0.1);
        assert_relative_eq!(samples[1].z, 0.6);
        assert!(samples[0].capture_time <= samples[1].capture_time);
        assert_eq!(stats.malformed(), 2);
    }

    #[test]
    fn test_worker_drops_when_channel_full() {
        let transport = ScriptedTransport::new(["1 1 1", "2 2 2", "3 3 3"]);
        let (tx, rx) = bounded(1);
        let worker =
            IngestWorker::spawn(Box::new(transport), tx, Instant::now(), Duration::from_millis(1)).unwrap();
        let stats = worker.stats();

        assert!(wait_until(Duration::from_secs(2), || stats.dropped() == 2));
        worker.stop().unwrap();
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_worker_returns_transport_error() {
        let script = vec![
            ScriptStep::from("1 2 3"),
            ScriptStep::Fail(std::io::ErrorKind::BrokenPipe),
        ];
        let (tx, _rx) = bounded(16);
        let worker = IngestWorker::spawn(Box::new(ScriptedTransport::new(script)), tx, Instant::now(), Duration::ZERO)
            .unwrap();

        assert!(wait_until(Duration::from_secs(2), || worker.is_finished()));
        let exit = worker.stop().unwrap();
        assert!(matches!(exit.error, Some(TransportError::Io(_))));
        assert!(exit.transport.is_open());
    }

    /// 握手正常、读取数据时崩溃的链路
    struct PanicOnPoll(ScriptedTransport);

    impl LineTransport for PanicOnPoll {
        fn read_line(&mut self) -> Result<Option<String>, TransportError> {
            self.0.read_line()
        }

        fn poll_line(&mut self) -> Result<Option<String>, TransportError> {
            panic!("driver fault while polling");
        }

        fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
            self.0.write_all(bytes)
        }

        fn clear_input(&mut self) -> Result<(), TransportError> {
            self.0.clear_input()
        }

        fn close(&mut self) {
            self.0.close()
        }

        fn is_open(&self) -> bool {
            self.0.is_open()
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[test]
    fn test_worker_panic_hands_transport_back() {
        let inner = ScriptedTransport::new(Vec::<ScriptStep>::new());
        let log = inner.log();
        let (tx, _rx) = bounded(16);
        let worker = IngestWorker::spawn(Box::new(PanicOnPoll(inner)), tx, Instant::now(), Duration::ZERO).unwrap();

        assert!(wait_until(Duration::from_secs(2), || worker.is_finished()));
        let mut exit = worker.stop().expect("panic must not lose the transport");
        assert!(matches!(exit.error, Some(TransportError::Io(_))));
        assert_eq!(exit.transport.name(), "panicking");

        crate::protocol::teardown(exit.transport.as_mut(), Duration::ZERO);
        let log = log.lock().unwrap();
        assert_eq!(log.interrupt_count(), 1);
        assert!(log.closed);
    }
}
