//! 原始样本的 CSV 记录，由独立的写入线程完成

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{error, info, warn};

use crate::error::PersistenceError;
use crate::types::{RecordHeader, RecordSummary, RecordTask, Sample};

const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// 按 RFC 4180 转义单个字段：含逗号、引号或换行时加引号，内部引号加倍
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// 先写表头块，再逐行写入 `elapsed,x,y,z`
///
/// 时间相对于第一个写入的样本，而不是会话开始时间
pub struct CsvRecorder<W: Write> {
    out: W,
    first_capture: Option<Duration>,
    rows_written: usize,
    write_errors: usize,
}

impl CsvRecorder<BufWriter<File>> {
    /// 创建（截断）记录文件并写入表头
    pub fn create(header: &RecordHeader) -> Result<Self, PersistenceError> {
        let file = File::create(&header.path).map_err(|source| PersistenceError::Create {
            path: header.path.clone(),
            source,
        })?;
        Self::with_writer(BufWriter::new(file), header)
    }
}

impl<W: Write> CsvRecorder<W> {
    pub fn with_writer(mut out: W, header: &RecordHeader) -> Result<Self, PersistenceError> {
        writeln!(out, "Sensor Name:,{}", csv_field(&header.sensor_name))?;
        writeln!(out, "Scale Range:,{}", csv_field(&header.scale_range))?;
        writeln!(out, "Serial Port:,{}", csv_field(&header.serial_port))?;
        writeln!(out, "File Name:,{}", csv_field(&header.file_name()))?;
        writeln!(out, "Time,X,Y,Z")?;
        out.flush()?;

        Ok(Self {
            out,
            first_capture: None,
            rows_written: 0,
            write_errors: 0,
        })
    }

    pub fn append(&mut self, sample: &Sample) -> Result<(), PersistenceError> {
        let first = *self.first_capture.get_or_insert(sample.capture_time);
        let elapsed = sample.capture_time.saturating_sub(first).as_secs_f64();

        match writeln!(self.out, "{:?},{:?},{:?},{:?}", elapsed, sample.x, sample.y, sample.z) {
            Ok(()) => {
                self.rows_written += 1;
                Ok(())
            }
            Err(e) => {
                self.write_errors += 1;
                Err(e.into())
            }
        }
    }

    pub fn flush(&mut self) -> Result<(), PersistenceError> {
        self.out.flush()?;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn write_errors(&self) -> usize {
        self.write_errors
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// 进行中的记录。未调用 `stop` 直接丢弃也会结束写入线程
pub struct RecordingHandle {
    sender: Sender<RecordTask>,
    handle: Option<JoinHandle<RecordSummary>>,
    dropped: Arc<AtomicUsize>,
    header: RecordHeader,
    since: Duration,
}

impl RecordingHandle {
    /// 同步写入表头，再把文件交给写入线程
    ///
    /// `since` 是记录开始时刻（相对会话开始），更早采集的样本不会写入。
    /// 表头写入失败时直接返回错误，不创建线程。
    pub fn start(header: RecordHeader, capacity: usize, since: Duration) -> Result<Self, PersistenceError> {
        let recorder = CsvRecorder::create(&header)?;
        let (sender, receiver) = bounded(capacity.max(1));

        let path = header.path.clone();
        let handle = thread::Builder::new()
            .name("recorder".to_string())
            .spawn(move || run_recorder(recorder, receiver, path))
            .map_err(PersistenceError::Write)?;

        info!("Recording started: {}", header.path.display());
        Ok(Self {
            sender,
            handle: Some(handle),
            dropped: Arc::new(AtomicUsize::new(0)),
            header,
            since,
        })
    }

    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// 样本入队，不阻塞。队列满时计为丢弃
    pub fn append(&self, sample: Sample) -> Result<(), PersistenceError> {
        if sample.capture_time < self.since {
            return Ok(());
        }
        match self.sender.try_send(RecordTask::Append(sample)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(PersistenceError::WriterGone),
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn since(&self) -> Duration {
        self.since
    }

    /// 等待队列中的数据写完，刷新并关闭文件
    pub fn stop(mut self) -> RecordSummary {
        self.finish()
    }

    fn finish(&mut self) -> RecordSummary {
        let dropped = self.dropped();
        let Some(handle) = self.handle.take() else {
            return RecordSummary::default();
        };

        if self.sender.send(RecordTask::Stop).is_err() {
            warn!("Recorder thread already gone when stopping");
        }
        let mut summary = match handle.join() {
            Ok(summary) => summary,
            Err(_) => {
                error!("Recorder thread panicked");
                RecordSummary {
                    path: self.header.path.clone(),
                    ..Default::default()
                }
            }
        };
        summary.dropped = dropped;
        info!("{}", summary.message());
        summary
    }
}

impl Drop for RecordingHandle {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.finish();
        }
    }
}

fn run_recorder<W: Write>(
    mut recorder: CsvRecorder<W>,
    receiver: Receiver<RecordTask>,
    path: std::path::PathBuf,
) -> RecordSummary {
    info!("Recorder thread started");

    loop {
        match receiver.recv_timeout(FLUSH_INTERVAL) {
            Ok(RecordTask::Append(sample)) => {
                if let Err(e) = recorder.append(&sample) {
                    warn!("Recorder: {}", e);
                }
            }
            Ok(RecordTask::Stop) => break,
            Err(RecvTimeoutError::Timeout) => {
                // 空闲时刷新缓冲
                if let Err(e) = recorder.flush() {
                    warn!("Recorder: flush failed: {}", e);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                info!("Recorder: task channel disconnected, exiting");
                break;
            }
        }
    }

    if let Err(e) = recorder.flush() {
        warn!("Recorder: final flush failed: {}", e);
    }
    info!("Recorder thread exiting");

    RecordSummary {
        path,
        rows_written: recorder.rows_written(),
        write_errors: recorder.write_errors(),
        dropped: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io;
    use std::path::PathBuf;
    use std::rc::Rc;

    fn header(path: impl Into<PathBuf>) -> RecordHeader {
        RecordHeader::new("kionix", "8", "/dev/ttyACM0", path)
    }

    fn sample(ms: u64, x: f64, y: f64, z: f64) -> Sample {
        Sample::new(Duration::from_millis(ms), x, y, z)
    }

    #[test]
    fn test_header_and_rows_relative_to_first_sample() {
        let mut recorder = CsvRecorder::with_writer(Vec::new(), &header("/tmp/run1.csv")).unwrap();
        recorder.append(&sample(1500, 0.0, 0.5, 1.0)).unwrap();
        recorder.append(&sample(1750, -0.25, 0.5, 1.0)).unwrap();

        let text = String::from_utf8(recorder.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Sensor Name:,kionix",
                "Scale Range:,8",
                "Serial Port:,/dev/ttyACM0",
                "File Name:,run1.csv",
                "Time,X,Y,Z",
                "0.0,0.0,0.5,1.0",
                "0.25,-0.25,0.5,1.0",
            ]
        );
    }

    #[test]
    fn test_header_fields_with_commas_are_quoted() {
        let header = RecordHeader::new("kionix", "8", "COM3,\"usb\"", "/tmp/run,final.csv");
        let recorder = CsvRecorder::with_writer(Vec::new(), &header).unwrap();

        let text = String::from_utf8(recorder.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[2], "Serial Port:,\"COM3,\"\"usb\"\"\"");
        assert_eq!(lines[3], "File Name:,\"run,final.csv\"");
        assert_eq!(lines[4], "Time,X,Y,Z");
    }

    #[test]
    fn test_csv_field_leaves_plain_values_alone() {
        assert_eq!(csv_field("kionix"), "kionix");
        assert_eq!(csv_field("a\nb"), "\"a\nb\"");
        assert!(matches!(csv_field("/dev/ttyACM0"), Cow::Borrowed(_)));
    }

    struct FlakyWriter {
        buf: Vec<u8>,
        failing: Rc<Cell<bool>>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            if self.failing.get() {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.buf.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_append_does_not_stop_later_appends() {
        let failing = Rc::new(Cell::new(false));
        let writer = FlakyWriter {
            buf: Vec::new(),
            failing: Rc::clone(&failing),
        };
        let mut recorder = CsvRecorder::with_writer(writer, &header("run.csv")).unwrap();

        recorder.append(&sample(0, 1.0, 1.0, 1.0)).unwrap();
        failing.set(true);
        assert!(recorder.append(&sample(100, 2.0, 2.0, 2.0)).is_err());
        failing.set(false);
        recorder.append(&sample(200, 3.0, 3.0, 3.0)).unwrap();

        assert_eq!(recorder.rows_written(), 2);
        assert_eq!(recorder.write_errors(), 1);
        let text = String::from_utf8(recorder.into_inner().buf).unwrap();
        assert!(text.ends_with("0.2,3.0,3.0,3.0\n"));
    }

    #[test]
    fn test_create_fails_for_missing_directory() {
        let path = std::env::temp_dir().join("senselink-missing-dir").join("nested").join("x.csv");
        let err = CsvRecorder::create(&header(path)).err().unwrap();
        assert!(matches!(err, PersistenceError::Create { .. }));
    }

    #[test]
    fn test_recording_thread_writes_file() {
        let path = std::env::temp_dir().join(format!("senselink-recorder-{}.csv", std::process::id()));
        let handle = RecordingHandle::start(header(path.clone()), 64, Duration::ZERO).unwrap();
        for i in 0..10 {
            handle.append(sample(i * 10, i as f64, 0.0, 1.0)).unwrap();
        }
        let summary = handle.stop();

        assert_eq!(summary.rows_written, 10);
        assert_eq!(summary.write_errors, 0);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 15);
        assert!(text.lines().nth(5).unwrap().starts_with("0.0,"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_samples_captured_before_start_are_skipped() {
        let path = std::env::temp_dir().join(format!("senselink-since-{}.csv", std::process::id()));
        let handle = RecordingHandle::start(header(path.clone()), 64, Duration::from_millis(500)).unwrap();
        handle.append(sample(100, 9.0, 9.0, 9.0)).unwrap();
        handle.append(sample(499, 9.0, 9.0, 9.0)).unwrap();
        handle.append(sample(600, 1.0, 0.0, 1.0)).unwrap();
        handle.append(sample(850, 2.0, 0.0, 1.0)).unwrap();
        let summary = handle.stop();

        assert_eq!(summary.rows_written, 2);
        let text = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<&str> = text.lines().skip(5).collect();
        // 时间原点是开始后的第一个样本
        assert_eq!(rows, vec!["0.0,1.0,0.0,1.0", "0.25,2.0,0.0,1.0"]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_restart_truncates_previous_file() {
        let path = std::env::temp_dir().join(format!("senselink-truncate-{}.csv", std::process::id()));
        let first = RecordingHandle::start(header(path.clone()), 8, Duration::ZERO).unwrap();
        first.append(sample(0, 1.0, 1.0, 1.0)).unwrap();
        first.stop();

        let second = RecordingHandle::start(header(path.clone()), 8, Duration::ZERO).unwrap();
        second.stop();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 5);
        std::fs::remove_file(&path).ok();
    }
}
