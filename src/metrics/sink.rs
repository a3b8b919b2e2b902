//! Scalar metrics sink for offline analysis (spec §2 item 9, §4.8). Grounded
//! on the teacher's `utils/metrics.rs::EventRecorder` (lock-free queue +
//! background CSV writer) and `utils/metrics_export.rs`'s
//! append-with-header-if-new-file convention.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_queue::ArrayQueue;
use log::error;

const SINK_CAPACITY: usize = 4096;
const FLUSH_POLL: Duration = Duration::from_millis(50);

/// One named scalar sample for a single control-loop iteration.
#[derive(Debug, Clone)]
pub struct ScalarSample {
    pub iteration: u64,
    pub name: &'static str,
    pub value: f64,
}

/// Records named scalar samples. Implementations must not block the control
/// loop thread on I/O.
pub trait MetricsSink: Send + Sync {
    fn record(&self, sample: ScalarSample);
    fn close(&self);
}

/// Background-thread-drained CSV sink: one row per `(iteration, name,
/// value)`, header written once on file creation, appended thereafter.
pub struct CsvMetricsSink {
    queue: Arc<ArrayQueue<ScalarSample>>,
    dropped: Arc<std::sync::atomic::AtomicU64>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CsvMetricsSink {
    /// Opens (or creates) `path`, writing the header row only if the file is
    /// new, and spawns the draining thread.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let is_new = !path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if is_new {
            writeln!(file, "iteration,name,value")?;
        }

        let queue = Arc::new(ArrayQueue::new(SINK_CAPACITY));
        let dropped = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker_queue = queue.clone();
        let worker_shutdown = shutdown.clone();
        let worker = thread::spawn(move || {
            run_drain_loop(file, worker_queue, worker_shutdown);
        });

        Ok(Self {
            queue,
            dropped,
            shutdown,
            worker: Some(worker),
        })
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

fn run_drain_loop(mut file: File, queue: Arc<ArrayQueue<ScalarSample>>, shutdown: Arc<AtomicBool>) {
    loop {
        while let Some(sample) = queue.pop() {
            if let Err(e) = writeln!(file, "{},{},{}", sample.iteration, sample.name, sample.value) {
                error!("failed to write metrics row: {e}");
            }
        }
        if shutdown.load(Ordering::Acquire) && queue.is_empty() {
            let _ = file.flush();
            return;
        }
        thread::sleep(FLUSH_POLL);
    }
}

impl MetricsSink for CsvMetricsSink {
    fn record(&self, sample: ScalarSample) {
        if self.queue.force_push(sample).is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn close(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

impl Drop for CsvMetricsSink {
    fn drop(&mut self) {
        self.close();
        if let Some(h) = self.worker.take() {
            let _ = h.join();
        }
    }
}

/// Appends a single ingress-counter summary row, mirroring the teacher's
/// `export_summary_csv` (one row per run, header written only for a new
/// file).
pub fn append_ingress_counters(
    path: impl AsRef<Path>,
    dropped: u64,
    decode_errors: u64,
) -> std::io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let is_new = !path.exists();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if is_new {
        writeln!(file, "dropped,decode_errors")?;
    }
    writeln!(file, "{dropped},{decode_errors}")
}

/// In-memory sink for tests: every recorded sample is retained in order.
#[derive(Default)]
pub struct InMemoryMetricsSink {
    samples: std::sync::Mutex<Vec<ScalarSample>>,
}

impl InMemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<ScalarSample> {
        self.samples.lock().unwrap().clone()
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn record(&self, sample: ScalarSample) {
        self.samples.lock().unwrap().push(sample);
    }

    fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_sink_retains_order() {
        let sink = InMemoryMetricsSink::new();
        sink.record(ScalarSample {
            iteration: 0,
            name: "error",
            value: 1400.0,
        });
        sink.record(ScalarSample {
            iteration: 0,
            name: "target",
            value: 28.0,
        });
        let samples = sink.samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].name, "error");
        assert_eq!(samples[1].name, "target");
    }

    #[test]
    fn csv_sink_writes_header_once_and_appends() {
        let dir = std::env::temp_dir().join(format!(
            "backlog-autoscaler-test-{}",
            std::process::id()
        ));
        let path = dir.join("control_metrics.csv");
        let _ = fs::remove_dir_all(&dir);

        {
            let sink = CsvMetricsSink::open(&path).unwrap();
            sink.record(ScalarSample {
                iteration: 0,
                name: "error",
                value: 5.0,
            });
            sink.close();
        }

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("iteration,name,value\n"));
        assert!(contents.contains("0,error,5"));

        let _ = fs::remove_dir_all(&dir);
    }
}
