//! Per-device workers and the sink writer.
//!
//! Every device runs its own classifier on its own thread. Committed events
//! are flattened into [`BoardRecord`]s and sent over a channel to a single
//! sink writer thread, so devices never share state and a slow or failing
//! sink never stalls classification.

use crate::collector::types::SensorFrame;
use crate::core::{ClassifierConfig, DirectionClassifier, Step};
use crate::sink::{BoardRecord, EventSink};
use crate::stats::SharedSessionStats;
use chrono::Duration;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// How often a device loop wakes up to check its running flag.
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

/// Identity and tuning for one device worker.
#[derive(Debug, Clone)]
pub struct DeviceSpec {
    pub device_id: String,
    pub classifier: ClassifierConfig,
    /// Partition interval for record buckets
    pub bucket: Duration,
    /// Cleared to stop the loop even while its feed is still open
    pub running: Arc<AtomicBool>,
}

impl DeviceSpec {
    pub fn new(device_id: impl Into<String>, classifier: ClassifierConfig) -> Self {
        Self {
            device_id: device_id.into(),
            classifier,
            bucket: Duration::minutes(1),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Share a stop flag with other workers.
    pub fn with_running(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }
}

/// What a device worker did before its feed ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceReport {
    pub device_id: String,
    pub frames: u64,
    pub calibration_samples: u64,
    pub events: u64,
}

/// Run one device's classification loop until `frames` is closed or
/// `spec.running` is cleared.
pub fn run_device(
    spec: &DeviceSpec,
    frames: &Receiver<SensorFrame>,
    records: &Sender<BoardRecord>,
    stats: &SharedSessionStats,
) -> DeviceReport {
    let mut classifier = DirectionClassifier::new(spec.classifier.clone());
    let mut report = DeviceReport {
        device_id: spec.device_id.clone(),
        ..DeviceReport::default()
    };

    tracing::info!(device = %spec.device_id, "device loop started");

    while spec.running.load(Ordering::SeqCst) {
        let frame = match frames.recv_timeout(POLL_INTERVAL) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        report.frames += 1;
        stats.record_frame();

        match classifier.process(frame) {
            Step::Calibrated { .. } => {
                report.calibration_samples += 1;
                stats.record_calibration_sample();
            }
            Step::Accumulating { .. } => {}
            Step::Emitted(event) => {
                report.events += 1;
                stats.record_event();

                let s = &event.summary;
                let p = &s.channels.percent;
                tracing::info!(
                    device = %spec.device_id,
                    "{:>5}: {:>4}, {:>4}, rf({:>3}), rr({:>3}), lf({:>3}), lr({:>3})",
                    event.direction,
                    s.weight,
                    s.stdev,
                    p[0],
                    p[1],
                    p[2],
                    p[3]
                );

                let record = BoardRecord::from_event(&spec.device_id, &event, spec.bucket);
                if records.send(record).is_err() {
                    tracing::warn!(device = %spec.device_id, "sink is gone, event dropped");
                }
            }
        }
    }

    tracing::info!(
        device = %spec.device_id,
        frames = report.frames,
        events = report.events,
        "device loop finished"
    );
    report
}

/// Spawn [`run_device`] on a dedicated thread.
pub fn spawn_device(
    spec: DeviceSpec,
    frames: Receiver<SensorFrame>,
    records: Sender<BoardRecord>,
    stats: SharedSessionStats,
) -> std::io::Result<JoinHandle<DeviceReport>> {
    std::thread::Builder::new()
        .name(format!("bboard-{}", spec.device_id))
        .spawn(move || run_device(&spec, &frames, &records, &stats))
}

/// What the sink writer did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub written: u64,
    pub failed: u64,
}

/// Drain `records` into `sink` until every sender is dropped.
///
/// Write failures, and a failed final flush, are counted and logged; the
/// record is not retried.
pub fn run_sink_writer<S: EventSink>(
    sink: &mut S,
    records: &Receiver<BoardRecord>,
    stats: &SharedSessionStats,
) -> SinkReport {
    let mut report = SinkReport::default();

    for record in records.iter() {
        match sink.write(&record) {
            Ok(()) => {
                report.written += 1;
                stats.record_sink_write();
            }
            Err(e) => {
                report.failed += 1;
                stats.record_sink_failure();
                tracing::warn!(device = %record.device_id, "failed to write event: {e}");
            }
        }
    }

    if let Err(e) = sink.flush() {
        report.failed += 1;
        stats.record_sink_failure();
        tracing::warn!("failed to flush sink: {e}");
    }
    report
}

/// Spawn [`run_sink_writer`] on a dedicated thread.
pub fn spawn_sink_writer<S: EventSink + 'static>(
    mut sink: S,
    records: Receiver<BoardRecord>,
    stats: SharedSessionStats,
) -> std::io::Result<JoinHandle<SinkReport>> {
    std::thread::Builder::new()
        .name("bboard-sink".to_string())
        .spawn(move || run_sink_writer(&mut sink, &records, &stats))
}
