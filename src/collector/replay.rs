//! Replay collector: feeds recorded readings into the pipeline.
//!
//! Readings are JSON lines of the form
//! `{"timestamp": "2014-06-01T12:00:00.001Z", "channels": [rf, rr, lf, lr]}`.
//! Invalid lines are logged and skipped; they never reach the analytics core.

use crate::collector::types::SensorFrame;
use crate::stats::SharedSessionStats;
use crossbeam_channel::{bounded, Receiver};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Errors that can occur while setting up a frame source.
#[derive(Debug)]
pub enum CollectorError {
    Io(String),
    AlreadyFinished,
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::Io(e) => write!(f, "IO error: {e}"),
            CollectorError::AlreadyFinished => write!(f, "Collector has already finished"),
        }
    }
}

impl std::error::Error for CollectorError {}

/// What a replay thread read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub frames: u64,
    pub rejected: u64,
    /// Set when reading stopped on an I/O error
    pub error: Option<String>,
}

/// Reads frames on a background thread and hands them out over a channel.
pub struct ReplayCollector {
    receiver: Receiver<SensorFrame>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<ReplayReport>>,
}

impl ReplayCollector {
    /// Start replaying from any buffered reader.
    pub fn spawn<R>(reader: R, stats: SharedSessionStats) -> Result<Self, CollectorError>
    where
        R: BufRead + Send + 'static,
    {
        let (sender, receiver) = bounded(10_000);
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let handle = std::thread::Builder::new()
            .name("bboard-replay".to_string())
            .spawn(move || {
                let mut report = ReplayReport::default();

                for (number, line) in reader.lines().enumerate() {
                    if !flag.load(Ordering::SeqCst) {
                        break;
                    }

                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            tracing::error!("replay input failed at line {}: {e}", number + 1);
                            report.error = Some(e.to_string());
                            break;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }

                    match SensorFrame::parse_json(&line) {
                        Ok(frame) => {
                            report.frames += 1;
                            if sender.send(frame).is_err() {
                                // consumer is gone
                                break;
                            }
                        }
                        Err(e) => {
                            report.rejected += 1;
                            stats.record_rejected_frame();
                            tracing::warn!("rejected frame at line {}: {e}", number + 1);
                        }
                    }
                }

                flag.store(false, Ordering::SeqCst);
                report
            })
            .map_err(|e| CollectorError::Io(e.to_string()))?;

        Ok(Self {
            receiver,
            running,
            handle: Some(handle),
        })
    }

    /// Start replaying a file.
    pub fn open(path: impl AsRef<Path>, stats: SharedSessionStats) -> Result<Self, CollectorError> {
        let file = File::open(path.as_ref()).map_err(|e| {
            CollectorError::Io(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::spawn(BufReader::new(file), stats)
    }

    /// Ask the reader thread to stop after the current line.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the reader thread is still producing frames.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shared handle to stop the reader from another thread.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Get the receiver for frames.
    pub fn receiver(&self) -> &Receiver<SensorFrame> {
        &self.receiver
    }

    /// Wait for the reader thread to finish.
    pub fn join(&mut self) -> Result<ReplayReport, CollectorError> {
        let handle = self.handle.take().ok_or(CollectorError::AlreadyFinished)?;
        handle
            .join()
            .map_err(|_| CollectorError::Io("replay thread panicked".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::create_shared_stats;
    use std::io::Cursor;

    const INPUT: &str = r#"{"timestamp":"2014-06-01T12:00:00.000Z","channels":[800,800,200,200]}

{"timestamp":"2014-06-01T12:00:00.005Z","channels":[800,800,200]}
{"timestamp":"2014-06-01T12:00:00.010Z","channels":[10,12,9,11]}
garbage
"#;

    #[test]
    fn test_replay_skips_invalid_lines() {
        let stats = create_shared_stats();
        let mut collector = ReplayCollector::spawn(Cursor::new(INPUT), stats.clone()).unwrap();

        let frames: Vec<SensorFrame> = collector.receiver().iter().collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].channels, [800, 800, 200, 200]);
        assert_eq!(frames[1].channels, [10, 12, 9, 11]);

        let report = collector.join().unwrap();
        assert_eq!(report.frames, 2);
        assert_eq!(report.rejected, 2);
        assert!(report.error.is_none());
        assert_eq!(stats.snapshot().frames_rejected, 2);
        assert!(!collector.is_running());

        assert!(matches!(collector.join(), Err(CollectorError::AlreadyFinished)));
    }

    #[test]
    fn test_open_missing_file() {
        let result = ReplayCollector::open("/nonexistent/bboard/frames.jsonl", create_shared_stats());
        assert!(matches!(result, Err(CollectorError::Io(_))));
    }
}
