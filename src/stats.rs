//! Session statistics.
//!
//! Counts what the pipeline did in this session (frames, calibration samples,
//! rejected input, emitted events and sink outcomes) and persists the totals
//! so `bboard status` can report them later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Thread-safe counters shared by device workers and the sink writer.
#[derive(Debug)]
pub struct SessionStats {
    frames_processed: AtomicU64,
    calibration_samples: AtomicU64,
    frames_rejected: AtomicU64,
    events_emitted: AtomicU64,
    sink_writes: AtomicU64,
    sink_failures: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            frames_processed: AtomicU64::new(0),
            calibration_samples: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
            events_emitted: AtomicU64::new(0),
            sink_writes: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats that continue from, and save back to, `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("could not load previous session stats: {e}");
        }

        stats
    }

    pub fn record_frame(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_calibration_sample(&self) {
        self.calibration_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_frame(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_write(&self) {
        self.sink_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            calibration_samples: self.calibration_samples.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            sink_writes: self.sink_writes.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable summary for the end of a run.
    pub fn summary(&self) -> String {
        let s = self.snapshot();
        format!(
            "Session Statistics:\n\
             - Frames processed: {}\n\
             - Calibration samples: {}\n\
             - Frames rejected: {}\n\
             - Direction events: {}\n\
             - Sink writes: {} ({} failed)\n\
             - Session duration: {} seconds",
            s.frames_processed,
            s.calibration_samples,
            s.frames_rejected,
            s.events_emitted,
            s.sink_writes,
            s.sink_failures,
            s.session_duration_secs
        )
    }

    /// Save totals to disk, if persistence is enabled.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let s = self.snapshot();
            let persisted = PersistedStats {
                frames_processed: s.frames_processed,
                calibration_samples: s.calibration_samples,
                frames_rejected: s.frames_rejected,
                events_emitted: s.events_emitted,
                sink_writes: s.sink_writes,
                sink_failures: s.sink_failures,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.frames_processed
                    .store(persisted.frames_processed, Ordering::Relaxed);
                self.calibration_samples
                    .store(persisted.calibration_samples, Ordering::Relaxed);
                self.frames_rejected
                    .store(persisted.frames_rejected, Ordering::Relaxed);
                self.events_emitted
                    .store(persisted.events_emitted, Ordering::Relaxed);
                self.sink_writes.store(persisted.sink_writes, Ordering::Relaxed);
                self.sink_failures
                    .store(persisted.sink_failures, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub frames_processed: u64,
    pub calibration_samples: u64,
    pub frames_rejected: u64,
    pub events_emitted: u64,
    pub sink_writes: u64,
    pub sink_failures: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// On-disk format.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    frames_processed: u64,
    calibration_samples: u64,
    frames_rejected: u64,
    events_emitted: u64,
    sink_writes: u64,
    sink_failures: u64,
    last_updated: DateTime<Utc>,
}

pub type SharedSessionStats = Arc<SessionStats>;

pub fn create_shared_stats() -> SharedSessionStats {
    Arc::new(SessionStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedSessionStats {
    Arc::new(SessionStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = SessionStats::new();
        stats.record_frame();
        stats.record_frame();
        stats.record_calibration_sample();
        stats.record_sink_failure();

        let s = stats.snapshot();
        assert_eq!(s.frames_processed, 2);
        assert_eq!(s.calibration_samples, 1);
        assert_eq!(s.sink_failures, 1);
        assert_eq!(s.events_emitted, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("bboard-stats-{}", uuid::Uuid::new_v4()))
            .join("stats.json");

        let stats = SessionStats::with_persistence(path.clone());
        stats.record_event();
        stats.record_event();
        stats.record_rejected_frame();
        stats.save().unwrap();

        let reloaded = SessionStats::with_persistence(path.clone());
        let s = reloaded.snapshot();
        assert_eq!(s.events_emitted, 2);
        assert_eq!(s.frames_rejected, 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_summary_format() {
        let summary = SessionStats::new().summary();
        assert!(summary.contains("Frames processed"));
        assert!(summary.contains("Direction events"));
        assert!(summary.contains("failed"));
    }
}
