//! Output records and sinks for committed direction events.
//!
//! A [`BoardRecord`] flattens a [`DirectionEvent`] into the row shape expected
//! downstream: one row per event, partitioned by a coarse time bucket.

use crate::collector::types::{LEFT_FRONT, LEFT_REAR, RIGHT_FRONT, RIGHT_REAR};
use crate::core::DirectionEvent;
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A committed direction event as written to a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRecord {
    pub id: Uuid,
    pub device_id: String,
    /// `timestamp` truncated to the partition interval
    pub bucket: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub direction: String,
    pub count: u32,
    pub period: i64,
    pub weight: u32,
    pub min: u64,
    pub max: u64,
    pub sum: u64,
    pub mean: u64,
    pub variance: u64,
    pub stdev: u64,
    pub rf_pcnt: u32,
    pub rr_pcnt: u32,
    pub lf_pcnt: u32,
    pub lr_pcnt: u32,
    pub rf_mean: u32,
    pub rr_mean: u32,
    pub lf_mean: u32,
    pub lr_mean: u32,
    pub rf_stdev: u64,
    pub rr_stdev: u64,
    pub lf_stdev: u64,
    pub lr_stdev: u64,
}

impl BoardRecord {
    /// Flatten an event. The record is stamped with the newest frame's time.
    pub fn from_event(device_id: &str, event: &DirectionEvent, bucket: Duration) -> Self {
        let s = &event.summary;
        let timestamp = s.last.timestamp;
        let percent = &s.channels.percent;
        let mean = &s.channels.mean;
        let stdev = &s.channels.stdev;

        Self {
            id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            bucket: timestamp.duration_trunc(bucket).unwrap_or(timestamp),
            timestamp,
            direction: event.direction.to_string(),
            count: s.count,
            period: s.period_nanos,
            weight: s.weight,
            min: s.min,
            max: s.max,
            sum: s.sum,
            mean: s.mean,
            variance: s.variance,
            stdev: s.stdev,
            rf_pcnt: percent[RIGHT_FRONT],
            rr_pcnt: percent[RIGHT_REAR],
            lf_pcnt: percent[LEFT_FRONT],
            lr_pcnt: percent[LEFT_REAR],
            rf_mean: mean[RIGHT_FRONT],
            rr_mean: mean[RIGHT_REAR],
            lf_mean: mean[LEFT_FRONT],
            lr_mean: mean[LEFT_REAR],
            rf_stdev: stdev[RIGHT_FRONT],
            rr_stdev: stdev[RIGHT_REAR],
            lf_stdev: stdev[LEFT_FRONT],
            lr_stdev: stdev[LEFT_REAR],
        }
    }
}

/// Sink errors.
#[derive(Debug)]
pub enum SinkError {
    Io(String),
    Serialize(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "IO error: {e}"),
            SinkError::Serialize(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for SinkError {}

/// Destination for committed events.
pub trait EventSink: Send {
    fn write(&mut self, record: &BoardRecord) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlSink {
    /// Open `path` for appending, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SinkError::Io(e.to_string()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SinkError::Io(e.to_string()))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonlSink {
    fn write(&mut self, record: &BoardRecord) -> Result<(), SinkError> {
        let line =
            serde_json::to_string(record).map_err(|e| SinkError::Serialize(e.to_string()))?;
        // flushed per record so a failed write is reported against that record
        writeln!(self.writer, "{line}")
            .and_then(|()| self.writer.flush())
            .map_err(|e| SinkError::Io(e.to_string()))
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush().map_err(|e| SinkError::Io(e.to_string()))
    }
}

/// Keeps records in memory; clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<BoardRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    ///
    /// A writer that panicked mid-run leaves the list poisoned but intact, so
    /// the records are still returned.
    pub fn records(&self) -> Vec<BoardRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => {
                tracing::warn!("memory sink lock poisoned, reading records anyway");
                poisoned.into_inner().clone()
            }
        }
    }
}

impl EventSink for MemorySink {
    fn write(&mut self, record: &BoardRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::{Direction, SensorFrame};
    use crate::core::summarize_frames;
    use chrono::TimeZone;

    fn sample_event() -> DirectionEvent {
        let ts = Utc.with_ymd_and_hms(2014, 6, 1, 12, 34, 56).unwrap();
        let frames = vec![
            SensorFrame::new(ts, [800, 800, 200, 200]),
            SensorFrame::new(ts + Duration::milliseconds(5), [800, 800, 200, 200]),
        ];
        DirectionEvent {
            direction: Direction::Right,
            summary: summarize_frames(&frames).unwrap(),
        }
    }

    #[test]
    fn test_record_fields() {
        let record = BoardRecord::from_event("00:1e:35:aa:bb:cc", &sample_event(), Duration::minutes(1));

        assert_eq!(record.device_id, "00:1e:35:aa:bb:cc");
        assert_eq!(record.direction, "right");
        assert_eq!(record.bucket, Utc.with_ymd_and_hms(2014, 6, 1, 12, 34, 0).unwrap());
        assert_eq!(record.count, 2);
        assert_eq!(record.period, 5_000_000);
        assert_eq!(record.sum, 4000);
        assert_eq!(record.rf_pcnt, 40);
        assert_eq!(record.lr_pcnt, 10);
        assert_eq!(record.rr_mean, 800);
        assert_eq!(record.lf_stdev, 0);
    }

    #[test]
    fn test_jsonl_sink_appends_lines() {
        let path = std::env::temp_dir()
            .join(format!("bboard-sink-{}", Uuid::new_v4()))
            .join("events.jsonl");
        let record = BoardRecord::from_event("dev", &sample_event(), Duration::minutes(1));

        {
            let mut sink = JsonlSink::open(&path).unwrap();
            sink.write(&record).unwrap();
            sink.write(&record).unwrap();
            sink.flush().unwrap();
            assert_eq!(sink.path(), path.as_path());
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: BoardRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, record);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_jsonl_sink_reports_failed_write() {
        let record = BoardRecord::from_event("dev", &sample_event(), Duration::minutes(1));
        let mut sink = JsonlSink::open("/dev/full").unwrap();

        assert!(matches!(sink.write(&record), Err(SinkError::Io(_))));
    }

    #[test]
    fn test_memory_sink_survives_poisoned_lock() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        let record = BoardRecord::from_event("dev", &sample_event(), Duration::minutes(1));
        writer.write(&record).unwrap();

        let shared = sink.clone();
        let result = std::thread::spawn(move || {
            let _guard = shared.records.lock().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(result.is_err());
        assert!(sink.records.is_poisoned());

        assert_eq!(sink.records(), vec![record.clone()]);
        writer.write(&record).unwrap();
        assert_eq!(sink.records().len(), 2);
    }

    #[test]
    fn test_memory_sink_shares_records() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        let record = BoardRecord::from_event("dev", &sample_event(), Duration::minutes(1));
        writer.write(&record).unwrap();
        assert_eq!(sink.records().len(), 1);
    }
}
