//! Idle-load calibration.
//!
//! Every board reads slightly heavy on some corners when nobody stands on it.
//! While the total load stays under the mass threshold, frames are collected
//! into a dedicated ring and the per-channel mean of that ring becomes the
//! offset subtracted from loaded frames.

use crate::collector::types::{Channels, SensorFrame, CHANNEL_COUNT};
use crate::core::ring::RingBuffer;
use crate::core::summary::{summarize, Summary};

/// Subtract per-channel offsets, clamping at zero.
pub fn apply_offsets(channels: &Channels, offsets: &Channels) -> Channels {
    let mut adjusted = [0; CHANNEL_COUNT];
    for (i, out) in adjusted.iter_mut().enumerate() {
        if channels[i] > offsets[i] {
            *out = channels[i] - offsets[i];
        }
    }
    adjusted
}

/// Rolling per-channel baseline computed from idle frames.
#[derive(Debug, Clone)]
pub struct CalibrationTracker {
    samples: RingBuffer<SensorFrame>,
    mass_threshold: u64,
    summary: Option<Summary>,
}

impl CalibrationTracker {
    pub fn new(capacity: usize, mass_threshold: u32) -> Self {
        Self {
            samples: RingBuffer::new(capacity),
            mass_threshold: u64::from(mass_threshold),
            summary: None,
        }
    }

    /// Whether the frame's raw total is below the "someone is on the board" threshold.
    pub fn is_idle(&self, frame: &SensorFrame) -> bool {
        frame.total() < self.mass_threshold
    }

    /// Record an idle frame and refresh the offsets.
    pub fn observe(&mut self, frame: SensorFrame) {
        self.samples.insert(frame);
        self.summary = summarize(&self.samples);
    }

    /// Current per-channel offsets; zero until the first idle frame.
    pub fn offsets(&self) -> Channels {
        self.summary
            .as_ref()
            .map(|s| s.channels.mean)
            .unwrap_or_default()
    }

    /// Subtract the current offsets from raw channel values.
    pub fn apply(&self, channels: &Channels) -> Channels {
        apply_offsets(channels, &self.offsets())
    }

    /// Latest summary of the idle samples.
    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Drop all samples, e.g. when a device is reattached.
    pub fn reset(&mut self) {
        self.samples.reset();
        self.summary = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_offset_clamps_at_zero() {
        let adjusted = apply_offsets(&[10, 5, 0, 300], &[10, 12, 1, 100]);
        assert_eq!(adjusted, [0, 0, 0, 200]);
    }

    #[test]
    fn test_offsets_start_at_zero() {
        let tracker = CalibrationTracker::new(100, 300);
        assert_eq!(tracker.offsets(), [0, 0, 0, 0]);
        assert_eq!(tracker.apply(&[1, 2, 3, 4]), [1, 2, 3, 4]);
        assert!(tracker.summary().is_none());
    }

    #[test]
    fn test_idle_threshold_is_strict() {
        let tracker = CalibrationTracker::new(10, 300);
        assert!(tracker.is_idle(&SensorFrame::new(Utc::now(), [100, 100, 99, 0])));
        assert!(!tracker.is_idle(&SensorFrame::new(Utc::now(), [100, 100, 100, 0])));
    }

    #[test]
    fn test_offsets_follow_idle_mean() {
        let mut tracker = CalibrationTracker::new(4, 300);
        for channels in [[10, 0, 0, 0], [20, 0, 0, 0], [30, 0, 0, 0], [40, 0, 0, 0]] {
            tracker.observe(SensorFrame::new(Utc::now(), channels));
        }
        assert_eq!(tracker.offsets()[0], 25);

        // rolling: the oldest sample drops out
        tracker.observe(SensorFrame::new(Utc::now(), [50, 0, 0, 0]));
        assert_eq!(tracker.sample_count(), 4);
        assert_eq!(tracker.offsets()[0], 35);

        tracker.reset();
        assert_eq!(tracker.sample_count(), 0);
        assert_eq!(tracker.offsets(), [0, 0, 0, 0]);
    }
}
