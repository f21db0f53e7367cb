//! Direction classification with a hysteresis latch.
//!
//! Each loaded frame is offset-corrected, pushed into the analytics window and
//! the window is re-summarized. The share of load on each edge of the board
//! gives four diagonal scores plus a neutral score; the best score is the
//! frame's decision. A direction is only committed once it has been decided
//! more than `threshold_count` times within the window, at which point the
//! event is emitted and the window starts over.

use crate::collector::types::{
    Channels, Direction, SensorFrame, CHANNEL_COUNT, LEFT_FRONT, LEFT_REAR, RIGHT_FRONT,
    RIGHT_REAR,
};
use crate::core::calibration::CalibrationTracker;
use crate::core::ring::RingBuffer;
use crate::core::summary::{summarize, Summary};
use serde::{Deserialize, Serialize};

/// Tunables for one device's classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Total load below which the board is considered empty
    pub mass_threshold: u32,
    /// Decisions a direction needs (exclusive) before it is emitted
    pub threshold_count: u32,
    /// Frames kept in the analytics window
    pub window_capacity: usize,
    /// Idle frames kept for calibration
    pub calibration_capacity: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            mass_threshold: 300,
            threshold_count: 10,
            window_capacity: 20,
            calibration_capacity: 100,
        }
    }
}

/// Scores for every direction, in [`Direction::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionScores(pub [u32; 5]);

impl DirectionScores {
    /// Score each edge of the board from per-channel load percentages.
    ///
    /// The neutral score divides by 3 instead of 4, so an edge has to clearly
    /// dominate before it beats `None`.
    pub fn from_percent(percent: &[u32; CHANNEL_COUNT]) -> Self {
        let up = percent[RIGHT_FRONT] + percent[LEFT_FRONT];
        let down = percent[RIGHT_REAR] + percent[LEFT_REAR];
        let left = percent[LEFT_FRONT] + percent[LEFT_REAR];
        let right = percent[RIGHT_FRONT] + percent[RIGHT_REAR];
        let none = (up + down + left + right) / 3;
        Self([up, down, left, right, none])
    }

    pub fn get(&self, direction: Direction) -> u32 {
        self.0[direction.index()]
    }

    /// Highest score wins; the first maximum in enumeration order breaks ties.
    pub fn decide(&self) -> Direction {
        let mut best = Direction::Up;
        for direction in Direction::ALL {
            if self.get(direction) > self.get(best) {
                best = direction;
            }
        }
        best
    }
}

/// A committed direction together with the window that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionEvent {
    pub direction: Direction,
    pub summary: Summary,
}

/// Outcome of feeding one frame to the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The frame was idle and went to calibration
    Calibrated { offsets: Channels },
    /// The frame was classified but nothing is committed yet
    Accumulating { direction: Direction, count: u32 },
    /// A direction was committed and the window was reset
    Emitted(DirectionEvent),
}

/// Per-device classifier state: the analytics window and its calibration.
#[derive(Debug, Clone)]
pub struct DirectionClassifier {
    config: ClassifierConfig,
    window: RingBuffer<SensorFrame>,
    calibration: CalibrationTracker,
}

impl DirectionClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            window: RingBuffer::new(config.window_capacity),
            calibration: CalibrationTracker::new(
                config.calibration_capacity,
                config.mass_threshold,
            ),
            config,
        }
    }

    /// Feed one raw frame.
    pub fn process(&mut self, frame: SensorFrame) -> Step {
        if self.calibration.is_idle(&frame) {
            self.calibration.observe(frame);
            return Step::Calibrated {
                offsets: self.calibration.offsets(),
            };
        }

        let adjusted = SensorFrame::new(frame.timestamp, self.calibration.apply(&frame.channels));
        self.window.insert(adjusted);

        let Some(mut summary) = summarize(&self.window) else {
            return Step::Accumulating {
                direction: Direction::None,
                count: 0,
            };
        };

        let scores = DirectionScores::from_percent(&summary.channels.percent);
        // an unloaded window has no edge to favour
        let direction = if summary.channels.sum.iter().all(|&sum| sum == 0) {
            Direction::None
        } else {
            scores.decide()
        };

        if let Some(newest) = self.window.newest_mut() {
            newest.direction = direction;
        }
        summary.retag_newest(direction);

        let count = summary.directions.get(direction);
        tracing::debug!(%direction, count, scores = ?scores.0, "frame classified");

        if count > self.config.threshold_count {
            self.window.reset();
            tracing::debug!(%direction, count, "direction committed, window reset");
            return Step::Emitted(DirectionEvent { direction, summary });
        }

        Step::Accumulating { direction, count }
    }

    /// Clear the analytics window, keeping calibration.
    pub fn reset(&mut self) {
        self.window.reset();
    }

    /// Clear both the window and calibration, for a newly attached device.
    pub fn reattach(&mut self) {
        self.window.reset();
        self.calibration.reset();
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn calibration(&self) -> &CalibrationTracker {
        &self.calibration
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn frame(i: i64, channels: Channels) -> SensorFrame {
        let start = Utc.with_ymd_and_hms(2014, 6, 1, 12, 0, 0).unwrap();
        SensorFrame::new(start + Duration::milliseconds(i), channels)
    }

    #[test]
    fn test_scores_from_percent() {
        let scores = DirectionScores::from_percent(&[40, 40, 10, 10]);
        assert_eq!(scores.get(Direction::Up), 50);
        assert_eq!(scores.get(Direction::Down), 50);
        assert_eq!(scores.get(Direction::Left), 20);
        assert_eq!(scores.get(Direction::Right), 80);
        assert_eq!(scores.get(Direction::None), 66);
        assert_eq!(scores.decide(), Direction::Right);
    }

    #[test]
    fn test_even_load_is_neutral() {
        let scores = DirectionScores::from_percent(&[25, 25, 25, 25]);
        assert_eq!(scores.decide(), Direction::None);
    }

    #[test]
    fn test_tie_goes_to_first_direction() {
        assert_eq!(DirectionScores([50, 50, 50, 50, 10]).decide(), Direction::Up);
        assert_eq!(DirectionScores([10, 60, 60, 60, 60]).decide(), Direction::Down);
        assert_eq!(DirectionScores([10, 10, 40, 40, 5]).decide(), Direction::Left);
        assert_eq!(DirectionScores([0, 0, 0, 0, 0]).decide(), Direction::Up);
    }

    #[test]
    fn test_latch_boundary_is_strict() {
        let config = ClassifierConfig {
            threshold_count: 3,
            ..ClassifierConfig::default()
        };
        let mut classifier = DirectionClassifier::new(config);

        for i in 1..=3 {
            match classifier.process(frame(i, [100, 100, 900, 900])) {
                Step::Accumulating { direction, count } => {
                    assert_eq!(direction, Direction::Left);
                    assert_eq!(count, i as u32);
                }
                other => panic!("unexpected step {other:?}"),
            }
        }
        assert_eq!(classifier.window_len(), 3);

        match classifier.process(frame(4, [100, 100, 900, 900])) {
            Step::Emitted(event) => {
                assert_eq!(event.direction, Direction::Left);
                assert_eq!(event.summary.count, 4);
                assert_eq!(event.summary.directions.get(Direction::Left), 4);
                assert_eq!(event.summary.directions.get(Direction::None), 0);
            }
            other => panic!("unexpected step {other:?}"),
        }
        assert_eq!(classifier.window_len(), 0);
    }

    #[test]
    fn test_unloaded_window_falls_back_to_none() {
        let config = ClassifierConfig {
            mass_threshold: 0,
            ..ClassifierConfig::default()
        };
        let mut classifier = DirectionClassifier::new(config);

        for i in 1..=10 {
            match classifier.process(frame(i, [0, 0, 0, 0])) {
                Step::Accumulating { direction, count } => {
                    assert_eq!(direction, Direction::None);
                    assert_eq!(count, i as u32);
                }
                other => panic!("unexpected step {other:?}"),
            }
        }

        match classifier.process(frame(11, [0, 0, 0, 0])) {
            Step::Emitted(event) => {
                assert_eq!(event.direction, Direction::None);
                assert_eq!(event.summary.directions.get(Direction::Up), 0);
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn test_idle_frames_do_not_touch_window() {
        let mut classifier = DirectionClassifier::new(ClassifierConfig::default());
        let step = classifier.process(frame(0, [10, 12, 9, 11]));
        assert_eq!(
            step,
            Step::Calibrated {
                offsets: [10, 12, 9, 11]
            }
        );
        assert_eq!(classifier.window_len(), 0);
        assert_eq!(classifier.calibration().sample_count(), 1);
    }

    #[test]
    fn test_offsets_applied_before_insert() {
        let mut classifier = DirectionClassifier::new(ClassifierConfig::default());
        classifier.process(frame(0, [50, 50, 50, 50]));

        // both left cells fall under their offsets, so only the right edge carries load
        match classifier.process(frame(1, [450, 450, 40, 50])) {
            Step::Accumulating { direction, count } => {
                assert_eq!(direction, Direction::Right);
                assert_eq!(count, 1);
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn test_reattach_clears_calibration() {
        let mut classifier = DirectionClassifier::new(ClassifierConfig::default());
        classifier.process(frame(0, [10, 10, 10, 10]));
        classifier.process(frame(1, [800, 800, 200, 200]));
        assert_eq!(classifier.window_len(), 1);

        classifier.reset();
        assert_eq!(classifier.window_len(), 0);
        assert_eq!(classifier.calibration().sample_count(), 1);

        classifier.reattach();
        assert_eq!(classifier.calibration().sample_count(), 0);
        assert_eq!(classifier.calibration().offsets(), [0, 0, 0, 0]);
    }
}
