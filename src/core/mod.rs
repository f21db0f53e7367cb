//! Streaming analytics core.
//!
//! This module contains:
//! - A fixed-capacity ring buffer for sensor frames
//! - Window summary statistics
//! - Idle-load calibration
//! - The direction classifier and its hysteresis latch

pub mod calibration;
pub mod classifier;
pub mod ring;
pub mod summary;

// Re-export commonly used types
pub use calibration::{apply_offsets, CalibrationTracker};
pub use classifier::{ClassifierConfig, DirectionClassifier, DirectionEvent, DirectionScores, Step};
pub use ring::RingBuffer;
pub use summary::{summarize, summarize_frames, ChannelStats, Percentiles, Summary, WEIGHT_FACTOR};
