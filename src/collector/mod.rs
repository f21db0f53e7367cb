//! Frame sources for the analytics pipeline.
//!
//! Device polling lives outside this crate; here a source is anything that
//! yields validated, time-ordered [`SensorFrame`]s over a channel.

pub mod replay;
pub mod types;

// Re-export commonly used types
pub use replay::{CollectorError, ReplayCollector, ReplayReport};
pub use types::{
    Channels, Direction, DirectionCounts, FrameError, RawReading, SensorFrame, CHANNEL_COUNT,
    LEFT_FRONT, LEFT_REAR, MAX_CHANNEL_VALUE, RIGHT_FRONT, RIGHT_REAR,
};
