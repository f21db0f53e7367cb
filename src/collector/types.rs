//! Sensor frame types for the balance board.
//!
//! A frame is one timestamped reading of the four load cells. Channel order is
//! fixed: `[right-front, right-rear, left-front, left-rear]`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of load cells on the board.
pub const CHANNEL_COUNT: usize = 4;

/// Channel index of the right-front load cell.
pub const RIGHT_FRONT: usize = 0;
/// Channel index of the right-rear load cell.
pub const RIGHT_REAR: usize = 1;
/// Channel index of the left-front load cell.
pub const LEFT_FRONT: usize = 2;
/// Channel index of the left-rear load cell.
pub const LEFT_REAR: usize = 3;

/// Largest value a load cell can report (16-bit sensor).
pub const MAX_CHANNEL_VALUE: u32 = u16::MAX as u32;

/// One value per load cell, in channel order.
pub type Channels = [u32; CHANNEL_COUNT];

/// Direction decided for a frame or a window.
///
/// The declaration order is significant: ties between scores are broken in
/// favour of the earliest variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    #[default]
    None,
}

impl Direction {
    /// All directions in tie-break order.
    pub const ALL: [Direction; 5] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
        Direction::None,
    ];

    /// Position of this direction in [`Direction::ALL`].
    pub fn index(self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
            Direction::None => 4,
        }
    }

    /// Lowercase label used in sink records.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::None => "none",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Occurrence count per direction, indexed in [`Direction::ALL`] order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectionCounts([u32; 5]);

impl DirectionCounts {
    /// Count the direction tags of a sequence of frames.
    pub fn tally<'a>(frames: impl IntoIterator<Item = &'a SensorFrame>) -> Self {
        let mut counts = Self::default();
        for frame in frames {
            counts.increment(frame.direction);
        }
        counts
    }

    pub fn get(&self, direction: Direction) -> u32 {
        self.0[direction.index()]
    }

    pub fn increment(&mut self, direction: Direction) {
        self.0[direction.index()] += 1;
    }

    /// Decrement, stopping at zero.
    pub fn decrement(&mut self, direction: Direction) {
        let slot = &mut self.0[direction.index()];
        *slot = slot.saturating_sub(1);
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }
}

/// A single timestamped reading of all four load cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorFrame {
    /// When the reading was taken
    pub timestamp: DateTime<Utc>,
    /// Load cell values in channel order
    pub channels: Channels,
    /// Direction assigned by the classifier (`None` until decided)
    pub direction: Direction,
}

impl SensorFrame {
    /// Create an untagged frame.
    pub fn new(timestamp: DateTime<Utc>, channels: Channels) -> Self {
        Self {
            timestamp,
            channels,
            direction: Direction::None,
        }
    }

    /// Sum of all four channels.
    pub fn total(&self) -> u64 {
        self.channels.iter().map(|&v| u64::from(v)).sum()
    }

    /// Mean of the four channels (truncating).
    pub fn average(&self) -> u64 {
        self.total() / CHANNEL_COUNT as u64
    }
}

impl fmt::Display for SensorFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>14}, {:>5}, {:>5}, {:>5}, {:>5}, {:>6}, {:>5}",
            self.timestamp.timestamp_subsec_nanos(),
            self.channels[RIGHT_FRONT],
            self.channels[RIGHT_REAR],
            self.channels[LEFT_FRONT],
            self.channels[LEFT_REAR],
            self.total(),
            self.average()
        )
    }
}

/// A reading as delivered by a frame source, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReading {
    pub timestamp: DateTime<Utc>,
    pub channels: Vec<u32>,
}

/// Reasons a raw reading is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Wrong number of channel values
    ChannelCount(usize),
    /// A channel value exceeds the sensor range
    OutOfRange { channel: usize, value: u32 },
    /// The record could not be decoded
    Parse(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::ChannelCount(n) => {
                write!(f, "expected {CHANNEL_COUNT} channels, got {n}")
            }
            FrameError::OutOfRange { channel, value } => {
                write!(
                    f,
                    "channel {channel} value {value} exceeds {MAX_CHANNEL_VALUE}"
                )
            }
            FrameError::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for FrameError {}

impl TryFrom<RawReading> for SensorFrame {
    type Error = FrameError;

    fn try_from(raw: RawReading) -> Result<Self, Self::Error> {
        let channels: Channels = raw
            .channels
            .as_slice()
            .try_into()
            .map_err(|_| FrameError::ChannelCount(raw.channels.len()))?;

        if let Some((channel, &value)) = channels
            .iter()
            .enumerate()
            .find(|&(_, &v)| v > MAX_CHANNEL_VALUE)
        {
            return Err(FrameError::OutOfRange { channel, value });
        }

        Ok(SensorFrame::new(raw.timestamp, channels))
    }
}

impl SensorFrame {
    /// Decode and validate a single JSON reading.
    pub fn parse_json(line: &str) -> Result<Self, FrameError> {
        let raw: RawReading =
            serde_json::from_str(line).map_err(|e| FrameError::Parse(e.to_string()))?;
        SensorFrame::try_from(raw)
    }
}
