//! Window statistics over a ring of sensor frames.
//!
//! All statistics use unsigned, truncating integer arithmetic. Floating point
//! is only used to take `ceil(sqrt(variance))` for standard deviations and for
//! the weight conversion, after the integer values have been truncated.

use crate::collector::types::{
    Channels, Direction, DirectionCounts, SensorFrame, CHANNEL_COUNT,
};
use crate::core::ring::RingBuffer;
use serde::{Deserialize, Serialize};

/// Factor applied to the summed channel medians to produce the weight estimate.
pub const WEIGHT_FACTOR: f64 = 0.022046226218;

/// Per-channel statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub sum: [u64; CHANNEL_COUNT],
    pub mean: Channels,
    pub variance: [u64; CHANNEL_COUNT],
    pub stdev: [u64; CHANNEL_COUNT],
    /// Share of the total load carried by each channel, in whole percent
    pub percent: [u32; CHANNEL_COUNT],
}

/// Per-channel percentiles of the raw channel values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: Channels,
    pub p25: Channels,
    pub p50: Channels,
    pub p75: Channels,
    pub p95: Channels,
}

/// Statistics over the valid frames of a window.
///
/// The aggregate fields (`min` through `stdev`) describe the per-frame totals
/// of all four channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub count: u32,
    /// Mean time between consecutive frames
    pub period_nanos: i64,
    pub weight: u32,
    pub min: u64,
    pub max: u64,
    pub sum: u64,
    pub mean: u64,
    pub variance: u64,
    pub stdev: u64,
    pub channels: ChannelStats,
    pub percentiles: Percentiles,
    pub directions: DirectionCounts,
    pub first: SensorFrame,
    pub last: SensorFrame,
}

impl Summary {
    /// Replace the newest frame's placeholder tag with a decided direction.
    ///
    /// The histogram moves one count from `None` to `direction`, so it counts
    /// decisions rather than placeholders.
    pub fn retag_newest(&mut self, direction: Direction) {
        self.directions.decrement(self.last.direction);
        self.directions.increment(direction);
        self.last.direction = direction;
        if self.count == 1 {
            self.first.direction = direction;
        }
    }
}

/// Summarize the valid contents of a ring. Returns `None` for an empty ring.
pub fn summarize(ring: &RingBuffer<SensorFrame>) -> Option<Summary> {
    summarize_frames(&ring.to_vec())
}

/// Summarize a window of frames given oldest first.
pub fn summarize_frames(frames: &[SensorFrame]) -> Option<Summary> {
    let first = frames.first()?;
    let last = frames.last()?;
    let n = frames.len() as u64;

    let mut sum = 0u64;
    let mut min = u64::MAX;
    let mut max = 0u64;
    let mut channel_sum = [0u64; CHANNEL_COUNT];

    for frame in frames {
        let total = frame.total();
        sum += total;
        min = min.min(total);
        max = max.max(total);
        for (acc, &value) in channel_sum.iter_mut().zip(frame.channels.iter()) {
            *acc += u64::from(value);
        }
    }

    let mean = sum / n;

    let mut channel_mean: Channels = [0; CHANNEL_COUNT];
    for (slot, &total) in channel_mean.iter_mut().zip(channel_sum.iter()) {
        // the mean of u32 values always fits in u32
        *slot = (total / n) as u32;
    }

    let grand_total: u64 = channel_sum.iter().sum();
    let mut percent = [0u32; CHANNEL_COUNT];
    for (channel, pct) in percent.iter_mut().enumerate() {
        *pct = percent_of(channel, channel_sum[channel], grand_total);
    }

    // second pass: squared deviations
    let mut deviation = 0u64;
    let mut channel_deviation = [0u64; CHANNEL_COUNT];
    for frame in frames {
        let diff = frame.total().abs_diff(mean);
        deviation += diff * diff;
        for channel in 0..CHANNEL_COUNT {
            let diff = frame.channels[channel].abs_diff(channel_mean[channel]) as u64;
            channel_deviation[channel] += diff * diff;
        }
    }

    let variance = deviation / n;
    let mut channel_variance = [0u64; CHANNEL_COUNT];
    let mut channel_stdev = [0u64; CHANNEL_COUNT];
    for channel in 0..CHANNEL_COUNT {
        channel_variance[channel] = channel_deviation[channel] / n;
        channel_stdev[channel] = ceil_sqrt(channel_variance[channel]);
    }

    let percentiles = percentiles(frames);
    let median_total: u64 = percentiles.p50.iter().map(|&v| u64::from(v)).sum();
    let weight = (median_total as f64 * WEIGHT_FACTOR).floor() as u32;

    Some(Summary {
        count: frames.len() as u32,
        period_nanos: mean_period_nanos(frames),
        weight,
        min,
        max,
        sum,
        mean,
        variance,
        stdev: ceil_sqrt(variance),
        channels: ChannelStats {
            sum: channel_sum,
            mean: channel_mean,
            variance: channel_variance,
            stdev: channel_stdev,
            percent,
        },
        percentiles,
        directions: DirectionCounts::tally(frames),
        first: first.clone(),
        last: last.clone(),
    })
}

/// Whole-percent share of `part` in `whole`.
///
/// A zero total, or a channel sum larger than the total, yields 0.
fn percent_of(channel: usize, part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    if part > whole {
        tracing::warn!(channel, part, whole, "channel sum exceeds total, percent set to 0");
        return 0;
    }
    (part * 100 / whole) as u32
}

fn ceil_sqrt(value: u64) -> u64 {
    (value as f64).sqrt().ceil() as u64
}

/// Average gap between consecutive timestamps, 0 for a single frame.
fn mean_period_nanos(frames: &[SensorFrame]) -> i64 {
    if frames.len() < 2 {
        return 0;
    }
    let elapsed: i64 = frames
        .windows(2)
        .map(|pair| {
            (pair[1].timestamp - pair[0].timestamp)
                .num_nanoseconds()
                .unwrap_or(0)
        })
        .sum();
    elapsed / (frames.len() as i64 - 1)
}

/// Positional percentiles per channel: sorted values indexed at `n * pct / 100`.
fn percentiles(frames: &[SensorFrame]) -> Percentiles {
    let n = frames.len();
    let mut out = Percentiles::default();

    for channel in 0..CHANNEL_COUNT {
        let mut values: Vec<u32> = frames.iter().map(|f| f.channels[channel]).collect();
        values.sort_unstable();

        let at = |pct: usize| values[n * pct / 100];
        out.p5[channel] = at(5);
        out.p25[channel] = at(25);
        out.p50[channel] = at(50);
        out.p75[channel] = at(75);
        out.p95[channel] = at(95);
    }

    out
}
