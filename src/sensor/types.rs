use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Number of display slots, independent of the configured channel count
pub const MAX_CHANNELS: usize = 4;

/// Index reported for an undecided tick
pub const UNDECIDED_INDEX: i32 = -1;

/// One line of sensor output as it came off the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSample {
    /// Logical channel; may be out of range for this pipeline
    pub channel: i32,
    pub r: i32,
    pub g: i32,
    pub b: i32,
    /// Clear (unfiltered) intensity
    pub c: i32,
}

/// A stored sample stamped with the consumer tick that received it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub channel: usize,
    pub r: i32,
    pub g: i32,
    pub b: i32,
    pub c: i32,
    pub received_at: Instant,
}

/// Per-channel classification result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseColor {
    None,
    Red,
    Blue,
    Yellow,
}

impl BaseColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseColor::None => "none",
            BaseColor::Red => "red",
            BaseColor::Blue => "blue",
            BaseColor::Yellow => "yellow",
        }
    }

    pub fn is_some(&self) -> bool {
        !matches!(self, BaseColor::None)
    }
}

/// Color decided across all channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixedColor {
    Red = 0,
    Blue = 1,
    Yellow = 2,
    Purple = 3,
    Orange = 4,
    Green = 5,
}

impl MixedColor {
    pub const ALL: [MixedColor; 6] = [
        MixedColor::Red,
        MixedColor::Blue,
        MixedColor::Yellow,
        MixedColor::Purple,
        MixedColor::Orange,
        MixedColor::Green,
    ];

    pub fn index(&self) -> i32 {
        *self as i32
    }

    pub fn from_index(index: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.index() == index)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MixedColor::Red => "red",
            MixedColor::Blue => "blue",
            MixedColor::Yellow => "yellow",
            MixedColor::Purple => "purple",
            MixedColor::Orange => "orange",
            MixedColor::Green => "green",
        }
    }
}

/// Wire index of a decision: the color's index, or -1 when undecided
pub fn decision_index(decision: Option<MixedColor>) -> i32 {
    decision.map(|c| c.index()).unwrap_or(UNDECIDED_INDEX)
}

pub fn decision_name(decision: Option<MixedColor>) -> &'static str {
    decision.map(|c| c.as_str()).unwrap_or("none")
}

/// Derived per-tick view of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelState {
    pub sample: Option<Sample>,
    pub base_color: BaseColor,
    /// A sample exists and is younger than the no-data timeout
    pub age_valid: bool,
}

impl ChannelState {
    pub fn empty() -> Self {
        Self { sample: None, base_color: BaseColor::None, age_valid: false }
    }
}
