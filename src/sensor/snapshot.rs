use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sensor::types::{decision_name, ChannelState, MixedColor, MAX_CHANNELS};

/// Display view of one sensor channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSlot {
    pub has_data: bool,
    pub r: i32,
    pub g: i32,
    pub b: i32,
    pub c: i32,
    pub base_color_name: String,
    /// Name of the tick's raw decided color
    pub final_color_name: String,
}

impl ChannelSlot {
    pub fn no_data() -> Self {
        Self {
            has_data: false,
            r: 0,
            g: 0,
            b: 0,
            c: 0,
            base_color_name: "none".to_string(),
            final_color_name: "none".to_string(),
        }
    }

    fn from_state(state: &ChannelState, decision: Option<MixedColor>) -> Self {
        match state.sample {
            Some(sample) if state.age_valid => Self {
                has_data: true,
                r: sample.r,
                g: sample.g,
                b: sample.b,
                c: sample.c,
                base_color_name: state.base_color.as_str().to_string(),
                final_color_name: decision_name(decision).to_string(),
            },
            _ => Self::no_data(),
        }
    }
}

/// Read-only per-tick view for display collaborators. Always exactly four slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySnapshot {
    pub slots: [ChannelSlot; MAX_CHANNELS],
    /// Raw (unstabilized) decision for this tick
    pub decided: Option<MixedColor>,
    /// Color most recently handed to the consumer
    pub applied: Option<MixedColor>,
    pub seq: u64,
    pub published_at: DateTime<Utc>,
}

impl DisplaySnapshot {
    /// Build from the tick's channel states; channels at or past `channel_count` report no data
    pub fn build(
        states: &[ChannelState],
        channel_count: usize,
        decided: Option<MixedColor>,
        applied: Option<MixedColor>,
        seq: u64,
    ) -> Self {
        let slots = std::array::from_fn(|ch| match states.get(ch) {
            Some(state) if ch < channel_count => ChannelSlot::from_state(state, decided),
            _ => ChannelSlot::no_data(),
        });
        Self { slots, decided, applied, seq, published_at: Utc::now() }
    }

    pub fn active_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.has_data).count()
    }
}

impl Default for DisplaySnapshot {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| ChannelSlot::no_data()),
            decided: None,
            applied: None,
            seq: 0,
            published_at: Utc::now(),
        }
    }
}
