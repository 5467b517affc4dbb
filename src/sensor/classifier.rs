use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::sensor::types::{BaseColor, ChannelState, Sample};

pub const DEFAULT_NO_DATA_TIMEOUT_MS: u64 = 700;
pub const DEFAULT_MIN_CLEAR: i32 = 10;

/// Absolute channel thresholds. Yellow is tested first, then blue, then red.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdRules {
    pub yellow_r_min: i32,
    pub yellow_g_min: i32,
    pub blue_min: i32,
    pub red_min: i32,
}

impl Default for ThresholdRules {
    fn default() -> Self {
        Self { yellow_r_min: 100, yellow_g_min: 220, blue_min: 100, red_min: 100 }
    }
}

/// Thresholds on each channel's share of r+g+b. Same precedence as [`ThresholdRules`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatioRules {
    pub yellow_rg_min: f64,
    pub yellow_b_max: f64,
    pub blue_min: f64,
    pub red_min: f64,
}

impl Default for RatioRules {
    fn default() -> Self {
        Self { yellow_rg_min: 0.30, yellow_b_max: 0.25, blue_min: 0.45, red_min: 0.50 }
    }
}

/// Classification strategy, applied uniformly to every channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ClassifierRules {
    Threshold(ThresholdRules),
    Ratio(RatioRules),
}

impl Default for ClassifierRules {
    fn default() -> Self {
        ClassifierRules::Threshold(ThresholdRules::default())
    }
}

impl ClassifierRules {
    /// Apply the color rules to raw values, ignoring freshness and brightness
    pub fn base_color(&self, r: i32, g: i32, b: i32) -> BaseColor {
        match self {
            ClassifierRules::Threshold(t) => {
                if r >= t.yellow_r_min && g >= t.yellow_g_min {
                    BaseColor::Yellow
                } else if b >= t.blue_min {
                    BaseColor::Blue
                } else if r >= t.red_min {
                    BaseColor::Red
                } else {
                    BaseColor::None
                }
            }
            ClassifierRules::Ratio(t) => {
                let sum = r as f64 + g as f64 + b as f64;
                if sum <= 0.0 {
                    return BaseColor::None;
                }
                let (rf, gf, bf) = (r as f64 / sum, g as f64 / sum, b as f64 / sum);
                if rf >= t.yellow_rg_min && gf >= t.yellow_rg_min && bf <= t.yellow_b_max {
                    BaseColor::Yellow
                } else if bf >= t.blue_min {
                    BaseColor::Blue
                } else if rf >= t.red_min {
                    BaseColor::Red
                } else {
                    BaseColor::None
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Below this clear value nothing is presented to the sensor
    pub min_clear: i32,
    pub rules: ClassifierRules,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self { min_clear: DEFAULT_MIN_CLEAR, rules: ClassifierRules::default() }
    }
}

/// Per-channel classifier
#[derive(Debug, Clone)]
pub struct Classifier {
    config: ClassifierConfig,
    no_data_timeout: Duration,
}

impl Classifier {
    pub fn new(config: ClassifierConfig, no_data_timeout: Duration) -> Self {
        Self { config, no_data_timeout }
    }

    pub fn no_data_timeout(&self) -> Duration {
        self.no_data_timeout
    }

    pub fn classify(&self, sample: Option<&Sample>, now: Instant) -> ChannelState {
        let Some(sample) = sample else { return ChannelState::empty() };

        if now.saturating_duration_since(sample.received_at) > self.no_data_timeout {
            return ChannelState { sample: Some(*sample), base_color: BaseColor::None, age_valid: false };
        }

        let base_color = if sample.c < self.config.min_clear {
            BaseColor::None
        } else {
            self.config.rules.base_color(sample.r, sample.g, sample.b)
        };

        ChannelState { sample: Some(*sample), base_color, age_valid: true }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default(), Duration::from_millis(DEFAULT_NO_DATA_TIMEOUT_MS))
    }
}
