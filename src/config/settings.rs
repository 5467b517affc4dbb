use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::sensor::classifier::{ClassifierConfig, DEFAULT_NO_DATA_TIMEOUT_MS};
use crate::sensor::types::MAX_CHANNELS;
use crate::sensor::{applier::DEFAULT_COOLDOWN_MS, stabilizer::DEFAULT_STABLE_FRAMES};
use crate::serial::queue::DEFAULT_QUEUE_CAPACITY;
use crate::serial::reader::{
    ReaderSettings, DEFAULT_FAULT_BACKOFF_MS, DEFAULT_JOIN_TIMEOUT_MS, DEFAULT_MAX_LINE_LEN,
};
use crate::serial::LinkConfig;

use super::{ConfigError, ConfigResult};

/// Delay between opening the port and reading from it; ESP32-class boards reset on open
pub const DEFAULT_WARMUP_MS: u64 = 800;

/// Background reader tuning. The per-byte read timeout is `link.read_timeout_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub max_line_len: usize,
    pub fault_backoff_ms: u64,
    pub join_timeout_ms: u64,
    pub queue_capacity: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_line_len: DEFAULT_MAX_LINE_LEN,
            fault_backoff_ms: DEFAULT_FAULT_BACKOFF_MS,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ReaderConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Everything the pipeline needs, loadable from a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub link: LinkConfig,
    pub channel_count: usize,
    pub no_data_timeout_ms: u64,
    pub stable_frames: u32,
    pub cooldown_ms: u64,
    pub warmup_ms: u64,
    pub classifier: ClassifierConfig,
    pub reader: ReaderConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            channel_count: MAX_CHANNELS,
            no_data_timeout_ms: DEFAULT_NO_DATA_TIMEOUT_MS,
            stable_frames: DEFAULT_STABLE_FRAMES,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            warmup_ms: DEFAULT_WARMUP_MS,
            classifier: ClassifierConfig::default(),
            reader: ReaderConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.channel_count == 0 || self.channel_count > MAX_CHANNELS {
            return Err(ConfigError::Invalid(format!(
                "channel_count must be between 1 and {}, got {}",
                MAX_CHANNELS, self.channel_count
            )));
        }
        if self.stable_frames == 0 {
            return Err(ConfigError::Invalid("stable_frames must be at least 1".to_string()));
        }
        if self.link.address.trim().is_empty() {
            return Err(ConfigError::Invalid("link.address must not be empty".to_string()));
        }
        if self.link.baud_rate == 0 {
            return Err(ConfigError::Invalid("link.baud_rate must be positive".to_string()));
        }
        if self.link.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid("link.read_timeout_ms must be positive".to_string()));
        }
        if self.reader.max_line_len == 0 || self.reader.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "reader.max_line_len and reader.queue_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Reader thread settings; each byte read waits at most `link.read_timeout_ms`
    pub fn reader_settings(&self) -> ReaderSettings {
        ReaderSettings {
            byte_timeout: Duration::from_millis(self.link.read_timeout_ms),
            max_line_len: self.reader.max_line_len,
            fault_backoff: Duration::from_millis(self.reader.fault_backoff_ms),
        }
    }

    pub fn no_data_timeout(&self) -> Duration {
        Duration::from_millis(self.no_data_timeout_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }
}
