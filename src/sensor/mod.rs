pub mod applier;
pub mod classifier;
pub mod parser;
pub mod resolver;
pub mod snapshot;
pub mod stabilizer;
pub mod store;
pub mod types;

pub use applier::Applier;
pub use classifier::{Classifier, ClassifierConfig, ClassifierRules, RatioRules, ThresholdRules};
pub use parser::parse_sample_line;
pub use resolver::resolve_mixed_color;
pub use snapshot::{ChannelSlot, DisplaySnapshot};
pub use stabilizer::{Stabilizer, Verdict};
pub use store::SampleStore;
pub use types::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    #[error("Malformed line: expected 4 or 5 fields, got {0}")]
    FieldCount(usize),

    #[error("Malformed line: field {index} is not an integer: {value:?}")]
    InvalidField { index: usize, value: String },

    #[error("Channel {channel} out of range (active channels: {limit})")]
    OutOfRangeChannel { channel: i32, limit: usize },
}

impl SampleError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, SampleError::FieldCount(_) | SampleError::InvalidField { .. })
    }
}

pub type Result<T> = std::result::Result<T, SampleError>;
