pub mod interface;
pub mod queue;
pub mod reader;

pub use interface::{DeviceLink, NativePort, SerialPortIO};
pub use queue::LineQueue;
pub use reader::{LineAssembler, ReaderHandle, ReaderSettings, ReaderStats};

use serde::{Deserialize, Serialize};

/// Connection settings for the sensor board's serial port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub address: String,
    pub baud_rate: u32,
    /// Applied at open and used by the reader for every byte read
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub dtr_enable: bool,
    pub rts_enable: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: reader::DEFAULT_BYTE_TIMEOUT_MS,
            write_timeout_ms: 50,
            dtr_enable: true,
            rts_enable: true,
        }
    }
}

#[cfg(windows)]
pub const DEFAULT_ADDRESS: &str = "COM3";
#[cfg(not(windows))]
pub const DEFAULT_ADDRESS: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUD_RATE: u32 = 115200;

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Device unavailable on {address}: {reason}")]
    DeviceUnavailable { address: String, reason: String },

    #[error("Communication timeout")]
    Timeout,

    #[error("Stream fault: {0}")]
    StreamFault(#[from] std::io::Error),

    #[error("Device link closed")]
    Closed,

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;
