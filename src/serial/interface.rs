use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, TryLockError};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, SerialPort};

use super::{LinkConfig, Result, SerialError};

/// How long `close` waits for the reader to release the port before deferring the release
pub const CLOSE_LOCK_WAIT: Duration = Duration::from_millis(100);

/// Byte-level access to the sensor board.
///
/// Implemented for real serial ports by [`NativePort`]; tests and replay hosts provide scripted
/// sources.
pub trait SerialPortIO: Send {
    /// Read a single byte, waiting at most `timeout`.
    ///
    /// Returns [`SerialError::Timeout`] when nothing arrived in time.
    fn read_byte(&mut self, timeout: Duration) -> Result<u8>;

    /// Final cleanup before the source is dropped. Called at most once per link; the OS handle
    /// itself is released when the source is dropped.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// `SerialPortIO` backed by the `serialport` crate
pub struct NativePort {
    port: Box<dyn SerialPort>,
}

impl NativePort {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl SerialPortIO for NativePort {
    fn read_byte(&mut self, timeout: Duration) -> Result<u8> {
        if self.port.timeout() != timeout {
            self.port.set_timeout(timeout)?;
        }

        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(1) => Ok(byte[0]),
            // A zero-length read on a serial port means the device went away
            Ok(_) => Err(SerialError::StreamFault(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "serial port returned end of stream",
            ))),
            Err(ref e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Err(SerialError::Timeout)
            }
            Err(e) => Err(SerialError::StreamFault(e)),
        }
    }

    // Discards unread input; the port handle closes when `NativePort` drops
    fn close(&mut self) -> Result<()> {
        self.port.clear(ClearBuffer::All)?;
        Ok(())
    }
}

/// Owned connection to the sensor board.
///
/// Shared between the consumer (which closes it) and the reader thread (which reads from it).
/// `close` is idempotent and releases the underlying handle exactly once. If the reader holds the
/// port when close is requested, the handle is released by a later `close` call, which the
/// reader makes itself on exit.
pub struct DeviceLink {
    address: String,
    io: Mutex<Option<Box<dyn SerialPortIO>>>,
    closed: AtomicBool,
    close_wait: Duration,
}

impl DeviceLink {
    /// Open and configure the serial port described by `config`
    pub fn open(config: &LinkConfig) -> Result<Self> {
        let unavailable = |reason: String| SerialError::DeviceUnavailable {
            address: config.address.clone(),
            reason,
        };

        let mut port = serialport::new(config.address.as_str(), config.baud_rate)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()
            .map_err(|e| unavailable(e.to_string()))?;

        port.write_data_terminal_ready(config.dtr_enable)
            .map_err(|e| unavailable(format!("failed to set DTR: {}", e)))?;
        port.write_request_to_send(config.rts_enable)
            .map_err(|e| unavailable(format!("failed to set RTS: {}", e)))?;

        log::info!(
            "Opened sensor link on {} at {} baud (read timeout {}ms, write timeout {}ms, dtr={}, rts={})",
            config.address,
            config.baud_rate,
            config.read_timeout_ms,
            config.write_timeout_ms,
            config.dtr_enable,
            config.rts_enable
        );

        Ok(Self::from_io(config.address.clone(), Box::new(NativePort::new(port))))
    }

    /// Wrap an already-open byte source
    pub fn from_io(address: impl Into<String>, io: Box<dyn SerialPortIO>) -> Self {
        Self {
            address: address.into(),
            io: Mutex::new(Some(io)),
            closed: AtomicBool::new(false),
            close_wait: CLOSE_LOCK_WAIT,
        }
    }

    pub fn with_close_wait(mut self, wait: Duration) -> Self {
        self.close_wait = wait;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Read one byte with the given timeout
    pub fn read_byte(&self, timeout: Duration) -> Result<u8> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SerialError::Closed);
        }
        let mut guard = match self.io.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_mut() {
            Some(io) => io.read_byte(timeout),
            None => Err(SerialError::Closed),
        }
    }

    /// Close the link. Safe to call any number of times; the underlying source is released once.
    ///
    /// Waits up to the close wait for the port lock. When the reader still holds it, the link stays
    /// closed for reads and the release is left to the next `close` call.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            log::debug!("Close of sensor link {} already requested", self.address);
        }

        let deadline = Instant::now() + self.close_wait;
        let taken = loop {
            match self.io.try_lock() {
                Ok(mut guard) => break guard.take(),
                Err(TryLockError::Poisoned(poisoned)) => break poisoned.into_inner().take(),
                Err(TryLockError::WouldBlock) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(TryLockError::WouldBlock) => {
                    log::warn!(
                        "Sensor link {} busy after {:?}; release deferred until the reader exits",
                        self.address,
                        self.close_wait
                    );
                    return;
                }
            }
        };

        if let Some(mut io) = taken {
            if let Err(e) = io.close() {
                log::warn!("Error while closing sensor link {}: {}", self.address, e);
            }
            drop(io);
            log::info!("Closed sensor link {}", self.address);
        }
    }

    /// True once the underlying source has been closed and dropped
    pub fn is_released(&self) -> bool {
        match self.io.try_lock() {
            Ok(guard) => guard.is_none(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().is_none(),
            Err(TryLockError::WouldBlock) => false,
        }
    }
}

impl std::fmt::Debug for DeviceLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLink")
            .field("address", &self.address)
            .field("open", &self.is_open())
            .finish()
    }
}
