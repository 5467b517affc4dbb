//! Background frame reader: turns the sensor byte stream into complete lines.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{DeviceLink, LineQueue, SerialError};

pub const DEFAULT_BYTE_TIMEOUT_MS: u64 = 50;
pub const DEFAULT_MAX_LINE_LEN: usize = 256;
pub const DEFAULT_FAULT_BACKOFF_MS: u64 = 50;
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderSettings {
    pub byte_timeout: Duration,
    pub max_line_len: usize,
    pub fault_backoff: Duration,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            byte_timeout: Duration::from_millis(DEFAULT_BYTE_TIMEOUT_MS),
            max_line_len: DEFAULT_MAX_LINE_LEN,
            fault_backoff: Duration::from_millis(DEFAULT_FAULT_BACKOFF_MS),
        }
    }
}

/// Accumulates bytes until a line feed completes a line.
#[derive(Debug)]
pub struct LineAssembler {
    buffer: Vec<u8>,
    max_len: usize,
    overflows: u64,
}

impl LineAssembler {
    pub fn new(max_len: usize) -> Self {
        Self { buffer: Vec::with_capacity(max_len), max_len, overflows: 0 }
    }

    /// Feed one byte; returns a line when `byte` terminates a non-empty one.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        if byte == b'\n' {
            let line = String::from_utf8_lossy(&self.buffer)
                .trim_end_matches(|c| c == '\r' || c == ' ')
                .to_string();
            self.buffer.clear();
            return if line.is_empty() { None } else { Some(line) };
        }

        if self.buffer.len() >= self.max_len {
            // Unterminated garbage; start over
            self.buffer.clear();
            self.overflows += 1;
            return None;
        }
        self.buffer.push(byte);
        None
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}

/// Counters written by the reader thread, read by the consumer
#[derive(Debug, Default)]
pub struct ReaderStats {
    pub lines_framed: AtomicU64,
    pub overflow_discards: AtomicU64,
    pub stream_faults: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl ReaderStats {
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|e| e.clone())
    }

    fn record_fault(&self, message: String) {
        self.stream_faults.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(message);
        }
    }
}

/// How a bounded join ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    Panicked,
    Abandoned,
    NotRunning,
}

/// Handle to the running reader thread
pub struct ReaderHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    stats: Arc<ReaderStats>,
}

impl ReaderHandle {
    /// Start the reader thread for `link`, feeding framed lines into `queue`
    pub fn spawn(link: Arc<DeviceLink>, queue: Arc<LineQueue>, settings: ReaderSettings) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(ReaderStats::default());
        let stop_flag = stop.clone();
        let stats_arc = stats.clone();

        let thread = thread::Builder::new()
            .name("chromalink-reader".into())
            .spawn(move || reader_loop(link, queue, settings, stop_flag, stats_arc))?;

        Ok(Self { stop, thread: Some(thread), stats })
    }

    pub fn stats(&self) -> Arc<ReaderStats> {
        self.stats.clone()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    pub fn signal_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Wait up to `timeout` for the thread to exit; abandon it otherwise
    pub fn join(&mut self, timeout: Duration) -> JoinOutcome {
        let Some(thread) = self.thread.take() else { return JoinOutcome::NotRunning };

        let deadline = Instant::now() + timeout;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                log::warn!("Reader thread did not exit within {:?}; abandoning it", timeout);
                return JoinOutcome::Abandoned;
            }
            thread::sleep(Duration::from_millis(2));
        }

        match thread.join() {
            Ok(()) => JoinOutcome::Joined,
            Err(_) => {
                log::error!("Reader thread panicked");
                JoinOutcome::Panicked
            }
        }
    }
}

impl std::fmt::Debug for ReaderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderHandle").field("running", &self.is_running()).finish()
    }
}

fn reader_loop(
    link: Arc<DeviceLink>,
    queue: Arc<LineQueue>,
    settings: ReaderSettings,
    stop: Arc<AtomicBool>,
    stats: Arc<ReaderStats>,
) {
    log::info!("Reader thread started on {}", link.address());
    let mut assembler = LineAssembler::new(settings.max_line_len);
    let mut fault_streak = 0u64;

    while !stop.load(Ordering::SeqCst) {
        match link.read_byte(settings.byte_timeout) {
            Ok(byte) => {
                fault_streak = 0;
                let overflows_before = assembler.overflows();
                if let Some(line) = assembler.push(byte) {
                    stats.lines_framed.fetch_add(1, Ordering::Relaxed);
                    queue.push(line);
                } else if assembler.overflows() != overflows_before {
                    stats.overflow_discards.fetch_add(1, Ordering::Relaxed);
                    log::debug!("Discarded unterminated input longer than {} bytes", settings.max_line_len);
                }
            }
            Err(SerialError::Timeout) => {}
            Err(e) => {
                if fault_streak == 0 {
                    log::warn!("Error reading sensor stream: {}", e);
                } else {
                    log::debug!("Sensor stream still failing ({} consecutive): {}", fault_streak + 1, e);
                }
                fault_streak += 1;
                stats.record_fault(e.to_string());
                thread::sleep(settings.fault_backoff);
            }
        }
    }

    // Close was requested while this thread held the port
    if !link.is_open() {
        link.close();
    }
    log::info!("Reader thread exiting ({})", link.address());
}
