use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// FIFO of framed lines between the reader thread and the tick consumer.
///
/// Bounded: when full, the oldest line is dropped so the consumer always sees the freshest data.
pub struct LineQueue {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
    dropped: AtomicU64,
    overflowing: AtomicBool,
}

impl LineQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_QUEUE_CAPACITY))),
            capacity,
            dropped: AtomicU64::new(0),
            overflowing: AtomicBool::new(false),
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = match self.lines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if lines.len() >= self.capacity {
            lines.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
            if !self.overflowing.swap(true, Ordering::Relaxed) {
                log::warn!("Line queue full ({} lines); dropping oldest lines until the consumer catches up", self.capacity);
            }
        }
        lines.push_back(line);
    }

    /// Take every pending line in enqueue order
    pub fn drain(&self) -> Vec<String> {
        let mut lines = match self.lines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.overflowing.store(false, Ordering::Relaxed);
        lines.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total lines discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for LineQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
