use std::time::{Duration, Instant};

use crate::sensor::stabilizer::Verdict;
use crate::sensor::types::MixedColor;

pub const DEFAULT_COOLDOWN_MS: u64 = 120;

/// Gate between confirmed decisions and the consumer callback.
///
/// An undecided confirmation never clears the applied color; it stays until a different color is
/// confirmed outside the cooldown window.
#[derive(Debug, Clone)]
pub struct Applier {
    cooldown: Duration,
    last_applied: Option<MixedColor>,
    last_applied_at: Option<Instant>,
}

impl Applier {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown, last_applied: None, last_applied_at: None }
    }

    pub fn last_applied(&self) -> Option<MixedColor> {
        self.last_applied
    }

    pub fn last_applied_at(&self) -> Option<Instant> {
        self.last_applied_at
    }

    fn cooled_down(&self, now: Instant) -> bool {
        match self.last_applied_at {
            Some(at) => now.saturating_duration_since(at) >= self.cooldown,
            None => true,
        }
    }

    /// Invoke `fire` if the verdict warrants a change. Returns the applied color.
    pub fn offer<F>(&mut self, verdict: Verdict, now: Instant, fire: F) -> Option<MixedColor>
    where
        F: FnOnce(MixedColor),
    {
        let color = verdict.confirmed().flatten()?;
        if Some(color) == self.last_applied || !self.cooled_down(now) {
            return None;
        }

        fire(color);
        self.last_applied = Some(color);
        self.last_applied_at = Some(now);
        Some(color)
    }
}

impl Default for Applier {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_COOLDOWN_MS))
    }
}
