use std::time::Instant;

use crate::sensor::types::{RawSample, Sample, MAX_CHANNELS};
use crate::sensor::{Result, SampleError};

/// Latest sample per active channel
#[derive(Debug, Clone)]
pub struct SampleStore {
    latest: [Option<Sample>; MAX_CHANNELS],
    channel_count: usize,
}

impl SampleStore {
    /// `channel_count` is clamped to `1..=MAX_CHANNELS`
    pub fn new(channel_count: usize) -> Self {
        Self { latest: [None; MAX_CHANNELS], channel_count: channel_count.clamp(1, MAX_CHANNELS) }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Overwrite the channel's sample, stamping it with the consumer's tick time
    pub fn update(&mut self, raw: RawSample, now: Instant) -> Result<()> {
        let channel = usize::try_from(raw.channel)
            .ok()
            .filter(|ch| *ch < self.channel_count)
            .ok_or(SampleError::OutOfRangeChannel { channel: raw.channel, limit: self.channel_count })?;

        self.latest[channel] = Some(Sample {
            channel,
            r: raw.r,
            g: raw.g,
            b: raw.b,
            c: raw.c,
            received_at: now,
        });
        Ok(())
    }

    pub fn latest(&self, channel: usize) -> Option<&Sample> {
        self.latest.get(channel).and_then(|s| s.as_ref())
    }
}
