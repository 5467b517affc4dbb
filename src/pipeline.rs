//! Tick-driven color decision pipeline.
//!
//! The host calls [`ColorPipeline::init`] once, [`ColorPipeline::tick`] from its periodic update,
//! and [`ColorPipeline::shutdown`] from any teardown path. All blocking I/O happens on the reader
//! thread; `tick` only drains the line queue and runs the classification stages.
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::{ConfigResult, PipelineConfig};
use crate::sensor::types::{ChannelState, MixedColor, MAX_CHANNELS};
use crate::sensor::{
    parse_sample_line, resolve_mixed_color, Applier, Classifier, DisplaySnapshot, SampleStore,
    Stabilizer, Verdict,
};
use crate::serial::reader::JoinOutcome;
use crate::serial::{DeviceLink, LineQueue, ReaderHandle, ReaderStats};

/// Downstream consumer of applied colors
pub trait ColorSink: Send {
    fn apply_decided_color(&mut self, color: MixedColor);
}

impl<F> ColorSink for F
where
    F: FnMut(MixedColor) + Send,
{
    fn apply_decided_color(&mut self, color: MixedColor) {
        self(color)
    }
}

/// Where the device link is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    NotInitialized,
    /// Open failed; the pipeline runs without data
    Unavailable,
    WarmingUp,
    Reading,
    Closed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub ticks: u64,
    pub lines_framed: u64,
    pub overflow_discards: u64,
    pub stream_faults: u64,
    pub queue_dropped: u64,
    pub lines_parsed: u64,
    pub malformed_lines: u64,
    pub out_of_range_samples: u64,
    pub decisions_confirmed: u64,
    pub colors_applied: u64,
    pub last_error: Option<String>,
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// Raw decision before stabilization
    pub decided: Option<MixedColor>,
    pub verdict: Verdict,
    /// Set when the sink was invoked this tick
    pub applied: Option<MixedColor>,
}

pub struct ColorPipeline {
    config: PipelineConfig,
    sink: Box<dyn ColorSink>,
    queue: Arc<LineQueue>,
    store: SampleStore,
    classifier: Classifier,
    stabilizer: Stabilizer,
    applier: Applier,
    link: Option<Arc<DeviceLink>>,
    reader: Option<ReaderHandle>,
    reader_stats: Option<Arc<ReaderStats>>,
    reader_start_at: Option<Instant>,
    status: LinkStatus,
    seq: u64,
    metrics: PipelineMetrics,
    snapshot_tx: watch::Sender<Arc<DisplaySnapshot>>,
    metrics_tx: watch::Sender<PipelineMetrics>,
}

impl ColorPipeline {
    pub fn new<S>(config: PipelineConfig, sink: S) -> ConfigResult<Self>
    where
        S: ColorSink + 'static,
    {
        config.validate()?;
        let (snapshot_tx, _) = watch::channel(Arc::new(DisplaySnapshot::default()));
        let (metrics_tx, _) = watch::channel(PipelineMetrics::default());

        Ok(Self {
            queue: Arc::new(LineQueue::new(config.reader.queue_capacity)),
            store: SampleStore::new(config.channel_count),
            classifier: Classifier::new(config.classifier, config.no_data_timeout()),
            stabilizer: Stabilizer::new(config.stable_frames),
            applier: Applier::new(config.cooldown()),
            sink: Box::new(sink),
            link: None,
            reader: None,
            reader_stats: None,
            reader_start_at: None,
            status: LinkStatus::NotInitialized,
            seq: 0,
            metrics: PipelineMetrics::default(),
            snapshot_tx,
            metrics_tx,
            config,
        })
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Open the configured serial port. Attempted once; failure leaves the pipeline without data.
    pub fn init(&mut self) {
        self.init_at(Instant::now())
    }

    pub fn init_at(&mut self, now: Instant) {
        if self.status != LinkStatus::NotInitialized {
            log::warn!("Pipeline already initialized ({:?}); ignoring init", self.status);
            return;
        }
        match DeviceLink::open(&self.config.link) {
            Ok(link) => self.attach_link(link, now),
            Err(e) => {
                log::error!("Sensor link unavailable, continuing without data: {}", e);
                self.metrics.last_error = Some(e.to_string());
                self.status = LinkStatus::Unavailable;
            }
        }
    }

    /// Initialize with an already-open link (scripted sources, replay)
    pub fn init_with_link(&mut self, link: DeviceLink) {
        self.init_with_link_at(link, Instant::now())
    }

    pub fn init_with_link_at(&mut self, link: DeviceLink, now: Instant) {
        if self.status != LinkStatus::NotInitialized {
            log::warn!("Pipeline already initialized ({:?}); closing the extra link", self.status);
            link.close();
            return;
        }
        self.attach_link(link, now);
    }

    fn attach_link(&mut self, link: DeviceLink, now: Instant) {
        log::info!("Sensor link {} open; reader starts after {:?} warm-up", link.address(), self.config.warmup());
        self.link = Some(Arc::new(link));
        self.reader_start_at = Some(now + self.config.warmup());
        self.status = LinkStatus::WarmingUp;
    }

    /// Producer side of the line queue, for hosts that feed lines themselves
    pub fn line_queue(&self) -> Arc<LineQueue> {
        self.queue.clone()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<Arc<DisplaySnapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn subscribe_metrics(&self) -> watch::Receiver<PipelineMetrics> {
        self.metrics_tx.subscribe()
    }

    pub fn snapshot(&self) -> Arc<DisplaySnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn metrics(&self) -> PipelineMetrics {
        self.metrics.clone()
    }

    pub fn last_applied(&self) -> Option<MixedColor> {
        self.applier.last_applied()
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.tick_at(Instant::now())
    }

    /// Run one pipeline iteration with `now` as the tick time
    pub fn tick_at(&mut self, now: Instant) -> TickOutcome {
        self.start_reader_if_due(now);
        self.drain_lines(now);

        let channel_count = self.store.channel_count();
        let states: [ChannelState; MAX_CHANNELS] = std::array::from_fn(|ch| {
            if ch < channel_count {
                self.classifier.classify(self.store.latest(ch), now)
            } else {
                ChannelState::empty()
            }
        });

        let decided = resolve_mixed_color(states.iter().map(|s| s.base_color));
        let verdict = self.stabilizer.observe(decided);
        if verdict.confirmed().is_some() {
            self.metrics.decisions_confirmed += 1;
        }

        let sink = &mut self.sink;
        let applied = self.applier.offer(verdict, now, |color| sink.apply_decided_color(color));
        if let Some(color) = applied {
            self.metrics.colors_applied += 1;
            log::info!("Applied color {} (index {})", color.as_str(), color.index());
        }

        self.seq += 1;
        let snapshot = DisplaySnapshot::build(&states, channel_count, decided, self.applier.last_applied(), self.seq);
        self.snapshot_tx.send_replace(Arc::new(snapshot));
        self.publish_metrics();

        TickOutcome { decided, verdict, applied }
    }

    fn start_reader_if_due(&mut self, now: Instant) {
        let Some(start_at) = self.reader_start_at else { return };
        if now < start_at {
            return;
        }
        self.reader_start_at = None;

        let Some(link) = self.link.clone() else { return };
        match ReaderHandle::spawn(link, self.queue.clone(), self.config.reader_settings()) {
            Ok(reader) => {
                self.reader_stats = Some(reader.stats());
                self.reader = Some(reader);
                self.status = LinkStatus::Reading;
            }
            Err(e) => {
                log::error!("Failed to start reader thread: {}", e);
                self.metrics.last_error = Some(format!("reader thread: {}", e));
                self.status = LinkStatus::Unavailable;
            }
        }
    }

    fn drain_lines(&mut self, now: Instant) {
        for line in self.queue.drain() {
            match parse_sample_line(&line).and_then(|raw| self.store.update(raw, now)) {
                Ok(()) => self.metrics.lines_parsed += 1,
                Err(e) if e.is_malformed() => {
                    self.metrics.malformed_lines += 1;
                    log::debug!("Dropped line {:?}: {}", line, e);
                }
                Err(e) => {
                    self.metrics.out_of_range_samples += 1;
                    log::debug!("Dropped sample: {}", e);
                }
            }
        }
    }

    fn publish_metrics(&mut self) {
        self.metrics.ticks = self.seq;
        self.metrics.queue_dropped = self.queue.dropped();
        if let Some(stats) = &self.reader_stats {
            self.metrics.lines_framed = stats.lines_framed.load(Ordering::Relaxed);
            self.metrics.overflow_discards = stats.overflow_discards.load(Ordering::Relaxed);
            self.metrics.stream_faults = stats.stream_faults.load(Ordering::Relaxed);
            if let Some(err) = stats.last_error() {
                self.metrics.last_error = Some(err);
            }
        }
        self.metrics_tx.send_replace(self.metrics.clone());
    }

    /// Stop the reader and close the link. Safe to call any number of times.
    pub fn shutdown(&mut self) {
        if self.status == LinkStatus::Closed {
            log::debug!("Pipeline already shut down");
        }
        self.reader_start_at = None;

        if let Some(reader) = &self.reader {
            reader.signal_stop();
        }

        if let Some(mut reader) = self.reader.take() {
            match reader.join(self.config.reader.join_timeout()) {
                JoinOutcome::Joined | JoinOutcome::NotRunning => log::debug!("Reader thread joined"),
                JoinOutcome::Abandoned => {
                    self.metrics.last_error = Some("reader thread abandoned at shutdown".to_string());
                }
                JoinOutcome::Panicked => {
                    self.metrics.last_error = Some("reader thread panicked".to_string());
                }
            }
        }

        if let Some(link) = &self.link {
            link.close();
            if !link.is_released() {
                log::debug!("Sensor link {} release pending on reader exit", link.address());
            }
        }

        if matches!(self.status, LinkStatus::WarmingUp | LinkStatus::Reading) {
            log::info!("Color pipeline shut down");
            self.status = LinkStatus::Closed;
        }
    }
}

impl Drop for ColorPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
