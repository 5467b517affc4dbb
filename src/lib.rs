pub mod config;
pub mod pipeline;
pub mod sensor;
pub mod serial;

pub use config::PipelineConfig;
pub use pipeline::{ColorPipeline, ColorSink, LinkStatus, PipelineMetrics, TickOutcome};
pub use sensor::{BaseColor, DisplaySnapshot, MixedColor};

use std::time::Duration;

use anyhow::Context;
use serde::Serialize;

/// Host loop tuning
#[derive(Debug, Clone)]
pub struct HostOptions {
    pub tick: Duration,
    /// Print applied colors and periodic snapshots as JSON lines on stdout
    pub json: bool,
    pub status_interval: Duration,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self { tick: Duration::from_millis(16), json: false, status_interval: Duration::from_secs(1) }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum HostEvent<'a> {
    Applied { index: i32, color: &'a str, at: chrono::DateTime<chrono::Utc> },
    Snapshot { snapshot: &'a DisplaySnapshot, metrics: &'a PipelineMetrics },
}

fn emit(event: &HostEvent<'_>) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => log::warn!("Failed to encode event: {}", e),
    }
}

/// Run the pipeline against the configured port until Ctrl-C
pub async fn run(config: PipelineConfig, options: HostOptions) -> anyhow::Result<()> {
    let json = options.json;
    let sink = move |color: MixedColor| {
        if json {
            emit(&HostEvent::Applied { index: color.index(), color: color.as_str(), at: chrono::Utc::now() });
        }
    };

    let mut pipeline = ColorPipeline::new(config, sink).context("invalid pipeline configuration")?;
    pipeline.init();
    log::info!("Color pipeline started (link status: {:?})", pipeline.status());

    let mut ticker = tokio::time::interval(options.tick);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut status = tokio::time::interval(options.status_interval);
    status.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ctrl_c_armed = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                pipeline.tick();
            }
            _ = status.tick() => {
                let snapshot = pipeline.snapshot();
                let metrics = pipeline.metrics();
                if json {
                    emit(&HostEvent::Snapshot { snapshot: &snapshot, metrics: &metrics });
                } else {
                    log::debug!(
                        "Decided {} / applied {} ({} channels with data, {} lines parsed)",
                        sensor::decision_name(snapshot.decided),
                        sensor::decision_name(snapshot.applied),
                        snapshot.active_slots(),
                        metrics.lines_parsed
                    );
                }
            }
            res = &mut ctrl_c, if ctrl_c_armed => {
                match res {
                    Ok(()) => {
                        log::info!("Shutdown requested");
                        break;
                    }
                    Err(e) => {
                        log::warn!("Failed to listen for Ctrl-C: {}", e);
                        ctrl_c_armed = false;
                    }
                }
            }
        }
    }

    pipeline.shutdown();
    Ok(())
}
