use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use chromalink_lib::{HostOptions, PipelineConfig};

#[derive(Parser, Debug)]
#[command(
    name = "chromalink",
    version,
    about = "Read a serial color sensor board and report the decided color",
    long_about = "Reads `channel,r,g,b,c` (or `r,g,b,c`) lines from a serial color sensor board, \
                  classifies each channel, mixes them into one color and reports confirmed changes."
)]
pub struct Cli {
    /// JSON config file; unspecified fields take their defaults
    #[arg(short, long, env = "CHROMALINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serial port to open (overrides the config file)
    #[arg(short, long, env = "CHROMALINK_PORT")]
    pub port: Option<String>,

    /// Baud rate (overrides the config file)
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Number of active sensor channels, 1-4 (overrides the config file)
    #[arg(long)]
    pub channels: Option<usize>,

    /// Tick period in milliseconds
    #[arg(long, default_value_t = 16)]
    pub tick_ms: u64,

    /// Print applied colors and snapshots as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Snapshot report period in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub status_ms: u64,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(port) = &self.port {
            config.link.address = port.clone();
        }
        if let Some(baud) = self.baud {
            config.link.baud_rate = baud;
        }
        if let Some(channels) = self.channels {
            config.channel_count = channels;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    pub fn host_options(&self) -> HostOptions {
        HostOptions {
            tick: Duration::from_millis(self.tick_ms.max(1)),
            json: self.json,
            status_interval: Duration::from_millis(self.status_ms.max(1)),
        }
    }
}
