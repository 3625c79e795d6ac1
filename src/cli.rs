use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{parse_channels, parse_volume, EngineConfig};
use crate::logging::LogLevel;

/// soundbank - decode and play sample-based sound effects
#[derive(Parser, Debug)]
#[command(name = "soundbank")]
#[command(version)]
#[command(about = "Decode and play WAVE sound effects through a bounded channel pool", long_about = None)]
pub struct Cli {
    /// Configuration file (key = value)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level (nothing, user, error, warning, info, debug, all or 0-6)
    #[arg(short, long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Decode a WAVE file and print its format
    Info {
        /// Path to the file
        file: PathBuf,
    },

    /// Play a sound by logical name through the default output
    Play {
        /// Logical name, resolved as <content-dir>/<name>.<extension>
        name: String,

        /// Loop the sound
        #[arg(long = "loop")]
        looping: bool,

        /// Play as a voice line
        #[arg(long)]
        voice: bool,

        /// Content directory path
        #[arg(short = 'd', long, value_name = "DIR")]
        content_dir: Option<PathBuf>,

        /// Volume (0-100)
        #[arg(long, value_name = "VOLUME")]
        volume: Option<String>,

        /// Number of playback channels
        #[arg(long, value_name = "COUNT")]
        channels: Option<String>,

        /// Stop after this many seconds (required to end a looping sound)
        #[arg(long, value_name = "SECONDS")]
        seconds: Option<f64>,
    },
}

impl Cli {
    /// Load the config file, if any, and apply command line overrides
    pub fn load_config(&self) -> Result<EngineConfig> {
        let config = match self.config {
            Some(ref path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        };
        self.merge_into_config(config)
    }

    /// Merge CLI arguments into the config struct
    pub fn merge_into_config(&self, mut config: EngineConfig) -> Result<EngineConfig> {
        if let Some(ref level) = self.log_level {
            config.log_level = parse_log_level(level)?;
        }

        if let Command::Play {
            content_dir,
            volume,
            channels,
            ..
        } = &self.command
        {
            if let Some(dir) = content_dir {
                config.content_dir = dir.clone();
            }
            if let Some(vol) = volume {
                let int_vol: i32 = vol.parse().context("Invalid volume")?;
                config.master_volume = parse_volume(int_vol);
            }
            if let Some(count) = channels {
                config.max_channels = parse_channels(count)?;
            }
        }

        Ok(config)
    }
}

fn parse_log_level(s: &str) -> Result<LogLevel> {
    s.parse::<LogLevel>()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid log level")
}
