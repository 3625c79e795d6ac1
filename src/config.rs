use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::logging::LogLevel;
use crate::resource::propfile::PropertyFile;
use crate::sound::channel_pool::MAX_CHANNELS;

/// Engine settings, read from a `key = value` config file and CLI overrides
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Size of the playback channel pool
    pub max_channels: usize,
    /// Directory logical sound names are resolved against
    pub content_dir: PathBuf,
    /// File extension appended to logical sound names
    pub extension: String,
    /// Initial master gain, 0.0..=1.0
    pub master_volume: f32,
    pub log_level: LogLevel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_channels: MAX_CHANNELS,
            content_dir: PathBuf::from("Content"),
            extension: "wav".to_string(),
            master_volume: 1.0,
            log_level: LogLevel::Info,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a property file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let props = PropertyFile::load(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_properties(&props)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load configuration from property file text
    pub fn parse(content: &str) -> Result<Self> {
        Self::from_properties(&PropertyFile::parse(content))
    }

    fn from_properties(props: &PropertyFile) -> Result<Self> {
        let mut config = Self::default();

        for (key, value) in props.iter() {
            match key {
                "max_channels" => {
                    config.max_channels = parse_channels(value)?;
                }
                "content_dir" => {
                    if value.is_empty() {
                        anyhow::bail!("content_dir must not be empty");
                    }
                    config.content_dir = PathBuf::from(value);
                }
                "extension" => {
                    config.extension = value.trim_start_matches('.').to_string();
                }
                "volume" => {
                    let vol: i32 = value.parse().context("Invalid volume value")?;
                    config.master_volume = parse_volume(vol);
                }
                "log_level" => {
                    config.log_level = value
                        .parse()
                        .map_err(|e: String| anyhow::anyhow!(e))
                        .context("Invalid log_level value")?;
                }
                other => log::warn!("ignoring unknown config key '{}'", other),
            }
        }

        Ok(config)
    }
}

/// Parse a channel count, which must be at least 1
pub fn parse_channels(s: &str) -> Result<usize> {
    let count: usize = s.parse().context("Invalid max_channels value")?;
    if count == 0 {
        anyhow::bail!("max_channels must be positive");
    }
    Ok(count)
}

/// Parse a volume value (0-100) to a float (0.0-1.0)
pub fn parse_volume(vol: i32) -> f32 {
    if vol < 0 {
        return 0.0;
    }
    if vol > 100 {
        return 1.0;
    }
    vol as f32 / 100.0
}
