//! Configuration for the software S/PDIF output

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SpdifError};

/// Frames in one channel-status block
pub const BLOCK_FRAMES: usize = 192;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub output: OutputConfig,
    pub channel_status: ChannelStatusConfig,
    pub debug: DebugConfig,
}

/// Double buffer and PCM ring buffer geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Encoded frames held by the stream buffer (both halves together)
    pub buffer_frames: usize,
    /// Number of periods the PCM ring buffer is split into
    pub pcm_periods: u32,
    /// PCM ring buffer size in bytes
    pub pcm_buffer_bytes: usize,
}

/// Channel-status flags that are not derived from the stream format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelStatusConfig {
    /// Assert that copying is permitted (byte 0, bit 2)
    pub copy_permitted: bool,
    /// Mark the stream as original/generation 0 (byte 1, bit 7)
    pub original: bool,
    /// Category code (byte 1, bits 0-6)
    pub category: u8,
}

/// Debug settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
    /// Optional `EnvFilter` directives, e.g. `"spdif_stream=trace"`
    pub log_filter: Option<String>,
}

/// Logging level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            buffer_frames: 2 * BLOCK_FRAMES,
            pcm_periods: 8,
            // period size divisible by 192 frames of S16_LE, S24_3LE and S24_LE
            pcm_buffer_bytes: 8 * BLOCK_FRAMES * 24,
        }
    }
}

impl Default for ChannelStatusConfig {
    fn default() -> Self {
        Self {
            copy_permitted: true,
            original: true,
            category: 0x02, // digital/digital converter
        }
    }
}

impl Config {
    /// Load configuration from the default path, or create it if it doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Self::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| SpdifError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SpdifError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spdif-sw")
            .join("config.toml")
    }
}
