//! Error types for the software S/PDIF output

use thiserror::Error;

/// Main error type
#[derive(Error, Debug)]
pub enum SpdifError {
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Transmitter error: {0}")]
    Transmitter(#[from] TransmitterError),

    #[error("Configuration error: {0}")]
    Setup(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file error: {0}")]
    Config(String),
}

/// Rejected stream parameters. Raised at prepare time, before any
/// encoder or buffer state changes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unsupported sample rate: {0} Hz")]
    UnsupportedRate(u32),

    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u32),

    #[error("Unsupported channel count: {0} (S/PDIF output is stereo)")]
    UnsupportedChannels(u32),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("PCM buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("Invalid stream geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid stream buffer size: {0} frames (must be a non-zero even number)")]
    InvalidStreamBuffer(usize),
}

/// Failures reported by the hardware transmitter abstraction
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitterError {
    #[error("No cyclic transfer descriptor available")]
    DescriptorUnavailable,

    #[error("Transfer was terminated")]
    Terminated,
}

/// Control-path misuse of the PCM stream lifecycle
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    #[error("No PCM stream is open")]
    NotOpen,

    #[error("A PCM stream is already open")]
    AlreadyOpen,

    #[error("PCM stream has not been prepared")]
    NotPrepared,
}

/// Result type alias for S/PDIF operations
pub type Result<T> = std::result::Result<T, SpdifError>;
