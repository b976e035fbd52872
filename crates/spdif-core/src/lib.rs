//! Core infrastructure for the software S/PDIF output
//!
//! This crate provides the error taxonomy, configuration, and logging
//! setup shared by the codec and streaming crates.

pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{ConfigError, Result, SpdifError, StreamError, TransmitterError};
