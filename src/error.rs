//! Error types for the AES67 sender

use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration and channel-partitioning errors, all fatal at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Configuration must be for sender mode, got \"{0}\"")]
    WrongDeviceMode(String),

    #[error("Channel count must be positive")]
    InvalidChannelCount,

    #[error("Channels per receiver must be positive")]
    InvalidChannelsPerReceiver,

    #[error("Sampling rate must be positive")]
    InvalidSamplingRate,

    #[error("{0} is not a multicast address")]
    NotMulticast(Ipv4Addr),

    #[error(
        "Multicast address overflow: stream {index} would need last octet {octet} (max 255)"
    )]
    AddressOverflow { index: usize, octet: u32 },

    #[error("Port overflow: stream {index} would need port {base_port} + {index}")]
    PortOverflow { index: usize, base_port: u16 },
}

/// Network clock subsystem errors
#[derive(Error, Debug)]
pub enum ClockError {
    #[error("Failed to initialize clock subsystem: {0}")]
    Init(String),

    #[error("Failed to create clock for domain {domain}: {reason}")]
    Create { domain: u8, reason: String },
}

/// Per-stream pipeline errors; any one of these brings the whole
/// system down (no partial-stream operation)
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to build pipeline for stream {index}: {reason}")]
    Build { index: usize, reason: String },

    #[error("Failed to start pipeline for stream {index}: {reason}")]
    Start { index: usize, reason: String },
}

/// Audio source errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
