//! Clip error types

use thiserror::Error;

/// Errors raised while configuring a clip
#[derive(Error, Debug)]
pub enum ClipError {
    /// Rate is zero, NaN or infinite
    #[error("Invalid rate: {0} (must be finite and non-zero)")]
    InvalidRate(f64),

    /// Cycle count below -1
    #[error("Invalid cycle count: {0}")]
    InvalidCycleCount(i64),

    /// Negative or NaN cycle duration (milliseconds)
    #[error("Invalid cycle duration: {0}ms")]
    InvalidCycleDuration(f64),

    /// Tick resolution of zero
    #[error("Invalid tick rate: {0} ticks per second")]
    InvalidTickRate(u32),

    /// Failed to parse a TOML configuration
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for clip operations
pub type Result<T> = std::result::Result<T, ClipError>;
