//! Error types for the tether supervisor crate
//!
//! This module defines all error types used throughout the crate,
//! providing consistent error handling and user-friendly error messages.

use thiserror::Error;

/// Main error type for the tether crate
#[derive(Error, Debug)]
pub enum TetherError {
    /// Errors related to configuration loading/validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Configuration validation errors
///
/// One variant per validation rule, so callers can report exactly which
/// field was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("remote list cannot be empty")]
    NoRemotes,

    #[error("remote host cannot be empty")]
    EmptyHost,

    #[error("remote host contains invalid characters: {host}")]
    InvalidHost { host: String },

    #[error("remote port cannot be zero: {host}")]
    ZeroPort { host: String },

    #[error("server_poll_timeout_secs cannot be zero when set")]
    ZeroServerPollTimeout,
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TetherError>;
