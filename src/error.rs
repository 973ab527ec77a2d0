use std::path::PathBuf;
use thiserror::Error;

/// Main error type for textsim
#[derive(Error, Debug)]
pub enum TextsimError {
    /// Caller supplied a value the search core refuses (blank query, zero top-N, empty entry)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Vector space or index could not be constructed
    #[error("Index build failed: {0}")]
    BuildFailure(String),

    /// Internal invariant violation, e.g. a poisoned lock
    #[error("Concurrency fault: {0}")]
    ConcurrencyFault(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// CSV corpus file errors
    #[error("CSV error: {context}: {source}")]
    Csv {
        source: csv::Error,
        context: String,
    },

    /// Daemon errors
    #[error("Daemon error: {0}")]
    Daemon(String),

    /// Daemon not running
    #[error("Daemon is not running")]
    DaemonNotRunning,
}

impl TextsimError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn poisoned(what: &str) -> Self {
        Self::ConcurrencyFault(format!("{} lock poisoned", what))
    }

    /// True when the error was caused by the caller's input rather than the system
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for textsim operations
pub type Result<T> = std::result::Result<T, TextsimError>;
