//! Unified error handling for notefan
//!
//! This crate provides a single error type used across all notefan
//! components, plus the context-chaining helpers the daemon relies on to
//! render errors as `outer context: inner context: root cause`.

use std::io;
use std::path::PathBuf;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all notefan operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead { path: PathBuf, source: io::Error },

    #[error("Failed to write file {path}: {source}")]
    FileWrite { path: PathBuf, source: io::Error },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("{0}")]
    Config(String),

    // ============================================================================
    // Embedded Controller Errors
    // ============================================================================
    #[error("{0}")]
    Ec(String),

    #[error("Embedded controller timeout: {0}")]
    EcTimeout(String),

    #[error("No working embedded controller found: {0}")]
    EcAutodetect(String),

    // ============================================================================
    // Sensor Errors
    // ============================================================================
    #[error("{0}")]
    Sensor(String),

    // ============================================================================
    // Protocol Errors
    // ============================================================================
    #[error("{0}")]
    Protocol(String),

    #[error("Message too large: {size} bytes (max {max_size} bytes)")]
    MessageTooLarge { size: usize, max_size: usize },

    // ============================================================================
    // Context chain
    // ============================================================================
    #[error("{context}: {source}")]
    Context { context: String, source: Box<Error> },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),
}

impl Error {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an embedded controller error from a string
    pub fn ec(msg: impl Into<String>) -> Self {
        Self::Ec(msg.into())
    }

    /// Create a sensor error from a string
    pub fn sensor(msg: impl Into<String>) -> Self {
        Self::Sensor(msg.into())
    }

    /// Create a protocol error from a string
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Wrap this error in an outer context string
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

// Allow converting from String to Error
impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to Error
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}

/// Context-chaining extension for `Result`
pub trait ResultExt<T> {
    /// Wrap the error with an outer context string
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Wrap the error with a lazily evaluated context string
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.into().context(f()))
    }
}
