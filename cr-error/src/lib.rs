//! Unified error handling for camrig
//!
//! This crate provides the single error type shared by the core library and the
//! command line front end. It uses thiserror for the Display and Error impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using CamrigError
pub type Result<T> = std::result::Result<T, CamrigError>;

/// Unified error type for all camrig operations
#[derive(thiserror::Error, Debug)]
pub enum CamrigError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("File too large: {path} ({size} bytes, max {max_size} bytes)")]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    // ============================================================================
    // Serialization Errors
    // ============================================================================
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // ============================================================================
    // Configuration Lifecycle Errors
    // ============================================================================
    #[error("Configuration validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("No draft configuration loaded")]
    NoDraftConfig,

    #[error("No runnable configuration loaded")]
    NoRunnableConfig,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // ============================================================================
    // Hardware Discovery Errors
    // ============================================================================
    #[error("Device discovery failed: {0}")]
    Discovery(String),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),
}

impl CamrigError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error from a list of violated rules
    pub fn validation<I, S>(errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Validation(errors.into_iter().map(Into::into).collect())
    }

    /// Create a discovery error from a string
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Violated-rule messages, if this is a validation error
    pub fn validation_errors(&self) -> Option<&[String]> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    /// True for errors caused by a missing file
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_))
    }
}

// Allow converting from String to CamrigError
impl From<String> for CamrigError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to CamrigError
impl From<&str> for CamrigError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}
