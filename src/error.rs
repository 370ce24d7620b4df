//! Error types for punctprep
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur while preparing or launching an invocation
#[derive(Debug, Error)]
pub enum PrepError {
    /// Invocation record or launcher settings are unusable
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The external program (or its interpreter) does not exist
    #[error("Program not found: {0}")]
    ProgramNotFound(String),

    /// The external program exists but could not be started
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external program ran past the configured timeout and was killed
    #[error("Program timed out after {0}ms")]
    TimedOut(u64),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PrepError {
    /// Exit status the binary reports for launcher-side failures.
    ///
    /// Follows shell conventions: 127 for a missing command, 126 for a command
    /// that could not be executed, 124 for a timeout.
    pub fn exit_code(&self) -> i32 {
        match self {
            PrepError::ProgramNotFound(_) => 127,
            PrepError::Spawn { .. } => 126,
            PrepError::TimedOut(_) => 124,
            _ => 1,
        }
    }
}

/// Result type alias for punctprep operations
pub type Result<T> = std::result::Result<T, PrepError>;
