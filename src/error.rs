//! Error handling for the portprobe scanner
//!
//! Only invocation-level problems surface as [`ScanError`]. Failures of a
//! single probe are never errors here: they are folded into
//! [`crate::network::ProbeOutcome::Error`] and the scan carries on.

use thiserror::Error;

/// Main error type for scanning operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid port range: {0}")]
    InvalidRange(String),

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Scan cancelled")]
    Cancelled,

    #[error("Could not resolve hostname: {0}")]
    ResolveError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Output error: {0}")]
    OutputError(String),
}

impl ScanError {
    /// True when the scan was stopped by an external cancellation request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScanError::Cancelled)
    }

    /// Process exit code the CLI uses for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ScanError::Cancelled => 130,
            _ => 1,
        }
    }
}
