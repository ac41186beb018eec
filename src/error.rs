//! Error types for the pipeline client

use thiserror::Error;

/// Result type alias for pipeline client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while driving a remote pipeline
///
/// All of these are unrecoverable at this layer: the coordinator does not
/// retry a partially-consumed streaming window, because the remote stage has
/// already claimed the consumed offsets and offers no resumability contract.
#[derive(Error, Debug)]
pub enum Error {
    /// The remote stage endpoint could not be reached during setup
    #[error("stage '{stage}' unavailable: {reason}")]
    StageUnavailable {
        /// Stage that failed to answer
        stage: String,
        /// Transport-level detail
        reason: String,
    },

    /// The remote stage rejected its configuration during Init
    #[error("stage '{stage}' rejected init: {reason}")]
    InitRejected {
        /// Stage that rejected the configuration
        stage: String,
        /// Remote-side detail (unsupported resolution, format, ...)
        reason: String,
    },

    /// A stage's Process call failed mid-run
    #[error("stage '{stage}' processing failed: {reason}")]
    Processing {
        /// Stage that reported the failure
        stage: String,
        /// Remote-side detail
        reason: String,
    },

    /// A plane layout violated its invariants (e.g. stride < width)
    #[error("invalid plane layout: {0}")]
    InvalidLayout(String),

    /// Configuration parsing or validation error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error on the local input or output file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl Error {
    /// True when the failure happened during stage setup, before any cycle ran
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            Error::StageUnavailable { .. } | Error::InitRejected { .. }
        )
    }
}
