//! Error taxonomy for node supervision, tuning and domain jobs.
//!
//! Operations return `anyhow::Result`; failures that callers need to tell
//! apart are raised as a [`NodeError`] and can be recovered with
//! `err.downcast_ref::<NodeError>()`.

use std::path::PathBuf;

use thiserror::Error;

/// Classified failures surfaced by this crate
#[derive(Debug, Error)]
pub enum NodeError {
    /// Operation is invalid for the node's current lifecycle
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Bad caller input
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    /// Non-success HTTP status from the management endpoint
    #[error("HTTP request failed with code {status}: {url}")]
    Http { status: u16, url: String },

    /// The node never became live, or reached the ERROR state
    #[error("failed to start node, check log file for more details: {}", log_file.display())]
    Startup { log_file: PathBuf },

    /// An external tool exited unsuccessfully
    #[error("{tool} failed with exit code {code}, see {}", log_file.display())]
    ToolFailed {
        tool: String,
        code: i32,
        log_file: PathBuf,
    },

    /// The optimizer left a result file that cannot be parsed
    #[error("Malformed optimizer result: {0}")]
    MalformedResult(String),
}

impl NodeError {
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument(message.into())
    }
}
