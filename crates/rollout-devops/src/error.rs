//! Error types for rollout-devops

use rollout_core::SourceError;
use thiserror::Error;

/// Errors that can occur talking to the DevOps REST API
#[derive(Error, Debug)]
pub enum DevOpsError {
    /// Organization, project or URLs are missing or malformed
    #[error("invalid DevOps configuration: {0}")]
    InvalidConfig(String),

    /// Request could not be sent or the connection dropped
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request did not complete in time
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Response body did not match the expected shape
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for DevOpsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DevOpsError::Timeout(err.to_string())
        } else if err.is_decode() {
            DevOpsError::Decode(err.to_string())
        } else {
            DevOpsError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DevOpsError {
    fn from(err: serde_json::Error) -> Self {
        DevOpsError::Decode(err.to_string())
    }
}

impl From<DevOpsError> for SourceError {
    fn from(err: DevOpsError) -> Self {
        match err {
            DevOpsError::Status { status, url } => SourceError::Status { status, url },
            DevOpsError::Timeout(msg) => SourceError::Timeout(msg),
            DevOpsError::Decode(msg) => SourceError::Decode(msg),
            DevOpsError::Http(msg) | DevOpsError::InvalidConfig(msg) => {
                SourceError::Transport(msg)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, DevOpsError>;
