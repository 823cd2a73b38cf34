//! Error taxonomy for the rollout engine.
//!
//! Two layers:
//! - [`SourceError`]: a single external call failed. The engine never lets
//!   one of these escape `reconcile`; it degrades the enclosing unit (one
//!   candidate, one environment) instead.
//! - [`RolloutError`]: configuration and setup failures surfaced to callers
//!   before any reconciliation starts.

/// Failure of one call against an external collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("request timed out: {0}")]
    Timeout(String),
}

/// Result type for external collaborator calls.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Rollout engine setup errors.
#[derive(Debug, thiserror::Error)]
pub enum RolloutError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("duplicate environment id: {0}")]
    DuplicateEnvironment(String),

    #[error("duplicate external environment id {external_id} (environment {id})")]
    DuplicateExternalId { id: String, external_id: String },

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for rollout engine setup operations.
pub type Result<T> = std::result::Result<T, RolloutError>;
