//! Error taxonomy for the sync engine.
//!
//! Registry wire failures (`RegistryError`) are raised by client
//! implementations and folded into `SyncError` at the orchestrator
//! boundary, where the failing tag is attached for diagnosis.

use harborsync_state::StorageError;
use thiserror::Error;

/// Failures speaking to a remote registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Network, DNS, or TLS failure reaching the remote.
    #[error("remote unreachable: {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// The remote answered, but not like a registry.
    #[error("protocol error from {url}: {reason}")]
    Protocol { url: String, reason: String },

    /// Tag or digest vanished between listing and fetch.
    #[error("not found on remote: {reference}")]
    NotFound { reference: String },

    /// Fetched content does not hash to the requested digest.
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },
}

/// Failures of one synchronization run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote unreachable: {url}: {reason}")]
    RemoteUnreachable { url: String, reason: String },

    #[error("remote protocol error: {url}: {reason}")]
    RemoteProtocolError { url: String, reason: String },

    /// The upstream repository itself is absent. Raised at the listing
    /// stage, before any tag is in play.
    #[error("upstream repository {upstream} not found on {url}")]
    UpstreamMissing { url: String, upstream: String },

    /// Fatal under the strict resolution policy: the run aborts rather
    /// than commit a version missing content it observed upstream.
    #[error("resolving tag {tag}: {reference} not found on remote")]
    NotFound { tag: String, reference: String },

    /// Integrity violation. Always fatal, never silently accepted.
    #[error("resolving tag {tag}: digest mismatch, expected {expected}, got {actual}")]
    DigestMismatch {
        tag: String,
        expected: String,
        actual: String,
    },

    #[error("invalid allowlist pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("sync cancelled")]
    Cancelled,

    #[error("resolver task panicked: {0}")]
    TaskPanic(String),
}

impl SyncError {
    /// Attach the tag being resolved to a registry failure.
    pub fn from_registry(err: RegistryError, tag: &str) -> Self {
        match err {
            RegistryError::Unreachable { url, reason } => {
                SyncError::RemoteUnreachable { url, reason }
            }
            RegistryError::Protocol { url, reason } => {
                SyncError::RemoteProtocolError { url, reason }
            }
            RegistryError::NotFound { reference } => SyncError::NotFound {
                tag: tag.to_string(),
                reference,
            },
            RegistryError::DigestMismatch { expected, actual } => SyncError::DigestMismatch {
                tag: tag.to_string(),
                expected,
                actual,
            },
        }
    }
}

/// Result type for sync engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;
