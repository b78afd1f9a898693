//! Error types for the HarborSync storage layer.

use thiserror::Error;

/// Errors produced by the repository version store and the CAS.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Blob not found in the content-addressed store.
    #[error("content not found in store: {digest}")]
    NotFound { digest: String },

    /// Digest string failed validation.
    #[error("invalid digest: {digest}")]
    InvalidDigest { digest: String },

    /// Repository id does not exist.
    #[error("repository not found: {id}")]
    RepositoryNotFound { id: String },

    /// Requested version number does not exist in the repository.
    #[error("version {number} not found in repository {id}")]
    VersionNotFound { id: String, number: u64 },

    /// A commit's base version is no longer the latest: another writer
    /// committed first. The caller should reconcile against the new
    /// latest version and retry.
    #[error("commit base {base} is stale, repository {id} is at version {latest}")]
    CommitConflict { id: String, base: u64, latest: u64 },
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
