//! Storage trait definitions for HarborSync.
//!
//! Two abstractions back the sync engine:
//! - `RepositoryStore`: append-only repository version history with
//!   atomic delta commits
//! - `CasStore`: content-addressed storage for raw manifest/config bytes
//!
//! All traits are async and backend-agnostic. In-memory implementations
//! live in the `memory` module and double as test fakes.

use async_trait::async_trait;

use crate::content::{ContentKind, ContentUnit};
use crate::digest::ContentDigest;
use crate::error::StorageResult;
use crate::version::{Delta, Repository, RepositoryId, RepositoryVersion, VersionRef};

/// Filter for content queries against one repository version.
#[derive(Debug, Clone, Default)]
pub struct ContentQuery {
    /// Restrict to one content kind.
    pub kind: Option<ContentKind>,
    /// Restrict tags to an exact name.
    pub name: Option<String>,
}

impl ContentQuery {
    pub fn tags() -> Self {
        ContentQuery {
            kind: Some(ContentKind::Tag),
            name: None,
        }
    }

    pub fn tags_named(name: &str) -> Self {
        ContentQuery {
            kind: Some(ContentKind::Tag),
            name: Some(name.to_string()),
        }
    }

    fn matches(&self, unit: &ContentUnit) -> bool {
        if let Some(kind) = self.kind {
            if unit.kind() != kind {
                return false;
            }
        }
        if let Some(name) = &self.name {
            match unit {
                ContentUnit::Tag { name: tag_name, .. } => {
                    if tag_name != name {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        true
    }

    /// Apply this query to a version's content, in stable key order.
    pub fn select<'a>(&self, version: &'a RepositoryVersion) -> Vec<&'a ContentUnit> {
        version
            .content()
            .values()
            .filter(|unit| self.matches(unit))
            .collect()
    }
}

/// Append-only store of repository version history.
///
/// Guarantees:
/// - Every repository is born with an empty version 0.
/// - Version numbers are strictly increasing, allocated under a
///   per-store transaction: concurrent commits never collide.
/// - `commit` is compare-and-set on the base version number: a delta
///   only ever applies on top of the version it was computed against.
/// - `commit` with an empty delta returns the current latest ref
///   without allocating a number.
/// - Readers never observe a partially applied version.
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Create a repository with an empty version 0.
    async fn create_repository(&self, name: &str) -> StorageResult<Repository>;

    /// Look up repository metadata.
    async fn repository(&self, id: RepositoryId) -> StorageResult<Repository>;

    /// Current latest version reference (version 0 until the first
    /// non-empty commit).
    async fn latest_version(&self, id: RepositoryId) -> StorageResult<VersionRef>;

    /// Fetch one version snapshot by number.
    async fn version(&self, id: RepositoryId, number: u64) -> StorageResult<RepositoryVersion>;

    /// List content units of one version, filtered by `query`.
    async fn list_content(
        &self,
        id: RepositoryId,
        number: u64,
        query: &ContentQuery,
    ) -> StorageResult<Vec<ContentUnit>>;

    /// Atomically commit `delta` on top of version `base`.
    ///
    /// `base` must be the latest version number, the one the delta was
    /// reconciled against; otherwise the commit fails with
    /// `StorageError::CommitConflict` and nothing is published. Empty
    /// deltas with a current base are a no-op returning the existing
    /// latest ref.
    async fn commit(&self, id: RepositoryId, delta: Delta, base: u64) -> StorageResult<VersionRef>;
}

/// Content-addressed blob store for raw manifest and config bytes.
///
/// `put(data)` always returns the SHA-256 digest of `data`; identical
/// content deduplicates to one entry.
#[async_trait]
pub trait CasStore: Send + Sync {
    /// Store bytes and return their content digest.
    async fn put(&self, data: &[u8]) -> StorageResult<ContentDigest>;

    /// Retrieve bytes by digest. `StorageError::NotFound` if absent.
    async fn get(&self, digest: &ContentDigest) -> StorageResult<Vec<u8>>;

    /// Check whether a digest exists in the store.
    async fn contains(&self, digest: &ContentDigest) -> StorageResult<bool>;
}
