//! In-memory storage backends.
//!
//! `MemoryRepositoryStore` and `MemoryCasStore` satisfy the storage trait
//! contracts without external dependencies. They serve as the default
//! backend for embedded use and as fakes in tests; durable backends plug
//! in behind the same traits.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::content::ContentUnit;
use crate::digest::ContentDigest;
use crate::error::{StorageError, StorageResult};
use crate::store::{CasStore, ContentQuery, RepositoryStore};
use crate::version::{Delta, Repository, RepositoryId, RepositoryVersion, VersionRef};

#[derive(Debug)]
struct RepoState {
    record: Repository,
    versions: Vec<RepositoryVersion>,
}

impl RepoState {
    fn latest(&self) -> &RepositoryVersion {
        // versions is never empty: version 0 is created with the repository.
        self.versions.last().unwrap()
    }
}

/// In-memory repository version store.
///
/// A single mutex guards the whole map, which makes every commit a
/// serialized read-modify-append transaction: version numbers stay
/// strictly monotonic under concurrent syncs, and readers only ever see
/// fully published versions.
#[derive(Debug, Default)]
pub struct MemoryRepositoryStore {
    repos: Mutex<HashMap<RepositoryId, RepoState>>,
}

impl MemoryRepositoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_repo<T>(
        &self,
        id: RepositoryId,
        f: impl FnOnce(&RepoState) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let repos = self.repos.lock().unwrap();
        let state = repos
            .get(&id)
            .ok_or_else(|| StorageError::RepositoryNotFound { id: id.to_string() })?;
        f(state)
    }
}

#[async_trait]
impl RepositoryStore for MemoryRepositoryStore {
    async fn create_repository(&self, name: &str) -> StorageResult<Repository> {
        let record = Repository {
            id: RepositoryId::new(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let state = RepoState {
            record: record.clone(),
            versions: vec![RepositoryVersion::initial()],
        };
        self.repos.lock().unwrap().insert(record.id, state);
        debug!(repository = %record.id, name, "created repository");
        Ok(record)
    }

    async fn repository(&self, id: RepositoryId) -> StorageResult<Repository> {
        self.with_repo(id, |state| Ok(state.record.clone()))
    }

    async fn latest_version(&self, id: RepositoryId) -> StorageResult<VersionRef> {
        self.with_repo(id, |state| {
            Ok(VersionRef {
                repository: id,
                number: state.latest().number,
            })
        })
    }

    async fn version(&self, id: RepositoryId, number: u64) -> StorageResult<RepositoryVersion> {
        self.with_repo(id, |state| {
            state
                .versions
                .iter()
                .find(|v| v.number == number)
                .cloned()
                .ok_or_else(|| StorageError::VersionNotFound {
                    id: id.to_string(),
                    number,
                })
        })
    }

    async fn list_content(
        &self,
        id: RepositoryId,
        number: u64,
        query: &ContentQuery,
    ) -> StorageResult<Vec<ContentUnit>> {
        let version = self.version(id, number).await?;
        Ok(query.select(&version).into_iter().cloned().collect())
    }

    async fn commit(&self, id: RepositoryId, delta: Delta, base: u64) -> StorageResult<VersionRef> {
        let mut repos = self.repos.lock().unwrap();
        let state = repos
            .get_mut(&id)
            .ok_or_else(|| StorageError::RepositoryNotFound { id: id.to_string() })?;

        let latest = state.latest().number;
        if latest != base {
            return Err(StorageError::CommitConflict {
                id: id.to_string(),
                base,
                latest,
            });
        }

        if delta.is_empty() {
            let number = latest;
            debug!(repository = %id, version = number, "empty delta, keeping latest version");
            return Ok(VersionRef {
                repository: id,
                number,
            });
        }

        let next = state.latest().apply(&delta);
        let number = next.number;
        state.versions.push(next);
        debug!(
            repository = %id,
            version = number,
            added = delta.to_add.len(),
            removed = delta.to_remove.len(),
            "committed repository version"
        );
        Ok(VersionRef {
            repository: id,
            number,
        })
    }
}

/// In-memory content-addressed store backed by a `HashMap<digest, bytes>`.
#[derive(Debug, Default)]
pub struct MemoryCasStore {
    store: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCasStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CasStore for MemoryCasStore {
    async fn put(&self, data: &[u8]) -> StorageResult<ContentDigest> {
        let digest = ContentDigest::from_bytes(data);
        let mut store = self.store.lock().unwrap();
        store.insert(digest.as_str().to_string(), data.to_vec());
        Ok(digest)
    }

    async fn get(&self, digest: &ContentDigest) -> StorageResult<Vec<u8>> {
        let store = self.store.lock().unwrap();
        store
            .get(digest.as_str())
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                digest: digest.as_str().to_string(),
            })
    }

    async fn contains(&self, digest: &ContentDigest) -> StorageResult<bool> {
        let store = self.store.lock().unwrap();
        Ok(store.contains_key(digest.as_str()))
    }
}
