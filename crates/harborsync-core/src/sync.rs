//! Sync orchestration: one run from tag listing to version commit.
//!
//! Stages: ListingTags -> Filtering -> Resolving -> Reconciling ->
//! Committing. Any stage failure aborts the run with no persisted
//! effects; the commit is the single atomic point of no return.
//! Cancellation is honored at every stage boundary and between resolver
//! worklist items.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use harborsync_state::{
    CasStore, ContentUnit, RepositoryId, RepositoryStore, StorageError, VersionRef,
};

use crate::error::{RegistryError, Result, SyncError};
use crate::filter::filter_tags;
use crate::reconcile::{desired_set, reconcile};
use crate::registry::RegistryClient;
use crate::remote::{Remote, SyncPolicy};
use crate::resolve::ContentResolver;

/// Cooperative cancellation signal for one sync run.
///
/// Clones share the flag. The orchestrator polls it at stage boundaries;
/// cancellation observed before commit leaves the repository untouched.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Stages of one sync run, in execution order.
///
/// A failure in any stage aborts the run; there is no partial commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    ListingTags,
    Filtering,
    Resolving,
    Reconciling,
    Committing,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncStage::ListingTags => "listing_tags",
            SyncStage::Filtering => "filtering",
            SyncStage::Resolving => "resolving",
            SyncStage::Reconciling => "reconciling",
            SyncStage::Committing => "committing",
        };
        f.write_str(name)
    }
}

/// Result of a completed sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The committed version, or the unchanged latest for a no-op run.
    pub version: VersionRef,
    /// Whether a new version was created.
    pub changed: bool,
}

/// Composes the registry client, resolver, reconciler, and version store
/// into whole sync runs.
pub struct SyncOrchestrator {
    registry: Arc<dyn RegistryClient>,
    store: Arc<dyn RepositoryStore>,
    resolver: Arc<ContentResolver>,
}

impl SyncOrchestrator {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        store: Arc<dyn RepositoryStore>,
        cas: Arc<dyn CasStore>,
    ) -> Self {
        let resolver = Arc::new(ContentResolver::new(Arc::clone(&registry), cas));
        SyncOrchestrator {
            registry,
            store,
            resolver,
        }
    }

    pub fn store(&self) -> &Arc<dyn RepositoryStore> {
        &self.store
    }

    /// Run one synchronization of `repository` against `remote`.
    pub async fn sync(
        &self,
        repository: RepositoryId,
        remote: &Remote,
        cancel: &CancelToken,
    ) -> Result<SyncOutcome> {
        info!(repository = %repository, remote = %remote.url,
              upstream = %remote.upstream_name, "starting sync");

        cancel.checkpoint()?;
        debug!(stage = %SyncStage::ListingTags, "entering stage");
        let all_tags = self.registry.list_tags(remote).await.map_err(|e| match e {
            // No tag is in play yet; name the upstream repository.
            RegistryError::NotFound { .. } => SyncError::UpstreamMissing {
                url: remote.url.clone(),
                upstream: remote.upstream_name.clone(),
            },
            other => SyncError::from_registry(other, &remote.upstream_name),
        })?;

        cancel.checkpoint()?;
        debug!(stage = %SyncStage::Filtering, "entering stage");
        let tags = filter_tags(&all_tags, &remote.allowlist_tags)?;
        info!(listed = all_tags.len(), kept = tags.len(), "filtered tags");

        cancel.checkpoint()?;
        debug!(stage = %SyncStage::Resolving, "entering stage");
        let resolved = self.resolve_all(remote, &tags, cancel).await?;
        let desired = desired_set(resolved);

        // Reconcile and commit against the same base version. If another
        // writer lands a version in between, the commit is rejected and
        // the delta is recomputed against the new latest, so the tag set
        // resolved this run stays authoritative.
        loop {
            cancel.checkpoint()?;
            debug!(stage = %SyncStage::Reconciling, "entering stage");
            let previous = self.store.latest_version(repository).await?;
            let previous_version = self.store.version(repository, previous.number).await?;
            let delta = reconcile(previous_version.content(), &desired);
            debug!(
                added = delta.to_add.len(),
                removed = delta.to_remove.len(),
                "reconciled against version {}",
                previous.number
            );

            // Point of no return: once the commit lands it is not cancellable.
            cancel.checkpoint()?;
            debug!(stage = %SyncStage::Committing, "entering stage");
            match self.store.commit(repository, delta, previous.number).await {
                Ok(version) => {
                    let changed = version.number != previous.number;
                    if changed {
                        info!(repository = %repository, version = version.number,
                              "sync committed new version");
                    } else {
                        info!(repository = %repository, version = version.number,
                              "sync left repository unchanged");
                    }
                    return Ok(SyncOutcome { version, changed });
                }
                Err(StorageError::CommitConflict { latest, .. }) => {
                    debug!(repository = %repository, base = previous.number, latest,
                           "commit lost the race, reconciling against new latest");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Resolve all tags with bounded parallelism.
    ///
    /// Tag resolutions are independent; the final content set is a set
    /// union, so completion order cannot affect the committed version.
    async fn resolve_all(
        &self,
        remote: &Remote,
        tags: &[String],
        cancel: &CancelToken,
    ) -> Result<Vec<ContentUnit>> {
        let semaphore = Arc::new(Semaphore::new(remote.max_concurrent_resolves.max(1)));
        let mut handles = Vec::with_capacity(tags.len());

        for tag in tags {
            let resolver = Arc::clone(&self.resolver);
            let semaphore = Arc::clone(&semaphore);
            let remote = remote.clone();
            let tag = tag.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                // Semaphore is never closed while handles are live.
                let _permit = semaphore.acquire().await.unwrap();
                if cancel.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }
                resolver.resolve(&remote, &tag, &cancel).await
            }));
        }

        let mut units = Vec::new();
        let mut first_error = None;
        for (tag, handle) in tags.iter().zip(handles) {
            let result = handle
                .await
                .map_err(|e| SyncError::TaskPanic(e.to_string()))?;
            match result {
                Ok(resolved) => units.extend(resolved),
                Err(err) => match remote.policy {
                    SyncPolicy::Strict => {
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                    }
                    SyncPolicy::BestEffort => {
                        warn!(tag = %tag, error = %err, "skipping tag that failed to resolve");
                    }
                },
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        Ok(units)
    }
}
