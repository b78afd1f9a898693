//! Content resolution: one tag name to its full content graph.
//!
//! Fetches the tag's manifest, walks manifest lists into their child
//! image manifests via an explicit worklist (bounded depth, cancellable
//! between items), verifies config blobs, and records every fetched
//! payload in the CAS. Layer blobs are recorded by digest only; their
//! bytes are pulled on demand by external collaborators.

use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use harborsync_state::{CasStore, ContentDigest, ContentUnit, PlatformRef};

use crate::error::{Result, SyncError};
use crate::registry::{FetchedManifest, ImageManifestSchema, ParsedManifest, RegistryClient};
use crate::remote::Remote;
use crate::sync::CancelToken;

/// Resolves tags against one remote, writing fetched bytes to the CAS.
pub struct ContentResolver {
    registry: Arc<dyn RegistryClient>,
    cas: Arc<dyn CasStore>,
}

impl ContentResolver {
    pub fn new(registry: Arc<dyn RegistryClient>, cas: Arc<dyn CasStore>) -> Self {
        ContentResolver { registry, cas }
    }

    /// Resolve `tag` into the content units it contributes to a version.
    ///
    /// Resolution of one tag is independent of its siblings; any failure
    /// here is scoped to this tag and the orchestrator decides whether it
    /// aborts the run.
    pub async fn resolve(
        &self,
        remote: &Remote,
        tag: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<ContentUnit>> {
        let fetched = self
            .registry
            .fetch_manifest(remote, tag)
            .await
            .map_err(|e| SyncError::from_registry(e, tag))?;
        self.cas.put(&fetched.bytes).await?;

        let mut units = vec![ContentUnit::Tag {
            name: tag.to_string(),
            manifest: fetched.digest.clone(),
        }];

        match fetched
            .parse(&remote.url)
            .map_err(|e| SyncError::from_registry(e, tag))?
        {
            ParsedManifest::Image(manifest) => {
                self.resolve_image(remote, tag, &fetched, &manifest, &mut units)
                    .await?;
            }
            ParsedManifest::List(list) => {
                let mut platform_refs = Vec::with_capacity(list.manifests.len());
                let mut worklist = Vec::with_capacity(list.manifests.len());
                for entry in &list.manifests {
                    let digest = self.parse_digest(remote, tag, &entry.digest)?;
                    platform_refs.push(PlatformRef {
                        digest: digest.clone(),
                        architecture: entry.platform.architecture.clone(),
                        os: entry.platform.os.clone(),
                    });
                    worklist.push(digest);
                }
                units.push(ContentUnit::ManifestList {
                    digest: fetched.digest.clone(),
                    manifests: platform_refs,
                });

                // One level of indirection: children must be image manifests.
                for child_digest in worklist {
                    if cancel.is_cancelled() {
                        return Err(SyncError::Cancelled);
                    }
                    let child = self
                        .registry
                        .fetch_manifest(remote, child_digest.as_str())
                        .await
                        .map_err(|e| SyncError::from_registry(e, tag))?;
                    self.cas.put(&child.bytes).await?;
                    match child
                        .parse(&remote.url)
                        .map_err(|e| SyncError::from_registry(e, tag))?
                    {
                        ParsedManifest::Image(manifest) => {
                            self.resolve_image(remote, tag, &child, &manifest, &mut units)
                                .await?;
                        }
                        ParsedManifest::List(_) => {
                            return Err(SyncError::RemoteProtocolError {
                                url: remote.url.clone(),
                                reason: format!(
                                    "manifest list {} nests another list {}",
                                    fetched.digest.short(),
                                    child.digest.short()
                                ),
                            });
                        }
                    }
                }
            }
        }

        debug!(tag, units = units.len(), "resolved tag content graph");
        Ok(units)
    }

    async fn resolve_image(
        &self,
        remote: &Remote,
        tag: &str,
        fetched: &FetchedManifest,
        manifest: &ImageManifestSchema,
        units: &mut Vec<ContentUnit>,
    ) -> Result<()> {
        let config = self.parse_digest(remote, tag, &manifest.config.digest)?;
        let mut layers = Vec::with_capacity(manifest.layers.len());
        for layer in &manifest.layers {
            layers.push(self.parse_digest(remote, tag, &layer.digest)?);
        }

        // Config blobs are fetched eagerly; the client verifies the digest.
        let config_bytes = self
            .registry
            .fetch_blob(remote, &config)
            .await
            .map_err(|e| SyncError::from_registry(e, tag))?;
        self.cas.put(&config_bytes).await?;

        units.push(ContentUnit::Manifest {
            digest: fetched.digest.clone(),
            config: config.clone(),
            layers: layers.clone(),
        });
        units.push(ContentUnit::Blob { digest: config });
        for layer in layers {
            units.push(ContentUnit::Blob { digest: layer });
        }
        Ok(())
    }

    fn parse_digest(&self, remote: &Remote, tag: &str, raw: &str) -> Result<ContentDigest> {
        ContentDigest::from_str(raw).map_err(|_| SyncError::RemoteProtocolError {
            url: remote.url.clone(),
            reason: format!("invalid digest {raw:?} in manifest for tag {tag}"),
        })
    }
}
