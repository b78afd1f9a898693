//! In-process fake registry for tests.
//!
//! `FakeRegistry` satisfies the `RegistryClient` contract from memory:
//! upstream repositories are built tag by tag, can be mutated between
//! syncs (repoint, remove), and can simulate an unreachable remote or
//! corrupted content. The `fixture` constructor mirrors the reference
//! upstream used by the functional suite: five image tags
//! (`manifest_a`..`manifest_e`) and four manifest-list tags
//! (`ml_i`..`ml_iv`).

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use harborsync_state::ContentDigest;

use crate::error::RegistryError;
use crate::registry::{media_type, FetchedManifest, RegistryClient};
use crate::remote::Remote;

/// Upstream repository name used by [`FakeRegistry::fixture`].
pub const FIXTURE_UPSTREAM: &str = "harborsync/test-fixture-1";

const CONFIG_MEDIA_TYPE: &str = "application/vnd.docker.container.image.v1+json";
const LAYER_MEDIA_TYPE: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";

#[derive(Debug, Default)]
struct FakeUpstream {
    /// tag name -> manifest digest
    tags: BTreeMap<String, ContentDigest>,
    /// manifest digest -> (bytes, media type)
    manifests: HashMap<String, (Vec<u8>, String)>,
    /// blob digest -> bytes
    blobs: HashMap<String, Vec<u8>>,
}

#[derive(Debug, Default)]
struct Inner {
    upstreams: HashMap<String, FakeUpstream>,
    unreachable: bool,
}

/// In-memory registry fake.
#[derive(Debug, Default)]
pub struct FakeRegistry {
    inner: Mutex<Inner>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the functional-test fixture.
    pub fn fixture() -> Self {
        let registry = Self::new();
        for tag in ["manifest_a", "manifest_b", "manifest_c", "manifest_d", "manifest_e"] {
            registry.add_image_tag(FIXTURE_UPSTREAM, tag, tag);
        }
        for tag in ["ml_i", "ml_ii", "ml_iii", "ml_iv"] {
            let amd64_seed = format!("{tag}-amd64");
            let arm64_seed = format!("{tag}-arm64");
            registry.add_list_tag(
                FIXTURE_UPSTREAM,
                tag,
                &[
                    ("amd64", "linux", amd64_seed.as_str()),
                    ("arm64", "linux", arm64_seed.as_str()),
                ],
            );
        }
        registry
    }

    /// Simulate network failure for every subsequent call.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.lock().unwrap().unreachable = unreachable;
    }

    /// Add an image manifest under `tag`. Content derives from `seed`, so
    /// the same seed always produces the same digests.
    pub fn add_image_tag(&self, upstream: &str, tag: &str, seed: &str) -> ContentDigest {
        let mut inner = self.inner.lock().unwrap();
        let repo = inner.upstreams.entry(upstream.to_string()).or_default();
        let digest = Self::insert_image(repo, seed);
        repo.tags.insert(tag.to_string(), digest.clone());
        digest
    }

    /// Add a manifest list under `tag` with one child image per entry of
    /// `children` (architecture, os, seed).
    pub fn add_list_tag(
        &self,
        upstream: &str,
        tag: &str,
        children: &[(&str, &str, &str)],
    ) -> ContentDigest {
        let mut inner = self.inner.lock().unwrap();
        let repo = inner.upstreams.entry(upstream.to_string()).or_default();

        let mut entries = Vec::with_capacity(children.len());
        for (architecture, os, seed) in children {
            let child_digest = Self::insert_image(repo, seed);
            entries.push(serde_json::json!({
                "mediaType": media_type::DOCKER_MANIFEST,
                "digest": child_digest.as_str(),
                "size": 0,
                "platform": {"architecture": architecture, "os": os},
            }));
        }
        let list = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": media_type::DOCKER_MANIFEST_LIST,
            "manifests": entries,
        });
        let bytes = serde_json::to_vec(&list).unwrap();
        let digest = ContentDigest::from_bytes(&bytes);
        repo.manifests.insert(
            digest.as_str().to_string(),
            (bytes, media_type::DOCKER_MANIFEST_LIST.to_string()),
        );
        repo.tags.insert(tag.to_string(), digest.clone());
        digest
    }

    /// Remove a tag from the upstream (the manifest stays fetchable by
    /// digest, as on a real registry).
    pub fn remove_tag(&self, upstream: &str, tag: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(repo) = inner.upstreams.get_mut(upstream) {
            repo.tags.remove(tag);
        }
    }

    /// Replace the manifest bytes stored under `digest` with garbage,
    /// simulating a corrupted or tampered remote.
    pub fn corrupt_manifest(&self, upstream: &str, digest: &ContentDigest) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(repo) = inner.upstreams.get_mut(upstream) {
            if let Some((bytes, _)) = repo.manifests.get_mut(digest.as_str()) {
                *bytes = b"corrupted".to_vec();
            }
        }
    }

    /// Manifest digest currently pointed at by `tag`.
    pub fn tag_digest(&self, upstream: &str, tag: &str) -> Option<ContentDigest> {
        let inner = self.inner.lock().unwrap();
        inner.upstreams.get(upstream)?.tags.get(tag).cloned()
    }

    fn insert_image(repo: &mut FakeUpstream, seed: &str) -> ContentDigest {
        let config_bytes = serde_json::to_vec(&serde_json::json!({
            "architecture": "amd64",
            "os": "linux",
            "rootfs": {"type": "layers"},
            "seed": seed,
        }))
        .unwrap();
        let config_digest = ContentDigest::from_bytes(&config_bytes);
        repo.blobs
            .insert(config_digest.as_str().to_string(), config_bytes.clone());

        let layer_digests: Vec<ContentDigest> = (0..2)
            .map(|i| ContentDigest::from_bytes(format!("{seed}-layer-{i}").as_bytes()))
            .collect();

        let manifest = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": media_type::DOCKER_MANIFEST,
            "config": {
                "mediaType": CONFIG_MEDIA_TYPE,
                "digest": config_digest.as_str(),
                "size": config_bytes.len(),
            },
            "layers": layer_digests.iter().map(|d| serde_json::json!({
                "mediaType": LAYER_MEDIA_TYPE,
                "digest": d.as_str(),
                "size": 0,
            })).collect::<Vec<_>>(),
        });
        let bytes = serde_json::to_vec(&manifest).unwrap();
        let digest = ContentDigest::from_bytes(&bytes);
        repo.manifests.insert(
            digest.as_str().to_string(),
            (bytes, media_type::DOCKER_MANIFEST.to_string()),
        );
        digest
    }

    fn check_reachable(&self, remote: &Remote) -> Result<(), RegistryError> {
        if self.inner.lock().unwrap().unreachable {
            return Err(RegistryError::Unreachable {
                url: remote.url.clone(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn list_tags(&self, remote: &Remote) -> Result<Vec<String>, RegistryError> {
        self.check_reachable(remote)?;
        let inner = self.inner.lock().unwrap();
        let repo = inner
            .upstreams
            .get(&remote.upstream_name)
            .ok_or_else(|| RegistryError::NotFound {
                reference: remote.upstream_name.clone(),
            })?;
        Ok(repo.tags.keys().cloned().collect())
    }

    async fn fetch_manifest(
        &self,
        remote: &Remote,
        reference: &str,
    ) -> Result<FetchedManifest, RegistryError> {
        self.check_reachable(remote)?;
        let inner = self.inner.lock().unwrap();
        let repo = inner
            .upstreams
            .get(&remote.upstream_name)
            .ok_or_else(|| RegistryError::NotFound {
                reference: remote.upstream_name.clone(),
            })?;

        let digest_key = if reference.starts_with("sha256:") {
            reference.to_string()
        } else {
            repo.tags
                .get(reference)
                .ok_or_else(|| RegistryError::NotFound {
                    reference: reference.to_string(),
                })?
                .as_str()
                .to_string()
        };
        let (bytes, media_type) =
            repo.manifests
                .get(&digest_key)
                .ok_or_else(|| RegistryError::NotFound {
                    reference: reference.to_string(),
                })?;

        // Same verification a wire client performs.
        let actual = ContentDigest::from_bytes(bytes);
        if actual.as_str() != digest_key {
            return Err(RegistryError::DigestMismatch {
                expected: digest_key,
                actual: actual.as_str().to_string(),
            });
        }

        Ok(FetchedManifest {
            bytes: bytes.clone(),
            digest: actual,
            media_type: media_type.clone(),
        })
    }

    async fn fetch_blob(
        &self,
        remote: &Remote,
        digest: &ContentDigest,
    ) -> Result<Vec<u8>, RegistryError> {
        self.check_reachable(remote)?;
        let inner = self.inner.lock().unwrap();
        let repo = inner
            .upstreams
            .get(&remote.upstream_name)
            .ok_or_else(|| RegistryError::NotFound {
                reference: remote.upstream_name.clone(),
            })?;
        let bytes = repo
            .blobs
            .get(digest.as_str())
            .ok_or_else(|| RegistryError::NotFound {
                reference: digest.as_str().to_string(),
            })?;
        let actual = ContentDigest::from_bytes(bytes);
        if &actual != digest {
            return Err(RegistryError::DigestMismatch {
                expected: digest.as_str().to_string(),
                actual: actual.as_str().to_string(),
            });
        }
        Ok(bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> Remote {
        Remote::new("https://fake.registry.test", FIXTURE_UPSTREAM)
    }

    #[tokio::test]
    async fn fixture_lists_all_nine_tags() {
        let registry = FakeRegistry::fixture();
        let tags = registry.list_tags(&remote()).await.unwrap();
        assert_eq!(tags.len(), 9);
        assert!(tags.contains(&"manifest_a".to_string()));
        assert!(tags.contains(&"ml_iv".to_string()));
    }

    #[tokio::test]
    async fn fetch_by_tag_then_by_digest_agree() {
        let registry = FakeRegistry::fixture();
        let by_tag = registry
            .fetch_manifest(&remote(), "manifest_a")
            .await
            .unwrap();
        let by_digest = registry
            .fetch_manifest(&remote(), by_tag.digest.as_str())
            .await
            .unwrap();
        assert_eq!(by_tag.bytes, by_digest.bytes);
    }

    #[tokio::test]
    async fn unknown_tag_is_not_found() {
        let registry = FakeRegistry::fixture();
        let err = registry
            .fetch_manifest(&remote(), "no_such_tag")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn unreachable_flag_fails_all_calls() {
        let registry = FakeRegistry::fixture();
        registry.set_unreachable(true);
        let err = registry.list_tags(&remote()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn corrupted_manifest_fails_digest_verification() {
        let registry = FakeRegistry::fixture();
        let digest = registry
            .tag_digest(FIXTURE_UPSTREAM, "manifest_a")
            .unwrap();
        registry.corrupt_manifest(FIXTURE_UPSTREAM, &digest);
        let err = registry
            .fetch_manifest(&remote(), digest.as_str())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DigestMismatch { .. }));
    }

    #[tokio::test]
    async fn same_seed_same_digest() {
        let registry = FakeRegistry::new();
        let d1 = registry.add_image_tag("repo", "a", "seed");
        let d2 = registry.add_image_tag("repo", "b", "seed");
        assert_eq!(d1, d2);
    }
}
