//! Remote registry client: trait, wire schemas, and media types.
//!
//! Implementations speak the container registry HTTP API (tag listing,
//! manifest and blob retrieval, content addressed by digest). Every
//! fetch-by-digest is verified against the requested digest before the
//! bytes are handed to the resolver.

pub mod http;

use async_trait::async_trait;
use serde::Deserialize;

use harborsync_state::ContentDigest;

use crate::error::RegistryError;
use crate::remote::Remote;

/// Manifest media types accepted from remotes.
pub mod media_type {
    pub const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
    pub const DOCKER_MANIFEST_LIST: &str =
        "application/vnd.docker.distribution.manifest.list.v2+json";
    pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
    pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";
}

/// Raw manifest bytes plus their verified content digest.
#[derive(Debug, Clone)]
pub struct FetchedManifest {
    pub bytes: Vec<u8>,
    pub digest: ContentDigest,
    pub media_type: String,
}

impl FetchedManifest {
    /// Parse the manifest body into its typed form.
    ///
    /// `url` is the remote base URL, used only for error context.
    pub fn parse(&self, url: &str) -> Result<ParsedManifest, RegistryError> {
        let protocol_err = |reason: String| RegistryError::Protocol {
            url: url.to_string(),
            reason,
        };
        match self.media_type.as_str() {
            media_type::DOCKER_MANIFEST_LIST | media_type::OCI_INDEX => {
                let list: ManifestListSchema = serde_json::from_slice(&self.bytes)
                    .map_err(|e| protocol_err(format!("malformed manifest list: {e}")))?;
                Ok(ParsedManifest::List(list))
            }
            media_type::DOCKER_MANIFEST | media_type::OCI_MANIFEST => {
                let manifest: ImageManifestSchema = serde_json::from_slice(&self.bytes)
                    .map_err(|e| protocol_err(format!("malformed image manifest: {e}")))?;
                Ok(ParsedManifest::Image(manifest))
            }
            other => Err(protocol_err(format!("unsupported media type: {other}"))),
        }
    }
}

/// A manifest body after schema validation.
#[derive(Debug)]
pub enum ParsedManifest {
    Image(ImageManifestSchema),
    List(ManifestListSchema),
}

/// Content descriptor common to config and layer references.
#[derive(Debug, Clone, Deserialize)]
pub struct DescriptorSchema {
    #[serde(rename = "mediaType", default)]
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub size: u64,
}

/// Image manifest wire schema (Docker v2 / OCI).
#[derive(Debug, Deserialize)]
pub struct ImageManifestSchema {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    pub config: DescriptorSchema,
    pub layers: Vec<DescriptorSchema>,
}

/// Platform selector inside a manifest list entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformSchema {
    pub architecture: String,
    pub os: String,
}

/// One entry of a manifest list.
#[derive(Debug, Deserialize)]
pub struct ManifestListEntrySchema {
    pub digest: String,
    pub platform: PlatformSchema,
}

/// Manifest list / OCI index wire schema.
#[derive(Debug, Deserialize)]
pub struct ManifestListSchema {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    pub manifests: Vec<ManifestListEntrySchema>,
}

/// Client for one remote registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// List all tag names of the remote's upstream repository.
    async fn list_tags(&self, remote: &Remote) -> Result<Vec<String>, RegistryError>;

    /// Fetch a manifest by tag name or digest.
    ///
    /// The returned digest is verified: for digest references it must
    /// equal the requested digest, otherwise the fetch fails with
    /// `DigestMismatch`.
    async fn fetch_manifest(
        &self,
        remote: &Remote,
        reference: &str,
    ) -> Result<FetchedManifest, RegistryError>;

    /// Fetch a blob by digest, verified against the digest.
    ///
    /// Used for config blobs; layer bytes are left to external
    /// collaborators to pull on demand.
    async fn fetch_blob(
        &self,
        remote: &Remote,
        digest: &ContentDigest,
    ) -> Result<Vec<u8>, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetched(bytes: &[u8], media_type: &str) -> FetchedManifest {
        FetchedManifest {
            bytes: bytes.to_vec(),
            digest: ContentDigest::from_bytes(bytes),
            media_type: media_type.to_string(),
        }
    }

    #[test]
    fn parses_image_manifest() {
        let body = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": media_type::DOCKER_MANIFEST,
            "config": {"mediaType": "application/vnd.docker.container.image.v1+json",
                       "digest": "sha256:aaaa", "size": 3},
            "layers": [{"mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
                        "digest": "sha256:bbbb", "size": 5}],
        });
        let raw = serde_json::to_vec(&body).unwrap();
        let parsed = fetched(&raw, media_type::DOCKER_MANIFEST)
            .parse("https://r.example.com")
            .unwrap();
        match parsed {
            ParsedManifest::Image(m) => {
                assert_eq!(m.schema_version, 2);
                assert_eq!(m.layers.len(), 1);
                assert_eq!(m.config.digest, "sha256:aaaa");
            }
            ParsedManifest::List(_) => panic!("expected image manifest"),
        }
    }

    #[test]
    fn parses_manifest_list() {
        let body = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": media_type::DOCKER_MANIFEST_LIST,
            "manifests": [
                {"digest": "sha256:cccc", "platform": {"architecture": "amd64", "os": "linux"}},
                {"digest": "sha256:dddd", "platform": {"architecture": "arm64", "os": "linux"}},
            ],
        });
        let raw = serde_json::to_vec(&body).unwrap();
        let parsed = fetched(&raw, media_type::OCI_INDEX)
            .parse("https://r.example.com")
            .unwrap();
        match parsed {
            ParsedManifest::List(l) => assert_eq!(l.manifests.len(), 2),
            ParsedManifest::Image(_) => panic!("expected manifest list"),
        }
    }

    #[test]
    fn malformed_body_is_protocol_error() {
        let err = fetched(b"not json", media_type::DOCKER_MANIFEST)
            .parse("https://r.example.com")
            .unwrap_err();
        assert!(matches!(err, RegistryError::Protocol { .. }));
    }

    #[test]
    fn unknown_media_type_is_protocol_error() {
        let err = fetched(b"{}", "application/octet-stream")
            .parse("https://r.example.com")
            .unwrap_err();
        assert!(matches!(err, RegistryError::Protocol { .. }));
    }
}
