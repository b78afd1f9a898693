//! HTTP client for the container registry API v2.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use harborsync_state::ContentDigest;

use crate::error::RegistryError;
use crate::registry::{media_type, FetchedManifest, RegistryClient};
use crate::remote::Remote;

const ACCEPT_MANIFEST: &str = concat!(
    "application/vnd.docker.distribution.manifest.v2+json, ",
    "application/vnd.docker.distribution.manifest.list.v2+json, ",
    "application/vnd.oci.image.manifest.v1+json, ",
    "application/vnd.oci.image.index.v1+json"
);

#[derive(Debug, Deserialize)]
struct TagListSchema {
    #[allow(dead_code)]
    name: String,
    tags: Vec<String>,
}

/// Registry client speaking the v2 wire protocol over HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpRegistryClient {
    client: reqwest::Client,
}

impl HttpRegistryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn unreachable(remote: &Remote, err: &reqwest::Error) -> RegistryError {
        RegistryError::Unreachable {
            url: remote.url.clone(),
            reason: err.to_string(),
        }
    }

    /// Map a non-success status to the error taxonomy.
    fn status_error(remote: &Remote, reference: &str, status: reqwest::StatusCode) -> RegistryError {
        if status == reqwest::StatusCode::NOT_FOUND {
            RegistryError::NotFound {
                reference: reference.to_string(),
            }
        } else {
            RegistryError::Protocol {
                url: remote.url.clone(),
                reason: format!("unexpected status {status} fetching {reference}"),
            }
        }
    }

    async fn get(
        &self,
        remote: &Remote,
        path: &str,
        reference: &str,
        accept: Option<&str>,
    ) -> Result<reqwest::Response, RegistryError> {
        let url = format!("{}/v2/{}/{}", remote.url.trim_end_matches('/'), remote.upstream_name, path);
        let mut request = self.client.get(&url);
        if let Some(accept) = accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Self::unreachable(remote, &e))?;
        if !response.status().is_success() {
            return Err(Self::status_error(remote, reference, response.status()));
        }
        Ok(response)
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn list_tags(&self, remote: &Remote) -> Result<Vec<String>, RegistryError> {
        let response = self.get(remote, "tags/list", "tags/list", None).await?;
        let listing: TagListSchema =
            response.json().await.map_err(|e| RegistryError::Protocol {
                url: remote.url.clone(),
                reason: format!("malformed tag listing: {e}"),
            })?;
        debug!(remote = %remote.url, upstream = %remote.upstream_name,
               tags = listing.tags.len(), "listed remote tags");
        Ok(listing.tags)
    }

    async fn fetch_manifest(
        &self,
        remote: &Remote,
        reference: &str,
    ) -> Result<FetchedManifest, RegistryError> {
        let response = self
            .get(
                remote,
                &format!("manifests/{reference}"),
                reference,
                Some(ACCEPT_MANIFEST),
            )
            .await?;

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| media_type::DOCKER_MANIFEST.to_string());
        let header_digest = response
            .headers()
            .get("docker-content-digest")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::unreachable(remote, &e))?;
        let digest = ContentDigest::from_bytes(&bytes);

        // Digest references must hash to themselves; tag fetches are
        // cross-checked against the digest header when the server sends one.
        if reference.starts_with("sha256:") && digest.as_str() != reference {
            return Err(RegistryError::DigestMismatch {
                expected: reference.to_string(),
                actual: digest.as_str().to_string(),
            });
        }
        if let Some(header_digest) = header_digest {
            if header_digest != digest.as_str() {
                warn!(remote = %remote.url, reference,
                      "Docker-Content-Digest header disagrees with body digest");
                return Err(RegistryError::DigestMismatch {
                    expected: header_digest,
                    actual: digest.as_str().to_string(),
                });
            }
        }

        Ok(FetchedManifest {
            bytes: bytes.to_vec(),
            digest,
            media_type,
        })
    }

    async fn fetch_blob(
        &self,
        remote: &Remote,
        digest: &ContentDigest,
    ) -> Result<Vec<u8>, RegistryError> {
        let response = self
            .get(
                remote,
                &format!("blobs/{digest}"),
                digest.as_str(),
                None,
            )
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::unreachable(remote, &e))?;
        let actual = ContentDigest::from_bytes(&bytes);
        if &actual != digest {
            return Err(RegistryError::DigestMismatch {
                expected: digest.as_str().to_string(),
                actual: actual.as_str().to_string(),
            });
        }
        Ok(bytes.to_vec())
    }
}
