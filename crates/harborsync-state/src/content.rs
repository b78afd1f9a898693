//! Content units: the typed records that make up a repository version.
//!
//! Tags are keyed by NAME (a tag is a mutable pointer that may be
//! repointed across versions); manifests, manifest lists, and blobs are
//! keyed by their content digest.

use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;

/// Reference to a platform-specific child manifest inside a manifest list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlatformRef {
    /// Digest of the child image manifest.
    pub digest: ContentDigest,
    /// CPU architecture, e.g. `amd64`.
    pub architecture: String,
    /// Operating system, e.g. `linux`.
    pub os: String,
}

/// A unit of repository content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentUnit {
    /// Human-readable name pointing at a manifest or manifest list.
    Tag {
        name: String,
        manifest: ContentDigest,
    },
    /// Image manifest: config blob plus ordered layer blobs.
    Manifest {
        digest: ContentDigest,
        config: ContentDigest,
        layers: Vec<ContentDigest>,
    },
    /// Multi-platform manifest list indirecting to child manifests.
    ManifestList {
        digest: ContentDigest,
        manifests: Vec<PlatformRef>,
    },
    /// Opaque blob (config or layer), identified by digest only.
    Blob { digest: ContentDigest },
}

impl ContentUnit {
    /// Logical identity of this unit within one repository version.
    pub fn key(&self) -> ContentKey {
        match self {
            ContentUnit::Tag { name, .. } => ContentKey::Tag(name.clone()),
            ContentUnit::Manifest { digest, .. } => ContentKey::Manifest(digest.clone()),
            ContentUnit::ManifestList { digest, .. } => ContentKey::ManifestList(digest.clone()),
            ContentUnit::Blob { digest } => ContentKey::Blob(digest.clone()),
        }
    }

    /// Broad kind discriminant, used by content queries.
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentUnit::Tag { .. } => ContentKind::Tag,
            ContentUnit::Manifest { .. } => ContentKind::Manifest,
            ContentUnit::ManifestList { .. } => ContentKind::ManifestList,
            ContentUnit::Blob { .. } => ContentKind::Blob,
        }
    }
}

/// Identity of a content unit inside one repository version.
///
/// Sorts tags before digest-keyed units, which gives version content a
/// stable, human-friendly iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContentKey {
    /// Identified by tag name, scoped to one version.
    Tag(String),
    /// Identified by manifest digest.
    Manifest(ContentDigest),
    /// Identified by manifest list digest.
    ManifestList(ContentDigest),
    /// Identified by blob digest.
    Blob(ContentDigest),
}

impl ContentKey {
    pub fn is_tag(&self) -> bool {
        matches!(self, ContentKey::Tag(_))
    }
}

/// Content kind discriminant for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Tag,
    Manifest,
    ManifestList,
    Blob,
}
