//! Immutable repository version snapshots and the deltas between them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::{ContentKey, ContentUnit};

/// Unique identifier for a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepositoryId(pub Uuid);

impl RepositoryId {
    /// Generate a new random repository id.
    pub fn new() -> Self {
        RepositoryId(Uuid::new_v4())
    }
}

impl Default for RepositoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to one version of one repository.
///
/// The engine's stable handle for "latest version" comparisons: two syncs
/// that change nothing return the same `VersionRef`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRef {
    pub repository: RepositoryId,
    pub number: u64,
}

impl std::fmt::Display for VersionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/versions/{}", self.repository, self.number)
    }
}

/// Immutable snapshot of a repository's content set.
///
/// Version 0 always exists and is empty. Later versions are created only
/// by committing a delta on top of the previous latest; existing versions
/// are never mutated. The content map is keyed by logical identity, so a
/// version can never hold two units with the same (type, digest) or two
/// tags with the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryVersion {
    pub number: u64,
    pub created_at: DateTime<Utc>,
    /// Persisted as a flat unit list; the keyed map is rebuilt on load.
    #[serde(with = "content_serde")]
    content: BTreeMap<ContentKey, ContentUnit>,
}

mod content_serde {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<ContentKey, ContentUnit>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<ContentKey, ContentUnit>, D::Error> {
        let units = Vec::<ContentUnit>::deserialize(deserializer)?;
        Ok(units.into_iter().map(|u| (u.key(), u)).collect())
    }
}

impl RepositoryVersion {
    /// The empty initial version.
    pub fn initial() -> Self {
        RepositoryVersion {
            number: 0,
            created_at: Utc::now(),
            content: BTreeMap::new(),
        }
    }

    /// Build the successor version by applying `delta` to this version's
    /// content. Untouched units are carried forward.
    pub fn apply(&self, delta: &Delta) -> Self {
        let mut content = self.content.clone();
        for key in &delta.to_remove {
            content.remove(key);
        }
        for unit in &delta.to_add {
            content.insert(unit.key(), unit.clone());
        }
        RepositoryVersion {
            number: self.number + 1,
            created_at: Utc::now(),
            content,
        }
    }

    pub fn content(&self) -> &BTreeMap<ContentKey, ContentUnit> {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }
}

/// Metadata record for a repository: identity plus its version history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// The difference between two repository versions.
///
/// `to_remove` only ever names tag keys: manifests and blobs that fall out
/// of use stay in the version store as orphans for an external cleanup
/// pass to reclaim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub to_add: Vec<ContentUnit>,
    pub to_remove: Vec<ContentKey>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}
