//! Version reconciliation: fetched content graphs against the previous
//! version's content set.
//!
//! A sync is authoritative over the tags it observes: tags absent from
//! the filtered remote listing are removed from the new version. Non-tag
//! units (manifests, lists, blobs) are never removed here; they fall out
//! of reference and wait for an external orphan-cleanup pass.

use std::collections::BTreeMap;

use harborsync_state::{ContentKey, ContentUnit, Delta};

/// Collapse resolved units into the desired content set.
///
/// The same manifest or blob reached through several tags collapses to
/// one entry; duplicate logical identities cannot survive a BTreeMap.
pub fn desired_set(units: impl IntoIterator<Item = ContentUnit>) -> BTreeMap<ContentKey, ContentUnit> {
    units.into_iter().map(|u| (u.key(), u)).collect()
}

/// Compute the delta that turns `previous` into `desired`.
///
/// Running this twice against identical remote state yields an empty
/// delta the second time: additions are keyed by logical identity, so a
/// re-resolved tag or manifest is recognized, not duplicated.
pub fn reconcile(
    previous: &BTreeMap<ContentKey, ContentUnit>,
    desired: &BTreeMap<ContentKey, ContentUnit>,
) -> Delta {
    let to_add = desired
        .iter()
        .filter(|(key, unit)| previous.get(*key) != Some(*unit))
        .map(|(_, unit)| unit.clone())
        .collect();

    let to_remove = previous
        .keys()
        .filter(|key| key.is_tag() && !desired.contains_key(*key))
        .cloned()
        .collect();

    Delta { to_add, to_remove }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harborsync_state::ContentDigest;

    fn tag(name: &str, target: &[u8]) -> ContentUnit {
        ContentUnit::Tag {
            name: name.to_string(),
            manifest: ContentDigest::from_bytes(target),
        }
    }

    fn manifest(data: &[u8]) -> ContentUnit {
        ContentUnit::Manifest {
            digest: ContentDigest::from_bytes(data),
            config: ContentDigest::from_bytes(b"config"),
            layers: vec![ContentDigest::from_bytes(b"layer")],
        }
    }

    #[test]
    fn first_sync_adds_everything() {
        let previous = BTreeMap::new();
        let desired = desired_set([tag("manifest_a", b"m1"), manifest(b"m1")]);
        let delta = reconcile(&previous, &desired);
        assert_eq!(delta.to_add.len(), 2);
        assert!(delta.to_remove.is_empty());
    }

    #[test]
    fn identical_state_yields_empty_delta() {
        let state = desired_set([tag("manifest_a", b"m1"), manifest(b"m1")]);
        let delta = reconcile(&state, &state);
        assert!(delta.is_empty(), "re-sync of unchanged remote must no-op");
    }

    #[test]
    fn duplicate_resolutions_collapse() {
        // Two tags sharing a manifest resolve it twice; the desired set
        // holds it once.
        let desired = desired_set([
            tag("a", b"shared"),
            manifest(b"shared"),
            tag("b", b"shared"),
            manifest(b"shared"),
        ]);
        assert_eq!(desired.len(), 3);
    }

    #[test]
    fn repointed_tag_is_added_not_duplicated() {
        let previous = desired_set([tag("latest", b"old"), manifest(b"old")]);
        let desired = desired_set([tag("latest", b"new"), manifest(b"new")]);
        let delta = reconcile(&previous, &desired);

        assert_eq!(delta.to_add.len(), 2, "new tag pointer and new manifest");
        assert!(
            delta.to_remove.is_empty(),
            "repointing replaces by key, nothing is removed"
        );
    }

    #[test]
    fn vanished_tag_is_removed_but_manifest_retained() {
        let previous = desired_set([tag("gone", b"m1"), manifest(b"m1")]);
        let desired = BTreeMap::new();
        let delta = reconcile(&previous, &desired);

        assert!(delta.to_add.is_empty());
        assert_eq!(delta.to_remove, vec![ContentKey::Tag("gone".to_string())]);
    }

    #[test]
    fn unchanged_units_are_not_re_added() {
        let shared_manifest = manifest(b"stable");
        let previous = desired_set([tag("a", b"stable"), shared_manifest.clone()]);
        let desired = desired_set([
            tag("a", b"stable"),
            shared_manifest,
            tag("b", b"stable"),
        ]);
        let delta = reconcile(&previous, &desired);
        assert_eq!(delta.to_add, vec![tag("b", b"stable")]);
    }
}
