//! Behavioral contract tests for `RepositoryStore` and `CasStore`.
//!
//! Run against the in-memory backends; any conforming implementation
//! must pass these.

use harborsync_state::{
    CasStore, ContentDigest, ContentKey, ContentQuery, ContentUnit, Delta, MemoryCasStore,
    MemoryRepositoryStore, RepositoryStore, StorageError,
};

fn tag(name: &str, target: &[u8]) -> ContentUnit {
    ContentUnit::Tag {
        name: name.to_string(),
        manifest: ContentDigest::from_bytes(target),
    }
}

fn add(units: Vec<ContentUnit>) -> Delta {
    Delta {
        to_add: units,
        to_remove: vec![],
    }
}

#[tokio::test]
async fn every_repository_is_born_with_empty_version_zero() {
    let store = MemoryRepositoryStore::new();
    let repo = store.create_repository("mirror").await.unwrap();

    let latest = store.latest_version(repo.id).await.unwrap();
    assert_eq!(latest.number, 0);
    assert!(store.version(repo.id, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn version_numbers_increase_by_one_per_commit() {
    let store = MemoryRepositoryStore::new();
    let repo = store.create_repository("mirror").await.unwrap();

    for i in 1..=3u64 {
        let committed = store
            .commit(repo.id, add(vec![tag(&format!("t{i}"), &[i as u8])]), i - 1)
            .await
            .unwrap();
        assert_eq!(committed.number, i);
    }
}

#[tokio::test]
async fn commit_requires_the_current_base_version() {
    let store = MemoryRepositoryStore::new();
    let repo = store.create_repository("mirror").await.unwrap();
    store
        .commit(repo.id, add(vec![tag("a", b"m1")]), 0)
        .await
        .unwrap();

    // A writer that reconciled against version 0 lost the race; its
    // delta must not apply on top of version 1.
    let err = store
        .commit(repo.id, add(vec![tag("b", b"m2")]), 0)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::CommitConflict { base: 0, latest: 1, .. }
    ));
    let latest = store.latest_version(repo.id).await.unwrap();
    assert_eq!(latest.number, 1, "rejected commit publishes nothing");
}

#[tokio::test]
async fn published_versions_are_immutable() {
    let store = MemoryRepositoryStore::new();
    let repo = store.create_repository("mirror").await.unwrap();
    store
        .commit(repo.id, add(vec![tag("a", b"m1")]), 0)
        .await
        .unwrap();

    let v1_before = store.version(repo.id, 1).await.unwrap();
    store
        .commit(
            repo.id,
            Delta {
                to_add: vec![tag("b", b"m2")],
                to_remove: vec![ContentKey::Tag("a".to_string())],
            },
            1,
        )
        .await
        .unwrap();
    let v1_after = store.version(repo.id, 1).await.unwrap();

    assert_eq!(v1_before, v1_after);
}

#[tokio::test]
async fn empty_delta_does_not_allocate_a_number() {
    let store = MemoryRepositoryStore::new();
    let repo = store.create_repository("mirror").await.unwrap();
    let v1 = store
        .commit(repo.id, add(vec![tag("a", b"m1")]), 0)
        .await
        .unwrap();

    let unchanged = store.commit(repo.id, Delta::default(), 1).await.unwrap();
    assert_eq!(unchanged, v1);
    assert!(matches!(
        store.version(repo.id, 2).await,
        Err(StorageError::VersionNotFound { .. })
    ));
}

#[tokio::test]
async fn unknown_repository_is_reported() {
    let store = MemoryRepositoryStore::new();
    let ghost = harborsync_state::RepositoryId::new();
    assert!(matches!(
        store.latest_version(ghost).await,
        Err(StorageError::RepositoryNotFound { .. })
    ));
}

#[tokio::test]
async fn content_query_selects_by_kind_and_name() {
    let store = MemoryRepositoryStore::new();
    let repo = store.create_repository("mirror").await.unwrap();
    store
        .commit(
            repo.id,
            add(vec![
                tag("a", b"m1"),
                tag("b", b"m2"),
                ContentUnit::Blob {
                    digest: ContentDigest::from_bytes(b"blob"),
                },
            ]),
            0,
        )
        .await
        .unwrap();

    let tags = store
        .list_content(repo.id, 1, &ContentQuery::tags())
        .await
        .unwrap();
    assert_eq!(tags.len(), 2);

    let named = store
        .list_content(repo.id, 1, &ContentQuery::tags_named("b"))
        .await
        .unwrap();
    assert_eq!(named.len(), 1);

    let everything = store
        .list_content(repo.id, 1, &ContentQuery::default())
        .await
        .unwrap();
    assert_eq!(everything.len(), 3);
}

#[tokio::test]
async fn cas_put_returns_content_digest_of_data() {
    let cas = MemoryCasStore::new();
    let data = b"manifest body";
    let digest = cas.put(data).await.unwrap();
    assert_eq!(digest, ContentDigest::from_bytes(data));
    assert_eq!(cas.get(&digest).await.unwrap(), data);
}
