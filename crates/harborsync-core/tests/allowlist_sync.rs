//! Syncing with allowlisted tags.
//!
//! The allowlist restricts which upstream tags are imported. Patterns
//! that match nothing are tolerated; wildcards follow shell glob rules
//! (`*` any run, `?` exactly one character).

use std::sync::Arc;

use harborsync_core::{
    init_tracing, CancelToken, CasStore, ContentQuery, ContentUnit, FakeRegistry, MemoryCasStore,
    MemoryRepositoryStore, RegistryClient, Remote, RepositoryStore, SyncOrchestrator,
    FIXTURE_UPSTREAM,
};
use tracing::Level;

async fn sync_with_allowlist(patterns: &[&str]) -> Vec<String> {
    init_tracing(false, Level::WARN);
    let registry = Arc::new(FakeRegistry::fixture());
    let store = Arc::new(MemoryRepositoryStore::new());
    let orchestrator = SyncOrchestrator::new(
        registry as Arc<dyn RegistryClient>,
        Arc::clone(&store) as Arc<dyn RepositoryStore>,
        Arc::new(MemoryCasStore::new()) as Arc<dyn CasStore>,
    );

    let repository = store.create_repository("mirror").await.unwrap().id;
    let remote =
        Remote::new("https://fake.registry.test", FIXTURE_UPSTREAM).with_allowlist(patterns);

    let outcome = orchestrator
        .sync(repository, &remote, &CancelToken::new())
        .await
        .unwrap();

    let mut names: Vec<String> = store
        .list_content(repository, outcome.version.number, &ContentQuery::tags())
        .await
        .unwrap()
        .into_iter()
        .map(|unit| match unit {
            ContentUnit::Tag { name, .. } => name,
            other => panic!("expected tag, got {other:?}"),
        })
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn non_existing_allowlisted_tag_is_ignored() {
    let tags = sync_with_allowlist(&["manifest_a", "non_existing_manifest"]).await;
    assert_eq!(tags, vec!["manifest_a"]);
}

#[tokio::test]
async fn only_allowlisted_tags_are_synced() {
    let tags = sync_with_allowlist(&["manifest_a", "manifest_b", "manifest_c"]).await;
    assert_eq!(tags, vec!["manifest_a", "manifest_b", "manifest_c"]);
}

#[tokio::test]
async fn wildcard_allowlist_matches_union_of_patterns() {
    let tags = sync_with_allowlist(&["ml_??", "manifest*"]).await;
    assert_eq!(
        tags,
        vec![
            "manifest_a",
            "manifest_b",
            "manifest_c",
            "manifest_d",
            "manifest_e",
            "ml_ii",
            "ml_iv",
        ]
    );
}

#[tokio::test]
async fn empty_allowlist_syncs_everything() {
    let tags = sync_with_allowlist(&[]).await;
    assert_eq!(tags.len(), 9);
}
