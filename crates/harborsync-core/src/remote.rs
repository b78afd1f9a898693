//! Remote registry configuration.

use serde::{Deserialize, Serialize};

fn default_max_concurrent_resolves() -> usize {
    8
}

/// How the orchestrator treats per-tag resolution failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    /// Any resolution failure aborts the whole run. Nothing is committed.
    #[default]
    Strict,
    /// Tags that fail to resolve are skipped with a warning; the run
    /// commits whatever resolved cleanly.
    BestEffort,
}

/// An upstream registry to mirror from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remote {
    /// Registry base URL, e.g. `https://registry-1.docker.io`.
    pub url: String,

    /// Repository name on the upstream registry, e.g. `library/busybox`.
    pub upstream_name: String,

    /// Glob patterns restricting which tags are imported. Empty means no
    /// filtering. A pattern matching nothing is tolerated, not an error.
    #[serde(default)]
    pub allowlist_tags: Vec<String>,

    /// Failure policy for per-tag resolution.
    #[serde(default)]
    pub policy: SyncPolicy,

    /// Upper bound on concurrent tag resolutions.
    #[serde(default = "default_max_concurrent_resolves")]
    pub max_concurrent_resolves: usize,
}

impl Remote {
    /// Remote with no allowlist and default policy.
    pub fn new(url: &str, upstream_name: &str) -> Self {
        Remote {
            url: url.to_string(),
            upstream_name: upstream_name.to_string(),
            allowlist_tags: Vec::new(),
            policy: SyncPolicy::default(),
            max_concurrent_resolves: default_max_concurrent_resolves(),
        }
    }

    pub fn with_allowlist(mut self, patterns: &[&str]) -> Self {
        self.allowlist_tags = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_defaults() {
        let remote = Remote::new("https://registry.example.com", "library/busybox");
        assert!(remote.allowlist_tags.is_empty());
        assert_eq!(remote.policy, SyncPolicy::Strict);
        assert_eq!(remote.max_concurrent_resolves, 8);
    }

    #[test]
    fn remote_deserializes_with_defaults() {
        let remote: Remote = serde_json::from_str(
            r#"{"url": "https://r.example.com", "upstream_name": "harborsync/test-fixture-1"}"#,
        )
        .unwrap();
        assert_eq!(remote.policy, SyncPolicy::Strict);
        assert_eq!(remote.max_concurrent_resolves, 8);
        assert!(remote.allowlist_tags.is_empty());
    }

    #[test]
    fn remote_builder_sets_allowlist() {
        let remote = Remote::new("https://r.example.com", "repo")
            .with_allowlist(&["manifest*", "ml_??"])
            .with_policy(SyncPolicy::BestEffort);
        assert_eq!(remote.allowlist_tags.len(), 2);
        assert_eq!(remote.policy, SyncPolicy::BestEffort);
    }
}
