//! Tag allowlist filtering.
//!
//! Shell-style globs: `*` matches any run of characters, `?` matches
//! exactly one. A tag survives if it matches ANY pattern; an empty
//! pattern list keeps every tag. Patterns that match nothing are
//! tolerated: allowlisting a tag the remote does not have must not fail
//! the sync.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::error::{Result, SyncError};

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|e| SyncError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| SyncError::InvalidPattern {
        pattern: patterns.join(","),
        reason: e.to_string(),
    })
}

/// Filter `tags` through the allowlist `patterns`.
///
/// The result is sorted and deduplicated so the outcome is deterministic
/// regardless of the order the remote listed tags in.
pub fn filter_tags(tags: &[String], patterns: &[String]) -> Result<Vec<String>> {
    let mut kept: Vec<String> = if patterns.is_empty() {
        tags.to_vec()
    } else {
        let set = build_globset(patterns)?;
        tags.iter()
            .filter(|tag| set.is_match(tag.as_str()))
            .cloned()
            .collect()
    };
    kept.sort_unstable();
    kept.dedup();
    debug!(
        total = tags.len(),
        kept = kept.len(),
        patterns = patterns.len(),
        "filtered remote tag listing"
    );
    Ok(kept)
}
