//! HarborSync Core Library
//!
//! Registry synchronization engine: lists an upstream registry's tags,
//! filters them through a glob allowlist, resolves each surviving tag
//! into its content graph, reconciles against the repository's latest
//! version, and commits a new immutable version (or no-ops when nothing
//! changed).

pub mod error;
pub mod fakes;
pub mod filter;
pub mod reconcile;
pub mod registry;
pub mod remote;
pub mod resolve;
pub mod sync;
pub mod task;
pub mod telemetry;

pub use error::{RegistryError, Result, SyncError};
pub use fakes::{FakeRegistry, FIXTURE_UPSTREAM};
pub use filter::filter_tags;
pub use reconcile::{desired_set, reconcile};
pub use registry::http::HttpRegistryClient;
pub use registry::{FetchedManifest, ParsedManifest, RegistryClient};
pub use remote::{Remote, SyncPolicy};
pub use resolve::ContentResolver;
pub use sync::{CancelToken, SyncOrchestrator, SyncOutcome, SyncStage};
pub use task::{spawn_sync, TaskHandle, TaskState};
pub use telemetry::init_tracing;

pub use harborsync_state::{
    CasStore, ContentDigest, ContentKey, ContentKind, ContentQuery, ContentUnit, Delta,
    MemoryCasStore, MemoryRepositoryStore, PlatformRef, Repository, RepositoryId,
    RepositoryStore, RepositoryVersion, StorageError, VersionRef,
};

/// HarborSync version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
