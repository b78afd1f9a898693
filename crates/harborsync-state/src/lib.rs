//! HarborSync storage layer.
//!
//! Content digests, content units, immutable repository versions, and the
//! storage traits the sync engine runs against. In-memory backends are
//! provided for embedded use and testing; durable backends implement the
//! same traits.

pub mod content;
pub mod digest;
pub mod error;
pub mod memory;
pub mod store;
pub mod version;

pub use content::{ContentKey, ContentKind, ContentUnit, PlatformRef};
pub use digest::ContentDigest;
pub use error::{StorageError, StorageResult};
pub use memory::{MemoryCasStore, MemoryRepositoryStore};
pub use store::{CasStore, ContentQuery, RepositoryStore};
pub use version::{Delta, Repository, RepositoryId, RepositoryVersion, VersionRef};
