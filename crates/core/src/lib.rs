//! bsync-core: Core library for the bsync project sync client
//!
//! This crate provides the synchronization engine, including:
//! - Mapping between project-relative paths and namespaced object keys
//! - Bucket versioning resolution
//! - Lazy enumeration of remote objects and local files
//! - Single-object transfers and whole-project sync
//! - Configuration and profile management
//!
//! This crate is designed to be independent of any specific S3 SDK; the
//! [`ObjectStore`] trait is the only seam to the remote store. The in-memory
//! implementation used by tests is available with the `test-util` feature.

pub mod config;
pub mod enumerate;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod path;
pub mod profile;
pub mod progress;
pub mod sync;
pub mod traits;
pub mod transfer;
pub mod versioning;
pub mod walk;

pub use config::{Config, ConfigManager};
pub use enumerate::{ObjectEnumerator, RemoteObjects};
pub use error::{Error, Result, TransferPhase};
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;
pub use path::{
    ProjectNamespace, local_path_for, relative_key_path, to_local_relative_path, to_remote_key,
};
pub use profile::{Profile, ProfileManager, RetryConfig, TimeoutConfig};
pub use progress::{ItemEvent, ItemOutcome, NoProgress, ProgressSink, TransferProgress};
pub use sync::{ProjectListing, SyncDirection, SyncOrchestrator, SyncSummary};
pub use traits::{
    ListPage, ListedObject, ObjectBody, ObjectStore, RemoteObject, VersionMarker, VersioningMode,
};
pub use transfer::{DownloadOutcome, TransferEngine};
pub use versioning::VersioningResolver;
pub use walk::{LocalFileRef, LocalFiles, walk};
