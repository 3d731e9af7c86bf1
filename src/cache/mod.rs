//! Storage of the latest snapshot.
//!
//! The cache holds at most one snapshot: each pass replaces it wholesale.
//! Only the pass holding the run lock writes; any number of readers (the
//! `show` command, the dashboard) may read at any time and always see either
//! the previous or the new snapshot, never a mix.

mod file;
mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

use std::fmt::Debug;

use backlogwatch_types::Snapshot;
use thiserror::Error;

/// Errors from reading or writing the snapshot cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cached snapshot is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    /// The snapshot was written by an incompatible release.
    #[error("cached snapshot has incompatible schema version {major}.{minor}")]
    IncompatibleVersion { major: u32, minor: u32 },
}

/// Last-write-wins store for the latest snapshot.
pub trait SnapshotCache: Send + Sync + Debug {
    /// Replace the cached snapshot.
    fn store(&self, snapshot: &Snapshot) -> Result<(), CacheError>;

    /// The latest snapshot, or `None` if no pass has completed yet.
    ///
    /// `None` is not the same as a healthy snapshot with no incidents.
    fn latest(&self) -> Result<Option<Snapshot>, CacheError>;
}
