use std::sync::Arc;

use parking_lot::RwLock;

use backlogwatch_types::Snapshot;

use super::{CacheError, SnapshotCache};

/// In-process snapshot cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    latest: RwLock<Option<Arc<Snapshot>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest snapshot without cloning it.
    pub fn latest_shared(&self) -> Option<Arc<Snapshot>> {
        self.latest.read().clone()
    }
}

impl SnapshotCache for MemoryCache {
    fn store(&self, snapshot: &Snapshot) -> Result<(), CacheError> {
        *self.latest.write() = Some(Arc::new(snapshot.clone()));
        Ok(())
    }

    fn latest(&self) -> Result<Option<Snapshot>, CacheError> {
        Ok(self.latest.read().as_deref().cloned())
    }
}
