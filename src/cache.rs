//! Snapshot cache — the only shared mutable state in the daemon.
//!
//! Holds an `Arc<Snapshot>` behind a `RwLock`. Readers clone the `Arc`
//! and release the lock immediately; writers replace the pointer. A
//! published snapshot is never mutated, so a reader sees either the old
//! or the new cycle in full.

use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::model::Snapshot;

/// What a reader gets back from the cache.
#[derive(Debug, Clone)]
pub enum CacheView {
    /// No refresh has completed yet.
    Empty,
    Ready(Arc<Snapshot>),
}

impl CacheView {
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            CacheView::Empty => None,
            CacheView::Ready(snapshot) => Some(snapshot),
        }
    }

    pub fn is_populated(&self) -> bool {
        matches!(self, CacheView::Ready(_))
    }
}

#[derive(Default)]
pub struct SnapshotCache {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last published snapshot, or `CacheView::Empty`.
    pub fn get(&self) -> CacheView {
        // A poisoned lock still guards a whole pointer; keep serving it.
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(snapshot) => CacheView::Ready(Arc::clone(snapshot)),
            None => CacheView::Empty,
        }
    }

    /// Publish a new snapshot and hand back the one it replaced.
    ///
    /// The write lock is held only for the pointer exchange.
    pub fn swap(&self, snapshot: impl Into<Arc<Snapshot>>) -> Option<Arc<Snapshot>> {
        let next = snapshot.into();
        let models = next.models.len();
        let deployments = next.deployments.len();

        let previous = {
            let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
            guard.replace(next)
        };

        debug!(models = models, deployments = deployments, "Snapshot published");
        previous
    }
}
