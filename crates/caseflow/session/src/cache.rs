//! Named object caches

use caseflow_types::{ObjectKind, PlatformObject};
use dashmap::DashMap;
use std::sync::Arc;

/// Cache of resolved directory objects keyed by kind and name.
///
/// Overwrite on miss, no eviction. Entries only go away on [`ObjectCache::clear`].
pub trait ObjectCache: Send + Sync {
    fn get(&self, kind: ObjectKind, name: &str) -> Option<Arc<PlatformObject>>;

    fn put(&self, kind: ObjectKind, name: &str, object: Arc<PlatformObject>);

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_enabled(&self) -> bool;
}

/// Concurrent in-memory cache
#[derive(Default)]
pub struct InMemoryCache {
    entries: DashMap<(ObjectKind, String), Arc<PlatformObject>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectCache for InMemoryCache {
    fn get(&self, kind: ObjectKind, name: &str) -> Option<Arc<PlatformObject>> {
        self.entries
            .get(&(kind, name.to_string()))
            .map(|entry| Arc::clone(entry.value()))
    }

    fn put(&self, kind: ObjectKind, name: &str, object: Arc<PlatformObject>) {
        self.entries.insert((kind, name.to_string()), object);
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Cache that never stores anything
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCache;

impl ObjectCache for DisabledCache {
    fn get(&self, _kind: ObjectKind, _name: &str) -> Option<Arc<PlatformObject>> {
        None
    }

    fn put(&self, _kind: ObjectKind, _name: &str, _object: Arc<PlatformObject>) {}

    fn clear(&self) {}

    fn len(&self) -> usize {
        0
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
