//! Keyed cache of rendered handles
//!
//! One handle per entity, no ordering and no eviction. A view clears the
//! whole cache on teardown. Slots are reserved synchronously on the first
//! request so concurrent first requests join the same handle.

use crate::handle::RenderedHandle;
use crate::types::{EntityId, HandleStatus};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Handles in the cache
    pub entries: usize,
    /// Handles whose output is attached and current
    pub ready: usize,
    /// Handles still queued or rendering
    pub pending: usize,
}

/// `EntityId -> RenderedHandle` map
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: DashMap<EntityId, RenderedHandle>,
}

impl RenderCache {
    /// Create empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a handle
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<RenderedHandle> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    /// True if a handle is cached for `id`
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entries.contains_key(id)
    }

    /// Insert or replace; returns the previous handle
    pub fn insert(&self, handle: RenderedHandle) -> Option<RenderedHandle> {
        self.entries.insert(handle.entity_id().clone(), handle)
    }

    /// Return the cached handle, or reserve a new one built by `make`
    ///
    /// The boolean is `true` when the handle was created by this call.
    pub fn get_or_reserve(
        &self,
        id: &EntityId,
        make: impl FnOnce() -> RenderedHandle,
    ) -> (RenderedHandle, bool) {
        match self.entries.entry(id.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let handle = make();
                entry.insert(handle.clone());
                (handle, true)
            }
        }
    }

    /// Remove the entry for `handle`'s entity only if it is still `handle`
    pub fn remove_if_same(&self, handle: &RenderedHandle) -> bool {
        self.entries
            .remove_if(handle.entity_id(), |_, cached| cached.ptr_eq(handle))
            .is_some()
    }

    /// Remove an entry
    pub fn remove(&self, id: &EntityId) -> Option<RenderedHandle> {
        self.entries.remove(id).map(|(_, handle)| handle)
    }

    /// Number of cached handles
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry, returning the removed handles
    pub fn clear(&self) -> Vec<RenderedHandle> {
        let ids: Vec<EntityId> = self.entity_ids();
        ids.iter().filter_map(|id| self.remove(id)).collect()
    }

    /// Cached entity ids, unordered
    #[must_use]
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Snapshot of cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for entry in self.entries.iter() {
            stats.entries += 1;
            if entry.value().status() == HandleStatus::Ready {
                stats.ready += 1;
            } else {
                stats.pending += 1;
            }
        }
        stats
    }
}
