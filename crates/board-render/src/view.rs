//! Host view owning a render cache
//!
//! One [`BoardView`] exists per open board file. Handles it renders are
//! registered as owned children; tearing the view down unloads all of them
//! and empties the cache.

use crate::cache::RenderCache;
use crate::handle::{RenderedHandle, RenderedSurface};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Board view: file path, child lifecycle and cache slot
#[derive(Debug)]
pub struct BoardView {
    file_path: PathBuf,
    cache: RenderCache,
    children: Mutex<Vec<RenderedHandle>>,
    loaded: AtomicBool,
}

impl BoardView {
    /// Loaded view for `file_path` with an empty cache
    #[must_use]
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            cache: RenderCache::new(),
            children: Mutex::new(Vec::new()),
            loaded: AtomicBool::new(true),
        }
    }

    /// Board file this view shows
    #[inline]
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Render cache scoped to this view
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// False once torn down
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Register a handle whose lifetime this view governs
    ///
    /// A view that was already torn down unloads the handle at once.
    pub fn own(&self, child: &RenderedHandle) {
        if !self.is_loaded() {
            child.unload();
            return;
        }
        let mut children = self.children.lock();
        if !children.iter().any(|c| c.ptr_eq(child)) {
            children.push(child.clone());
        }
    }

    /// Stop governing a handle without unloading it
    pub fn release(&self, child: &RenderedHandle) {
        self.children.lock().retain(|c| !c.ptr_eq(child));
    }

    /// Number of owned handles
    #[must_use]
    pub fn owned_count(&self) -> usize {
        self.children.lock().len()
    }

    /// Unload every owned handle and clear the cache
    ///
    /// Pending render tasks for these handles skip when they start.
    pub fn teardown(&self) {
        if !self.loaded.swap(false, Ordering::AcqRel) {
            return;
        }
        let children = std::mem::take(&mut *self.children.lock());
        let cached = self.cache.clear();
        for handle in children.iter().chain(cached.iter()) {
            handle.unload();
        }
        tracing::info!(
            file = %self.file_path.display(),
            handles = children.len(),
            cached = cached.len(),
            "board view torn down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MarkdownService;
    use crate::types::EntityId;
    use std::sync::Arc;

    fn handle(id: &str) -> RenderedHandle {
        RenderedHandle::new(EntityId::from(id), "x", Arc::new(MarkdownService::new()))
    }

    #[test]
    fn own_is_idempotent() {
        let view = BoardView::new("board.md");
        let h = handle("a");
        view.own(&h);
        view.own(&h);
        assert_eq!(view.owned_count(), 1);
        view.release(&h);
        assert_eq!(view.owned_count(), 0);
        assert!(!h.is_unloaded());
    }

    #[test]
    fn teardown_unloads_and_clears() {
        let view = BoardView::new("board.md");
        let h = handle("a");
        view.own(&h);
        view.cache().insert(h.clone());

        view.teardown();
        assert!(!view.is_loaded());
        assert!(h.is_unloaded());
        assert!(view.cache().is_empty());
        assert_eq!(view.owned_count(), 0);

        let late = handle("b");
        view.own(&late);
        assert!(late.is_unloaded());
        assert_eq!(view.owned_count(), 0);
    }

    #[test]
    fn file_path_is_kept() {
        let view = BoardView::new("boards/sprint.md");
        assert_eq!(view.file_path(), Path::new("boards/sprint.md"));
    }
}
