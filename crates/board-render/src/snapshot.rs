//! Non-cached previews
//!
//! - [`ClonedPreview`]: a deep copy of cached output, used for drag ghosts
//!   and similar read-only surfaces. Never cached, highlighted or migrated.
//! - [`StaticPreview`]: a one-off render straight through the service,
//!   bypassing cache and queue.

use crate::cache::RenderCache;
use crate::controller::PreviewContext;
use crate::error::PreviewError;
use crate::overlay::HighlightOverlay;
use crate::service::RenderService;
use crate::sink::ErrorSink;
use crate::types::EntityId;
use board_dom::{DomError, Element, Size};
use parking_lot::Mutex;
use std::sync::Arc;

/// Deep copy of a cached output root
#[derive(Debug, Clone)]
pub struct ClonedPreview {
    root: Element,
    reserved: Option<Size>,
}

impl ClonedPreview {
    /// Copy `entity_id`'s cached output into `target`
    ///
    /// Returns `None` when nothing is cached, the handle has no output yet, or
    /// `target` already has children. The lookup never creates a cache entry.
    ///
    /// # Errors
    /// - `DomError` if the copy cannot be placed under `target`
    pub fn capture(
        cache: &RenderCache,
        entity_id: &EntityId,
        target: &Element,
    ) -> Result<Option<Self>, DomError> {
        let Some(handle) = cache.get(entity_id) else {
            return Ok(None);
        };
        let Some(output) = handle.output_root() else {
            return Ok(None);
        };
        if target.child_count() > 0 {
            return Ok(None);
        }

        let root = output.deep_clone();
        target.append(&root)?;
        let reserved = handle.last_measured().filter(Size::has_height);
        if let Some(size) = reserved {
            target.set_explicit_size(Some(size));
        }
        Ok(Some(Self { root, reserved }))
    }

    /// Root of the copy
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Size pinned on the target, if any
    #[inline]
    #[must_use]
    pub fn reserved(&self) -> Option<Size> {
        self.reserved
    }
}

/// Uncached render into a fixed target
pub struct StaticPreview {
    target: Element,
    service: Arc<dyn RenderService>,
    overlay: HighlightOverlay,
    sink: Arc<dyn ErrorSink>,
    root: Mutex<Option<Element>>,
    search_query: Mutex<String>,
}

impl StaticPreview {
    /// Preview rendering into `target` with the context's service and overlay
    #[must_use]
    pub fn new(ctx: &PreviewContext, target: Element) -> Self {
        Self {
            target,
            service: Arc::clone(&ctx.service),
            overlay: ctx.overlay.clone(),
            sink: Arc::clone(&ctx.sink),
            root: Mutex::new(None),
            search_query: Mutex::new(String::new()),
        }
    }

    /// Render `content` as the target's first child
    ///
    /// Failures go to the error sink and leave the previous output in place.
    pub async fn render(&self, content: &str) -> Option<Element> {
        let root = match self.service.render(content).await {
            Ok(root) => root,
            Err(source) => {
                self.sink.report(&PreviewError::Static(source));
                return None;
            }
        };
        if let Err(error) = self.target.replace_first_child(&root) {
            self.sink.report(&PreviewError::Dom(error));
            return None;
        }
        let query = self.search_query.lock().clone();
        self.overlay.apply(&root, &query);
        *self.root.lock() = Some(root.clone());
        Some(root)
    }

    /// Change the search query; returns the number of marks applied
    pub fn set_search_query(&self, query: &str) -> usize {
        {
            let mut current = self.search_query.lock();
            if *current == query {
                return 0;
            }
            *current = query.to_string();
        }
        match self.root() {
            Some(root) => self.overlay.apply(&root, query),
            None => 0,
        }
    }

    /// Output of the last successful render
    #[must_use]
    pub fn root(&self) -> Option<Element> {
        self.root.lock().clone()
    }

    /// Element the preview renders into
    #[inline]
    #[must_use]
    pub fn target(&self) -> &Element {
        &self.target
    }
}

impl std::fmt::Debug for StaticPreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticPreview")
            .field("target", &self.target.id())
            .field("rendered", &self.root.lock().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::RenderedHandle;
    use crate::service::MarkdownService;
    use crate::session::PreviewSession;

    #[tokio::test]
    async fn clone_copies_once_into_empty_target() {
        let cache = RenderCache::new();
        let handle = RenderedHandle::new(
            EntityId::from("card"),
            "body",
            Arc::new(MarkdownService::new()),
        );
        let output = handle.render_output().await.unwrap();
        handle.set_last_measured(Size::new(120.0, 30.0));
        cache.insert(handle);

        let ghost = Element::new("div");
        let preview = ClonedPreview::capture(&cache, &EntityId::from("card"), &ghost)
            .unwrap()
            .unwrap();
        assert!(!preview.root().ptr_eq(&output));
        assert_eq!(preview.root().text_content(), "body");
        assert_eq!(ghost.explicit_size(), Some(Size::new(120.0, 30.0)));
        assert!(output.parent().is_none());

        let again = ClonedPreview::capture(&cache, &EntityId::from("card"), &ghost).unwrap();
        assert!(again.is_none());
        assert_eq!(ghost.child_count(), 1);
    }

    #[test]
    fn clone_of_unknown_entity_is_none() {
        let cache = RenderCache::new();
        let target = Element::new("div");
        assert!(ClonedPreview::capture(&cache, &EntityId::from("nope"), &target)
            .unwrap()
            .is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn static_preview_replaces_first_child_and_highlights() {
        let session = PreviewSession::with_defaults(Arc::new(MarkdownService::new()));
        let ctx = session.open_view("board.md");
        let target = Element::new("div");

        let preview = StaticPreview::new(&ctx, target.clone());
        let first = preview.render("due today").await.unwrap();
        assert!(target.first_child().unwrap().ptr_eq(&first));

        assert_eq!(preview.set_search_query("today"), 1);
        let second = preview.render("due tomorrow, not today").await.unwrap();
        assert!(target.first_child().unwrap().ptr_eq(&second));
        assert!(first.parent().is_none());
        assert_eq!(second.mark_count(), 1);
        assert_eq!(target.child_count(), 1);
        assert_eq!(session.queue().stats().submitted, 0);
        assert!(ctx.view().cache().is_empty());
    }
}
