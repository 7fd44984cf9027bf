//! Search highlight overlay

use crate::handle::RenderedHandle;
use board_dom::{Element, Highlighter, RegexHighlighter};
use std::sync::Arc;

/// Applies search highlights to rendered output
///
/// Always clears old marks before applying new ones, so a refresh after a
/// content change or migration never leaves stale highlights behind.
#[derive(Clone)]
pub struct HighlightOverlay {
    highlighter: Arc<dyn Highlighter>,
}

impl HighlightOverlay {
    /// Overlay using `highlighter`
    #[must_use]
    pub fn new(highlighter: Arc<dyn Highlighter>) -> Self {
        Self { highlighter }
    }

    /// Re-apply `query` to the handle's output; returns the number of marks
    pub fn refresh(&self, handle: &RenderedHandle, query: &str) -> usize {
        handle.set_search_query(query);
        match handle.output_root() {
            Some(root) => self.apply(&root, query),
            None => 0,
        }
    }

    /// Clear and re-apply `query` under `root`
    pub fn apply(&self, root: &Element, query: &str) -> usize {
        self.highlighter.unmark(root);
        let query = query.trim();
        if query.is_empty() {
            return 0;
        }
        self.highlighter.mark(root, query)
    }
}

impl Default for HighlightOverlay {
    fn default() -> Self {
        Self::new(Arc::new(RegexHighlighter::new()))
    }
}

impl std::fmt::Debug for HighlightOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HighlightOverlay").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MarkdownService;
    use crate::types::EntityId;

    #[tokio::test]
    async fn refresh_replaces_marks() {
        let handle = RenderedHandle::new(
            EntityId::from("card"),
            "alpha beta alpha",
            Arc::new(MarkdownService::new()),
        );
        let root = handle.render_output().await.unwrap();
        let overlay = HighlightOverlay::default();

        assert_eq!(overlay.refresh(&handle, "alpha"), 2);
        assert_eq!(root.mark_count(), 2);
        assert_eq!(handle.search_query(), "alpha");

        assert_eq!(overlay.refresh(&handle, "beta"), 1);
        assert_eq!(root.mark_count(), 1);

        assert_eq!(overlay.refresh(&handle, "   "), 0);
        assert_eq!(root.mark_count(), 0);
    }

    #[test]
    fn refresh_without_output_records_query() {
        let handle = RenderedHandle::new(
            EntityId::from("card"),
            "x",
            Arc::new(MarkdownService::new()),
        );
        assert_eq!(HighlightOverlay::default().refresh(&handle, "x"), 0);
        assert_eq!(handle.search_query(), "x");
    }
}
