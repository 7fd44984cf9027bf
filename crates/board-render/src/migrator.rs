//! Relocating rendered output between containers
//!
//! A card that scrolls back into view gets a fresh, empty container. Instead
//! of re-rendering, the cached output root is moved into it. To keep the
//! layout steady while the host measures the new position, the container is
//! pinned to the last measured size for a short settle delay.

use crate::handle::RenderedHandle;
use board_dom::{DomError, Element, WeakElement};
use std::time::Duration;

/// What a migration did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationOutcome {
    /// Output root was reparented into the new container
    pub moved: bool,
    /// New container was pinned to the memoized size
    pub reserved: bool,
}

/// Moves a handle's output into a new container
#[derive(Debug, Clone, Copy)]
pub struct Migrator {
    settle_delay: Duration,
}

impl Migrator {
    /// Migrator with the given settle delay
    #[inline]
    #[must_use]
    pub fn new(settle_delay: Duration) -> Self {
        Self { settle_delay }
    }

    /// How long a reserved size is kept
    #[inline]
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Bind `handle` to `container`, moving its output there
    ///
    /// Works for handles in any state. A handle with no output yet only
    /// records the container; the render task attaches into it later.
    ///
    /// # Errors
    /// - `DomError` if the output cannot be placed under `container`
    pub fn migrate(
        &self,
        handle: &RenderedHandle,
        container: &Element,
    ) -> Result<MigrationOutcome, DomError> {
        if let Some(previous) = handle.live_container() {
            if !previous.ptr_eq(container) {
                let rect = previous.bounding_box();
                if rect.has_height() {
                    handle.set_last_measured(rect);
                }
            }
        }

        let mut outcome = MigrationOutcome::default();
        if let Some(size) = handle.last_measured().filter(|s| s.has_height()) {
            let token = container.pin_size(size);
            self.schedule_release(container, token);
            outcome.reserved = true;
        }

        handle.bind_container(container);

        if let Some(root) = handle.output_root() {
            let already_there = root.parent().is_some_and(|parent| parent.ptr_eq(container));
            if !already_there {
                container.append(&root)?;
                outcome.moved = true;
            }
        }

        tracing::debug!(
            entity = %handle.entity_id(),
            container = %container.id(),
            moved = outcome.moved,
            reserved = outcome.reserved,
            "migrated render output"
        );
        Ok(outcome)
    }

    // a timer only releases its own pin; a newer pin on the container survives
    fn schedule_release(&self, container: &Element, token: u64) {
        let weak: WeakElement = container.downgrade();
        let delay = self.settle_delay;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) if !delay.is_zero() => {
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(container) = weak.upgrade() {
                        container.release_size(token);
                    }
                });
            }
            _ => {
                container.release_size(token);
            }
        }
    }
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MarkdownService;
    use crate::types::{AttachState, EntityId};
    use board_dom::Size;
    use std::sync::Arc;

    async fn rendered(content: &str) -> RenderedHandle {
        let handle = RenderedHandle::new(
            EntityId::from("card"),
            content,
            Arc::new(MarkdownService::new()),
        );
        handle.render_output().await.unwrap();
        handle
    }

    #[tokio::test]
    async fn moves_output_without_copying() {
        let handle = rendered("body").await;
        let root = handle.output_root().unwrap();
        let a = Element::new("div");
        let b = Element::new("div");
        let migrator = Migrator::default();

        assert!(migrator.migrate(&handle, &a).unwrap().moved);
        assert!(root.parent().unwrap().ptr_eq(&a));

        assert!(migrator.migrate(&handle, &b).unwrap().moved);
        assert_eq!(a.child_count(), 0);
        assert!(b.first_child().unwrap().ptr_eq(&root));
        assert_eq!(handle.attach_state(), AttachState::Measuring);
        assert!(handle.is_bound_to(&b));
    }

    #[tokio::test]
    async fn same_container_is_not_reappended() {
        let handle = rendered("body").await;
        let a = Element::new("div");
        let migrator = Migrator::default();

        migrator.migrate(&handle, &a).unwrap();
        let outcome = migrator.migrate(&handle, &a).unwrap();
        assert!(!outcome.moved);
        assert_eq!(a.child_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reserves_then_releases_size() {
        let handle = rendered("body").await;
        let a = Element::new("div");
        let b = Element::new("div");
        let migrator = Migrator::new(Duration::from_millis(10));

        migrator.migrate(&handle, &a).unwrap();
        a.set_layout_size(Size::new(200.0, 80.0));

        let outcome = migrator.migrate(&handle, &b).unwrap();
        assert!(outcome.reserved);
        assert_eq!(b.explicit_size(), Some(Size::new(200.0, 80.0)));

        tokio::time::sleep(Duration::from_millis(11)).await;
        assert_eq!(b.explicit_size(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_migration_keeps_full_settle_delay() {
        let handle = rendered("body").await;
        let a = Element::new("div");
        let b = Element::new("div");
        let migrator = Migrator::new(Duration::from_millis(10));

        migrator.migrate(&handle, &a).unwrap();
        a.set_layout_size(Size::new(200.0, 80.0));
        migrator.migrate(&handle, &b).unwrap();

        tokio::time::sleep(Duration::from_millis(8)).await;
        migrator.migrate(&handle, &a).unwrap();
        migrator.migrate(&handle, &b).unwrap();
        assert!(b.explicit_size().is_some());

        // first timer fires here and must not clear the second pin
        tokio::time::sleep(Duration::from_millis(3)).await;
        assert!(b.explicit_size().is_some());

        tokio::time::sleep(Duration::from_millis(8)).await;
        assert_eq!(b.explicit_size(), None);
    }

    #[tokio::test]
    async fn collapsed_container_reserves_nothing() {
        let handle = rendered("body").await;
        let a = Element::new("div");
        let b = Element::new("div");
        let migrator = Migrator::default();

        migrator.migrate(&handle, &a).unwrap();
        let outcome = migrator.migrate(&handle, &b).unwrap();
        assert!(!outcome.reserved);
        assert_eq!(b.explicit_size(), None);
        assert!(handle.last_measured().is_none());
    }

    #[test]
    fn handle_without_output_only_records_container() {
        let handle = RenderedHandle::new(
            EntityId::from("card"),
            "x",
            Arc::new(MarkdownService::new()),
        );
        let a = Element::new("div");
        let outcome = Migrator::default().migrate(&handle, &a).unwrap();
        assert_eq!(outcome, MigrationOutcome::default());
        assert!(handle.is_bound_to(&a));
        assert_eq!(a.child_count(), 0);
    }
}
