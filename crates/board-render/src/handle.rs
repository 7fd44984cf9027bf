//! Cached rendering state for one entity
//!
//! A [`RenderedHandle`] owns the subtree produced for one card and remembers
//! where it is currently shown. It holds the rendering service rather than
//! being one: the host renderer is composed in, and the surface the rest of
//! the layer sees is the small [`RenderedSurface`] capability.

use crate::completion::Completion;
use crate::error::RenderError;
use crate::service::RenderService;
use crate::types::{AttachState, EntityId, HandleStatus};
use async_trait::async_trait;
use board_dom::{Element, Size, WeakElement};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// What the preview layer needs from a rendered surface
#[async_trait]
pub trait RenderedSurface: Send + Sync {
    /// Show `content`; returns `true` if the output was re-rendered
    async fn set(&self, content: &str) -> Result<bool, RenderError>;

    /// Release the output and make pending work skip
    fn unload(&self);

    /// Host size report for the output
    fn observe_size(&self, observed: Size);
}

struct HandleState {
    content: Option<String>,
    requested: String,
    output_root: Option<Element>,
    container: Option<WeakElement>,
    consumers: Vec<(u64, WeakElement)>,
    next_consumer: u64,
    last_measured: Option<Size>,
    last_observed: Option<Size>,
    status: HandleStatus,
    attach: AttachState,
    search_query: String,
    waiters: Vec<Completion>,
    unloaded: bool,
}

struct HandleInner {
    entity_id: EntityId,
    service: Arc<dyn RenderService>,
    state: Mutex<HandleState>,
}

/// Shared, mutable render state bound to one entity
#[derive(Clone)]
pub struct RenderedHandle {
    inner: Arc<HandleInner>,
}

impl RenderedHandle {
    /// New `Queued` handle that will render `content`
    #[must_use]
    pub fn new(
        entity_id: EntityId,
        content: impl Into<String>,
        service: Arc<dyn RenderService>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                entity_id,
                service,
                state: Mutex::new(HandleState {
                    content: None,
                    requested: content.into(),
                    output_root: None,
                    container: None,
                    consumers: Vec::new(),
                    next_consumer: 0,
                    last_measured: None,
                    last_observed: None,
                    status: HandleStatus::Queued,
                    attach: AttachState::Unattached,
                    search_query: String::new(),
                    waiters: Vec::new(),
                    unloaded: false,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandleState> {
        self.inner.state.lock()
    }

    /// Owning entity
    #[inline]
    #[must_use]
    pub fn entity_id(&self) -> &EntityId {
        &self.inner.entity_id
    }

    /// Identity comparison
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &RenderedHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Render progress
    #[must_use]
    pub fn status(&self) -> HandleStatus {
        self.lock().status
    }

    pub(crate) fn set_status(&self, status: HandleStatus) {
        self.lock().status = status;
    }

    /// Container relationship
    #[must_use]
    pub fn attach_state(&self) -> AttachState {
        self.lock().attach
    }

    pub(crate) fn set_attach_state(&self, attach: AttachState) {
        self.lock().attach = attach;
    }

    /// Text the current output was rendered from
    #[must_use]
    pub fn content(&self) -> Option<String> {
        self.lock().content.clone()
    }

    /// Latest text asked for
    #[must_use]
    pub fn requested_content(&self) -> String {
        self.lock().requested.clone()
    }

    /// Record the latest text asked for, without rendering
    pub fn request_content(&self, content: impl Into<String>) {
        self.lock().requested = content.into();
    }

    /// Root of the rendered output, once produced
    #[must_use]
    pub fn output_root(&self) -> Option<Element> {
        self.lock().output_root.clone()
    }

    /// Current container, if it is still alive
    #[must_use]
    pub fn container(&self) -> Option<Element> {
        self.lock().container.as_ref().and_then(WeakElement::upgrade)
    }

    /// Current container, if it is alive and still in the tree
    #[must_use]
    pub fn live_container(&self) -> Option<Element> {
        self.container().filter(Element::is_connected)
    }

    /// True if `container` is the current container
    #[must_use]
    pub fn is_bound_to(&self, container: &Element) -> bool {
        self.lock()
            .container
            .as_ref()
            .is_some_and(|weak| weak.refers_to(container))
    }

    pub(crate) fn bind_container(&self, container: &Element) {
        let mut state = self.lock();
        state.container = Some(container.downgrade());
        state.attach = AttachState::Measuring;
    }

    /// Register a card showing this handle in `container`
    pub(crate) fn add_consumer(&self, container: &Element) -> u64 {
        let mut state = self.lock();
        state.next_consumer += 1;
        let id = state.next_consumer;
        state.consumers.push((id, container.downgrade()));
        id
    }

    /// Point consumer `id` at a new container, registering it if needed
    pub(crate) fn move_consumer(&self, id: u64, container: &Element) {
        let mut state = self.lock();
        let weak = container.downgrade();
        match state.consumers.iter_mut().find(|(cid, _)| *cid == id) {
            Some(entry) => entry.1 = weak,
            None => state.consumers.push((id, weak)),
        }
    }

    pub(crate) fn remove_consumer(&self, id: u64) {
        self.lock().consumers.retain(|(cid, _)| *cid != id);
    }

    /// Cards still showing this handle in a live container
    #[must_use]
    pub fn live_consumers(&self) -> usize {
        let weak: Vec<WeakElement> = self.lock().consumers.iter().map(|(_, w)| w.clone()).collect();
        weak.iter()
            .filter_map(WeakElement::upgrade)
            .filter(Element::is_connected)
            .count()
    }

    /// Current live container, or else the newest live consumer container
    ///
    /// A fallback container becomes the bound one.
    pub(crate) fn adopt_live_container(&self) -> Option<Element> {
        if let Some(container) = self.live_container() {
            return Some(container);
        }
        let candidates: Vec<WeakElement> = {
            let mut state = self.lock();
            state.consumers.retain(|(_, w)| w.upgrade().is_some());
            state.consumers.iter().rev().map(|(_, w)| w.clone()).collect()
        };
        let fallback = candidates
            .iter()
            .filter_map(WeakElement::upgrade)
            .find(Element::is_connected)?;
        self.bind_container(&fallback);
        Some(fallback)
    }

    /// Size reserved for the output during migration
    #[must_use]
    pub fn last_measured(&self) -> Option<Size> {
        self.lock().last_measured
    }

    pub(crate) fn set_last_measured(&self, size: Size) {
        self.lock().last_measured = Some(size);
    }

    /// Last non-zero size reported by the host
    #[must_use]
    pub fn last_observed(&self) -> Option<Size> {
        self.lock().last_observed
    }

    /// Query the overlay last applied
    #[must_use]
    pub fn search_query(&self) -> String {
        self.lock().search_query.clone()
    }

    pub(crate) fn set_search_query(&self, query: &str) {
        let mut state = self.lock();
        if state.search_query != query {
            state.search_query = query.to_string();
        }
    }

    /// True once the owning view released this handle
    #[must_use]
    pub fn is_unloaded(&self) -> bool {
        self.lock().unloaded
    }

    /// Wait for this handle to settle; resolves at once if already `Ready`
    pub(crate) fn add_waiter(&self, completion: Completion) {
        let mut state = self.lock();
        if state.status == HandleStatus::Ready || state.unloaded {
            drop(state);
            completion.resolve();
        } else {
            state.waiters.push(completion);
        }
    }

    pub(crate) fn resolve_waiters(&self) {
        let waiters = std::mem::take(&mut self.lock().waiters);
        for waiter in waiters {
            waiter.resolve();
        }
    }

    /// Render the requested content into a fresh output root
    ///
    /// Moves the handle to `Rendering`. The caller attaches the root and
    /// decides when the handle is `Ready`.
    pub(crate) async fn render_output(&self) -> Result<Element, RenderError> {
        let content = {
            let mut state = self.lock();
            state.status = HandleStatus::Rendering;
            state.requested.clone()
        };
        let root = self.inner.service.render(&content).await?;

        let mut state = self.lock();
        state.output_root = Some(root.clone());
        state.content = Some(content);
        Ok(root)
    }
}

#[async_trait]
impl RenderedSurface for RenderedHandle {
    async fn set(&self, content: &str) -> Result<bool, RenderError> {
        let root = {
            let mut state = self.lock();
            state.requested = content.to_string();
            if state.content.as_deref() == Some(content) {
                return Ok(false);
            }
            match &state.output_root {
                Some(root) => root.clone(),
                // not rendered yet; the pending render picks up `requested`
                None => return Ok(false),
            }
        };
        self.inner.service.update(&root, content).await?;
        self.lock().content = Some(content.to_string());
        Ok(true)
    }

    fn unload(&self) {
        let (root, waiters) = {
            let mut state = self.lock();
            state.unloaded = true;
            state.container = None;
            state.consumers.clear();
            state.attach = AttachState::Unattached;
            (state.output_root.take(), std::mem::take(&mut state.waiters))
        };
        if let Some(root) = root {
            root.detach();
        }
        for waiter in waiters {
            waiter.resolve();
        }
    }

    fn observe_size(&self, observed: Size) {
        if !observed.has_height() {
            return;
        }
        let container = self.container();
        let mut state = self.lock();
        state.last_observed = Some(observed);
        if let Some(container) = container {
            let rect = container.bounding_box();
            if state.last_measured.is_none() || rect.has_height() {
                state.last_measured = Some(rect);
            }
        }
        if state.attach == AttachState::Measuring {
            state.attach = AttachState::Attached;
        }
    }
}

impl std::fmt::Debug for RenderedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("RenderedHandle")
            .field("entity_id", &self.inner.entity_id)
            .field("status", &state.status)
            .field("attach", &state.attach)
            .field("has_output", &state.output_root.is_some())
            .field("last_measured", &state.last_measured)
            .finish()
    }
}
