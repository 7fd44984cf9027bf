//! Per-card preview controller
//!
//! A card asks for content under an entity id and gets back a
//! [`PreviewController`]. The controller decides between three paths:
//!
//! - **Hit, ready**: migrate the cached output into the card's container,
//!   refresh highlights, done. No rendering.
//! - **Hit, pending**: join the in-flight render. The latest container and
//!   content are recorded; the render task honours both when it runs.
//! - **Miss**: reserve a handle in the cache and submit a render task.
//!
//! Render tasks skip when their view or handle was unloaded, or when no
//! card showing the handle still has a live container. A skipped, failed or
//! cancelled task removes its reservation so the next request retries.

use crate::completion::Completion;
use crate::error::{PreviewError, PreviewResult};
use crate::handle::{RenderedHandle, RenderedSurface};
use crate::migrator::{MigrationOutcome, Migrator};
use crate::overlay::HighlightOverlay;
use crate::queue::{RenderQueue, TaskHandle};
use crate::service::RenderService;
use crate::sink::ErrorSink;
use crate::snapshot::ClonedPreview;
use crate::types::{AttachState, EntityId, HandleStatus};
use crate::view::BoardView;
use board_dom::{DomError, Element, Size, WeakElement};
use futures::FutureExt;
use std::sync::Arc;

/// Everything a controller needs from its surroundings
///
/// Built by [`crate::PreviewSession`]; cheap to clone.
#[derive(Clone)]
pub struct PreviewContext {
    pub(crate) view: Arc<BoardView>,
    pub(crate) queue: RenderQueue,
    pub(crate) service: Arc<dyn RenderService>,
    pub(crate) overlay: HighlightOverlay,
    pub(crate) migrator: Migrator,
    pub(crate) sink: Arc<dyn ErrorSink>,
    pub(crate) default_priority: i32,
}

impl PreviewContext {
    /// View whose cache this context uses
    #[inline]
    #[must_use]
    pub fn view(&self) -> &Arc<BoardView> {
        &self.view
    }

    /// Shared render queue
    #[inline]
    #[must_use]
    pub fn queue(&self) -> &RenderQueue {
        &self.queue
    }

    /// Size a fresh wrapper should reserve for a cached entity
    #[must_use]
    pub fn reserved_size(&self, entity_id: &EntityId) -> Option<Size> {
        self.view
            .cache()
            .get(entity_id)
            .and_then(|handle| handle.last_measured())
            .filter(Size::has_height)
    }

    /// Static copy of a cached entity's output into an empty `target`
    ///
    /// # Errors
    /// - `DomError` if the copy cannot be placed under `target`
    pub fn render_clone(
        &self,
        entity_id: &EntityId,
        target: &Element,
    ) -> Result<Option<ClonedPreview>, DomError> {
        ClonedPreview::capture(self.view.cache(), entity_id, target)
    }
}

impl std::fmt::Debug for PreviewContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewContext")
            .field("file", &self.view.file_path())
            .field("queue", &self.queue)
            .field("default_priority", &self.default_priority)
            .finish_non_exhaustive()
    }
}

/// A card's request to show content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    /// Cache identity of the content
    pub entity_id: EntityId,
    /// Source text
    pub content: String,
    /// Render priority; the session default when `None`
    pub priority: Option<i32>,
    /// Active search query
    pub search_query: String,
}

impl MountRequest {
    /// Request with default priority and no search query
    #[must_use]
    pub fn new(entity_id: impl Into<EntityId>, content: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            content: content.into(),
            priority: None,
            search_query: String::new(),
        }
    }

    /// With render priority
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// With search query
    #[must_use]
    pub fn with_search_query(mut self, query: impl Into<String>) -> Self {
        self.search_query = query.into();
        self
    }
}

/// Preview lifecycle for one mounted card
pub struct PreviewController {
    ctx: PreviewContext,
    handle: RenderedHandle,
    container: WeakElement,
    consumer: u64,
    completion: Completion,
    task: Option<TaskHandle>,
    search_query: String,
    cache_hit: bool,
}

impl PreviewController {
    /// Mount `request` into `container`
    ///
    /// Service failures while reconciling content on a cache hit are
    /// reported to the error sink; the controller is still returned.
    ///
    /// # Errors
    /// - `PreviewError::Dom` if cached output cannot be moved into `container`
    pub async fn mount(
        ctx: &PreviewContext,
        container: &Element,
        request: MountRequest,
    ) -> PreviewResult<Self> {
        let MountRequest {
            entity_id,
            content,
            priority,
            search_query,
        } = request;
        let completion = Completion::new();

        if !ctx.view.is_loaded() {
            tracing::debug!(entity = %entity_id, "mount on unloaded view ignored");
            let handle = RenderedHandle::new(entity_id, content, Arc::clone(&ctx.service));
            handle.unload();
            completion.resolve();
            let consumer = handle.add_consumer(container);
            return Ok(Self::assemble(ctx, handle, container, consumer, completion, None, search_query, false));
        }

        let (handle, created) = ctx.view.cache().get_or_reserve(&entity_id, || {
            RenderedHandle::new(entity_id.clone(), content.clone(), Arc::clone(&ctx.service))
        });

        if created {
            tracing::debug!(entity = %entity_id, "render cache miss");
            ctx.view.own(&handle);
            handle.set_search_query(&search_query);
            if let Err(error) = ctx.migrator.migrate(&handle, container) {
                abandon(ctx, &handle);
                return Err(error.into());
            }
            let consumer = handle.add_consumer(container);
            handle.add_waiter(completion.clone());

            let priority = priority.unwrap_or(ctx.default_priority);
            let task = ctx.queue.submit_cancellable(
                entity_id.to_string(),
                priority,
                run_render(ctx.clone(), handle.clone()).boxed(),
                cancel_render(ctx.clone(), handle.clone()),
            );
            return Ok(Self::assemble(ctx, handle, container, consumer, completion, Some(task), search_query, false));
        }

        tracing::debug!(entity = %entity_id, status = %handle.status(), "render cache hit");
        ctx.migrator.migrate(&handle, container)?;
        let consumer = handle.add_consumer(container);

        if handle.status() == HandleStatus::Ready {
            completion.resolve();
            if let Err(source) = handle.set(&content).await {
                ctx.sink.report(&PreviewError::render(entity_id, source));
            }
            ctx.overlay.refresh(&handle, &search_query);
        } else {
            handle.request_content(content);
            handle.set_search_query(&search_query);
            handle.add_waiter(completion.clone());
        }
        Ok(Self::assemble(ctx, handle, container, consumer, completion, None, search_query, true))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        ctx: &PreviewContext,
        handle: RenderedHandle,
        container: &Element,
        consumer: u64,
        completion: Completion,
        task: Option<TaskHandle>,
        search_query: String,
        cache_hit: bool,
    ) -> Self {
        Self {
            ctx: ctx.clone(),
            handle,
            container: container.downgrade(),
            consumer,
            completion,
            task,
            search_query,
            cache_hit,
        }
    }

    /// Show new content
    ///
    /// Returns `true` if the output was re-rendered. Identical content is a
    /// no-op; content arriving before the first render finishes is picked up
    /// by the render task.
    ///
    /// # Errors
    /// - `PreviewError::Render` if the service fails to update the output
    /// - `PreviewError::Dom` if the output cannot be moved back into this
    ///   controller's container
    pub async fn update_content(&mut self, content: &str) -> PreviewResult<bool> {
        if self.handle.is_unloaded() {
            return Ok(false);
        }
        if self.handle.status() != HandleStatus::Ready {
            self.handle.request_content(content);
            return Ok(false);
        }
        if self.handle.content().as_deref() == Some(content) {
            return Ok(false);
        }

        if let Some(container) = self.container.upgrade().filter(Element::is_connected) {
            if !self.handle.is_bound_to(&container) {
                self.ctx.migrator.migrate(&self.handle, &container)?;
            }
        }
        let changed = self
            .handle
            .set(content)
            .await
            .map_err(|source| PreviewError::render(self.handle.entity_id().clone(), source))?;
        self.ctx.overlay.refresh(&self.handle, &self.search_query);
        Ok(changed)
    }

    /// Change the search query; returns the number of marks applied
    pub fn set_search_query(&mut self, query: &str) -> usize {
        if self.search_query == query {
            return 0;
        }
        self.search_query = query.to_string();
        if self.handle.status() == HandleStatus::Ready {
            self.ctx.overlay.refresh(&self.handle, query)
        } else {
            self.handle.set_search_query(query);
            0
        }
    }

    /// Host mounted a (possibly new) container for this card
    ///
    /// # Errors
    /// - `PreviewError::Dom` if the output cannot be moved into `container`
    pub fn container_attached(&mut self, container: &Element) -> PreviewResult<MigrationOutcome> {
        self.container = container.downgrade();
        self.handle.move_consumer(self.consumer, container);
        let outcome = self.ctx.migrator.migrate(&self.handle, container)?;
        if self.handle.status() == HandleStatus::Ready {
            self.ctx.overlay.refresh(&self.handle, &self.search_query);
        }
        Ok(outcome)
    }

    /// Host measured this card's container
    pub fn container_resized(&self, size: Size) {
        if let Some(container) = self.container.upgrade() {
            if self.handle.is_bound_to(&container) {
                self.handle.observe_size(size);
            }
        }
    }

    /// Card unmounted
    ///
    /// Resolves this card's completion at once. A pending render task is not
    /// cancelled; it still fills the cache for the next mount.
    pub fn detach(&mut self) {
        self.completion.resolve();
        self.handle.remove_consumer(self.consumer);
        if let Some(container) = self.container.upgrade() {
            if self.handle.is_bound_to(&container) {
                self.handle.set_attach_state(AttachState::Unattached);
            }
        }
    }

    /// Resolves when the render settles or the card detaches
    #[must_use]
    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    /// Wait for [`PreviewController::completion`]
    pub async fn settled(&self) {
        self.completion.wait().await;
    }

    /// Queue handle of the render this controller submitted, if any
    pub fn take_task(&mut self) -> Option<TaskHandle> {
        self.task.take()
    }

    /// Cached handle backing this card
    #[inline]
    #[must_use]
    pub fn handle(&self) -> &RenderedHandle {
        &self.handle
    }

    /// Entity shown by this card
    #[inline]
    #[must_use]
    pub fn entity_id(&self) -> &EntityId {
        self.handle.entity_id()
    }

    /// True if the mount found an existing handle
    #[inline]
    #[must_use]
    pub fn was_cache_hit(&self) -> bool {
        self.cache_hit
    }

    /// Query this card last asked for
    #[inline]
    #[must_use]
    pub fn search_query(&self) -> &str {
        &self.search_query
    }
}

impl Drop for PreviewController {
    fn drop(&mut self) {
        self.completion.resolve();
        self.handle.remove_consumer(self.consumer);
    }
}

impl std::fmt::Debug for PreviewController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewController")
            .field("handle", &self.handle)
            .field("cache_hit", &self.cache_hit)
            .field("settled", &self.completion.is_resolved())
            .finish_non_exhaustive()
    }
}

fn skip_reason(ctx: &PreviewContext, handle: &RenderedHandle, need_container: bool) -> Option<&'static str> {
    if !ctx.view.is_loaded() {
        Some("view unloaded")
    } else if handle.is_unloaded() {
        Some("handle unloaded")
    } else if need_container && handle.adopt_live_container().is_none() {
        Some("container gone")
    } else {
        None
    }
}

/// Drop a reservation so the next request renders again
fn abandon(ctx: &PreviewContext, handle: &RenderedHandle) {
    ctx.view.cache().remove_if_same(handle);
    ctx.view.release(handle);
    handle.unload();
}

fn cancel_render(ctx: PreviewContext, handle: RenderedHandle) -> impl FnOnce() + Send + 'static {
    move || {
        tracing::debug!(entity = %handle.entity_id(), "render task cancelled before start");
        abandon(&ctx, &handle);
    }
}

async fn run_render(ctx: PreviewContext, handle: RenderedHandle) -> PreviewResult<()> {
    let entity = handle.entity_id().clone();

    if let Some(reason) = skip_reason(&ctx, &handle, true) {
        tracing::debug!(entity = %entity, reason, "skipping stale render task");
        abandon(&ctx, &handle);
        return Ok(());
    }

    let root = match handle.render_output().await {
        Ok(root) => root,
        Err(source) => {
            abandon(&ctx, &handle);
            return Err(PreviewError::render(entity, source));
        }
    };

    if let Some(reason) = skip_reason(&ctx, &handle, false) {
        tracing::debug!(entity = %entity, reason, "discarding render output");
        abandon(&ctx, &handle);
        return Ok(());
    }

    // attach into whichever container a card shows it in now
    if let Some(container) = handle.adopt_live_container() {
        let attached = root.parent().is_some_and(|parent| parent.ptr_eq(&container));
        if !attached {
            if let Err(error) = container.append(&root) {
                abandon(&ctx, &handle);
                return Err(error.into());
            }
        }
    }

    // content may have changed while the service was busy
    loop {
        let requested = handle.requested_content();
        match handle.set(&requested).await {
            Ok(true) => continue,
            Ok(false) => break,
            Err(source) => {
                abandon(&ctx, &handle);
                return Err(PreviewError::render(entity, source));
            }
        }
    }

    handle.set_status(HandleStatus::Ready);
    let marks = ctx.overlay.refresh(&handle, &handle.search_query());
    handle.resolve_waiters();
    tracing::debug!(entity = %entity, marks, "card rendered");
    Ok(())
}
