//! Testing utilities for the board preview workspace
//!
//! Shared test helpers: a scriptable rendering service, an error sink that
//! keeps what it receives, and board fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use board_dom::{Element, RegexHighlighter, Size};
use board_render::{
    ErrorSink, PreviewConfig, PreviewContext, PreviewError, PreviewSession, RenderError,
    RenderService,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Rendering service that records calls and can be delayed, gated or failed
///
/// Output is `div.markdown-preview-view > p` holding the content verbatim.
#[derive(Debug)]
pub struct MockRenderService {
    renders: AtomicUsize,
    updates: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    delay: Option<Duration>,
    gate: watch::Sender<bool>,
    failing: Mutex<Vec<String>>,
    log: Mutex<Vec<String>>,
}

impl MockRenderService {
    pub fn new() -> Self {
        let (gate, _rx) = watch::channel(true);
        Self {
            renders: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            delay: None,
            gate,
            failing: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Every call sleeps for `delay` first
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Calls block until [`MockRenderService::open_gate`]
    pub fn gated(self) -> Self {
        self.gate.send_replace(false);
        self
    }

    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    pub fn close_gate(&self) {
        self.gate.send_replace(false);
    }

    /// Fail any call whose content contains `needle`
    pub fn fail_when_contains(&self, needle: &str) {
        self.failing.lock().push(needle.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn render_calls(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.render_calls() + self.update_calls()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Content of every call, in the order calls started
    pub fn rendered(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    async fn produce(&self, content: &str) -> Result<Element, RenderError> {
        self.log.lock().push(content.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failing = self
            .failing
            .lock()
            .iter()
            .any(|needle| content.contains(needle.as_str()));
        if failing {
            return Err(RenderError::service(format!("scripted failure for {content:?}")));
        }

        let root = Element::new("div");
        root.set_attr("class", "markdown-preview-view");
        root.append(&Element::with_text("p", content))?;
        Ok(root)
    }
}

impl Default for MockRenderService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RenderService for MockRenderService {
    async fn render(&self, content: &str) -> Result<Element, RenderError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.produce(content).await
    }

    async fn update(&self, root: &Element, content: &str) -> Result<(), RenderError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let fresh = self.produce(content).await?;
        root.replace_children(fresh.take_children())?;
        Ok(())
    }
}

/// Error sink that keeps every report
#[derive(Debug, Default)]
pub struct CollectingSink {
    errors: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, error: &PreviewError) {
        self.errors.lock().push(error.to_string());
    }
}

/// Session, view context and collaborators wired for a test
pub struct Harness {
    pub session: PreviewSession,
    pub ctx: PreviewContext,
    pub service: Arc<MockRenderService>,
    pub sink: Arc<CollectingSink>,
}

impl Harness {
    pub fn new(service: MockRenderService) -> Self {
        Self::with_config(service, PreviewConfig::default())
    }

    pub fn with_config(service: MockRenderService, config: PreviewConfig) -> Self {
        let service = Arc::new(service);
        let sink = Arc::new(CollectingSink::new());
        let session = PreviewSession::new(
            config,
            service.clone(),
            Arc::new(RegexHighlighter::new()),
            sink.clone(),
        )
        .unwrap();
        let ctx = session.open_view("boards/test.md");
        Self {
            session,
            ctx,
            service,
            sink,
        }
    }
}

/// Card container with a host layout size
pub fn container(width: f32, height: f32) -> Element {
    let el = Element::new("div");
    el.set_attr("class", "kanban-card");
    el.set_layout_size(Size::new(width, height));
    el
}

/// Board root with `lanes` lane elements
pub fn board(lanes: usize) -> (Element, Vec<Element>) {
    let root = Element::new("div");
    root.set_attr("class", "kanban-board");
    let lanes: Vec<Element> = (0..lanes)
        .map(|_| {
            let lane = Element::new("div");
            lane.set_attr("class", "kanban-lane");
            lane
        })
        .collect();
    for lane in &lanes {
        root.append(lane).unwrap();
    }
    (root, lanes)
}

/// Container mounted inside `lane`
pub fn card_in(lane: &Element, width: f32, height: f32) -> Element {
    let el = container(width, height);
    lane.append(&el).unwrap();
    el
}
