//! Randomised board workload
//!
//! Drives a preview session the way a scrolling, dragging and editing user
//! would, then checks after the queue goes idle:
//! 1. No entity rendered more often than the cache missed
//! 2. The render service never saw more calls in flight than the ceiling
//! 3. Every mounted card shows its latest content, inside its own container

use async_trait::async_trait;
use board_dom::{Element, RegexHighlighter, Size};
use board_render::{
    EntityId, HandleStatus, MarkdownService, MountRequest, PreviewConfig, PreviewContext,
    PreviewController, PreviewSession, QueueStats, RenderError, RenderService, TracingErrorSink,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const QUERIES: [&str; 5] = ["", "card", "revision", "1", "card 2"];

/// Simulator configuration
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Distinct cards on the board
    pub cards: usize,
    /// Lanes cards are spread over
    pub lanes: usize,
    /// Random operations to perform
    pub operations: u64,
    /// Render queue ceiling
    pub concurrency: usize,
    /// Simulated service latency; zero only yields
    pub render_delay_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            cards: 200,
            lanes: 4,
            operations: 5_000,
            concurrency: 50,
            render_delay_ms: 0,
        }
    }
}

/// Invariant broken during a run
#[derive(Debug, Clone, Serialize)]
pub enum Violation {
    /// More renders than cache misses
    ExcessRenders {
        /// Service `render` calls
        renders: u64,
        /// Mounts that missed the cache
        misses: u64,
    },
    /// Service saw more concurrent calls than allowed
    CeilingExceeded {
        /// Highest number of renders in flight
        peak: usize,
        /// Configured queue ceiling
        limit: usize,
    },
    /// Mounted card shows something other than its latest content
    StaleContent {
        /// Card entity
        entity: EntityId,
        /// Text of the latest revision
        expected: String,
        /// Text found in the container
        shown: String,
    },
    /// Ready output is not inside the card's container
    OutputMisplaced {
        /// Card entity
        entity: EntityId,
    },
}

/// Counters collected during a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulatorStats {
    /// Cards mounted
    pub mounts: u64,
    /// Mounts that found a cached handle
    pub cache_hits: u64,
    /// Mounts that submitted a render
    pub cache_misses: u64,
    /// Cards unmounted
    pub unmounts: u64,
    /// Cards moved to another lane
    pub drags: u64,
    /// Content edits
    pub edits: u64,
    /// Container resizes
    pub resizes: u64,
    /// Search query changes
    pub searches: u64,
    /// Service `render` calls
    pub renders: u64,
    /// Service `update` calls
    pub updates: u64,
    /// Highest number of renders in flight
    pub peak_in_flight: usize,
    /// Tasks accepted by the queue
    pub queue_submitted: u64,
    /// Tasks that completed
    pub queue_completed: u64,
    /// Tasks that failed
    pub queue_failed: u64,
    /// Tasks dropped before starting
    pub queue_cancelled: u64,
}

impl SimulatorStats {
    fn absorb_queue(&mut self, queue: QueueStats) {
        self.queue_submitted = queue.submitted;
        self.queue_completed = queue.completed;
        self.queue_failed = queue.failed;
        self.queue_cancelled = queue.cancelled;
    }
}

/// Final report from the simulator
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorReport {
    /// Configuration used
    pub config: SimulatorConfig,
    /// Collected counters
    pub stats: SimulatorStats,
    /// Broken invariants; empty on success
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// True if no invariant was broken
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Human-readable summary
    #[must_use]
    pub fn generate_text(&self) -> String {
        let s = &self.stats;
        let mut report = String::new();
        report.push_str("=== Board Preview Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Cards: {} across {} lanes\n", self.config.cards, self.config.lanes));
        report.push_str(&format!("Mounts: {} ({} hits, {} misses)\n", s.mounts, s.cache_hits, s.cache_misses));
        report.push_str(&format!("Unmounts: {}\n", s.unmounts));
        report.push_str(&format!("Drags: {}\n", s.drags));
        report.push_str(&format!("Edits: {}\n", s.edits));
        report.push_str(&format!("Resizes: {}\n", s.resizes));
        report.push_str(&format!("Searches: {}\n", s.searches));
        report.push_str(&format!("Service renders: {}\n", s.renders));
        report.push_str(&format!("Service updates: {}\n", s.updates));
        report.push_str(&format!(
            "Peak in flight: {} (limit {})\n",
            s.peak_in_flight, self.config.concurrency
        ));
        report.push_str(&format!(
            "Queue: {} submitted, {} completed, {} failed, {} cancelled\n",
            s.queue_submitted, s.queue_completed, s.queue_failed, s.queue_cancelled
        ));
        report.push_str(&format!("Violations: {}\n", self.violations.len()));

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));
        report
    }
}

/// Markdown service that counts calls and simulates latency
#[derive(Debug)]
struct CountingService {
    inner: MarkdownService,
    delay: Duration,
    renders: AtomicU64,
    updates: AtomicU64,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingService {
    fn new(delay: Duration) -> Self {
        Self {
            inner: MarkdownService::new(),
            delay,
            renders: AtomicU64::new(0),
            updates: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    async fn produce(&self, content: &str) -> Result<Element, RenderError> {
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.to_tree(content)
    }
}

#[async_trait]
impl RenderService for CountingService {
    // in-place updates bypass the queue, so only renders count towards the peak
    async fn render(&self, content: &str) -> Result<Element, RenderError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = self.produce(content).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn update(&self, root: &Element, content: &str) -> Result<(), RenderError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let fresh = self.produce(content).await?;
        root.replace_children(fresh.take_children())?;
        Ok(())
    }
}

struct Mounted {
    controller: PreviewController,
    container: Element,
}

struct Card {
    id: EntityId,
    revision: u32,
    mounted: Option<Mounted>,
}

impl Card {
    fn new(index: usize) -> Self {
        Self {
            id: EntityId::new(format!("card-{index}")),
            revision: 0,
            mounted: None,
        }
    }

    fn content(&self) -> String {
        format!("{} revision {}", self.id, self.revision)
    }
}

enum Action {
    Mount,
    Unmount,
    Drag,
    Edit,
    Resize,
    Search,
}

struct Simulation {
    ctx: PreviewContext,
    lanes: Vec<Element>,
    rng: StdRng,
    query: String,
    stats: SimulatorStats,
}

impl Simulation {
    async fn mount(&mut self, card: &mut Card) -> anyhow::Result<()> {
        let lane_index = self.rng.gen_range(0..self.lanes.len());
        let lane = &self.lanes[lane_index];
        let container = Element::new("div");
        container.set_attr("class", "kanban-card");
        container.set_layout_size(Size::new(240.0, self.rng.gen_range(40.0..160.0)));
        lane.append(&container)?;

        let request = MountRequest::new(card.id.clone(), card.content())
            .with_priority(self.rng.gen_range(0..3))
            .with_search_query(self.query.clone());
        let controller = PreviewController::mount(&self.ctx, &container, request).await?;

        self.stats.mounts += 1;
        if controller.was_cache_hit() {
            self.stats.cache_hits += 1;
        } else {
            self.stats.cache_misses += 1;
        }
        card.mounted = Some(Mounted {
            controller,
            container,
        });
        Ok(())
    }

    fn unmount(card: &mut Card) {
        if let Some(mut mounted) = card.mounted.take() {
            mounted.controller.detach();
            mounted.container.remove();
        }
    }

    async fn step(&mut self, cards: &mut [Card]) -> anyhow::Result<()> {
        let index = self.rng.gen_range(0..cards.len());
        let action = if cards[index].mounted.is_none() {
            Action::Mount
        } else {
            match self.rng.gen_range(0..10) {
                0..=2 => Action::Unmount,
                3..=4 => Action::Drag,
                5..=6 => Action::Edit,
                7..=8 => Action::Resize,
                _ => Action::Search,
            }
        };

        match action {
            Action::Mount => self.mount(&mut cards[index]).await?,
            Action::Unmount => {
                Self::unmount(&mut cards[index]);
                self.stats.unmounts += 1;
            }
            Action::Drag => {
                Self::unmount(&mut cards[index]);
                self.mount(&mut cards[index]).await?;
                self.stats.drags += 1;
            }
            Action::Edit => {
                let card = &mut cards[index];
                card.revision += 1;
                let content = card.content();
                if let Some(mounted) = card.mounted.as_mut() {
                    mounted.controller.update_content(&content).await?;
                }
                self.stats.edits += 1;
            }
            Action::Resize => {
                if let Some(mounted) = cards[index].mounted.as_ref() {
                    let height = self.rng.gen_range(40.0..160.0);
                    mounted.container.set_layout_size(Size::new(240.0, height));
                    mounted.controller.container_resized(mounted.container.bounding_box());
                }
                self.stats.resizes += 1;
            }
            Action::Search => {
                self.query = QUERIES[self.rng.gen_range(0..QUERIES.len())].to_string();
                for mounted in cards.iter_mut().filter_map(|c| c.mounted.as_mut()) {
                    mounted.controller.set_search_query(&self.query);
                }
                self.stats.searches += 1;
            }
        }
        Ok(())
    }
}

fn verify(cards: &[Card]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for card in cards {
        let Some(mounted) = card.mounted.as_ref() else {
            continue;
        };
        let handle = mounted.controller.handle();
        if handle.status() != HandleStatus::Ready {
            continue;
        }
        let expected = card.content();
        let shown = mounted.container.text_content();
        if shown != expected {
            violations.push(Violation::StaleContent {
                entity: card.id.clone(),
                expected,
                shown,
            });
        }
        let placed = handle
            .output_root()
            .and_then(|root| root.parent())
            .is_some_and(|parent| parent.ptr_eq(&mounted.container));
        if !placed {
            violations.push(Violation::OutputMisplaced {
                entity: card.id.clone(),
            });
        }
    }
    violations
}

/// Run the board preview simulator
///
/// # Errors
/// Fails if the session cannot be created or a tree operation fails.
pub async fn run_simulator(config: SimulatorConfig) -> anyhow::Result<SimulatorReport> {
    let service = Arc::new(CountingService::new(Duration::from_millis(config.render_delay_ms)));
    let session = PreviewSession::new(
        PreviewConfig::default().with_concurrency(config.concurrency),
        service.clone(),
        Arc::new(RegexHighlighter::new()),
        Arc::new(TracingErrorSink),
    )?;

    let board = Element::new("div");
    board.set_attr("class", "kanban-board");
    let lanes: Vec<Element> = (0..config.lanes.max(1))
        .map(|_| Element::new("div"))
        .collect();
    for lane in &lanes {
        lane.set_attr("class", "kanban-lane");
        board.append(lane)?;
    }

    let mut cards: Vec<Card> = (0..config.cards.max(1)).map(Card::new).collect();
    let mut sim = Simulation {
        ctx: session.open_view("simulated/board.md"),
        lanes,
        rng: StdRng::seed_from_u64(config.seed),
        query: String::new(),
        stats: SimulatorStats::default(),
    };

    for step in 0..config.operations {
        sim.step(&mut cards).await?;
        // let the queue make progress between bursts of user input
        if step % 16 == 0 {
            tokio::task::yield_now().await;
        }
    }
    session.queue().on_idle().await;

    let mut stats = sim.stats;
    stats.renders = service.renders.load(Ordering::SeqCst);
    stats.updates = service.updates.load(Ordering::SeqCst);
    stats.peak_in_flight = service.peak.load(Ordering::SeqCst);
    stats.absorb_queue(session.queue().stats());

    let mut violations = Vec::new();
    if stats.renders > stats.cache_misses {
        violations.push(Violation::ExcessRenders {
            renders: stats.renders,
            misses: stats.cache_misses,
        });
    }
    if stats.peak_in_flight > config.concurrency {
        violations.push(Violation::CeilingExceeded {
            peak: stats.peak_in_flight,
            limit: config.concurrency,
        });
    }
    violations.extend(verify(&cards));

    tracing::info!(
        mounts = stats.mounts,
        renders = stats.renders,
        violations = violations.len(),
        "simulation finished"
    );
    session.shutdown();

    Ok(SimulatorReport {
        config,
        stats,
        violations,
    })
}
