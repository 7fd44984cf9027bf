//! Bounded-concurrency priority render queue
//!
//! Provides ordered, isolated execution of render work:
//! - Highest priority first, FIFO among equal priorities
//! - Fixed ceiling on tasks in flight
//! - Failures and panics reported to the error sink, never stalling the queue
//! - Pause/resume, idle waiting and explicit shutdown
//! - Cancel hooks for work dropped by shutdown before it started
//!
//! The queue is a cheap handle; clones share the same scheduler. Submitting
//! spawns onto the ambient Tokio runtime.

use crate::config::PreviewConfig;
use crate::error::PreviewError;
use crate::sink::ErrorSink;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

/// Unit of render work
pub type RenderAction = BoxFuture<'static, Result<(), PreviewError>>;

/// Cleanup for a task that never started
pub type CancelHook = Box<dyn FnOnce() + Send>;

/// How a submitted task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Action returned `Ok`
    Completed,
    /// Action returned an error or panicked
    Failed,
    /// Dropped by shutdown before it started
    Cancelled,
}

/// Completion handle for a submitted task
#[derive(Debug)]
pub struct TaskHandle {
    label: String,
    rx: oneshot::Receiver<TaskOutcome>,
}

impl TaskHandle {
    /// Label given at submission
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Wait for the task to end
    pub async fn wait(self) -> TaskOutcome {
        self.rx.await.unwrap_or(TaskOutcome::Cancelled)
    }
}

/// Queue statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks accepted
    pub submitted: u64,
    /// Tasks that returned `Ok`
    pub completed: u64,
    /// Tasks that failed or panicked
    pub failed: u64,
    /// Tasks dropped before starting
    pub cancelled: u64,
    /// Highest number of tasks ever in flight at once
    pub peak_running: usize,
}

struct Pending {
    priority: i32,
    seq: u64,
    label: String,
    action: RenderAction,
    on_cancel: Option<CancelHook>,
    done: oneshot::Sender<TaskOutcome>,
}

impl Pending {
    fn cancel(self) {
        if let Some(hook) = self.on_cancel {
            hook();
        }
        let _ = self.done.send(TaskOutcome::Cancelled);
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // max-heap: higher priority wins, then the earlier submission
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<Pending>,
    running: usize,
    paused: bool,
    closed: bool,
    next_seq: u64,
    stats: QueueStats,
}

impl QueueState {
    fn outstanding(&self) -> usize {
        self.heap.len() + self.running
    }
}

struct QueueInner {
    concurrency: usize,
    state: Mutex<QueueState>,
    outstanding: watch::Sender<usize>,
    sink: Arc<dyn ErrorSink>,
}

/// Priority render scheduler
#[derive(Clone)]
pub struct RenderQueue {
    inner: Arc<QueueInner>,
}

impl RenderQueue {
    /// Create queue with a concurrency ceiling (at least 1)
    #[must_use]
    pub fn new(concurrency: usize, sink: Arc<dyn ErrorSink>) -> Self {
        let (outstanding, _rx) = watch::channel(0);
        Self {
            inner: Arc::new(QueueInner {
                concurrency: concurrency.max(1),
                state: Mutex::new(QueueState::default()),
                outstanding,
                sink,
            }),
        }
    }

    /// Create queue from configuration
    #[must_use]
    pub fn with_config(config: &PreviewConfig, sink: Arc<dyn ErrorSink>) -> Self {
        Self::new(config.concurrency, sink)
    }

    /// Submit work
    ///
    /// Starts immediately when a slot is free and nothing of higher priority
    /// is waiting. After [`RenderQueue::shutdown`] the task is dropped and its
    /// handle resolves as `Cancelled`.
    pub fn submit(&self, label: impl Into<String>, priority: i32, action: RenderAction) -> TaskHandle {
        self.enqueue(label.into(), priority, action, None)
    }

    /// Submit work with a hook that runs if the task is dropped unstarted
    ///
    /// The hook runs on [`RenderQueue::shutdown`] for pending tasks, or at
    /// once when submitting to a closed queue. It never runs for a task
    /// that started.
    pub fn submit_cancellable(
        &self,
        label: impl Into<String>,
        priority: i32,
        action: RenderAction,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> TaskHandle {
        self.enqueue(label.into(), priority, action, Some(Box::new(on_cancel)))
    }

    fn enqueue(
        &self,
        label: String,
        priority: i32,
        action: RenderAction,
        on_cancel: Option<CancelHook>,
    ) -> TaskHandle {
        let (done, rx) = oneshot::channel();
        let mut state = self.inner.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let task = Pending {
            priority,
            seq,
            label: label.clone(),
            action,
            on_cancel,
            done,
        };
        if state.closed {
            state.stats.cancelled += 1;
            drop(state);
            tracing::debug!(task = %label, "render queue closed; task dropped");
            task.cancel();
            return TaskHandle { label, rx };
        }
        state.stats.submitted += 1;
        state.heap.push(task);
        self.publish(&state);
        drop(state);
        self.pump();
        TaskHandle { label, rx }
    }

    /// Stop starting new tasks; running tasks continue
    pub fn pause(&self) {
        self.inner.state.lock().paused = true;
    }

    /// Resume starting tasks
    pub fn resume(&self) {
        self.inner.state.lock().paused = false;
        self.pump();
    }

    /// True while paused
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().paused
    }

    /// Drop every pending task and refuse new ones
    ///
    /// Cancel hooks of dropped tasks run before their handles resolve.
    /// Tasks already running are not interrupted.
    pub fn shutdown(&self) {
        let drained: Vec<Pending> = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            let drained: Vec<Pending> = state.heap.drain().collect();
            state.stats.cancelled += drained.len() as u64;
            self.publish(&state);
            drained
        };
        if !drained.is_empty() {
            tracing::warn!(dropped = drained.len(), "render queue shut down with pending tasks");
        }
        for task in drained {
            task.cancel();
        }
    }

    /// True after shutdown
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Wait until nothing is pending or running
    pub async fn on_idle(&self) {
        let mut rx = self.inner.outstanding.subscribe();
        // the sender lives in `self.inner`
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Tasks waiting for a slot
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().heap.len()
    }

    /// Tasks in flight
    #[must_use]
    pub fn running_len(&self) -> usize {
        self.inner.state.lock().running
    }

    /// Concurrency ceiling
    #[inline]
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// Snapshot of queue statistics
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.inner.state.lock().stats
    }

    fn publish(&self, state: &QueueState) {
        self.inner.outstanding.send_replace(state.outstanding());
    }

    fn pump(&self) {
        loop {
            let next = {
                let mut state = self.inner.state.lock();
                if state.paused || state.running >= self.inner.concurrency {
                    return;
                }
                let Some(task) = state.heap.pop() else {
                    return;
                };
                state.running += 1;
                state.stats.peak_running = state.stats.peak_running.max(state.running);
                task
            };
            self.spawn(next);
        }
    }

    fn spawn(&self, task: Pending) {
        let queue = self.clone();
        tokio::spawn(async move {
            let Pending {
                label, action, done, ..
            } = task;
            tracing::trace!(task = %label, "render task started");

            let outcome = match AssertUnwindSafe(action).catch_unwind().await {
                Ok(Ok(())) => TaskOutcome::Completed,
                Ok(Err(error)) => {
                    queue.inner.sink.report(&error);
                    TaskOutcome::Failed
                }
                Err(_) => {
                    queue.inner.sink.report(&PreviewError::TaskPanicked(label.clone()));
                    TaskOutcome::Failed
                }
            };
            queue.finish(outcome);
            let _ = done.send(outcome);
            queue.pump();
        });
    }

    fn finish(&self, outcome: TaskOutcome) {
        let mut state = self.inner.state.lock();
        state.running -= 1;
        match outcome {
            TaskOutcome::Completed => state.stats.completed += 1,
            TaskOutcome::Failed => state.stats.failed += 1,
            TaskOutcome::Cancelled => state.stats.cancelled += 1,
        }
        self.publish(&state);
    }
}

impl std::fmt::Debug for RenderQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RenderQueue")
            .field("concurrency", &self.inner.concurrency)
            .field("pending", &state.heap.len())
            .field("running", &state.running)
            .field("paused", &state.paused)
            .field("closed", &state.closed)
            .finish()
    }
}
