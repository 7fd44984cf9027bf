//! Process-level owner of the render queue and collaborators
//!
//! A [`PreviewSession`] is created once and shared by every open board view.
//! It owns the single [`RenderQueue`] so the concurrency ceiling applies
//! across all views, and hands out a [`PreviewContext`] per view.

use crate::config::PreviewConfig;
use crate::controller::PreviewContext;
use crate::error::PreviewResult;
use crate::migrator::Migrator;
use crate::overlay::HighlightOverlay;
use crate::queue::RenderQueue;
use crate::service::RenderService;
use crate::sink::{ErrorSink, TracingErrorSink};
use crate::view::BoardView;
use board_dom::{Highlighter, RegexHighlighter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared queue, service, highlighter and error sink
pub struct PreviewSession {
    config: PreviewConfig,
    queue: RenderQueue,
    service: Arc<dyn RenderService>,
    overlay: HighlightOverlay,
    sink: Arc<dyn ErrorSink>,
}

impl PreviewSession {
    /// Create session from explicit parts
    ///
    /// # Errors
    /// - `PreviewError::Config` if `config` fails validation
    pub fn new(
        config: PreviewConfig,
        service: Arc<dyn RenderService>,
        highlighter: Arc<dyn Highlighter>,
        sink: Arc<dyn ErrorSink>,
    ) -> PreviewResult<Self> {
        config.validate()?;
        Ok(Self::assemble(config, service, highlighter, sink))
    }

    /// Session with default config, regex highlighting and tracing sink
    #[must_use]
    pub fn with_defaults(service: Arc<dyn RenderService>) -> Self {
        Self::assemble(
            PreviewConfig::default(),
            service,
            Arc::new(RegexHighlighter::new()),
            Arc::new(TracingErrorSink),
        )
    }

    /// Session configured from a TOML file, otherwise defaults
    ///
    /// # Errors
    /// - `PreviewError::Config` if the file cannot be read, parsed or validated
    pub fn from_config_file(
        path: impl AsRef<Path>,
        service: Arc<dyn RenderService>,
    ) -> PreviewResult<Self> {
        let config = PreviewConfig::from_file(path)?;
        Self::new(
            config,
            service,
            Arc::new(RegexHighlighter::new()),
            Arc::new(TracingErrorSink),
        )
    }

    fn assemble(
        config: PreviewConfig,
        service: Arc<dyn RenderService>,
        highlighter: Arc<dyn Highlighter>,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        let queue = RenderQueue::with_config(&config, Arc::clone(&sink));
        tracing::info!(
            concurrency = config.concurrency,
            settle_delay_ms = config.settle_delay_ms,
            "preview session started"
        );
        Self {
            config,
            queue,
            service,
            overlay: HighlightOverlay::new(highlighter),
            sink,
        }
    }

    /// Open a fresh view for a board file
    #[must_use]
    pub fn open_view(&self, file_path: impl Into<PathBuf>) -> PreviewContext {
        self.context_for(Arc::new(BoardView::new(file_path)))
    }

    /// Context binding an existing view to this session
    #[must_use]
    pub fn context_for(&self, view: Arc<BoardView>) -> PreviewContext {
        tracing::debug!(file = %view.file_path().display(), "board view attached");
        PreviewContext {
            view,
            queue: self.queue.clone(),
            service: Arc::clone(&self.service),
            overlay: self.overlay.clone(),
            migrator: Migrator::new(self.config.settle_delay()),
            sink: Arc::clone(&self.sink),
            default_priority: self.config.default_priority,
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Shared render queue
    #[inline]
    #[must_use]
    pub fn queue(&self) -> &RenderQueue {
        &self.queue
    }

    /// Error sink used by every view
    #[inline]
    #[must_use]
    pub fn sink(&self) -> &Arc<dyn ErrorSink> {
        &self.sink
    }

    /// Stop the queue, dropping work that has not started
    pub fn shutdown(&self) {
        self.queue.shutdown();
        tracing::info!(stats = ?self.queue.stats(), "preview session shut down");
    }
}

impl std::fmt::Debug for PreviewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewSession")
            .field("config", &self.config)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
