//! Board Render - preview cache and scheduling for board cards
//!
//! Virtualized boards mount and unmount cards constantly. This crate keeps
//! each card's rendered output alive across those cycles:
//! - [`RenderCache`] keyed by entity, one handle per entity
//! - [`RenderQueue`] with a fixed concurrency ceiling and priority-then-FIFO order
//! - [`Migrator`] moving cached output into new containers without re-rendering
//! - [`HighlightOverlay`] keeping search marks in sync with content and location
//! - [`PreviewController`] tying those together for one mounted card
//!
//! # Example
//!
//! ```rust,no_run
//! use board_dom::Element;
//! use board_render::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), PreviewError> {
//! let session = PreviewSession::with_defaults(Arc::new(MarkdownService::new()));
//! let ctx = session.open_view("boards/sprint.md");
//!
//! let container = Element::new("div");
//! let card = PreviewController::mount(
//!     &ctx,
//!     &container,
//!     MountRequest::new("card-1", "- [ ] write notes").with_priority(1),
//! )
//! .await?;
//! card.settled().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cache;
pub mod completion;
pub mod config;
pub mod controller;
pub mod error;
pub mod handle;
pub mod migrator;
pub mod overlay;
pub mod queue;
pub mod service;
pub mod session;
pub mod sink;
pub mod snapshot;
pub mod types;
pub mod view;

pub use cache::{CacheStats, RenderCache};
pub use completion::Completion;
pub use config::PreviewConfig;
pub use controller::{MountRequest, PreviewContext, PreviewController};
pub use error::{ConfigError, PreviewError, PreviewResult, RenderError};
pub use handle::{RenderedHandle, RenderedSurface};
pub use migrator::{MigrationOutcome, Migrator};
pub use overlay::HighlightOverlay;
pub use queue::{CancelHook, QueueStats, RenderAction, RenderQueue, TaskHandle, TaskOutcome};
pub use service::{MarkdownService, RenderService};
pub use session::PreviewSession;
pub use sink::{ErrorSink, TracingErrorSink};
pub use snapshot::{ClonedPreview, StaticPreview};
pub use types::{AttachState, EntityId, HandleStatus};
pub use view::BoardView;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for mounting previews
    pub use crate::{
        AttachState, BoardView, EntityId, HandleStatus, MarkdownService, MountRequest,
        PreviewConfig, PreviewContext, PreviewController, PreviewError, PreviewSession,
        RenderService, RenderedSurface,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
