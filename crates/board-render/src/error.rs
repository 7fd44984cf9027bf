//! Error types for the preview layer
//!
//! Nothing in this crate is fatal to the process:
//! - Rendering-service failures abort one task and are retried by the next request
//! - Stale containers are skipped silently, not reported
//! - Task failures and panics are isolated per task

use crate::types::EntityId;
use board_dom::DomError;
use std::path::PathBuf;

/// Failure reported by a rendering service
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    /// The service could not produce output
    #[error("render service failed: {0}")]
    Service(String),

    /// Produced output could not be placed in the tree
    #[error("tree error: {0}")]
    Dom(#[from] DomError),
}

impl RenderError {
    /// Create service error
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service(message.into())
    }
}

/// Errors while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error during file read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Queue must admit at least one task
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Main preview error type
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    /// Rendering failed for a cached entity
    #[error("render failed for {entity}: {source}")]
    Render {
        /// Entity being rendered
        entity: EntityId,
        /// Service failure
        #[source]
        source: RenderError,
    },

    /// Uncached render failed
    #[error("static render failed: {0}")]
    Static(#[source] RenderError),

    /// A queued task panicked
    #[error("render task '{0}' panicked")]
    TaskPanicked(String),

    /// Tree mutation failed
    #[error("tree error: {0}")]
    Dom(#[from] DomError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PreviewError {
    /// Create render error for entity
    pub fn render(entity: EntityId, source: RenderError) -> Self {
        Self::Render { entity, source }
    }
}

/// Result type alias for preview operations
pub type PreviewResult<T> = Result<T, PreviewError>;
