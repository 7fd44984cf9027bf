//! Process-wide error reporting

use crate::error::PreviewError;

/// Receives errors that have no caller to return to
pub trait ErrorSink: Send + Sync {
    /// Report an error
    fn report(&self, error: &PreviewError);
}

/// Default sink: logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, error: &PreviewError) {
        tracing::error!(error = %error, "error rendering board card");
    }
}
