//! Core identifiers and state enums

use serde::{Deserialize, Serialize};

/// Stable identity of a card's content for caching purposes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wrap an identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render progress of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleStatus {
    /// Render task submitted, not started
    Queued,
    /// Rendering service is producing output
    Rendering,
    /// Output attached and highlighted
    Ready,
}

impl std::fmt::Display for HandleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Queued => "queued",
            Self::Rendering => "rendering",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Relationship between a handle and its current container
///
/// Driven by explicit events: a container attach moves to `Measuring`, the
/// first non-zero size report moves to `Attached`, a consumer detach moves
/// back to `Unattached`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AttachState {
    /// No consumer container
    #[default]
    Unattached,
    /// Placed in a container whose size is not yet known
    Measuring,
    /// Placed and measured
    Attached,
}
