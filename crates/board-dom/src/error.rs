//! Error types for tree mutations

use crate::element::ElementId;

/// Errors raised by structural tree operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// Appending would make an element its own ancestor
    #[error("cannot append {child} under {parent}: would create a cycle")]
    HierarchyCycle {
        /// Element receiving the child
        parent: ElementId,
        /// Element being appended
        child: ElementId,
    },

    /// Operation on an element the host has removed
    #[error("element {0} has been removed")]
    Removed(ElementId),
}
