//! Board DOM - in-memory visual tree
//!
//! A small stand-in for the host UI's element tree, with just enough surface
//! for the preview cache to work against:
//! - Reparenting with stable identity (moving never copies)
//! - Weak container references that dangle when the host drops a container
//! - Inline sizing and host-reported layout boxes
//! - Deep cloning for static snapshots
//! - Highlight marks and the [`Highlighter`] seam
//!
//! # Example
//!
//! ```rust
//! use board_dom::{Element, Highlighter, RegexHighlighter};
//!
//! let card = Element::new("div");
//! let body = Element::with_text("p", "Ship the release notes");
//! card.append(&body).unwrap();
//!
//! let marks = RegexHighlighter::new().mark(&card, "release");
//! assert_eq!(marks, 1);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod element;
pub mod error;
pub mod geometry;
pub mod highlight;

pub use element::{Element, ElementId, WeakElement};
pub use error::DomError;
pub use geometry::Size;
pub use highlight::{Highlighter, RegexHighlighter};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
