//! Board preview tooling
//!
//! Library side of the `board-preview` binary:
//! - [`simulator`]: randomised mount/unmount/drag/edit workload with invariant checks
//! - [`render`]: render a markdown file through the preview pipeline

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod render;
pub mod simulator;

pub use render::{render_file, RenderOptions};
pub use simulator::{run_simulator, SimulatorConfig, SimulatorReport, SimulatorStats, Violation};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
