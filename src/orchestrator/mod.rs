//! Application-level orchestration.
//!
//! `handle` owns the run slot (start/stop/shutdown) and exposes state to
//! presentation layers; `controller` turns UI commands into orchestrator calls so
//! the UI thread never touches the runtime directly.

#[cfg(feature = "tui")]
mod controller;
mod handle;

#[cfg(feature = "tui")]
pub(crate) use controller::{run_controller, UiCommand};
pub use handle::Orchestrator;
