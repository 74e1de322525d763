//! Workflow state machine and its controller.
//!
//! `state` holds the stage data and pure transitions; `controller` issues the external calls
//! and owns the command loop. UI/CLI layers only go through this module.

mod controller;
mod state;

#[cfg(feature = "tui")]
pub(crate) use controller::{run_controller, UiCommand};
pub use controller::WorkflowController;
pub use state::WorkflowState;
