//! TUI Widgets
//!
//! Panels of the agent dashboard.

mod activity;
mod progress;
mod services;

pub use activity::render_activity;
pub use progress::{render_progress, step_states, StepState};
pub use services::render_services;
