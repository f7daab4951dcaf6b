//! The payment agent: state machine, activity log, transaction mode and the
//! runtime that executes the machine's effects.

pub mod activity;
pub mod machine;
pub mod mode;
pub mod runtime;
pub mod state;

pub use activity::{ActivityEntry, ActivityKind, ActivityLog, DEFAULT_ACTIVITY_CAPACITY};
pub use machine::{AgentEvent, AgentSession, Effect, SessionSummary, Transition};
pub use mode::{ModeGate, TransactionMode};
pub use runtime::{AgentRuntime, RuntimeSettings};
pub use state::{AgentState, FlowStep};
