//! The agent runtime: prompt orchestration, streaming accumulation, and
//! session state.

pub mod accumulator;
pub mod agent;
pub mod events;
pub mod session;

pub use agent::AgentRuntime;
pub use events::{AgentEvent, StatusState};
pub use session::Session;
