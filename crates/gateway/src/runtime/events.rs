//! Events externalised to SSE subscribers.
//!
//! These are the only payloads clients ever see. Block payloads are
//! always complete: deltas never leave the runtime.

use serde::Serialize;
use serde_json::Value;

/// One externalised agent event. The broker stamps a `timestamp` field
/// (integer seconds since epoch) onto the serialised form at publish.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Echoed when a prompt is accepted.
    User { content: String },
    /// A complete assistant text block.
    Text { content: String },
    /// A complete reasoning block.
    Reasoning { content: String },
    /// The model is invoking a tool; `input` is fully parsed.
    ToolCall {
        id: String,
        name: String,
        input: Value,
    },
    /// A tool finished; `result` is the JSON-encoded envelope.
    ToolResult {
        id: String,
        result: String,
        #[serde(rename = "isError")]
        is_error: bool,
    },
    /// Loop state transitions.
    Status {
        state: StatusState,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    Idle,
    Thinking,
    RunningTool,
    Error,
}

impl AgentEvent {
    pub fn status(state: StatusState) -> Self {
        AgentEvent::Status {
            state,
            message: None,
        }
    }

    pub fn status_message(state: StatusState, message: impl Into<String>) -> Self {
        AgentEvent::Status {
            state,
            message: Some(message.into()),
        }
    }
}
