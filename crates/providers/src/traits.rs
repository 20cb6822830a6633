use cl_domain::error::Result;
use cl_domain::history::HistoryEntry;
use cl_domain::stream::{BoxStream, StreamEvent};
use cl_domain::tool::ToolSpec;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic streaming chat request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// The session history to send, oldest first.
    pub history: Vec<HistoryEntry>,
    /// Tool specs the model may invoke.
    pub tools: Vec<ToolSpec>,
    /// System prompt prefixed to the request. Empty string means none.
    pub system: String,
    /// Model identifier.
    pub model: String,
    /// Maximum tokens in the response.
    pub max_tokens: u32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The abstract streaming iterator the agent loop consumes.
///
/// Implementations translate between the session history and the wire
/// format of a concrete LLM API, and yield block events in the shape of
/// [`StreamEvent`]. The loop never sees a provider's raw protocol.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Open a streaming chat request and return its event stream.
    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
