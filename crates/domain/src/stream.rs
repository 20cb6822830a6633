//! Provider-agnostic streaming events.
//!
//! Every adapter translates its wire protocol into this small alphabet.
//! Blocks are keyed by index and may interleave; consumers must key their
//! accumulation state on the index, not on arrival order.

use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for LLM streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events yielded by an LLM streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The response message has opened.
    MessageStart,
    /// A content block opened at `index`.
    BlockStart { index: usize, kind: BlockKind },
    /// An incremental fragment of the block at `index`. Text and reasoning
    /// fragments are literal text; tool-use fragments are partial JSON.
    Delta { index: usize, fragment: String },
    /// The block at `index` is complete and may be externalised.
    BlockStop { index: usize },
    /// The response message has closed.
    MessageStop,
    /// The provider reported an in-stream error.
    Error { message: String },
}

/// The kind of a content block, announced at block start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    Reasoning,
    ToolUse { id: String, name: String },
}
