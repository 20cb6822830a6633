//! The session message log.
//!
//! An append-only sequence of turns: user text, assistant content blocks,
//! and the tool results that answer an assistant turn's tool-use blocks.
//! Entries are never reordered, edited, or removed during a session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry in the session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum HistoryEntry {
    /// Opaque text submitted by the user.
    User { content: String },
    /// An ordered list of content blocks produced by the model.
    Assistant { blocks: Vec<ContentBlock> },
    /// Tool results answering the immediately preceding assistant turn,
    /// in response order.
    ToolResults { results: Vec<ToolResultBlock> },
}

/// One unit of an assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// Opaque thinking text.
    Reasoning { text: String },
}

/// Answers one tool-use block, keyed by its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    /// JSON-encoded success or error envelope.
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl HistoryEntry {
    /// The tool-use blocks of an assistant turn, in block order.
    /// Empty for every other entry kind.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        match self {
            HistoryEntry::Assistant { blocks } => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse { id, name, input } => {
                        Some((id.as_str(), name.as_str(), input))
                    }
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}
