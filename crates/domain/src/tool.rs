//! Tool metadata advertised to the model.

use serde::{Deserialize, Serialize};

/// What a tool tells the model about itself: a stable name, a
/// human-readable description, and a JSON Schema for its input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's input object.
    pub input_schema: serde_json::Value,
}
