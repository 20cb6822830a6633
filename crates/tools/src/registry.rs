//! Tool trait, result envelope, and the name→tool registry.

use std::collections::HashMap;
use std::sync::Arc;

use cl_domain::cancel::CancelToken;
use cl_domain::tool::ToolSpec;
use serde::de::DeserializeOwned;
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The uniform result of a tool run: a JSON envelope encoded as a compact
/// string plus an error flag. Success envelopes are domain-keyed
/// (`{"content": …}`, `{"matches": …}`); error envelopes are always
/// `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutcome {
    /// Encode a success envelope.
    pub fn success(envelope: Value) -> Self {
        Self {
            content: envelope.to_string(),
            is_error: false,
        }
    }

    /// Encode an error envelope.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: serde_json::json!({ "error": message.into() }).to_string(),
            is_error: true,
        }
    }
}

/// Deserialize a tool's input object, folding failure into the error
/// envelope so malformed input never escapes as an exception.
pub(crate) fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, ToolOutcome> {
    serde_json::from_value(input).map_err(|e| ToolOutcome::error(format!("invalid input: {e}")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An immutable, registered tool.
///
/// `run` receives the model-supplied input and the prompt's cancellation
/// token; implementations check the token on entry, at coarse loop
/// checkpoints, and on every subprocess wait.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Stable name the model calls the tool by.
    fn name(&self) -> &'static str;

    /// Name, description, and JSON Schema advertised to the model.
    fn spec(&self) -> ToolSpec;

    async fn run(&self, input: Value, cancel: &CancelToken) -> ToolOutcome;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Name→tool mapping, populated at startup and read-only afterwards.
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
    /// Registration order, so advertised specs are stable.
    order: Vec<&'static str>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// The full built-in catalogue.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::read::ReadTool));
        registry.register(Arc::new(crate::list_dir::ListDirTool));
        registry.register(Arc::new(crate::grep::GrepTool));
        registry.register(Arc::new(crate::shell::BashTool::default()));
        registry.register(Arc::new(crate::write::WriteTool));
        registry.register(Arc::new(crate::edit::EditTool));
        registry.register(Arc::new(crate::relocate::MoveTool));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        if self.tools.insert(name, tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Specs for every registered tool, in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.spec())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalogue_is_complete() {
        let registry = ToolRegistry::builtin();
        for name in ["read", "list_dir", "grep", "bash", "write", "edit", "move"] {
            assert!(registry.get(name).is_some(), "missing tool {name}");
        }
        assert_eq!(registry.len(), 7);
        assert!(registry.get("delete_everything").is_none());
    }

    #[test]
    fn specs_are_stable_and_schema_bearing() {
        let registry = ToolRegistry::builtin();
        let specs = registry.specs();
        assert_eq!(specs.len(), 7);
        assert_eq!(specs[0].name, "read");
        for spec in &specs {
            assert_eq!(spec.input_schema["type"], "object");
            assert!(!spec.description.is_empty());
        }
    }

    #[test]
    fn outcome_envelopes() {
        let ok = ToolOutcome::success(serde_json::json!({"content": "x"}));
        assert!(!ok.is_error);
        assert_eq!(ok.content, r#"{"content":"x"}"#);

        let err = ToolOutcome::error("boom");
        assert!(err.is_error);
        assert_eq!(err.content, r#"{"error":"boom"}"#);
    }
}
