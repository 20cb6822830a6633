//! Read tool: file contents, optionally restricted to a 1-indexed
//! inclusive line range.

use cl_domain::cancel::CancelToken;
use cl_domain::tool::ToolSpec;
use serde::Deserialize;
use serde_json::Value;
use tokio::fs;

use crate::registry::{parse_input, Tool, ToolOutcome};

#[derive(Debug, Clone, Deserialize)]
struct ReadRequest {
    path: String,
    #[serde(default)]
    start_line: Option<usize>,
    #[serde(default)]
    end_line: Option<usize>,
}

pub struct ReadTool;

#[async_trait::async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &'static str {
        "read"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().into(),
            description: "Read a file, optionally restricted to a 1-indexed inclusive \
                          line range. Omitting the range returns the whole file."
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File to read" },
                    "start_line": { "type": "integer", "description": "First line, 1-indexed" },
                    "end_line": { "type": "integer", "description": "Last line, inclusive" }
                },
                "required": ["path"]
            }),
        }
    }

    async fn run(&self, input: Value, cancel: &CancelToken) -> ToolOutcome {
        let req: ReadRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return e,
        };
        if cancel.is_cancelled() {
            return ToolOutcome::error("cancelled");
        }

        let path = std::path::Path::new(&req.path);
        match fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => {
                return ToolOutcome::error(format!("path is a directory: {}", req.path));
            }
            Ok(_) => {}
            Err(_) => {
                return ToolOutcome::error(format!("file not found: {}", req.path));
            }
        }

        let raw = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => return ToolOutcome::error(format!("failed to read '{}': {e}", req.path)),
        };

        // No range: the raw bytes round-trip unchanged.
        if req.start_line.is_none() && req.end_line.is_none() {
            return ToolOutcome::success(serde_json::json!({ "content": raw }));
        }

        let lines: Vec<&str> = raw.lines().collect();
        let total = lines.len();

        let start = req.start_line.unwrap_or(1);
        if start < 1 {
            return ToolOutcome::error("start_line must be at least 1");
        }
        if let Some(end) = req.end_line {
            if start > end {
                return ToolOutcome::error(format!(
                    "start_line {start} is greater than end_line {end}"
                ));
            }
        }
        // An explicit start past EOF is an error; an end past EOF reads to EOF.
        if req.start_line.is_some() && start > total {
            return ToolOutcome::error(format!(
                "start_line {start} exceeds file length ({total} lines)"
            ));
        }

        let end = req.end_line.unwrap_or(total).min(total);
        let selected = if start > end {
            String::new()
        } else {
            lines[start - 1..end].join("\n")
        };

        ToolOutcome::success(serde_json::json!({ "content": selected }))
    }
}
