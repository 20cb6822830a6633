//! Write tool: create or replace a file, or append to one.
//!
//! Overwrite goes through the atomic temp-then-rename path and keeps an
//! existing file's permission bits.

use std::path::Path;

use cl_domain::cancel::CancelToken;
use cl_domain::tool::ToolSpec;
use serde::Deserialize;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::fsops;
use crate::registry::{parse_input, Tool, ToolOutcome};

#[derive(Debug, Clone, Deserialize)]
struct WriteRequest {
    path: String,
    content: String,
    #[serde(default)]
    mode: WriteMode,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum WriteMode {
    #[default]
    Overwrite,
    Append,
}

pub struct WriteTool;

#[async_trait::async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &'static str {
        "write"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().into(),
            description: "Write content to a file. mode 'overwrite' (default) replaces \
                          the file atomically; mode 'append' adds to its end. Missing \
                          parent directories are created."
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Destination file" },
                    "content": { "type": "string", "description": "Content to write" },
                    "mode": { "type": "string", "enum": ["overwrite", "append"] }
                },
                "required": ["path", "content"]
            }),
        }
    }

    async fn run(&self, input: Value, cancel: &CancelToken) -> ToolOutcome {
        let req: WriteRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return e,
        };
        if req.path.trim().is_empty() {
            return ToolOutcome::error("path must not be empty");
        }
        if cancel.is_cancelled() {
            return ToolOutcome::error("cancelled");
        }

        let path = Path::new(&req.path);
        if path.is_dir() {
            return ToolOutcome::error(format!("path is a directory: {}", req.path));
        }

        if let Err(e) = fsops::ensure_parent_dirs(path).await {
            return ToolOutcome::error(format!("failed to create parent directories: {e}"));
        }

        let result = match req.mode {
            WriteMode::Overwrite => {
                let mode = fsops::existing_mode(path).await;
                fsops::atomic_replace(path, req.content.as_bytes(), mode).await
            }
            WriteMode::Append => append(path, req.content.as_bytes()).await,
        };

        if let Err(e) = result {
            return ToolOutcome::error(format!("failed to write '{}': {e}", req.path));
        }

        let absolute = path
            .canonicalize()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| req.path.clone());

        ToolOutcome::success(serde_json::json!({
            "path": absolute,
            "bytes_written": req.content.len(),
        }))
    }
}

async fn append(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(content).await?;
    file.flush().await
}
