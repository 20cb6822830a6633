//! Pattern search tool over a file or a directory tree.
//!
//! Case-sensitive. An empty match set is success with empty matches,
//! never an error.

use std::path::Path;

use cl_domain::cancel::CancelToken;
use cl_domain::tool::ToolSpec;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use walkdir::WalkDir;

use crate::registry::{parse_input, Tool, ToolOutcome};

/// Cancellation is polled once per this many scanned lines.
const CANCEL_CHECK_LINES: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
struct GrepRequest {
    pattern: String,
    path: String,
    #[serde(default)]
    recursive: bool,
}

pub struct GrepTool;

#[async_trait::async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().into(),
            description: "Search a file (or, with recursive=true, a directory tree) for a \
                          case-sensitive regular expression. Single-file matches are \
                          `line:content`; recursive matches are `file:line:content`."
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string", "description": "Regular expression" },
                    "path": { "type": "string", "description": "File or directory to search" },
                    "recursive": { "type": "boolean", "description": "Walk directories recursively" }
                },
                "required": ["pattern", "path"]
            }),
        }
    }

    async fn run(&self, input: Value, cancel: &CancelToken) -> ToolOutcome {
        let req: GrepRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return e,
        };
        if cancel.is_cancelled() {
            return ToolOutcome::error("cancelled");
        }

        let regex = match Regex::new(&req.pattern) {
            Ok(r) => r,
            Err(e) => return ToolOutcome::error(format!("invalid pattern: {e}")),
        };

        let path = Path::new(&req.path);
        let meta = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(_) => return ToolOutcome::error(format!("path not found: {}", req.path)),
        };

        if !req.recursive {
            if meta.is_dir() {
                return ToolOutcome::error(format!(
                    "path is a directory (set recursive to search it): {}",
                    req.path
                ));
            }
            let content = match tokio::fs::read_to_string(path).await {
                Ok(c) => c,
                Err(e) => {
                    return ToolOutcome::error(format!("failed to read '{}': {e}", req.path));
                }
            };
            let mut matches = Vec::new();
            if let Err(out) = scan_lines(&regex, &content, None, cancel, &mut matches) {
                return out;
            }
            return ToolOutcome::success(serde_json::json!({ "matches": matches }));
        }

        // Recursive walk; the blocking traversal runs off the async runtime.
        let cancel = cancel.clone();
        let root = req.path.clone();
        let scan = tokio::task::spawn_blocking(move || walk_and_scan(&regex, &root, &cancel));
        match scan.await {
            Ok(Ok(matches)) => ToolOutcome::success(serde_json::json!({ "matches": matches })),
            Ok(Err(out)) => out,
            Err(e) => ToolOutcome::error(format!("search failed: {e}")),
        }
    }
}

/// Collect `line:content` (or `file:line:content` when `file` is given)
/// matches from one file's content.
fn scan_lines(
    regex: &Regex,
    content: &str,
    file: Option<&str>,
    cancel: &CancelToken,
    matches: &mut Vec<String>,
) -> Result<(), ToolOutcome> {
    for (idx, line) in content.lines().enumerate() {
        if idx % CANCEL_CHECK_LINES == 0 && cancel.is_cancelled() {
            return Err(ToolOutcome::error("cancelled"));
        }
        if regex.is_match(line) {
            match file {
                Some(f) => matches.push(format!("{f}:{}:{line}", idx + 1)),
                None => matches.push(format!("{}:{line}", idx + 1)),
            }
        }
    }
    Ok(())
}

fn walk_and_scan(
    regex: &Regex,
    root: &str,
    cancel: &CancelToken,
) -> Result<Vec<String>, ToolOutcome> {
    let mut matches = Vec::new();

    for (seen, entry) in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .enumerate()
    {
        if seen % 64 == 0 && cancel.is_cancelled() {
            return Err(ToolOutcome::error("cancelled"));
        }
        if !entry.file_type().is_file() {
            continue;
        }
        // Unreadable or non-UTF-8 (binary) files are skipped, not fatal.
        let content = match std::fs::read_to_string(entry.path()) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(path = %entry.path().display(), error = %e, "skipping file");
                continue;
            }
        };
        let file = entry.path().to_string_lossy();
        scan_lines(regex, &content, Some(file.as_ref()), cancel, &mut matches)?;
    }

    Ok(matches)
}
