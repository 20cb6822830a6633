//! Edit tool: line-based mutation of one file.
//!
//! All operations are validated (bounds, kinds, overlaps) before any is
//! applied, so a batch either lands fully or not at all. Application is
//! ordered by descending anchor line so earlier splices cannot shift the
//! line numbers later operations refer to.

use std::path::Path;

use cl_domain::cancel::CancelToken;
use cl_domain::tool::ToolSpec;
use serde::Deserialize;
use serde_json::Value;
use tokio::fs;

use crate::fsops;
use crate::registry::{parse_input, Tool, ToolOutcome};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
struct EditRequest {
    path: String,
    operations: Vec<EditOp>,
}

/// Line numbers are 1-indexed and inclusive. `afterLine = 0` inserts
/// before the first line.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum EditOp {
    #[serde(rename_all = "camelCase")]
    Replace {
        start_line: usize,
        end_line: usize,
        content: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Insert {
        after_line: usize,
        content: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Delete { start_line: usize, end_line: usize },
}

impl EditOp {
    /// The inclusive line range this operation touches; inserts are the
    /// degenerate range at their anchor.
    fn range(&self) -> (usize, usize) {
        match self {
            EditOp::Replace {
                start_line,
                end_line,
                ..
            }
            | EditOp::Delete {
                start_line,
                end_line,
            } => (*start_line, *end_line),
            EditOp::Insert { after_line, .. } => (*after_line, *after_line),
        }
    }

    /// Lines removed plus lines inserted.
    fn lines_changed(&self) -> usize {
        match self {
            EditOp::Replace {
                start_line,
                end_line,
                content,
            } => (end_line - start_line + 1) + content.len(),
            EditOp::Insert { content, .. } => content.len(),
            EditOp::Delete {
                start_line,
                end_line,
            } => end_line - start_line + 1,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Check one operation against the file's line count.
fn validate_op(idx: usize, op: &EditOp, total: usize) -> Result<(), String> {
    match op {
        EditOp::Replace {
            start_line,
            end_line,
            ..
        }
        | EditOp::Delete {
            start_line,
            end_line,
        } => {
            if *start_line < 1 {
                return Err(format!("operation {idx}: startLine must be at least 1"));
            }
            if start_line > end_line {
                return Err(format!(
                    "operation {idx}: startLine {start_line} is greater than endLine {end_line}"
                ));
            }
            if *end_line > total {
                return Err(format!(
                    "operation {idx}: endLine {end_line} exceeds file length ({total} lines)"
                ));
            }
        }
        EditOp::Insert { after_line, .. } => {
            if *after_line > total {
                return Err(format!(
                    "operation {idx}: afterLine {after_line} exceeds file length ({total} lines)"
                ));
            }
        }
    }
    Ok(())
}

/// Two inclusive ranges overlap iff s1 <= e2 and e1 >= s2.
fn overlapping(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0 <= b.1 && a.1 >= b.0
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct EditTool;

#[async_trait::async_trait]
impl Tool for EditTool {
    fn name(&self) -> &'static str {
        "edit"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().into(),
            description: "Apply a batch of line edits (replace, insert, delete) to a \
                          file. Line numbers are 1-indexed and inclusive; afterLine 0 \
                          inserts before the first line. Operations must not touch \
                          overlapping line ranges; the batch applies fully or not at \
                          all."
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File to edit" },
                    "operations": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "kind": { "type": "string", "enum": ["replace", "insert", "delete"] },
                                "startLine": { "type": "integer" },
                                "endLine": { "type": "integer" },
                                "afterLine": { "type": "integer" },
                                "content": { "type": "array", "items": { "type": "string" } }
                            },
                            "required": ["kind"]
                        }
                    }
                },
                "required": ["path", "operations"]
            }),
        }
    }

    async fn run(&self, input: Value, cancel: &CancelToken) -> ToolOutcome {
        let req: EditRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return e,
        };
        if req.operations.is_empty() {
            return ToolOutcome::error("operations must not be empty");
        }
        if cancel.is_cancelled() {
            return ToolOutcome::error("cancelled");
        }

        let path = Path::new(&req.path);
        match fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => {
                return ToolOutcome::error(format!("path is a directory: {}", req.path));
            }
            Ok(_) => {}
            Err(_) => return ToolOutcome::error(format!("file not found: {}", req.path)),
        }

        let raw = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => return ToolOutcome::error(format!("failed to read '{}': {e}", req.path)),
        };

        // Split preserving the trailing-newline property of the original.
        let had_trailing_newline = raw.ends_with('\n');
        let mut lines: Vec<String> = if raw.is_empty() {
            Vec::new()
        } else {
            let mut v: Vec<String> = raw.split('\n').map(str::to_owned).collect();
            if had_trailing_newline {
                v.pop();
            }
            v
        };
        let total = lines.len();

        // ── Validate everything before touching anything ─────────────
        for (idx, op) in req.operations.iter().enumerate() {
            if let Err(msg) = validate_op(idx, op, total) {
                return ToolOutcome::error(msg);
            }
        }
        for i in 0..req.operations.len() {
            for j in (i + 1)..req.operations.len() {
                if overlapping(req.operations[i].range(), req.operations[j].range()) {
                    return ToolOutcome::error(format!(
                        "operations {i} and {j} touch overlapping line ranges"
                    ));
                }
            }
        }

        // ── Apply by descending anchor line ──────────────────────────
        let mut ordered: Vec<&EditOp> = req.operations.iter().collect();
        ordered.sort_by(|a, b| b.range().0.cmp(&a.range().0));

        let mut lines_changed = 0usize;
        for op in ordered {
            lines_changed += op.lines_changed();
            match op {
                EditOp::Replace {
                    start_line,
                    end_line,
                    content,
                } => {
                    lines.splice(start_line - 1..*end_line, content.iter().cloned());
                }
                EditOp::Insert {
                    after_line,
                    content,
                } => {
                    lines.splice(*after_line..*after_line, content.iter().cloned());
                }
                EditOp::Delete {
                    start_line,
                    end_line,
                } => {
                    lines.drain(start_line - 1..*end_line);
                }
            }
        }

        let mut new_content = lines.join("\n");
        if had_trailing_newline && !lines.is_empty() {
            new_content.push('\n');
        }

        let mode = fsops::existing_mode(path).await;
        if let Err(e) = fsops::atomic_replace(path, new_content.as_bytes(), mode).await {
            return ToolOutcome::error(format!("failed to write '{}': {e}", req.path));
        }

        let absolute = path
            .canonicalize()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| req.path.clone());

        ToolOutcome::success(serde_json::json!({
            "path": absolute,
            "lines_changed": lines_changed,
            "total_lines": lines.len(),
        }))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    async fn run(input: Value) -> ToolOutcome {
        EditTool.run(input, &CancelToken::new()).await
    }

    fn file_with(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("subject.txt");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn replace_insert_delete_in_one_batch() {
        let dir = TempDir::new().unwrap();
        let path = file_with(&dir, "l1\nl2\nl3\nl4\nl5\n");

        let out = run(serde_json::json!({
            "path": path,
            "operations": [
                { "kind": "replace", "startLine": 1, "endLine": 1, "content": ["L1a", "L1b"] },
                { "kind": "delete", "startLine": 3, "endLine": 4 },
                { "kind": "insert", "afterLine": 5, "content": ["tail"] }
            ]
        }))
        .await;
        assert!(!out.is_error, "{}", out.content);

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "L1a\nL1b\nl2\nl5\ntail\n"
        );
        let v: Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(v["total_lines"], 5);
        // replace 1+2, delete 2, insert 1
        assert_eq!(v["lines_changed"], 6);
        assert!(Path::new(v["path"].as_str().unwrap()).is_absolute());
    }

    #[tokio::test]
    async fn insert_at_zero_prepends() {
        let dir = TempDir::new().unwrap();
        let path = file_with(&dir, "body\n");

        let out = run(serde_json::json!({
            "path": path,
            "operations": [
                { "kind": "insert", "afterLine": 0, "content": ["header"] }
            ]
        }))
        .await;
        assert!(!out.is_error);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "header\nbody\n");
    }

    #[tokio::test]
    async fn any_invalid_op_rejects_the_whole_batch() {
        let dir = TempDir::new().unwrap();
        let path = file_with(&dir, "a\nb\nc\n");
        let original = std::fs::read_to_string(&path).unwrap();

        let out = run(serde_json::json!({
            "path": path,
            "operations": [
                { "kind": "delete", "startLine": 1, "endLine": 1 },
                { "kind": "replace", "startLine": 2, "endLine": 9, "content": ["x"] }
            ]
        }))
        .await;
        assert!(out.is_error);
        assert!(out.content.contains("exceeds file length"));
        // Nothing was applied.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }

    #[tokio::test]
    async fn overlapping_ranges_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = file_with(&dir, "a\nb\nc\nd\n");

        let out = run(serde_json::json!({
            "path": path,
            "operations": [
                { "kind": "replace", "startLine": 1, "endLine": 3, "content": ["x"] },
                { "kind": "delete", "startLine": 3, "endLine": 4 }
            ]
        }))
        .await;
        assert!(out.is_error);
        assert!(out.content.contains("overlapping"));
    }

    #[tokio::test]
    async fn insert_inside_a_replaced_range_is_an_overlap() {
        let dir = TempDir::new().unwrap();
        let path = file_with(&dir, "a\nb\nc\n");

        let out = run(serde_json::json!({
            "path": path,
            "operations": [
                { "kind": "replace", "startLine": 1, "endLine": 2, "content": ["x"] },
                { "kind": "insert", "afterLine": 2, "content": ["y"] }
            ]
        }))
        .await;
        assert!(out.is_error);
        assert!(out.content.contains("overlapping"));
    }

    #[tokio::test]
    async fn empty_operations_list_is_a_validation_error() {
        let dir = TempDir::new().unwrap();
        let path = file_with(&dir, "a\n");

        let out = run(serde_json::json!({ "path": path, "operations": [] })).await;
        assert!(out.is_error);
        assert!(out.content.contains("must not be empty"));
    }

    #[tokio::test]
    async fn unknown_kind_is_a_validation_error() {
        let dir = TempDir::new().unwrap();
        let path = file_with(&dir, "a\n");

        let out = run(serde_json::json!({
            "path": path,
            "operations": [ { "kind": "swap", "startLine": 1, "endLine": 1 } ]
        }))
        .await;
        assert!(out.is_error);
        assert!(out.content.contains("invalid input"));
    }

    #[tokio::test]
    async fn preserves_missing_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let path = file_with(&dir, "a\nb");

        let out = run(serde_json::json!({
            "path": path,
            "operations": [
                { "kind": "replace", "startLine": 1, "endLine": 1, "content": ["A"] }
            ]
        }))
        .await;
        assert!(!out.is_error);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "A\nb");
    }

    #[tokio::test]
    async fn preserves_file_mode() {
        let dir = TempDir::new().unwrap();
        let path = file_with(&dir, "a\n");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();

        run(serde_json::json!({
            "path": path,
            "operations": [
                { "kind": "replace", "startLine": 1, "endLine": 1, "content": ["b"] }
            ]
        }))
        .await;

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o640);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let out = run(serde_json::json!({
            "path": dir.path().join("ghost.txt"),
            "operations": [ { "kind": "delete", "startLine": 1, "endLine": 1 } ]
        }))
        .await;
        assert!(out.is_error);
        assert!(out.content.contains("file not found"));
    }
}
