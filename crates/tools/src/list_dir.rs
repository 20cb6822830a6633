//! Directory listing tool with unix metadata (mode, owner, size).

use std::os::unix::fs::{MetadataExt, PermissionsExt};

use cl_domain::cancel::CancelToken;
use cl_domain::tool::ToolSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;

use crate::registry::{parse_input, Tool, ToolOutcome};

#[derive(Debug, Clone, Deserialize)]
struct ListDirRequest {
    path: String,
}

/// One directory entry. Hidden entries are included.
#[derive(Debug, Clone, Serialize)]
struct DirEntry {
    name: String,
    kind: EntryKind,
    /// `ls`-style mode string, e.g. `drwxr-xr-x`.
    mode: String,
    uid: u32,
    gid: u32,
    size: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum EntryKind {
    File,
    Dir,
    Symlink,
}

pub struct ListDirTool;

#[async_trait::async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &'static str {
        "list_dir"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().into(),
            description: "List a directory with per-entry metadata: kind, permissions, \
                          owner, and size. Hidden entries are included."
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory to list" }
                },
                "required": ["path"]
            }),
        }
    }

    async fn run(&self, input: Value, cancel: &CancelToken) -> ToolOutcome {
        let req: ListDirRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return e,
        };
        if cancel.is_cancelled() {
            return ToolOutcome::error("cancelled");
        }

        let meta = match fs::symlink_metadata(&req.path).await {
            Ok(m) => m,
            Err(_) => return ToolOutcome::error(format!("path not found: {}", req.path)),
        };
        if !meta.is_dir() {
            return ToolOutcome::error(format!("not a directory: {}", req.path));
        }

        let mut read_dir = match fs::read_dir(&req.path).await {
            Ok(rd) => rd,
            Err(e) => {
                return ToolOutcome::error(format!("failed to read '{}': {e}", req.path));
            }
        };

        let mut entries: Vec<DirEntry> = Vec::new();
        loop {
            let entry = match read_dir.next_entry().await {
                Ok(Some(e)) => e,
                Ok(None) => break,
                Err(e) => return ToolOutcome::error(format!("failed to read entry: {e}")),
            };
            let meta = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    return ToolOutcome::error(format!(
                        "failed to stat '{}': {e}",
                        entry.path().display()
                    ));
                }
            };

            let file_type = entry.file_type().await.ok();
            let kind = match file_type {
                Some(t) if t.is_symlink() => EntryKind::Symlink,
                Some(t) if t.is_dir() => EntryKind::Dir,
                _ => EntryKind::File,
            };

            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                kind,
                mode: mode_string(kind, meta.permissions().mode()),
                uid: meta.uid(),
                gid: meta.gid(),
                size: meta.len(),
            });
        }

        // Sort by name for deterministic output.
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        ToolOutcome::success(serde_json::json!({ "entries": entries }))
    }
}

/// Render mode bits `ls`-style: type char + rwx triplets.
fn mode_string(kind: EntryKind, mode: u32) -> String {
    let type_char = match kind {
        EntryKind::Dir => 'd',
        EntryKind::Symlink => 'l',
        EntryKind::File => '-',
    };
    let mut s = String::with_capacity(10);
    s.push(type_char);
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        s.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    s
}
