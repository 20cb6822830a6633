//! Move tool: rename a file or directory, with a copy-then-remove
//! fallback when rename fails (cross-device moves).

use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use cl_domain::cancel::CancelToken;
use cl_domain::tool::ToolSpec;
use serde::Deserialize;
use serde_json::Value;
use tokio::fs;

use crate::fsops;
use crate::registry::{parse_input, Tool, ToolOutcome};

#[derive(Debug, Clone, Deserialize)]
struct MoveRequest {
    source: String,
    destination: String,
}

pub struct MoveTool;

#[async_trait::async_trait]
impl Tool for MoveTool {
    fn name(&self) -> &'static str {
        "move"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().into(),
            description: "Move or rename a file or directory. When the destination is \
                          an existing directory the source keeps its name inside it. \
                          Missing destination directories are created."
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "source": { "type": "string", "description": "Existing path" },
                    "destination": { "type": "string", "description": "Target path or directory" }
                },
                "required": ["source", "destination"]
            }),
        }
    }

    async fn run(&self, input: Value, cancel: &CancelToken) -> ToolOutcome {
        let req: MoveRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return e,
        };
        if cancel.is_cancelled() {
            return ToolOutcome::error("cancelled");
        }

        let source = match fs::canonicalize(&req.source).await {
            Ok(p) => p,
            Err(_) => return ToolOutcome::error(format!("source not found: {}", req.source)),
        };

        let mut destination = absolutize(Path::new(&req.destination));
        // Moving into an existing directory keeps the source's basename.
        if destination.is_dir() {
            match source.file_name() {
                Some(name) => destination.push(name),
                None => {
                    return ToolOutcome::error(format!(
                        "cannot derive a name for '{}' inside '{}'",
                        req.source, req.destination
                    ));
                }
            }
        }

        let source_is_dir = source.is_dir();
        if source_is_dir {
            let prefix = format!("{}{}", source.display(), MAIN_SEPARATOR);
            if destination.display().to_string().starts_with(&prefix) {
                return ToolOutcome::error(format!(
                    "cannot move a directory into itself: {} -> {}",
                    source.display(),
                    destination.display()
                ));
            }
        }
        if destination.is_dir() {
            match std::fs::read_dir(&destination) {
                Ok(mut entries) => {
                    if entries.next().is_some() {
                        return ToolOutcome::error(format!(
                            "destination is a non-empty directory: {}",
                            destination.display()
                        ));
                    }
                }
                Err(e) => {
                    return ToolOutcome::error(format!(
                        "failed to inspect destination '{}': {e}",
                        destination.display()
                    ));
                }
            }
        }

        if let Err(e) = fsops::ensure_parent_dirs(&destination).await {
            return ToolOutcome::error(format!("failed to create destination parents: {e}"));
        }

        // Try the cheap rename first; fall back to copy + remove, which
        // also covers cross-device moves.
        if fs::rename(&source, &destination).await.is_err() {
            if let Err(e) = copy_recursive(&source, &destination, cancel).await {
                return ToolOutcome::error(format!(
                    "failed to move '{}' to '{}': {e}",
                    source.display(),
                    destination.display()
                ));
            }
            let removed = if source_is_dir {
                fs::remove_dir_all(&source).await
            } else {
                fs::remove_file(&source).await
            };
            if let Err(e) = removed {
                return ToolOutcome::error(format!(
                    "copied but failed to remove source '{}': {e}",
                    source.display()
                ));
            }
        }

        ToolOutcome::success(serde_json::json!({
            "source": source.display().to_string(),
            "destination": destination.display().to_string(),
        }))
    }
}

/// Absolute form of a possibly-missing path (canonicalize demands
/// existence; the destination usually does not exist yet).
fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Copy a file or directory tree, preserving unix permission bits.
/// Boxed because directory recursion makes the future self-referential.
fn copy_recursive<'a>(
    source: &'a Path,
    destination: &'a Path,
    cancel: &'a CancelToken,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        if cancel.is_cancelled() {
            return Err(std::io::Error::other("cancelled"));
        }

        let meta = fs::metadata(source).await?;
        if meta.is_dir() {
            fs::create_dir_all(destination).await?;
            fs::set_permissions(destination, meta.permissions()).await?;

            let mut entries = fs::read_dir(source).await?;
            while let Some(entry) = entries.next_entry().await? {
                let target = destination.join(entry.file_name());
                copy_recursive(&entry.path(), &target, cancel).await?;
            }
        } else {
            // std::fs::copy (and tokio's wrapper) carries permission bits.
            fs::copy(source, destination).await?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    async fn run(input: Value) -> ToolOutcome {
        MoveTool.run(input, &CancelToken::new()).await
    }

    #[tokio::test]
    async fn renames_a_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("old.txt");
        std::fs::write(&src, "data").unwrap();

        let dst = dir.path().join("new.txt");
        let out = run(serde_json::json!({ "source": src, "destination": dst })).await;
        assert!(!out.is_error);
        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "data");
    }

    #[tokio::test]
    async fn destination_directory_keeps_basename() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("file.txt");
        std::fs::write(&src, "x").unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();

        let out = run(serde_json::json!({ "source": src, "destination": sub })).await;
        assert!(!out.is_error);
        assert!(sub.join("file.txt").exists());

        let v: Value = serde_json::from_str(&out.content).unwrap();
        assert!(v["destination"].as_str().unwrap().ends_with("sub/file.txt"));
    }

    #[tokio::test]
    async fn move_there_and_back_preserves_content_and_mode() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.sh");
        std::fs::write(&a, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&a, std::fs::Permissions::from_mode(0o750)).unwrap();

        let b = dir.path().join("b.sh");
        run(serde_json::json!({ "source": a, "destination": b })).await;
        run(serde_json::json!({ "source": b, "destination": a })).await;

        assert!(a.exists());
        assert!(!b.exists());
        assert_eq!(std::fs::read_to_string(&a).unwrap(), "#!/bin/sh\n");
        let mode = std::fs::metadata(&a).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o750);
    }

    #[tokio::test]
    async fn refuses_moving_a_directory_into_itself() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("tree");
        std::fs::create_dir_all(src.join("leaf")).unwrap();

        let out = run(serde_json::json!({
            "source": src,
            "destination": src.join("leaf/copy")
        }))
        .await;
        assert!(out.is_error);
        assert!(out.content.contains("into itself"));
    }

    #[tokio::test]
    async fn refuses_overwriting_non_empty_directory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src_dir");
        std::fs::create_dir(&src).unwrap();
        let dst = dir.path().join("dst");
        std::fs::create_dir(&dst).unwrap();
        std::fs::create_dir(dst.join("src_dir")).unwrap();
        std::fs::write(dst.join("src_dir/occupant.txt"), "here").unwrap();

        let out = run(serde_json::json!({ "source": src, "destination": dst })).await;
        assert!(out.is_error);
        assert!(out.content.contains("non-empty directory"));
    }

    #[tokio::test]
    async fn creates_missing_destination_parents() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("f.txt");
        std::fs::write(&src, "x").unwrap();

        let dst = dir.path().join("deep/nested/f.txt");
        let out = run(serde_json::json!({ "source": src, "destination": dst })).await;
        assert!(!out.is_error);
        assert!(dst.exists());
    }

    #[tokio::test]
    async fn missing_source_is_an_error() {
        let dir = TempDir::new().unwrap();
        let out = run(serde_json::json!({
            "source": dir.path().join("ghost"),
            "destination": dir.path().join("dst")
        }))
        .await;
        assert!(out.is_error);
        assert!(out.content.contains("source not found"));
    }
}
