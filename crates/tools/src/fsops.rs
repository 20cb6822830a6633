//! Shared filesystem helpers for the mutating tools.
//!
//! Atomic replacement is the one rule: new content is written to a
//! uniquely-named sibling temp file and renamed into place, so observers
//! never see a half-written destination. The temp file is removed on
//! every failure path.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Mode for newly created files.
pub const NEW_FILE_MODE: u32 = 0o644;
/// Mode for created parent directories.
pub const DIR_MODE: u32 = 0o755;

/// Create all missing ancestors of `path` at [`DIR_MODE`].
pub async fn ensure_parent_dirs(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            let mut builder = fs::DirBuilder::new();
            builder.recursive(true).mode(DIR_MODE);
            builder.create(parent).await?;
        }
    }
    Ok(())
}

/// Replace `path` atomically with `content`.
///
/// The replacement carries `mode` when given (used to preserve an existing
/// file's permission bits), otherwise [`NEW_FILE_MODE`].
pub async fn atomic_replace(path: &Path, content: &[u8], mode: Option<u32>) -> std::io::Result<()> {
    let tmp_path = sibling_temp_path(path);

    let result = write_temp_and_rename(path, &tmp_path, content, mode).await;
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path).await;
    }
    result
}

async fn write_temp_and_rename(
    path: &Path,
    tmp_path: &Path,
    content: &[u8],
    mode: Option<u32>,
) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp_path).await?;
    file.write_all(content).await?;
    file.flush().await?;
    file.sync_data().await?;
    drop(file);

    fs::set_permissions(
        tmp_path,
        std::fs::Permissions::from_mode(mode.unwrap_or(NEW_FILE_MODE)),
    )
    .await?;

    fs::rename(tmp_path, path).await
}

/// Unique temp name in the destination's own directory, so the final
/// rename never crosses a filesystem boundary.
fn sibling_temp_path(path: &Path) -> PathBuf {
    let tmp_name = format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        uuid::Uuid::new_v4().as_simple()
    );
    path.with_file_name(tmp_name)
}

/// Permission bits of `path`, if it exists.
pub async fn existing_mode(path: &Path) -> Option<u32> {
    fs::metadata(path)
        .await
        .ok()
        .map(|m| m.permissions().mode() & 0o7777)
}
