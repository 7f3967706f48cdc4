// ─── Filesystem helpers ───
// Small async wrappers that attach the offending path to IO errors.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::core::error::{LauncherError, LauncherResult};

pub async fn create_dir_safe(path: &Path) -> LauncherResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(LauncherError::io(path))
}

/// Write `bytes` to a sibling temp file and rename it over `dest`.
///
/// Readers never observe a half-written file.
pub async fn write_atomic(dest: &Path, bytes: &[u8]) -> LauncherResult<()> {
    if let Some(parent) = dest.parent() {
        create_dir_safe(parent).await?;
    }

    let tmp = temp_sibling(dest);
    {
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(LauncherError::io(&tmp))?;
        file.write_all(bytes).await.map_err(LauncherError::io(&tmp))?;
        file.flush().await.map_err(LauncherError::io(&tmp))?;
        // handle dropped before rename (Windows refuses to rename open files)
    }

    tokio::fs::rename(&tmp, dest)
        .await
        .map_err(LauncherError::io(dest))
}

/// Copy `src` over `dest` through a temp file, same guarantee as `write_atomic`.
pub async fn copy_atomic(src: &Path, dest: &Path) -> LauncherResult<()> {
    if let Some(parent) = dest.parent() {
        create_dir_safe(parent).await?;
    }

    let tmp = temp_sibling(dest);
    tokio::fs::copy(src, &tmp)
        .await
        .map_err(LauncherError::io(src))?;
    tokio::fs::rename(&tmp, dest)
        .await
        .map_err(LauncherError::io(dest))
}

/// Remove a file, treating "already gone" as success.
pub async fn remove_file_if_exists(path: &Path) -> LauncherResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(LauncherError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// `true` when the path is a regular file with at least one byte.
pub async fn is_non_empty_file(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// File names directly under `dir`. A missing directory yields an empty list.
pub async fn list_file_names(dir: &Path) -> LauncherResult<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => {
            return Err(LauncherError::Io {
                path: dir.to_path_buf(),
                source: e,
            })
        }
    };

    while let Some(entry) = entries.next_entry().await.map_err(LauncherError::io(dir))? {
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if is_file {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }

    names.sort();
    Ok(names)
}

fn temp_sibling(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.{}.part", name, uuid::Uuid::new_v4().simple()))
}
