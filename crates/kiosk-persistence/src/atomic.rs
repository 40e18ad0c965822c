//! Write-to-temp-then-rename file replacement.

use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::PersistenceError;

/// Fixed sibling used for staging, so an orphan from a crash is overwritten
/// by the next write.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let payload = serde_json::to_vec_pretty(value)?;
    let staged = stage(path, &payload).await?;
    commit(&staged, path).await
}

/// Write the payload to the temp sibling and flush it to disk.
/// The canonical file is not touched.
pub(crate) async fn stage(path: &Path, payload: &[u8]) -> Result<PathBuf, PersistenceError> {
    let staged = temp_path(path);
    let write_err = |source| PersistenceError::Write {
        path: staged.clone(),
        source,
    };

    let mut file = fs::File::create(&staged).await.map_err(write_err)?;
    file.write_all(payload).await.map_err(write_err)?;
    file.flush().await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;

    Ok(staged)
}

/// Rename the staged file over the canonical path
pub(crate) async fn commit(staged: &Path, path: &Path) -> Result<(), PersistenceError> {
    fs::rename(staged, path)
        .await
        .map_err(|source| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        })
}
