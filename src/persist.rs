//! Snapshot persistence for the [`VectorIndex`].
//!
//! The snapshot is one JSON file holding an array of
//! `{ "content", "metadata", "embedding" }` objects in index order. It is
//! always rewritten in full; there is no append format.
//!
//! `f32` values are written with their shortest round-trip representation,
//! so a save → load cycle reproduces every embedding exactly.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::index::VectorIndex;
use crate::models::VectorRecord;

/// Write the full index to `path`, replacing any existing snapshot.
///
/// Missing parent directories are created. The bytes go to a sibling
/// `.tmp` file first and are renamed into place, so readers never see a
/// half-written snapshot.
pub async fn save(index: &VectorIndex, path: &Path) -> Result<()> {
    let write_err = |source: std::io::Error| StoreError::PersistenceWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let bytes = serde_json::to_vec(index.records())
        .map_err(|e| write_err(std::io::Error::other(e)))?;

    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, &bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(write_err)?;

    tracing::debug!(path = %path.display(), records = index.len(), "snapshot saved");
    Ok(())
}

/// Load a snapshot.
///
/// Returns `None` when the file does not exist. A file that exists but
/// cannot be read or parsed is logged and also yields `None`, so callers
/// carry on with an empty index.
pub async fn load(path: &Path) -> Option<VectorIndex> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read snapshot, starting empty");
            return None;
        }
    };

    match serde_json::from_slice::<Vec<VectorRecord>>(&bytes) {
        Ok(records) => {
            tracing::info!(path = %path.display(), records = records.len(), "snapshot loaded");
            Some(VectorIndex::from_records(records))
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "snapshot is corrupt, starting empty");
            None
        }
    }
}

/// Delete the snapshot file. A missing file is not an error.
pub async fn remove(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StoreError::PersistenceWrite {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
