//! On-disk locations and JSON files backing [`FileKeyValueStore`].
//!
//! Store files hold API tokens, so they are created owner-only (0600, in a
//! 0700 directory on Unix) before any bytes are written, then moved into
//! place with a rename.
//!
//! [`FileKeyValueStore`]: crate::kv::FileKeyValueStore

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::StoreError;

const APP_DIR: &str = "tallybar";

// ============================================================================
// Locations
// ============================================================================

/// Directory holding `config.json`.
///
/// `~/Library/Application Support/TallyBar` on macOS, the platform config
/// directory joined with `tallybar` elsewhere.
pub fn default_config_dir() -> PathBuf {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|home| home.join("Library/Application Support/TallyBar"))
    } else {
        dirs::config_dir().map(|dir| dir.join(APP_DIR))
    };
    base.unwrap_or_else(|| PathBuf::from("."))
}

/// Directory holding one JSON file per store key.
pub fn default_data_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        return default_config_dir().join("data");
    }
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| default_config_dir().join("data"))
}

/// Path of the configuration file.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

// ============================================================================
// Files
// ============================================================================

async fn create_private_dir(dir: &Path) -> Result<(), StoreError> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(dir).await?;
    Ok(())
}

async fn create_private_file(path: &Path) -> Result<tokio::fs::File, StoreError> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    Ok(options.open(path).await?)
}

/// Writes `value` to `path`, replacing any previous file in one rename.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the directory, temp file or rename fails.
pub async fn write_json(path: &Path, value: &Value) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        create_private_dir(dir).await?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;

    let staging = path.with_extension("json.tmp");
    let mut file = create_private_file(&staging).await?;
    file.write_all(&bytes).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&staging, path).await {
        // best effort, the rename error is what matters
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(e.into());
    }
    debug!(path = %path.display(), bytes = bytes.len(), "Wrote store file");
    Ok(())
}

/// Reads the JSON value at `path`; a missing file is `None`.
///
/// # Errors
///
/// Returns [`StoreError::Io`] for unreadable files and
/// [`StoreError::Serialization`] for corrupt ones.
pub async fn read_json(path: &Path) -> Result<Option<Value>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        warn!(path = %path.display(), error = %e, "Corrupt store file");
        e.into()
    })
}
