//! JSON file field store
//!
//! Persists all fields as one flat JSON object (`{"ACCESSTOKEN": "...", ...}`).
//! Every write rewrites the file with an atomic temp-file + rename so a crash
//! mid-write never leaves a truncated file behind. A tokio Mutex serializes
//! read-modify-write cycles within the process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::store::{FieldStore, StoreFuture};

type Entries = BTreeMap<String, String>;

/// File-backed [`FieldStore`].
///
/// The file is re-read on every call, so edits made by another process are
/// picked up. A missing file reads as empty; the file is created on first write.
pub struct JsonFileFieldStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileFieldStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Entries> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(StoreError::Io(format!("reading token file: {e}"))),
        };
        if contents.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str(&contents)
            .map_err(|e| StoreError::Serialization(format!("parsing token file: {e}")))
    }

    async fn modify(&self, f: impl FnOnce(&mut Entries) -> bool) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        if f(&mut entries) {
            write_atomic(&self.path, &entries).await?;
        }
        Ok(())
    }
}

impl FieldStore for JsonFileFieldStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut entries = self.read_entries().await?;
            Ok(entries.remove(key))
        })
    }

    fn put<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(self.modify(move |entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        }))
    }

    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(self.modify(move |entries| entries.remove(key).is_some()))
    }
}

/// Write entries to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 (owner read/write only) since
/// the file contains OAuth tokens.
async fn write_atomic(path: &Path, entries: &Entries) -> Result<()> {
    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| StoreError::Serialization(format!("serializing tokens: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StoreError::Io(format!("creating token directory: {e}")))?;

    let tmp_path = dir.join(format!(".tokens.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| StoreError::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| StoreError::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| StoreError::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), fields = entries.len(), "persisted token fields");
    Ok(())
}
