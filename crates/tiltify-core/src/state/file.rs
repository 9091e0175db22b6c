// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Purpose
//
// Provides persistent delivery state across daemon restarts and crashes, so
// a restarted bridge resumes after the last delivered donation instead of
// replaying the whole campaign.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "updated_at": "2025-01-09T12:00:00Z",
//   "document": {
//     "tiltify": {
//       "12345": { "lastId": 9, "ids": [7, 8, 9] }
//     }
//   }
// }
// ```

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::document;
use crate::config::StateStoreConfig;
use crate::traits::state_store::{StateStore, StateStoreFactory};
use crate::Error;

/// State file format version
/// Used for future migration if format changes
const STATE_FILE_VERSION: &str = "1.0";

/// File-based state store with crash recovery
///
/// Every mutation is applied to a copy of the document, written to disk, and
/// only then made visible to readers. A failed write leaves both the file and
/// the in-memory document as they were. Writing and publishing run on their
/// own task, so a caller dropped mid-update (an abandoned tick) cannot leave
/// the file ahead of the in-memory document.
///
/// # Example
///
/// ```rust,no_run
/// use tiltify_core::state::FileStateStore;
/// use tiltify_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/tiltify/state.json").await?;
///
///     // Atomically written to disk
///     store.set("/tiltify/12345/lastId", serde_json::json!(9)).await?;
///
///     let last_id = store.get("/tiltify/12345/lastId").await?;
///     assert_eq!(last_id, serde_json::json!(9));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<RwLock<Value>>,
}

/// Serializable state file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    #[serde(default)]
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    document: Value,
}

impl FileStateStore {
    /// Create or load a file state store
    ///
    /// This will:
    /// 1. Try to load existing state file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start with empty state
    /// 4. Create parent directories if needed
    ///
    /// Loading never writes the main file unless it is restored from backup.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let document = Self::load_state_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(document)),
        })
    }

    /// Load state from file with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main state file
    /// 2. If JSON parse error, try loading backup
    /// 3. If backup also fails, start with empty state
    async fn load_state_with_recovery(path: &Path) -> Result<Value, Error> {
        let err = match Self::load_state(path).await {
            Ok(document) => {
                tracing::debug!("Loaded state from file: {}", path.display());
                return Ok(document);
            }
            Err(e) => e,
        };

        // Only parse failures count as corruption; I/O errors are surfaced
        if !matches!(err, Error::Json(_)) {
            return Err(err);
        }

        tracing::warn!(
            "State file appears corrupted: {}. Attempting recovery from backup.",
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty state.");
            return Ok(document::empty());
        }

        match Self::load_state(&backup_path).await {
            Ok(document) => {
                tracing::info!("Recovered state from backup: {}", backup_path.display());

                if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await {
                    tracing::error!(
                        "Failed to restore state file from backup: {}",
                        restore_err
                    );
                }

                Ok(document)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with empty state.",
                    backup_err
                );
                Ok(document::empty())
            }
        }
    }

    /// Load state from file
    async fn load_state(path: &Path) -> Result<Value, Error> {
        if !path.exists() {
            tracing::debug!("State file does not exist: {}", path.display());
            return Ok(document::empty());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to read state file {}: {}",
                path.display(),
                e
            ))
        })?;

        let state_file: StateFileFormat = serde_json::from_str(&content)?;

        if state_file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                STATE_FILE_VERSION,
                state_file.version
            );
        }

        if !state_file.document.is_object() {
            return Err(Error::state_store(format!(
                "State file {} has a non-object document",
                path.display()
            )));
        }

        Ok(state_file.document)
    }

    /// Apply `change` to a copy of the document, persist it, then publish it
    ///
    /// The write lock is held for the whole update so disk writes never
    /// interleave. Unchanged documents are not rewritten.
    async fn update<F>(&self, change: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Value) -> Result<(), Error> + Send,
    {
        let mut guard = Arc::clone(&self.state).write_owned().await;
        let mut next = guard.clone();
        change(&mut next)?;

        if next == *guard && self.path.exists() {
            tracing::trace!("State unchanged, skipping write");
            return Ok(());
        }

        // Runs to completion even if this future is dropped
        let path = self.path.clone();
        let persist = tokio::spawn(async move {
            Self::write_state(&path, &next).await?;
            *guard = next;
            Ok::<(), Error>(())
        });

        persist
            .await
            .map_err(|e| Error::state_store(format!("State write task failed: {}", e)))?
    }

    /// Write state to file atomically
    async fn write_state(path: &Path, document: &Value) -> Result<(), Error> {
        let state_file = StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            updated_at: Some(chrono::Utc::now()),
            document: document.clone(),
        };

        let json = serde_json::to_string_pretty(&state_file)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?;

        // Write to temporary file first
        let temp_path = Self::temp_path(path);
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Create backup of current file (if it exists)
        if path.exists() {
            let backup_path = Self::backup_path(path);
            if let Err(e) = fs::copy(path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::trace!("State written to file: {}", path.display());
        Ok(())
    }

    /// Restore state file from backup
    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored state file from backup");
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(path: &Path) -> PathBuf {
        let mut temp = path.to_path_buf();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Location of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the whole document
    pub async fn snapshot(&self) -> Value {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, path: &str) -> Result<Value, Error> {
        let guard = self.state.read().await;
        document::get(&guard, path).cloned()
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), Error> {
        self.update(|doc| document::set(doc, path, value)).await
    }

    async fn append(&self, path: &str, value: Value) -> Result<(), Error> {
        self.update(|doc| document::append(doc, path, value)).await
    }

    async fn delete(&self, path: &str) -> Result<(), Error> {
        self.update(|doc| document::delete(doc, path)).await
    }

    async fn commit(&self, entries: Vec<(String, Value)>) -> Result<(), Error> {
        self.update(|doc| {
            for (path, value) in entries {
                document::set(doc, &path, value)?;
            }
            Ok(())
        })
        .await
    }

    async fn flush(&self) -> Result<(), Error> {
        // Every update is written before it becomes visible, so the only
        // thing left to do is materialize a store that was never written.
        if self.path.exists() {
            return Ok(());
        }
        let guard = self.state.write().await;
        Self::write_state(&self.path, &guard).await
    }
}

/// Factory for [`FileStateStore`]
pub struct FileStateStoreFactory;

#[async_trait]
impl StateStoreFactory for FileStateStoreFactory {
    async fn create(&self, config: &StateStoreConfig) -> Result<Arc<dyn StateStore>, Error> {
        match config {
            StateStoreConfig::File { path } => Ok(Arc::new(FileStateStore::new(path).await?)),
            _ => Err(Error::config("Invalid config for file state store")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_basic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        assert!(store.get("/tiltify/1/lastId").await.unwrap_err().is_not_found());

        store.set("/tiltify/1/lastId", json!(9)).await.unwrap();
        store.append("/tiltify/1/ids", json!(9)).await.unwrap();
        assert!(path.exists());

        // Load new instance and verify persistence
        let store2 = FileStateStore::new(&path).await.unwrap();
        assert_eq!(store2.get("/tiltify/1/lastId").await.unwrap(), json!(9));
        assert_eq!(store2.get("/tiltify/1/ids").await.unwrap(), json!([9]));
    }

    #[tokio::test]
    async fn test_file_store_loading_does_not_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        let _ = store.get("/tiltify/1/lastId").await;

        assert!(!path.exists());
        assert!(path.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_file_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        store.set("/tiltify/1/lastId", json!(1)).await.unwrap();

        // Write again to ensure backup is created
        store.set("/tiltify/1/lastId", json!(2)).await.unwrap();

        let backup_path = FileStateStore::backup_path(&path);
        assert!(backup_path.exists(), "Backup file should exist after write");

        fs::write(&path, b"corrupted json data").await.unwrap();

        let store2 = FileStateStore::new(&path)
            .await
            .expect("backup should have been recovered");

        // Backup holds the state before the last write
        assert_eq!(store2.get("/tiltify/1/lastId").await.unwrap(), json!(1));

        // The main file was restored from the backup
        let restored = fs::read_to_string(&path).await.unwrap();
        assert!(serde_json::from_str::<Value>(&restored).is_ok());
    }

    #[tokio::test]
    async fn test_file_store_corruption_without_backup_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{not json").await.unwrap();

        let store = FileStateStore::new(&path).await.unwrap();
        assert_eq!(store.snapshot().await, json!({}));
    }

    #[tokio::test]
    async fn test_file_store_commit_writes_once_and_skips_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        let entries = vec![
            ("/tiltify/1/lastId".to_string(), json!(3)),
            ("/tiltify/1/ids".to_string(), json!([1, 2, 3])),
        ];
        store.commit(entries.clone()).await.unwrap();
        let written = fs::read_to_string(&path).await.unwrap();

        // Same values again: the file is left as is
        store.commit(entries).await.unwrap();
        assert_eq!(fs::read_to_string(&path).await.unwrap(), written);
        assert!(!FileStateStore::backup_path(&path).exists());

        let on_disk: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(on_disk["version"], json!("1.0"));
        assert_eq!(on_disk["document"]["tiltify"]["1"]["lastId"], json!(3));
    }

    #[tokio::test]
    async fn test_file_store_failed_commit_changes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        store.set("/tiltify", json!("scalar")).await.unwrap();
        let before = fs::read_to_string(&path).await.unwrap();

        let result = store
            .commit(vec![("/tiltify/1/lastId".to_string(), json!(3))])
            .await;

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).await.unwrap(), before);
        assert_eq!(store.snapshot().await, json!({"tiltify": "scalar"}));
    }

    #[tokio::test]
    async fn test_file_store_atomic_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();

        for i in 0..10 {
            store.set("/tiltify/1/lastId", json!(i)).await.unwrap();
        }

        let store2 = FileStateStore::new(&path).await.unwrap();
        assert_eq!(store2.get("/tiltify/1/lastId").await.unwrap(), json!(9));
        assert!(!FileStateStore::temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_file_store_dropped_commit_keeps_file_and_memory_in_step() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        store.set("/tiltify/1/lastId", json!(1)).await.unwrap();

        // Drop the commit after its first poll, as an abandoned tick would
        let entries = vec![
            ("/tiltify/1/lastId".to_string(), json!(2)),
            ("/tiltify/1/ids".to_string(), json!([1, 2])),
        ];
        let _ = tokio::time::timeout(std::time::Duration::ZERO, store.commit(entries)).await;

        // Readers wait for any in-flight write to finish
        let in_memory = store.snapshot().await;
        let on_disk = FileStateStore::new(&path).await.unwrap().snapshot().await;
        assert_eq!(in_memory, on_disk);
    }

    #[tokio::test]
    async fn test_file_store_flush_materializes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        store.flush().await.unwrap();

        assert!(path.exists());
        assert_eq!(FileStateStore::new(&path).await.unwrap().snapshot().await, json!({}));
    }

    #[tokio::test]
    async fn test_file_factory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let config = StateStoreConfig::File {
            path: path.to_string_lossy().into_owned(),
        };

        let store = FileStateStoreFactory.create(&config).await.unwrap();
        store.set("/a", json!(1)).await.unwrap();
        assert!(path.exists());

        assert!(FileStateStoreFactory
            .create(&StateStoreConfig::Memory)
            .await
            .is_err());
    }
}
