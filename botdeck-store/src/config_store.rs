//! File-backed store for the installed-plugin document.
//!
//! The document is YAML. Writes go to a `.tmp` sibling first and are then
//! renamed over the final path, so readers never observe a half-written
//! document. A document that fails validation is never written.
//!
//! The store also owns the mutex that serialises load → mutate → save
//! cycles; two concurrent mutations can otherwise both load the same
//! snapshot and the later save drops the earlier one's changes.

use botdeck_core::error::{DeckError, Result};
use botdeck_core::model::PluginConfig;
use chrono::Utc;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};

/// Held for the duration of one read-modify-write cycle.
pub type StoreGuard<'a> = MutexGuard<'a, ()>;

pub struct ConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire exclusive access to the document.
    pub async fn lock(&self) -> StoreGuard<'_> {
        self.write_lock.lock().await
    }

    /// Read the document.
    ///
    /// * missing or blank file → fresh empty document
    /// * unparseable, or violates the document invariants → `CorruptConfig`
    pub async fn load(&self) -> Result<PluginConfig> {
        let path = self.path.clone();
        blocking(move || read_document(&path)).await
    }

    /// Validate, stamp `metadata.last_updated` and atomically persist.
    pub async fn save(&self, config: &mut PluginConfig) -> Result<()> {
        config.validate()?;
        config.touch(Utc::now());

        let yaml = serde_yaml::to_string(&*config)
            .map_err(|e| DeckError::Internal(format!("failed to serialize config: {e}")))?;

        let path = self.path.clone();
        let tmp = self.tmp_path()?;
        blocking(move || write_document(&path, &tmp, yaml.as_bytes())).await?;

        tracing::debug!(
            path = %self.path.display(),
            plugins = config.plugins.len(),
            "store: config saved"
        );
        Ok(())
    }

    /// Run `mutate` against the current document under the lock and save the
    /// result. Nothing is written when `mutate` fails.
    pub async fn update<T>(
        &self,
        mutate: impl FnOnce(&mut PluginConfig) -> Result<T>,
    ) -> Result<T> {
        let _guard = self.lock().await;
        let mut config = self.load().await?;
        let out = mutate(&mut config)?;
        self.save(&mut config).await?;
        Ok(out)
    }

    fn tmp_path(&self) -> Result<PathBuf> {
        let name = self.path.file_name().ok_or_else(|| {
            DeckError::InvalidConfig(format!("{} is not a file path", self.path.display()))
        })?;
        let mut tmp_name = OsString::from(name);
        tmp_name.push(".tmp");
        Ok(self.path.with_file_name(tmp_name))
    }
}

/// File I/O runs on the blocking pool so callers holding the store lock
/// never park a runtime worker on disk.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| DeckError::Internal(format!("store task failed: {e}")))?
}

fn read_document(path: &Path) -> Result<PluginConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "store: no config file, starting empty");
        return Ok(PluginConfig::default());
    }

    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(PluginConfig::default());
    }

    let config: PluginConfig = serde_yaml::from_str(&content).map_err(|e| {
        tracing::warn!(error = %e, path = %path.display(), "store: config file is malformed");
        DeckError::CorruptConfig(format!("{}: {e}", path.display()))
    })?;

    config.validate().map_err(|e| DeckError::CorruptConfig(e.to_string()))?;

    tracing::debug!(plugins = config.plugins.len(), "store: config loaded");
    Ok(config)
}

fn write_document(path: &Path, tmp: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    if let Err(e) = write_synced(tmp, bytes) {
        let _ = fs::remove_file(tmp);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(tmp, path) {
        tracing::warn!(error = %e, "store: failed to rename tmp → config file");
        let _ = fs::remove_file(tmp);
        return Err(e.into());
    }
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use botdeck_core::model::InstalledPluginRecord;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn record(version: &str) -> InstalledPluginRecord {
        InstalledPluginRecord::new(version, Utc::now())
    }

    #[tokio::test]
    async fn load_missing_file_returns_empty_document() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.yaml"));
        let config = store.load().await.unwrap();
        assert!(config.plugins.is_empty());
        assert_eq!(config.metadata.version, "1.0.0");
    }

    #[tokio::test]
    async fn load_blank_file_returns_empty_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "\n  \n").unwrap();
        assert!(ConfigStore::new(&path).load().await.unwrap().plugins.is_empty());
    }

    #[tokio::test]
    async fn load_malformed_file_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "plugins: [not, a, map").unwrap();
        let err = ConfigStore::new(&path).load().await.unwrap_err();
        assert_eq!(err.kind(), "CorruptConfig");
    }

    #[tokio::test]
    async fn load_document_with_blank_version_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "plugins:\n  foo:\n    version: ''\n").unwrap();
        let err = ConfigStore::new(&path).load().await.unwrap_err();
        assert_eq!(err.kind(), "CorruptConfig");
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested/dir/config.yaml"));
        let mut config = PluginConfig::default();
        config.plugins.insert("foo".into(), record("1.0.0"));
        store.save(&mut config).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, config);
        assert!(!dir.path().join("nested/dir/config.yaml.tmp").exists());
    }

    #[tokio::test]
    async fn save_stamps_last_updated() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.yaml"));
        let mut config = PluginConfig::default();
        let before = Utc::now();
        config.metadata.last_updated = before - chrono::Duration::days(3);
        store.save(&mut config).await.unwrap();
        assert!(config.metadata.last_updated >= before);
    }

    #[tokio::test]
    async fn save_rejects_blank_version_and_keeps_previous_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let store = ConfigStore::new(&path);

        let mut good = PluginConfig::default();
        good.plugins.insert("foo".into(), record("1.0.0"));
        store.save(&mut good).await.unwrap();
        let on_disk = fs::read_to_string(&path).unwrap();

        let mut bad = good.clone();
        bad.plugins.insert("bar".into(), record(""));
        let err = store.save(&mut bad).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidConfig");

        assert_eq!(fs::read_to_string(&path).unwrap(), on_disk);
        assert!(!dir.path().join("config.yaml.tmp").exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn io_errors_surface_from_blocking_pool() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        let err = store.load().await.unwrap_err();
        assert_eq!(err.kind(), "Io");

        let blocked = dir.path().join("not-a-dir");
        fs::write(&blocked, "x").unwrap();
        let store = ConfigStore::new(blocked.join("config.yaml"));
        let err = store.save(&mut PluginConfig::default()).await.unwrap_err();
        assert_eq!(err.kind(), "Io");
        assert!(!blocked.join("config.yaml.tmp").exists());
    }

    #[tokio::test]
    async fn update_failure_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let store = ConfigStore::new(&path);
        let res: Result<()> = store
            .update(|config| {
                config.plugins.insert("foo".into(), record("1.0.0"));
                Err(DeckError::NotFound("bar".into()))
            })
            .await;
        assert!(res.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn concurrent_updates_do_not_lose_writes() {
        let dir = tempdir().unwrap();
        let store = Arc::new(ConfigStore::new(dir.path().join("config.yaml")));

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .update(|config| {
                        config.plugins.insert(format!("plugin-{i}"), record("1.0.0"));
                        Ok(())
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(store.load().await.unwrap().plugins.len(), 16);
    }
}
