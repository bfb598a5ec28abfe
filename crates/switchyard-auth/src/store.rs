use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use switchyard_core::{SwitchyardError, SwitchyardResult};

/// Opaque string key/value storage for credential material.
///
/// Implementations never interpret values. `list` returns ids only.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the value stored under `id`, if any.
    async fn get(&self, id: &str) -> SwitchyardResult<Option<String>>;
    /// Stores `value` under `id`, replacing any previous value.
    async fn set(&self, id: &str, value: &str) -> SwitchyardResult<()>;
    /// Removes `id`. Returns whether something was removed.
    async fn delete(&self, id: &str) -> SwitchyardResult<bool>;
    /// Lists all stored ids in ascending order.
    async fn list(&self) -> SwitchyardResult<Vec<String>>;
}

/// Process-local secret store. Contents are lost on exit.
#[derive(Default)]
pub struct MemorySecretStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemorySecretStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, id: &str) -> SwitchyardResult<Option<String>> {
        Ok(self.entries.lock().get(id).cloned())
    }

    async fn set(&self, id: &str, value: &str) -> SwitchyardResult<()> {
        self.entries.lock().insert(id.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, id: &str) -> SwitchyardResult<bool> {
        Ok(self.entries.lock().remove(id).is_some())
    }

    async fn list(&self) -> SwitchyardResult<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}

/// File-backed secret store: one JSON object mapping id to value.
///
/// Writes go to a sibling temp file which is then renamed over the original,
/// so a crash mid-write never leaves a truncated store behind. Access from
/// this process is serialized; concurrent writers in other processes are not
/// coordinated.
pub struct FileSecretStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileSecretStore {
    /// Opens (or lazily creates) the store at `path`.
    pub async fn new(path: PathBuf) -> SwitchyardResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(Self {
            path,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    async fn load(&self) -> SwitchyardResult<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) if data.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(data) => serde_json::from_str(&data).map_err(|e| {
                SwitchyardError::Secret(format!(
                    "Failed to parse secret store '{}': {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> SwitchyardResult<()> {
        let tmp = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&tmp, json).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, id: &str) -> SwitchyardResult<Option<String>> {
        let _guard = self.write_lock.lock().await;
        Ok(self.load().await?.remove(id))
    }

    async fn set(&self, id: &str, value: &str) -> SwitchyardResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(id.to_string(), value.to_string());
        self.persist(&entries).await
    }

    async fn delete(&self, id: &str) -> SwitchyardResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(id).is_none() {
            return Ok(false);
        }
        self.persist(&entries).await?;
        Ok(true)
    }

    async fn list(&self) -> SwitchyardResult<Vec<String>> {
        let _guard = self.write_lock.lock().await;
        Ok(self.load().await?.into_keys().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_crud() {
        let store = MemorySecretStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);

        store.set("b", "2").await.unwrap();
        store.set("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.list().await.unwrap(), vec!["a", "b"]);

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.list().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("secrets.json");

        let store = FileSecretStore::new(path.clone()).await.unwrap();
        store.set("openai-key", "sk-test").await.unwrap();
        store.set("other", "x").await.unwrap();
        assert!(store.delete("other").await.unwrap());

        let reopened = FileSecretStore::new(path).await.unwrap();
        assert_eq!(
            reopened.get("openai-key").await.unwrap().as_deref(),
            Some("sk-test")
        );
        assert_eq!(reopened.list().await.unwrap(), vec!["openai-key"]);
    }

    #[tokio::test]
    async fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let store = FileSecretStore::new(path).await.unwrap();
        let err = store.get("x").await.unwrap_err();
        assert!(matches!(err, SwitchyardError::Secret(_)));
    }
}
