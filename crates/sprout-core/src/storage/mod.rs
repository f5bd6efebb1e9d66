//! Durable storage boundary
//!
//! The profile store and usage ledger live behind a keyed get/put interface
//! so the core never touches a concrete database. Persistence is best-effort:
//! callers spawn writes through [`persist_json_with_retry`] and never block a
//! user-facing turn on them.

use crate::error::{SproutError, SproutResult};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keyed byte storage
///
/// Keys are `/`-separated paths (`memory/profile/{user_id}`). Eventual
/// consistency is acceptable; the core treats every read as possibly stale.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Fetch a value by key
    async fn get(&self, key: &str) -> SproutResult<Option<Vec<u8>>>;

    /// Store a value, overwriting any previous one
    async fn put(&self, key: &str, value: Vec<u8>) -> SproutResult<()>;

    /// Remove a key; removing a missing key is not an error
    async fn delete(&self, key: &str) -> SproutResult<()>;

    /// List keys under a prefix, sorted
    async fn list_keys(&self, prefix: &str) -> SproutResult<Vec<String>>;
}

/// Typed read helper
pub async fn get_json<T: DeserializeOwned>(
    storage: &dyn KeyValueStorage,
    key: &str,
) -> SproutResult<Option<T>> {
    match storage.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Typed write helper
pub async fn put_json<T: Serialize>(
    storage: &dyn KeyValueStorage,
    key: &str,
    value: &T,
) -> SproutResult<()> {
    let bytes = serde_json::to_vec(value)?;
    storage.put(key, bytes).await
}

/// Best-effort persistence with a bounded retry count
///
/// Failures are logged and dropped after the final attempt; persistence is
/// fire-and-forget relative to the user-facing reply and never surfaces.
pub async fn persist_json_with_retry<T: Serialize>(
    storage: Arc<dyn KeyValueStorage>,
    key: String,
    value: T,
    attempts: u32,
) {
    let bytes = match serde_json::to_vec(&value) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "dropping unserializable persistence write");
            return;
        }
    };

    for attempt in 0..attempts.max(1) {
        match storage.put(&key, bytes.clone()).await {
            Ok(()) => return,
            Err(e) if attempt + 1 < attempts => {
                tracing::debug!(key = %key, attempt, error = %e, "persistence write failed, retrying");
                tokio::time::sleep(std::time::Duration::from_millis(50 << attempt)).await;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "persistence write dropped after retries");
            }
        }
    }
}

/// In-memory storage
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStorage for InMemoryStorage {
    async fn get(&self, key: &str) -> SproutResult<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> SproutResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> SproutResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> SproutResult<Vec<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// File-backed storage, one file per key under a root directory
///
/// Keys are flattened to file names (`/` becomes `_`), so `list_keys`
/// returns names in that flattened form.
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Create a file storage rooted at the given directory
    pub fn new(root: impl AsRef<Path>) -> SproutResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Keys map to paths by replacing separators; path traversal is rejected
    fn path_for(&self, key: &str) -> SproutResult<PathBuf> {
        if key.is_empty() || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
            return Err(SproutError::storage_with_key("invalid storage key", key));
        }
        let sanitized: String = key
            .chars()
            .map(|c| if c == '/' { '_' } else { c })
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            .collect();
        Ok(self.root.join(format!("{sanitized}.json")))
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get(&self, key: &str) -> SproutResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SproutError::storage_with_key(e.to_string(), key)),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> SproutResult<()> {
        let path = self.path_for(key)?;
        // Write-then-rename so readers never observe a torn file
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &value)
            .await
            .map_err(|e| SproutError::storage_with_key(e.to_string(), key))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| SproutError::storage_with_key(e.to_string(), key))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> SproutResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SproutError::storage_with_key(e.to_string(), key)),
        }
    }

    async fn list_keys(&self, prefix: &str) -> SproutResult<Vec<String>> {
        let sanitized_prefix: String = prefix
            .chars()
            .map(|c| if c == '/' { '_' } else { c })
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            .collect();

        let mut keys = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| SproutError::storage(e.to_string()))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| SproutError::storage(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(stem) = name.strip_suffix(".json") {
                if stem.starts_with(&sanitized_prefix) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
