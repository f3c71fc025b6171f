//! Key/value persistence for metadata records

use crate::error::{BossError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Separator between the owning resource's lookup key and a metadata key
pub const META_KEY_DELIMITER: char = '#';

/// Composite key for a metadata value attached to a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaKey(String);

impl MetaKey {
    pub fn new(lookup_key: &str, key: &str) -> Self {
        Self(format!("{}{}{}", lookup_key, META_KEY_DELIMITER, key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Trait for metadata persistence backends
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Store a value, replacing any existing one
    async fn write(&self, key: &str, value: Value) -> Result<()>;

    /// Store a value only if the key is absent
    async fn write_new(&self, key: &str, value: Value) -> Result<()>;

    /// Read the value for a key
    async fn read(&self, key: &str) -> Result<Value>;

    /// Replace an existing value, returning the previous one
    async fn update(&self, key: &str, value: Value) -> Result<Value>;

    /// Remove a value, returning it
    async fn delete(&self, key: &str) -> Result<Value>;

    /// List keys starting with a prefix, in lexical order
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

fn not_found(key: &str) -> BossError {
    BossError::NotFound(format!("No metadata for key {}", key))
}

fn duplicate(key: &str) -> BossError {
    BossError::DuplicateKey(format!("Metadata key {} already exists", key))
}

fn list_prefix(map: &BTreeMap<String, Value>, prefix: &str) -> Vec<String> {
    map.range(prefix.to_string()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, _)| k.clone())
        .collect()
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    items: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn write(&self, key: &str, value: Value) -> Result<()> {
        self.items.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn write_new(&self, key: &str, value: Value) -> Result<()> {
        let mut items = self.items.write();
        if items.contains_key(key) {
            return Err(duplicate(key));
        }
        items.insert(key.to_string(), value);
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Value> {
        self.items.read().get(key).cloned().ok_or_else(|| not_found(key))
    }

    async fn update(&self, key: &str, value: Value) -> Result<Value> {
        let mut items = self.items.write();
        match items.get_mut(key) {
            Some(slot) => Ok(std::mem::replace(slot, value)),
            None => Err(not_found(key)),
        }
    }

    async fn delete(&self, key: &str) -> Result<Value> {
        self.items.write().remove(key).ok_or_else(|| not_found(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(list_prefix(&self.items.read(), prefix))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    saved_at: DateTime<Utc>,
    items: BTreeMap<String, Value>,
}

/// File-backed store that persists a JSON snapshot after every mutation
pub struct FileMetadataStore {
    path: PathBuf,
    items: tokio::sync::Mutex<BTreeMap<String, Value>>,
}

impl FileMetadataStore {
    pub const FILE_NAME: &'static str = "metadata.json";

    /// Open (or create) a store under `base_path`
    pub async fn open(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref();
        fs::create_dir_all(base_path).await?;
        let path = base_path.join(Self::FILE_NAME);

        let items = if fs::try_exists(&path).await? {
            let bytes = fs::read(&path).await?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
            log::debug!(
                "loaded {} metadata records saved at {}",
                snapshot.items.len(),
                snapshot.saved_at
            );
            snapshot.items
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            items: tokio::sync::Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, items: &BTreeMap<String, Value>) -> Result<()> {
        let snapshot = Snapshot {
            saved_at: Utc::now(),
            items: items.clone(),
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;

        // Write beside the target and rename so readers never see a torn file
        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for FileMetadataStore {
    async fn write(&self, key: &str, value: Value) -> Result<()> {
        let mut items = self.items.lock().await;
        items.insert(key.to_string(), value);
        self.persist(&items).await
    }

    async fn write_new(&self, key: &str, value: Value) -> Result<()> {
        let mut items = self.items.lock().await;
        if items.contains_key(key) {
            return Err(duplicate(key));
        }
        items.insert(key.to_string(), value);
        self.persist(&items).await
    }

    async fn read(&self, key: &str) -> Result<Value> {
        self.items
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| not_found(key))
    }

    async fn update(&self, key: &str, value: Value) -> Result<Value> {
        let mut items = self.items.lock().await;
        let previous = match items.get_mut(key) {
            Some(slot) => std::mem::replace(slot, value),
            None => return Err(not_found(key)),
        };
        self.persist(&items).await?;
        Ok(previous)
    }

    async fn delete(&self, key: &str) -> Result<Value> {
        let mut items = self.items.lock().await;
        let previous = items.remove(key).ok_or_else(|| not_found(key))?;
        self.persist(&items).await?;
        Ok(previous)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(list_prefix(&*self.items.lock().await, prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn exercise(store: &dyn MetadataStore) {
        let key = MetaKey::new("1&2&3", "scan_date");
        store.write(key.as_str(), json!("2016-05-01")).await.unwrap();
        assert_eq!(store.read(key.as_str()).await.unwrap(), json!("2016-05-01"));

        let previous = store.update(key.as_str(), json!("2017-01-01")).await.unwrap();
        assert_eq!(previous, json!("2016-05-01"));

        assert!(matches!(
            store.write_new(key.as_str(), json!(1)).await,
            Err(BossError::DuplicateKey(_))
        ));

        store.write("1&2&3#a", json!(1)).await.unwrap();
        store.write("1&2&30#a", json!(2)).await.unwrap();
        let keys = store.list("1&2&3#").await.unwrap();
        assert_eq!(keys, vec!["1&2&3#a".to_string(), "1&2&3#scan_date".to_string()]);

        let removed = store.delete(key.as_str()).await.unwrap();
        assert_eq!(removed, json!("2017-01-01"));
        assert!(matches!(
            store.read(key.as_str()).await,
            Err(BossError::NotFound(_))
        ));
        assert!(matches!(
            store.update("missing", json!(0)).await,
            Err(BossError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("missing").await,
            Err(BossError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryMetadataStore::new();
        exercise(&store).await;
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_file_store_persists() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = FileMetadataStore::open(temp_dir.path()).await.unwrap();
            exercise(&store).await;
        }

        let reopened = FileMetadataStore::open(temp_dir.path()).await.unwrap();
        assert_eq!(reopened.read("1&2&30#a").await.unwrap(), json!(2));
        assert!(reopened.path().ends_with(FileMetadataStore::FILE_NAME));
    }

    #[test]
    fn test_meta_key() {
        assert_eq!(MetaKey::new("4&5", "notes").as_str(), "4&5#notes");
    }
}
