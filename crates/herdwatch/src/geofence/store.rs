//! Fence Store
//!
//! A small key/value JSON file standing in for client-local storage. The
//! saved fence is kept as an array of `[lat, lng]` pairs under one key.

use std::path::{Path, PathBuf};

use herdwatch_geo::Boundary;
use serde_json::{Map, Value};
use tokio::fs;
use tracing::debug;

/// Error type for store access
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to access store file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse store contents: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store file {0} does not contain a JSON object")]
    NotAnObject(PathBuf),
}

/// File-backed key/value store
#[derive(Debug, Clone)]
pub struct FenceStore {
    path: PathBuf,
}

impl FenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the boundary stored under `key`, `None` when absent
    pub async fn load(&self, key: &str) -> Result<Option<Boundary>, StoreError> {
        let mut entries = self.read_all().await?;
        match entries.remove(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Store `boundary` under `key`, replacing any previous value
    pub async fn save(&self, key: &str, boundary: &Boundary) -> Result<(), StoreError> {
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), serde_json::to_value(boundary)?);
        self.write_all(entries).await?;
        debug!(key = %key, points = boundary.len(), "Saved fence");
        Ok(())
    }

    /// Delete `key`; returns whether it existed
    pub async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_none() {
            return Ok(false);
        }
        self.write_all(entries).await?;
        debug!(key = %key, "Removed fence");
        Ok(true)
    }

    async fn read_all(&self) -> Result<Map<String, Value>, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::NotAnObject(self.path.clone())),
        }
    }

    /// Write through a sibling temp file so a crash never leaves half a file
    async fn write_all(&self, entries: Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&Value::Object(entries))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use herdwatch_geo::LatLng;
    use tempfile::TempDir;

    use super::*;

    fn fence() -> Boundary {
        Boundary::from_vertices([
            LatLng::new(12.9716, 77.5946),
            LatLng::new(12.975, 77.6),
            LatLng::new(12.97, 77.605),
        ])
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FenceStore::new(dir.path().join("state.json"));
        assert!(store.load("savedFence").await.unwrap().is_none());
        assert!(!store.remove("savedFence").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_load_remove() {
        let dir = TempDir::new().unwrap();
        let store = FenceStore::new(dir.path().join("nested/state.json"));

        store.save("savedFence", &fence()).await.unwrap();
        assert_eq!(store.load("savedFence").await.unwrap(), Some(fence()));

        assert!(store.remove("savedFence").await.unwrap());
        assert!(store.load("savedFence").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persisted_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let store = FenceStore::new(&path);
        store.save("savedFence", &fence()).await.unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(
            raw["savedFence"],
            serde_json::json!([[12.9716, 77.5946], [12.975, 77.6], [12.97, 77.605]])
        );
    }

    #[tokio::test]
    async fn test_other_keys_preserved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"theme":"dark"}"#).await.unwrap();

        let store = FenceStore::new(&path);
        store.save("savedFence", &fence()).await.unwrap();
        store.remove("savedFence").await.unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"theme": "dark"}));
    }

    #[tokio::test]
    async fn test_corrupt_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "[1, 2]").await.unwrap();

        let store = FenceStore::new(&path);
        assert!(matches!(
            store.load("savedFence").await,
            Err(StoreError::NotAnObject(_))
        ));
    }
}
