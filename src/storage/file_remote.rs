//! Authoritative store kept as one JSON document per collection.

use super::io_utils::persist_atomically;
use super::remote::{CountFilter, RemoteStore};
use crate::core::{OrderedItem, Result, SyncError, validate_key};
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

pub struct JsonFileRemoteStore<T> {
    root: PathBuf,
    // Serializes read-modify-write cycles on the documents.
    write_lock: Mutex<()>,
    marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileRemoteStore<T> {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
            marker: PhantomData,
        }
    }

    fn document_path(&self, collection: &str) -> Result<PathBuf> {
        validate_key(collection)?;
        if collection.contains(['/', '\\']) || collection.starts_with('.') {
            return Err(SyncError::InvalidKey(format!(
                "collection '{}' is not a valid document name",
                collection
            )));
        }
        Ok(self.root.join(format!("{}.json", collection)))
    }
}

impl<T> JsonFileRemoteStore<T>
where
    T: Serialize + DeserializeOwned,
{
    async fn read_document(&self, collection: &str) -> Result<Vec<OrderedItem<T>>> {
        let path = self.document_path(collection)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(SyncError::Remote(format!(
                    "Failed to read '{}': {}",
                    path.display(),
                    err
                )));
            }
        };
        serde_json::from_slice(&bytes).map_err(|err| {
            SyncError::Remote(format!(
                "Failed to decode collection '{}': {}",
                collection, err
            ))
        })
    }

    async fn write_document(&self, collection: &str, items: &[OrderedItem<T>]) -> Result<()> {
        let path = self.document_path(collection)?;
        let bytes = serde_json::to_vec_pretty(items).map_err(|err| {
            SyncError::Remote(format!(
                "Failed to encode collection '{}': {}",
                collection, err
            ))
        })?;
        let target = path.clone();
        tokio::task::spawn_blocking(move || persist_atomically(&target, &bytes))
            .await
            .map_err(|err| SyncError::Remote(format!("Write task failed: {}", err)))?
            .map_err(|err| {
                SyncError::Remote(format!("Failed to write '{}': {}", path.display(), err))
            })
    }
}

fn upsert<T: Clone>(items: &mut Vec<OrderedItem<T>>, item: &OrderedItem<T>) {
    match items.iter_mut().find(|existing| existing.id == item.id) {
        Some(existing) => *existing = item.clone(),
        None => items.push(item.clone()),
    }
}

#[async_trait]
impl<T> RemoteStore<T> for JsonFileRemoteStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn load(&self, collection: &str) -> Result<Vec<OrderedItem<T>>> {
        let mut items = self.read_document(collection).await?;
        items.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn write_one(&self, collection: &str, item: &OrderedItem<T>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.read_document(collection).await?;
        upsert(&mut items, item);
        self.write_document(collection, &items).await
    }

    async fn write_many(&self, collection: &str, batch: &[OrderedItem<T>]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.read_document(collection).await?;
        for item in batch {
            upsert(&mut items, item);
        }
        self.write_document(collection, &items).await
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.read_document(collection).await?;
        items.retain(|item| item.id != id);
        self.write_document(collection, &items).await
    }

    async fn count(&self, collection: &str, filter: CountFilter) -> Result<usize> {
        let items = self.read_document(collection).await?;
        Ok(items.iter().filter(|item| filter.matches(item)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFileRemoteStore<String> = JsonFileRemoteStore::new(dir.path());
        store
            .write_many(
                "hero",
                &[
                    OrderedItem::new("x", "X".to_string(), 2),
                    OrderedItem::new("y", "Y".to_string(), 1),
                ],
            )
            .await
            .unwrap();
        store.delete_one("hero", "x").await.unwrap();

        let reopened: JsonFileRemoteStore<String> = JsonFileRemoteStore::new(dir.path());
        let items = reopened.load("hero").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "y");
        assert_eq!(reopened.count("hero", CountFilter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_document_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFileRemoteStore<String> = JsonFileRemoteStore::new(dir.path());
        assert!(store.load("nav").await.unwrap().is_empty());
        assert!(store.load("../nav").await.is_err());
    }
}
