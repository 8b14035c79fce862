//! Local durable media and the snapshot adapter used by keyed stores.

use super::codec::SnapshotCodec;
use super::io_utils::persist_atomically;
use crate::core::{Result, Snapshot, SyncError, validate_key};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ============================================================================
// Media
// ============================================================================

/// Namespaced byte storage that survives a session (browser local storage,
/// app data directory, ...).
pub trait LocalMedium: Send + Sync {
    fn get(&self, namespace: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, namespace: &str, bytes: &[u8]) -> Result<()>;
    fn remove(&self, namespace: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryMedium {
    slots: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.slots
            .lock()
            .map(|slots| slots.contains_key(namespace))
            .unwrap_or(false)
    }
}

impl LocalMedium for MemoryMedium {
    fn get(&self, namespace: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.slots.lock()?.get(namespace).cloned())
    }

    fn set(&self, namespace: &str, bytes: &[u8]) -> Result<()> {
        self.slots
            .lock()?
            .insert(namespace.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, namespace: &str) -> Result<()> {
        self.slots.lock()?.remove(namespace);
        Ok(())
    }
}

/// One file per namespace under a root directory.
#[derive(Debug, Clone)]
pub struct FileMedium {
    root: PathBuf,
}

impl FileMedium {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_path(&self, namespace: &str) -> Result<PathBuf> {
        validate_key(namespace)?;
        if !namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(SyncError::InvalidKey(format!(
                "namespace '{}' contains characters not allowed in file names",
                namespace
            )));
        }
        Ok(self.root.join(format!("{}.snapshot", namespace)))
    }
}

impl LocalMedium for FileMedium {
    fn get(&self, namespace: &str) -> Result<Option<Vec<u8>>> {
        let path = self.slot_path(namespace)?;
        if !path.exists() {
            return Ok(None);
        }
        fs::read(&path).map(Some).map_err(|e| {
            SyncError::Medium(format!("Failed to read '{}': {}", path.display(), e))
        })
    }

    fn set(&self, namespace: &str, bytes: &[u8]) -> Result<()> {
        let path = self.slot_path(namespace)?;
        persist_atomically(&path, bytes).map_err(|e| {
            SyncError::Medium(format!("Failed to write snapshot '{}': {}", path.display(), e))
        })
    }

    fn remove(&self, namespace: &str) -> Result<()> {
        let path = self.slot_path(namespace)?;
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                SyncError::Medium(format!("Failed to delete '{}': {}", path.display(), e))
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// Persistence adapter
// ============================================================================

/// Load/commit contract for a collection snapshot.
///
/// `load` returning `Ok(None)` means nothing was ever committed.
pub trait PersistenceAdapter<S>: Send + Sync {
    fn load(&self) -> Result<Option<Snapshot<S>>>;
    fn commit(&self, snapshot: &Snapshot<S>) -> Result<()>;
    fn erase(&self) -> Result<()>;
}

/// Encodes snapshots with a [`SnapshotCodec`] into one namespace of a
/// [`LocalMedium`].
pub struct LocalPersistence<S> {
    namespace: String,
    medium: Arc<dyn LocalMedium>,
    codec: SnapshotCodec,
    marker: PhantomData<fn() -> S>,
}

impl<S> LocalPersistence<S> {
    pub fn new(
        namespace: impl Into<String>,
        medium: Arc<dyn LocalMedium>,
        codec: SnapshotCodec,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            medium,
            codec,
            marker: PhantomData,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl<S> PersistenceAdapter<S> for LocalPersistence<S>
where
    S: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<Snapshot<S>>> {
        match self.medium.get(&self.namespace)? {
            Some(bytes) => self.codec.decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn commit(&self, snapshot: &Snapshot<S>) -> Result<()> {
        let bytes = self.codec.encode(snapshot)?;
        self.medium.set(&self.namespace, &bytes)
    }

    fn erase(&self) -> Result<()> {
        self.medium.remove(&self.namespace)
    }
}
