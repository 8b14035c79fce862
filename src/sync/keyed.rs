//! Keyed collection with merge-on-insert and local snapshot persistence.
//!
//! Every mutation is applied in memory first and then written as a full
//! snapshot through the store's [`PersistenceAdapter`]. Persistence failures
//! are logged and never reach the caller: the local medium is assumed to be
//! available for the whole session, so there is no retry.

use super::notify::{NotificationKind, Notifier};
use crate::catalog::Priced;
use crate::config::KeyedStoreConfig;
use crate::core::{Entry, Result, Snapshot, SyncError, validate_key};
use crate::storage::{LocalMedium, LocalPersistence, PersistenceAdapter};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::{Arc, Mutex};

/// Whether a non-silent insert should also ask the UI to open the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertMode {
    #[default]
    Reveal,
    Silent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyedChange {
    Added,
    Updated,
    Removed,
}

struct KeyedState<T> {
    entries: IndexMap<String, Entry<T>>,
    version: u64,
}

pub struct KeyedCollectionStore<T> {
    config: KeyedStoreConfig,
    persistence: Box<dyn PersistenceAdapter<Vec<Entry<T>>>>,
    notifier: Notifier,
    state: Mutex<KeyedState<T>>,
}

impl<T> KeyedCollectionStore<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Opens the store and restores the last committed snapshot.
    ///
    /// A missing or unreadable snapshot starts the store empty.
    pub fn open(
        config: KeyedStoreConfig,
        persistence: Box<dyn PersistenceAdapter<Vec<Entry<T>>>>,
        notifier: Notifier,
    ) -> Result<Self> {
        config.validate()?;

        let state = match persistence.load() {
            Ok(Some(snapshot)) => {
                debug!(
                    "restored keyed snapshot: namespace='{}' version={} entries={}",
                    config.namespace,
                    snapshot.version,
                    snapshot.data.len()
                );
                KeyedState {
                    version: snapshot.version,
                    entries: index_entries(snapshot.data),
                }
            }
            Ok(None) => KeyedState {
                entries: IndexMap::new(),
                version: 0,
            },
            Err(err) => {
                warn!(
                    "failed to load keyed snapshot, starting empty: namespace='{}' error='{}'",
                    config.namespace, err
                );
                KeyedState {
                    entries: IndexMap::new(),
                    version: 0,
                }
            }
        };

        Ok(Self {
            config,
            persistence,
            notifier,
            state: Mutex::new(state),
        })
    }

    /// Opens the store over a local medium using the configured codec.
    pub fn open_local(
        config: KeyedStoreConfig,
        medium: Arc<dyn LocalMedium>,
        notifier: Notifier,
    ) -> Result<Self> {
        let persistence: LocalPersistence<Vec<Entry<T>>> =
            LocalPersistence::new(config.namespace.clone(), medium, config.codec);
        Self::open(config, Box::new(persistence), notifier)
    }

    pub fn name(&self) -> &str {
        &self.config.namespace
    }

    pub fn config(&self) -> &KeyedStoreConfig {
        &self.config
    }

    /// Adds one unit of `key`, revealing the collection.
    pub fn insert(&self, key: &str, payload: T) -> Result<KeyedChange> {
        self.insert_with(key, payload, 1, InsertMode::Reveal)
    }

    /// Adds `quantity` units of `key`.
    ///
    /// An existing entry keeps its payload and gains `quantity`; there is never
    /// more than one entry per key.
    pub fn insert_with(
        &self,
        key: &str,
        payload: T,
        quantity: u32,
        mode: InsertMode,
    ) -> Result<KeyedChange> {
        validate_key(key)?;
        if quantity == 0 {
            return Err(SyncError::InvalidQuantity {
                key: key.to_string(),
                quantity,
            });
        }

        let change = {
            let mut state = self.state.lock()?;
            let change = match state.entries.get_mut(key) {
                Some(entry) => {
                    entry.quantity = entry.quantity.saturating_add(quantity);
                    KeyedChange::Updated
                }
                None => {
                    state
                        .entries
                        .insert(key.to_string(), Entry::new(key, payload, quantity));
                    KeyedChange::Added
                }
            };
            self.commit_locked(&mut state);
            change
        };

        let kind = match change {
            KeyedChange::Added => NotificationKind::Added,
            _ => NotificationKind::Updated,
        };
        self.notifier.emit(&self.config.namespace, kind, key);
        if mode == InsertMode::Reveal && self.config.reveal_on_insert {
            self.notifier
                .emit(&self.config.namespace, NotificationKind::Reveal, key);
        }
        Ok(change)
    }

    /// Removes `key`. Returns `false` when it was not present.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let removed = {
            let mut state = self.state.lock()?;
            let removed = state.entries.shift_remove(key).is_some();
            if removed {
                self.commit_locked(&mut state);
            }
            removed
        };
        if removed {
            self.notifier
                .emit(&self.config.namespace, NotificationKind::Removed, key);
        }
        Ok(removed)
    }

    /// Sets the quantity of an existing entry.
    ///
    /// Quantities below one are ignored: an entry only leaves the collection
    /// through [`remove`](Self::remove). Unknown keys are ignored.
    pub fn set_quantity(&self, key: &str, quantity: i64) -> Result<bool> {
        if quantity < 1 {
            return Ok(false);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

        let applied = {
            let mut state = self.state.lock()?;
            let applied = match state.entries.get_mut(key) {
                Some(entry) if entry.quantity != quantity => {
                    entry.quantity = quantity;
                    true
                }
                _ => false,
            };
            if applied {
                self.commit_locked(&mut state);
            }
            applied
        };
        if applied {
            self.notifier
                .emit(&self.config.namespace, NotificationKind::Updated, key);
        }
        Ok(applied)
    }

    /// Inserts `key` when absent, removes it when present.
    pub fn toggle(&self, key: &str, payload: T) -> Result<KeyedChange> {
        if self.contains(key)? {
            self.remove(key)?;
            return Ok(KeyedChange::Removed);
        }
        self.insert(key, payload)
    }

    /// Empties the collection and erases its durable snapshot.
    pub fn clear(&self) -> Result<()> {
        {
            let mut state = self.state.lock()?;
            state.entries.clear();
            state.version += 1;
            if let Err(err) = self.persistence.erase() {
                warn!(
                    "failed to erase keyed snapshot: namespace='{}' error='{}'",
                    self.config.namespace, err
                );
            }
        }
        self.notifier
            .emit(&self.config.namespace, NotificationKind::Cleared, "");
        Ok(())
    }

    /// Sum of quantities.
    pub fn count(&self) -> Result<u64> {
        let state = self.state.lock()?;
        Ok(state
            .entries
            .values()
            .map(|entry| u64::from(entry.quantity))
            .sum())
    }

    /// Number of distinct keys.
    pub fn len(&self) -> Result<usize> {
        Ok(self.state.lock()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.state.lock()?.entries.contains_key(key))
    }

    pub fn get(&self, key: &str) -> Result<Option<Entry<T>>> {
        Ok(self.state.lock()?.entries.get(key).cloned())
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> Result<Vec<Entry<T>>> {
        Ok(self.state.lock()?.entries.values().cloned().collect())
    }

    pub fn version(&self) -> Result<u64> {
        Ok(self.state.lock()?.version)
    }

    /// Read-only copy for consumers such as a filter pipeline.
    pub fn snapshot(&self) -> Result<Snapshot<Vec<Entry<T>>>> {
        let state = self.state.lock()?;
        Ok(Snapshot::new(
            state.version,
            state.entries.values().cloned().collect(),
        ))
    }

    fn commit_locked(&self, state: &mut KeyedState<T>) {
        state.version += 1;
        let snapshot = Snapshot::new(state.version, state.entries.values().cloned().collect());
        if let Err(err) = self.persistence.commit(&snapshot) {
            warn!(
                "failed to persist keyed snapshot: namespace='{}' version={} error='{}'",
                self.config.namespace, state.version, err
            );
        }
    }
}

impl<T> KeyedCollectionStore<T>
where
    T: Priced + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Σ effective price × quantity, in minor units.
    pub fn total(&self) -> Result<u64> {
        let state = self.state.lock()?;
        Ok(state.entries.values().fold(0u64, |acc, entry| {
            acc.saturating_add(
                entry
                    .payload
                    .effective_price()
                    .saturating_mul(u64::from(entry.quantity)),
            )
        }))
    }
}

/// Rebuilds the key index from a persisted entry list, merging duplicate keys
/// and lifting zero quantities to one.
fn index_entries<T>(entries: Vec<Entry<T>>) -> IndexMap<String, Entry<T>> {
    let mut indexed: IndexMap<String, Entry<T>> = IndexMap::with_capacity(entries.len());
    for mut entry in entries {
        if entry.key.trim().is_empty() {
            continue;
        }
        entry.quantity = entry.quantity.max(1);
        match indexed.get_mut(&entry.key) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(entry.quantity);
            }
            None => {
                indexed.insert(entry.key.clone(), entry);
            }
        }
    }
    indexed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Product;
    use crate::storage::MemoryMedium;

    fn cart() -> KeyedCollectionStore<Product> {
        KeyedCollectionStore::open_local(
            KeyedStoreConfig::new("cart"),
            Arc::new(MemoryMedium::new()),
            Notifier::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_index_entries_merges_duplicates() {
        let indexed = index_entries(vec![
            Entry::new("a", 1u8, 2),
            Entry::new("b", 2u8, 0),
            Entry::new("a", 1u8, 3),
            Entry::new(" ", 9u8, 1),
        ]);
        assert_eq!(indexed.len(), 2);
        assert_eq!(indexed["a"].quantity, 5);
        assert_eq!(indexed["b"].quantity, 1);
    }

    #[test]
    fn test_insert_rejects_blank_key_and_zero_quantity() {
        let store = cart();
        let product = Product::new("a", "Lamp", 100);
        assert!(matches!(
            store.insert("", product.clone()),
            Err(SyncError::InvalidKey(_))
        ));
        assert!(matches!(
            store.insert_with("a", product, 0, InsertMode::Silent),
            Err(SyncError::InvalidQuantity { .. })
        ));
        assert!(store.is_empty().unwrap());
        assert_eq!(store.version().unwrap(), 0);
    }

    #[test]
    fn test_set_quantity_unchanged_value_is_noop() {
        let store = cart();
        store
            .insert_with("a", Product::new("a", "Lamp", 100), 2, InsertMode::Silent)
            .unwrap();
        let version = store.version().unwrap();
        assert!(!store.set_quantity("a", 2).unwrap());
        assert!(!store.set_quantity("missing", 4).unwrap());
        assert_eq!(store.version().unwrap(), version);
    }
}
