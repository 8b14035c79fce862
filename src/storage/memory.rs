//! In-memory authoritative store with fault injection.

use super::remote::{CountFilter, RemoteStore};
use crate::core::{OrderedItem, Result, SyncError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;

#[derive(Debug, Default)]
struct FaultPlan {
    /// Countdown of `write_one` calls; the call that sees `1` fails.
    fail_write_in: Option<usize>,
    fail_ids: HashSet<String>,
    fail_loads: bool,
    fail_batches: bool,
    fail_counts: bool,
    fail_deletes: bool,
}

pub struct InMemoryRemoteStore<T> {
    collections: Mutex<HashMap<String, Vec<OrderedItem<T>>>>,
    faults: Mutex<FaultPlan>,
    batch: bool,
    item_writes: AtomicUsize,
    paused: watch::Sender<bool>,
}

impl<T> Default for InMemoryRemoteStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InMemoryRemoteStore<T> {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            collections: Mutex::new(HashMap::new()),
            faults: Mutex::new(FaultPlan::default()),
            batch: true,
            item_writes: AtomicUsize::new(0),
            paused,
        }
    }

    /// A backend without multi-item writes; `write_many` fails with
    /// `Unsupported`.
    pub fn without_batch() -> Self {
        Self {
            batch: false,
            ..Self::new()
        }
    }

    pub fn seed(&self, collection: &str, items: Vec<OrderedItem<T>>) {
        if let Ok(mut collections) = self.collections.lock() {
            collections.insert(collection.to_string(), items);
        }
    }

    /// Number of items successfully written so far (batched items included).
    pub fn write_count(&self) -> usize {
        self.item_writes.load(Ordering::SeqCst)
    }

    /// The `n`-th `write_one` from now fails (1 = the next one).
    pub fn fail_nth_write(&self, n: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.fail_write_in = (n > 0).then_some(n);
        }
    }

    pub fn fail_writes_for(&self, id: &str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.fail_ids.insert(id.to_string());
        }
    }

    pub fn fail_loads(&self, fail: bool) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.fail_loads = fail;
        }
    }

    pub fn fail_batches(&self, fail: bool) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.fail_batches = fail;
        }
    }

    pub fn fail_counts(&self, fail: bool) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.fail_counts = fail;
        }
    }

    pub fn fail_deletes(&self, fail: bool) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.fail_deletes = fail;
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            *faults = FaultPlan::default();
        }
    }

    /// Holds every write (`write_one`, `write_many`, `delete_one`) until
    /// [`resume_writes`](Self::resume_writes) is called.
    pub fn pause_writes(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume_writes(&self) {
        self.paused.send_replace(false);
    }

    async fn wait_while_paused(&self) {
        let mut rx = self.paused.subscribe();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    fn check_write_fault(&self, collection: &str, id: &str) -> Result<()> {
        let mut faults = self.faults.lock()?;
        if faults.fail_ids.contains(id) {
            return Err(SyncError::Remote(format!(
                "injected write failure for '{}:{}'",
                collection, id
            )));
        }
        if let Some(remaining) = faults.fail_write_in {
            if remaining <= 1 {
                faults.fail_write_in = None;
                return Err(SyncError::Remote(format!(
                    "injected write failure for '{}:{}'",
                    collection, id
                )));
            }
            faults.fail_write_in = Some(remaining - 1);
        }
        Ok(())
    }
}

impl<T: Clone> InMemoryRemoteStore<T> {
    /// Authoritative contents of a collection, ascending by position.
    pub fn items(&self, collection: &str) -> Vec<OrderedItem<T>> {
        let mut items = self
            .collections
            .lock()
            .ok()
            .and_then(|collections| collections.get(collection).cloned())
            .unwrap_or_default();
        items.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        items
    }

    fn upsert(&self, collection: &str, item: &OrderedItem<T>) -> Result<()> {
        let mut collections = self.collections.lock()?;
        let items = collections.entry(collection.to_string()).or_default();
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => items.push(item.clone()),
        }
        self.item_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl<T> RemoteStore<T> for InMemoryRemoteStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn load(&self, collection: &str) -> Result<Vec<OrderedItem<T>>> {
        if self.faults.lock()?.fail_loads {
            return Err(SyncError::Remote(format!(
                "injected load failure for '{}'",
                collection
            )));
        }
        Ok(self.items(collection))
    }

    async fn write_one(&self, collection: &str, item: &OrderedItem<T>) -> Result<()> {
        self.wait_while_paused().await;
        self.check_write_fault(collection, &item.id)?;
        self.upsert(collection, item)
    }

    async fn write_many(&self, collection: &str, items: &[OrderedItem<T>]) -> Result<()> {
        if !self.batch {
            return Err(SyncError::Unsupported(
                "batched writes are not available on this backend".to_string(),
            ));
        }
        self.wait_while_paused().await;
        {
            let faults = self.faults.lock()?;
            let blocked = items.iter().find(|item| faults.fail_ids.contains(&item.id));
            if faults.fail_batches || blocked.is_some() {
                return Err(SyncError::Remote(format!(
                    "injected batch failure for '{}'",
                    collection
                )));
            }
        }
        for item in items {
            self.upsert(collection, item)?;
        }
        Ok(())
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<()> {
        self.wait_while_paused().await;
        if self.faults.lock()?.fail_deletes {
            return Err(SyncError::Remote(format!(
                "injected delete failure for '{}:{}'",
                collection, id
            )));
        }
        let mut collections = self.collections.lock()?;
        if let Some(items) = collections.get_mut(collection) {
            items.retain(|item| item.id != id);
        }
        Ok(())
    }

    async fn count(&self, collection: &str, filter: CountFilter) -> Result<usize> {
        if self.faults.lock()?.fail_counts {
            return Err(SyncError::Remote(format!(
                "injected count failure for '{}'",
                collection
            )));
        }
        let collections = self.collections.lock()?;
        Ok(collections
            .get(collection)
            .map(|items| items.iter().filter(|item| filter.matches(item)).count())
            .unwrap_or(0))
    }

    fn supports_batch(&self) -> bool {
        self.batch
    }
}
