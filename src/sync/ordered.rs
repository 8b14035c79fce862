//! Ordered collection cached in front of an authoritative remote store.
//!
//! Mutations are applied to the in-memory list first. Multi-item mutations
//! (reorder, compaction, renumbering) record an [`IntentLog`] and push it to
//! the remote; a failure part way reloads the authoritative state instead of
//! compensating. Only one multi-item sequence may be in flight per store, and
//! none starts while a single-item write is still unacknowledged.

use super::intent::{CommitStrategy, IntentLog};
use super::notify::{NotificationKind, Notifier};
use super::optimistic::Optimistic;
use crate::config::{AdmissionRule, OrderedStoreConfig};
use crate::core::{Direction, OrderedItem, Result, Snapshot, SyncError, validate_key};
use crate::storage::{CountFilter, RemoteStore};
use std::sync::{Arc, Mutex};
use tracing::{Instrument, Level, event, info_span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    Loading,
    Ready,
    Reordering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The initial load has not completed.
    NotReady,
    /// Another reorder or compaction is in flight.
    Busy,
    NotFound,
    /// Already first (moving up) or last (moving down).
    AtBoundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderOutcome {
    Applied,
    Skipped(SkipReason),
    /// The remote rejected part of the sequence. `reloaded` is `false` when
    /// the authoritative reload also failed and the pre-operation snapshot
    /// was restored instead.
    RolledBack { reloaded: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Applied,
    Unchanged,
    CapacityExceeded { limit: usize },
    RolledBack,
    Skipped(SkipReason),
}

pub type OrderedUpdate<T> = Optimistic<Vec<OrderedItem<T>>>;

struct OrderedState<T> {
    phase: StorePhase,
    items: Vec<OrderedItem<T>>,
    version: u64,
    // Admissions written but not yet acknowledged; counted against capacity.
    pending_admissions: usize,
    // Single-item writes in flight. Sequences wait for them to settle so an
    // intent never carries an unconfirmed flag or item.
    pending_writes: usize,
    last_update: Option<OrderedUpdate<T>>,
}

impl<T> OrderedState<T> {
    fn gate(&self) -> Option<SkipReason> {
        match self.phase {
            StorePhase::Loading => Some(SkipReason::NotReady),
            StorePhase::Reordering => Some(SkipReason::Busy),
            StorePhase::Ready => None,
        }
    }

    fn sequence_gate(&self) -> Option<SkipReason> {
        self.gate()
            .or((self.pending_writes > 0).then_some(SkipReason::Busy))
    }

    fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    fn release_write(&mut self, admission: bool) {
        self.pending_writes = self.pending_writes.saturating_sub(1);
        if admission {
            self.pending_admissions = self.pending_admissions.saturating_sub(1);
        }
    }
}

/// Restores the pre-operation list and drops back to `Loading` if a sequence
/// future is dropped before it settles. The remote may hold part of the
/// sequence, so commands wait for the next [`load`](OrderedCollectionStore::load).
struct FlightGuard<'a, T> {
    state: &'a Mutex<OrderedState<T>>,
    base: Snapshot<Vec<OrderedItem<T>>>,
}

impl<T> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if state.phase == StorePhase::Reordering {
                state.items = std::mem::take(&mut self.base.data);
                state.phase = StorePhase::Loading;
                state.version += 1;
                state.last_update = None;
                event!(
                    Level::WARN,
                    snapshot_version = self.base.version,
                    "sequence abandoned mid-flight, cache needs a reload"
                );
            }
        }
    }
}

struct Flight<'a, T> {
    intent: IntentLog<T>,
    guard: FlightGuard<'a, T>,
}

/// Counts one single-item write as in flight until it settles or its future
/// is dropped.
struct WriteGuard<'a, T> {
    state: &'a Mutex<OrderedState<T>>,
    admission: bool,
    settled: bool,
}

impl<T> WriteGuard<'_, T> {
    fn settle(&mut self, state: &mut OrderedState<T>) {
        if !self.settled {
            state.release_write(self.admission);
            self.settled = true;
        }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            state.release_write(self.admission);
        }
    }
}

pub struct OrderedCollectionStore<T>
where
    T: Send + Sync + 'static,
{
    config: OrderedStoreConfig,
    remote: Arc<dyn RemoteStore<T>>,
    notifier: Notifier,
    state: Mutex<OrderedState<T>>,
}

impl<T> OrderedCollectionStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an empty store in the `Loading` phase. Call
    /// [`load`](Self::load) before issuing commands.
    pub fn new(
        config: OrderedStoreConfig,
        remote: Arc<dyn RemoteStore<T>>,
        notifier: Notifier,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            remote,
            notifier,
            state: Mutex::new(OrderedState {
                phase: StorePhase::Loading,
                items: Vec::new(),
                version: 0,
                pending_admissions: 0,
                pending_writes: 0,
                last_update: None,
            }),
        })
    }

    pub async fn open(
        config: OrderedStoreConfig,
        remote: Arc<dyn RemoteStore<T>>,
        notifier: Notifier,
    ) -> Result<Self> {
        let store = Self::new(config, remote, notifier)?;
        store.load().await?;
        Ok(store)
    }

    pub fn name(&self) -> &str {
        &self.config.collection
    }

    pub fn config(&self) -> &OrderedStoreConfig {
        &self.config
    }

    /// Replaces the cache with the authoritative contents.
    ///
    /// A load that completes while a sequence is in flight is discarded; the
    /// sequence settles the cache itself.
    pub async fn load(&self) -> Result<usize> {
        let items = sort_by_position(self.remote.load(&self.config.collection).await?);
        let count = items.len();
        {
            let mut state = self.state.lock()?;
            if state.phase == StorePhase::Reordering {
                event!(
                    Level::DEBUG,
                    collection = %self.config.collection,
                    "load discarded while a sequence is in flight"
                );
                return Ok(state.items.len());
            }
            state.items = items;
            state.phase = StorePhase::Ready;
            state.version += 1;
        }
        self.notifier.emit(
            &self.config.collection,
            NotificationKind::Reloaded,
            format!("{} items", count),
        );
        Ok(count)
    }

    /// Items ascending by position.
    pub fn list(&self) -> Result<Vec<OrderedItem<T>>> {
        Ok(self.state.lock()?.items.clone())
    }

    pub fn get(&self, id: &str) -> Result<Option<OrderedItem<T>>> {
        let state = self.state.lock()?;
        Ok(state.items.iter().find(|item| item.id == id).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.state.lock()?.items.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Admitted items in the local cache.
    pub fn admitted_count(&self) -> Result<usize> {
        let state = self.state.lock()?;
        Ok(state
            .items
            .iter()
            .filter(|item| self.is_admitted(item))
            .count())
    }

    pub fn phase(&self) -> Result<StorePhase> {
        Ok(self.state.lock()?.phase)
    }

    pub fn version(&self) -> Result<u64> {
        Ok(self.state.lock()?.version)
    }

    /// The most recent optimistic mutation and how it settled.
    pub fn last_update(&self) -> Result<Option<OrderedUpdate<T>>> {
        Ok(self.state.lock()?.last_update.clone())
    }

    pub fn snapshot(&self) -> Result<Snapshot<Vec<OrderedItem<T>>>> {
        let state = self.state.lock()?;
        Ok(Snapshot::new(state.version, state.items.clone()))
    }

    /// Swaps `id` with its neighbour in `direction` and renumbers the list.
    pub async fn reorder(&self, id: &str, direction: Direction) -> Result<ReorderOutcome> {
        let flight = match self.start_sequence(|items| {
            let index = items
                .iter()
                .position(|item| item.id == id)
                .ok_or(SkipReason::NotFound)?;
            let adjacent = direction
                .adjacent(index, items.len())
                .ok_or(SkipReason::AtBoundary)?;
            items.swap(index, adjacent);
            Ok(())
        })? {
            Ok(flight) => flight,
            Err(reason) => return Ok(ReorderOutcome::Skipped(reason)),
        };

        let span = info_span!(
            "ordered.reorder",
            collection = %self.config.collection,
            item = %id,
            direction = %direction
        );
        let result = flight
            .intent
            .apply(self.remote.as_ref(), self.config.commit_strategy)
            .instrument(span)
            .await
            .map(|_| ());
        self.finish_sequence("reorder", flight, result).await
    }

    /// Removes `id` from the remote collection and renumbers what remains.
    pub async fn remove_and_compact(&self, id: &str) -> Result<ReorderOutcome> {
        let flight = match self.start_sequence(|items| {
            let index = items
                .iter()
                .position(|item| item.id == id)
                .ok_or(SkipReason::NotFound)?;
            items.remove(index);
            Ok(())
        })? {
            Ok(flight) => flight,
            Err(reason) => return Ok(ReorderOutcome::Skipped(reason)),
        };

        let span = info_span!(
            "ordered.remove_and_compact",
            collection = %self.config.collection,
            item = %id
        );
        let result: Result<()> = async {
            self.remote
                .delete_one(&self.config.collection, id)
                .await
                .map_err(|err| SyncError::PartialCommit {
                    collection: self.config.collection.clone(),
                    written: 0,
                    total: flight.intent.len() + 1,
                    reason: err.to_string(),
                })?;
            flight
                .intent
                .apply(self.remote.as_ref(), self.config.commit_strategy)
                .await
                .map(|_| ())
        }
        .instrument(span)
        .await;
        self.finish_sequence("remove_and_compact", flight, result)
            .await
    }

    /// Renumbers the whole collection `1..=N` in display order and writes it
    /// as one batch when the backend allows.
    pub async fn fix_sequential_order(&self) -> Result<ReorderOutcome> {
        let flight = match self.start_sequence(|_| Ok(()))? {
            Ok(flight) => flight,
            Err(reason) => return Ok(ReorderOutcome::Skipped(reason)),
        };

        let span = info_span!(
            "ordered.fix_sequential_order",
            collection = %self.config.collection,
            items = flight.intent.len()
        );
        let result = flight
            .intent
            .apply(self.remote.as_ref(), CommitStrategy::Auto)
            .instrument(span)
            .await
            .map(|_| ());
        self.finish_sequence("fix_sequential_order", flight, result)
            .await
    }

    /// Flips the `active` flag of one item.
    ///
    /// Admitting checks capacity first and never writes when the limit is
    /// reached. A failed write reverts only this flag.
    pub async fn set_admitted(&self, id: &str, admitted: bool) -> Result<AdmissionOutcome> {
        validate_key(id)?;
        {
            let state = self.state.lock()?;
            if let Some(reason) = state.gate() {
                return Ok(AdmissionOutcome::Skipped(reason));
            }
            match state.items.iter().find(|item| item.id == id) {
                None => return Ok(AdmissionOutcome::Skipped(SkipReason::NotFound)),
                Some(item) if item.active == Some(admitted) => {
                    return Ok(AdmissionOutcome::Unchanged);
                }
                Some(_) => {}
            }
        }

        let counts = admitted && self.config.admission == AdmissionRule::ActiveFlag;
        if counts {
            if let Some(limit) = self.capacity_reached().await? {
                self.reject_over_capacity(id, limit);
                return Ok(AdmissionOutcome::CapacityExceeded { limit });
            }
        }

        let (updated, previous, mut write) = {
            let mut state = self.state.lock()?;
            if let Some(reason) = state.gate() {
                return Ok(AdmissionOutcome::Skipped(reason));
            }
            let base = state.items.clone();
            let Some(item) = state.items.iter_mut().find(|item| item.id == id) else {
                return Ok(AdmissionOutcome::Skipped(SkipReason::NotFound));
            };
            let previous = item.active;
            item.active = Some(admitted);
            let updated = item.clone();
            if counts {
                state.pending_admissions += 1;
            }
            state.pending_writes += 1;
            let local = state.items.clone();
            state.last_update = Some(Optimistic::pending(base, local));
            let write = WriteGuard {
                state: &self.state,
                admission: counts,
                settled: false,
            };
            (updated, previous, write)
        };

        let span = info_span!(
            "ordered.set_admitted",
            collection = %self.config.collection,
            item = %id,
            admitted
        );
        let result = self
            .remote
            .write_one(&self.config.collection, &updated)
            .instrument(span)
            .await;

        let mut state = self.state.lock()?;
        write.settle(&mut state);
        match result {
            Ok(()) => {
                state.version += 1;
                state.last_update = state.last_update.take().map(Optimistic::confirm);
                drop(state);
                self.notifier.emit(
                    &self.config.collection,
                    NotificationKind::AdmissionChanged,
                    format!("{} active={}", id, admitted),
                );
                Ok(AdmissionOutcome::Applied)
            }
            Err(err) => {
                if let Some(item) = state.items.iter_mut().find(|item| item.id == id) {
                    item.active = previous;
                }
                state.version += 1;
                let restored = state.items.clone();
                state.last_update = state.last_update.take().map(|u| u.roll_back(restored));
                drop(state);
                event!(
                    Level::WARN,
                    collection = %self.config.collection,
                    item = %id,
                    error = %err,
                    "admission write failed, flag reverted"
                );
                self.notifier.emit(
                    &self.config.collection,
                    NotificationKind::AdmissionFailed,
                    format!("{}: {}", id, err),
                );
                Ok(AdmissionOutcome::RolledBack)
            }
        }
    }

    /// Appends `id` after the current highest position.
    pub async fn insert_at_end(&self, id: &str, payload: T) -> Result<AdmissionOutcome> {
        validate_key(id)?;
        {
            let state = self.state.lock()?;
            if let Some(reason) = state.gate() {
                return Ok(AdmissionOutcome::Skipped(reason));
            }
            if state.contains(id) {
                return Ok(AdmissionOutcome::Unchanged);
            }
        }

        if let Some(limit) = self.capacity_reached().await? {
            self.reject_over_capacity(id, limit);
            return Ok(AdmissionOutcome::CapacityExceeded { limit });
        }

        let (item, mut write) = {
            let mut state = self.state.lock()?;
            if let Some(reason) = state.gate() {
                return Ok(AdmissionOutcome::Skipped(reason));
            }
            if state.contains(id) {
                return Ok(AdmissionOutcome::Unchanged);
            }
            let base = state.items.clone();
            let position = state
                .items
                .iter()
                .map(|item| item.position)
                .max()
                .unwrap_or(0)
                .saturating_add(1);
            let mut item = OrderedItem::new(id, payload, position);
            if self.config.admission == AdmissionRule::ActiveFlag {
                item.active = Some(true);
            }
            state.items.push(item.clone());
            state.pending_admissions += 1;
            state.pending_writes += 1;
            let local = state.items.clone();
            state.last_update = Some(Optimistic::pending(base, local));
            let write = WriteGuard {
                state: &self.state,
                admission: true,
                settled: false,
            };
            (item, write)
        };

        let span = info_span!(
            "ordered.insert_at_end",
            collection = %self.config.collection,
            item = %id,
            position = item.position
        );
        let result = self
            .remote
            .write_one(&self.config.collection, &item)
            .instrument(span)
            .await;

        let mut state = self.state.lock()?;
        write.settle(&mut state);
        state.version += 1;
        match result {
            Ok(()) => {
                state.last_update = state.last_update.take().map(Optimistic::confirm);
                drop(state);
                self.notifier.emit(
                    &self.config.collection,
                    NotificationKind::Added,
                    format!("{} at {}", id, item.position),
                );
                Ok(AdmissionOutcome::Applied)
            }
            Err(err) => {
                state.items.retain(|existing| existing.id != id);
                let restored = state.items.clone();
                state.last_update = state.last_update.take().map(|u| u.roll_back(restored));
                drop(state);
                event!(
                    Level::WARN,
                    collection = %self.config.collection,
                    item = %id,
                    error = %err,
                    "insert write failed, item removed"
                );
                self.notifier.emit(
                    &self.config.collection,
                    NotificationKind::AdmissionFailed,
                    format!("{}: {}", id, err),
                );
                Ok(AdmissionOutcome::RolledBack)
            }
        }
    }

    fn is_admitted(&self, item: &OrderedItem<T>) -> bool {
        match self.config.admission {
            AdmissionRule::ActiveFlag => item.is_active(),
            AdmissionRule::Membership => true,
        }
    }

    /// `Some(limit)` when one more admission would exceed the capacity.
    ///
    /// The count comes from the authoritative store; the local cache is used
    /// when the count request fails.
    async fn capacity_reached(&self) -> Result<Option<usize>> {
        let Some(limit) = self.config.capacity else {
            return Ok(None);
        };
        let filter = match self.config.admission {
            AdmissionRule::ActiveFlag => CountFilter::Active,
            AdmissionRule::Membership => CountFilter::All,
        };
        let remote_count = self.remote.count(&self.config.collection, filter).await;

        let state = self.state.lock()?;
        let current = match remote_count {
            Ok(count) => count,
            Err(err) => {
                let local = state
                    .items
                    .iter()
                    .filter(|item| self.is_admitted(item))
                    .count();
                event!(
                    Level::WARN,
                    collection = %self.config.collection,
                    error = %err,
                    local,
                    "remote count failed, using cached admissions"
                );
                local
            }
        };
        Ok((current + state.pending_admissions >= limit).then_some(limit))
    }

    fn reject_over_capacity(&self, id: &str, limit: usize) {
        self.notifier.emit(
            &self.config.collection,
            NotificationKind::CapacityExceeded,
            format!("{} rejected: limit of {} reached", id, limit),
        );
    }

    /// Applies `mutate` to the cached list, renumbers it and enters
    /// `Reordering`. `mutate` must leave the list untouched when it returns
    /// `Err`.
    fn start_sequence<F>(&self, mutate: F) -> Result<std::result::Result<Flight<'_, T>, SkipReason>>
    where
        F: FnOnce(&mut Vec<OrderedItem<T>>) -> std::result::Result<(), SkipReason>,
    {
        let mut state = self.state.lock()?;
        if let Some(reason) = state.sequence_gate() {
            return Ok(Err(reason));
        }
        let base = Snapshot::new(state.version, state.items.clone());
        if let Err(reason) = mutate(&mut state.items) {
            return Ok(Err(reason));
        }
        renumber(&mut state.items);
        state.phase = StorePhase::Reordering;
        let local = state.items.clone();
        state.last_update = Some(Optimistic::pending(base.data.clone(), local.clone()));
        drop(state);

        Ok(Ok(Flight {
            intent: IntentLog::record(self.config.collection.clone(), local),
            guard: FlightGuard {
                state: &self.state,
                base,
            },
        }))
    }

    async fn finish_sequence(
        &self,
        operation: &str,
        flight: Flight<'_, T>,
        result: Result<()>,
    ) -> Result<ReorderOutcome> {
        let err = match result {
            Ok(()) => {
                {
                    let mut state = self.state.lock()?;
                    state.phase = StorePhase::Ready;
                    state.version += 1;
                    state.last_update = state.last_update.take().map(Optimistic::confirm);
                }
                self.notifier.emit(
                    &self.config.collection,
                    NotificationKind::ReorderOk,
                    operation,
                );
                return Ok(ReorderOutcome::Applied);
            }
            Err(err) => err,
        };

        event!(
            Level::WARN,
            collection = %self.config.collection,
            operation,
            error = %err,
            "ordered sequence failed, reloading authoritative state"
        );
        let reload = self.remote.load(&self.config.collection).await;

        let reloaded = {
            let mut state = self.state.lock()?;
            let (restored, reloaded) = match reload {
                Ok(items) => (sort_by_position(items), true),
                Err(load_err) => {
                    event!(
                        Level::ERROR,
                        collection = %self.config.collection,
                        error = %load_err,
                        snapshot_version = flight.guard.base.version,
                        "reload failed, restoring last known-good snapshot"
                    );
                    (flight.guard.base.data.clone(), false)
                }
            };
            state.items = restored.clone();
            state.phase = StorePhase::Ready;
            state.version += 1;
            state.last_update = state.last_update.take().map(|u| u.roll_back(restored));
            reloaded
        };
        self.notifier.emit(
            &self.config.collection,
            NotificationKind::ReorderFailed,
            format!("{}: {}", operation, err),
        );
        Ok(ReorderOutcome::RolledBack { reloaded })
    }
}

fn sort_by_position<T>(mut items: Vec<OrderedItem<T>>) -> Vec<OrderedItem<T>> {
    items.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
    items
}

fn renumber<T>(items: &mut [OrderedItem<T>]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.position = u32::try_from(index + 1).unwrap_or(u32::MAX);
    }
}
