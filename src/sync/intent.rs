use crate::core::{OrderedItem, Result, SyncError};
use crate::storage::RemoteStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{Level, event};

/// How a multi-item intent reaches the authoritative store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStrategy {
    /// One `write_many` when the backend supports it, sequential otherwise.
    #[default]
    Auto,
    /// Always one `write_one` per item in ascending position order.
    Sequential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    Batched,
    Sequential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReport {
    pub mode: CommitMode,
    pub written: usize,
}

/// Desired final state of an ordered collection after a multi-item mutation.
#[derive(Debug, Clone)]
pub struct IntentLog<T> {
    collection: String,
    desired: Vec<OrderedItem<T>>,
    recorded_at: DateTime<Utc>,
}

impl<T> IntentLog<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Records `desired`, sorted ascending by position.
    pub fn record(collection: impl Into<String>, mut desired: Vec<OrderedItem<T>>) -> Self {
        desired.sort_by_key(|item| item.position);
        Self {
            collection: collection.into(),
            desired,
            recorded_at: Utc::now(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn desired(&self) -> &[OrderedItem<T>] {
        &self.desired
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn len(&self) -> usize {
        self.desired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.desired.is_empty()
    }

    /// Pushes the intent to `remote`.
    ///
    /// Sequential application stops at the first failed write; the error is a
    /// `PartialCommit` carrying how many writes landed before it.
    pub async fn apply(
        &self,
        remote: &dyn RemoteStore<T>,
        strategy: CommitStrategy,
    ) -> Result<CommitReport> {
        if self.desired.is_empty() {
            return Ok(CommitReport {
                mode: CommitMode::Sequential,
                written: 0,
            });
        }

        if strategy == CommitStrategy::Auto && remote.supports_batch() {
            remote
                .write_many(&self.collection, &self.desired)
                .await
                .map_err(|err| self.partial(0, err))?;
            event!(
                Level::DEBUG,
                collection = %self.collection,
                items = self.desired.len(),
                "intent applied as one batch"
            );
            return Ok(CommitReport {
                mode: CommitMode::Batched,
                written: self.desired.len(),
            });
        }

        for (written, item) in self.desired.iter().enumerate() {
            if let Err(err) = remote.write_one(&self.collection, item).await {
                event!(
                    Level::WARN,
                    collection = %self.collection,
                    item = %item.id,
                    written,
                    error = %err,
                    "sequential intent write failed"
                );
                return Err(self.partial(written, err));
            }
        }
        Ok(CommitReport {
            mode: CommitMode::Sequential,
            written: self.desired.len(),
        })
    }

    fn partial(&self, written: usize, err: SyncError) -> SyncError {
        SyncError::PartialCommit {
            collection: self.collection.clone(),
            written,
            total: self.desired.len(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryRemoteStore;

    fn intent() -> IntentLog<&'static str> {
        IntentLog::record(
            "nav",
            vec![
                OrderedItem::new("c", "C", 3),
                OrderedItem::new("a", "A", 1),
                OrderedItem::new("b", "B", 2),
            ],
        )
    }

    #[test]
    fn test_record_sorts_by_position() {
        let ids: Vec<_> = intent().desired().iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_auto_uses_batch_when_available() {
        let remote = InMemoryRemoteStore::new();
        let report = tokio_test::block_on(intent().apply(&remote, CommitStrategy::Auto)).unwrap();
        assert_eq!(report.mode, CommitMode::Batched);
        assert_eq!(remote.items("nav").len(), 3);
    }

    #[test]
    fn test_sequential_stops_at_first_failure() {
        let remote = InMemoryRemoteStore::without_batch();
        remote.fail_nth_write(2);
        let err = tokio_test::block_on(intent().apply(&remote, CommitStrategy::Auto)).unwrap_err();
        match err {
            SyncError::PartialCommit { written, total, .. } => {
                assert_eq!(written, 1);
                assert_eq!(total, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        let stored: Vec<_> = remote.items("nav").into_iter().map(|i| i.id).collect();
        assert_eq!(stored, vec!["a"]);
    }
}
