use crate::core::{OrderedItem, Result};
use async_trait::async_trait;

/// Predicate accepted by [`RemoteStore::count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountFilter {
    All,
    Active,
}

impl CountFilter {
    pub fn matches<T>(&self, item: &OrderedItem<T>) -> bool {
        match self {
            Self::All => true,
            Self::Active => item.is_active(),
        }
    }
}

/// Authoritative store backing ordered collections.
///
/// Every call may suspend. Nothing here is transactional across items except
/// `write_many` on backends whose `supports_batch()` is `true`. `write_one` is
/// a full replace of the item with the same id.
#[async_trait]
pub trait RemoteStore<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    async fn load(&self, collection: &str) -> Result<Vec<OrderedItem<T>>>;

    async fn write_one(&self, collection: &str, item: &OrderedItem<T>) -> Result<()>;

    async fn write_many(&self, collection: &str, items: &[OrderedItem<T>]) -> Result<()>;

    async fn delete_one(&self, collection: &str, id: &str) -> Result<()>;

    async fn count(&self, collection: &str, filter: CountFilter) -> Result<usize>;

    fn supports_batch(&self) -> bool {
        true
    }
}
