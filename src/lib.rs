// ============================================================================
// Storefront Sync Library
// ============================================================================

pub mod catalog;
pub mod config;
pub mod core;
pub mod facade;
pub mod filter;
pub mod prelude;
pub mod storage;
pub mod sync;

// Re-export main types for convenience
pub use catalog::{Category, Filterable, HeroItem, Priced, Product};
pub use config::{
    AdmissionRule, DEFAULT_CATEGORY_CAPACITY, DEFAULT_HERO_CAPACITY, KeyedStoreConfig,
    OrderedStoreConfig, StorefrontConfig,
};
pub use crate::core::{Direction, Entry, OrderedItem, Result, Snapshot, SyncError};
pub use facade::{Cart, CategoryList, HeroCarousel, Storefront, Wishlist};
pub use filter::{FilterCriteria, FilterPipeline};

// Re-export persistence backends
pub use storage::{
    CountFilter, FileMedium, InMemoryRemoteStore, JsonFileRemoteStore, LocalMedium,
    LocalPersistence, MemoryMedium, PersistenceAdapter, RemoteStore, SnapshotCodec,
};

// Re-export store engines
pub use sync::{
    AdmissionOutcome, CommitMode, CommitReport, CommitStrategy, InsertMode, IntentLog,
    KeyedChange, KeyedCollectionStore, Notification, NotificationKind, Notifier, Optimistic,
    OptimisticPhase, OrderedCollectionStore, OrderedUpdate, ReorderOutcome, SkipReason,
    StorePhase,
};
