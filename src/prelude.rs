//! Recommended API entrypoints grouped by abstraction level.
//!
//! `app` is the default for UI code that only needs the storefront handles.
//! `advanced` exposes the store engines and backends for custom collections.

pub mod app {
    //! Surface for UI components.
    //!
    //! Intended usage:
    //! - open a `Storefront` once and pass its store handles around,
    //! - subscribe to `Notification`s for toasts and panel reveals,
    //! - drive ordered lists with `Direction` and inspect the outcomes.
    pub use crate::{
        AdmissionOutcome, Direction, FilterCriteria, FilterPipeline, Notification,
        NotificationKind, Product, ReorderOutcome, Storefront, StorefrontConfig,
    };
}

pub mod advanced {
    //! Store engines, persistence seams and backends.
    pub use crate::storage;
    pub use crate::sync::{
        IntentLog, KeyedCollectionStore, Notifier, Optimistic, OrderedCollectionStore,
    };
}
