pub mod intent;
pub mod keyed;
pub mod notify;
pub mod optimistic;
pub mod ordered;

pub use intent::{CommitMode, CommitReport, CommitStrategy, IntentLog};
pub use keyed::{InsertMode, KeyedChange, KeyedCollectionStore};
pub use notify::{Notification, NotificationKind, Notifier};
pub use optimistic::{Optimistic, OptimisticPhase};
pub use ordered::{
    AdmissionOutcome, OrderedCollectionStore, OrderedUpdate, ReorderOutcome, SkipReason,
    StorePhase,
};
