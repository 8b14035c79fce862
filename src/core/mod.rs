pub mod error;
pub mod types;

pub use error::{Result, SyncError};
pub use types::{Direction, Entry, OrderedItem, Snapshot, validate_key};
