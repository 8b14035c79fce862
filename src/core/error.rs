use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid quantity {quantity} for key '{key}'")]
    InvalidQuantity { key: String, quantity: u32 },

    #[error("Item '{0}' not found in collection '{1}'")]
    NotFound(String, String),

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Local medium error: {0}")]
    Medium(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Partial commit in '{collection}': {written} of {total} writes applied: {reason}")]
    PartialCommit {
        collection: String,
        written: usize,
        total: usize,
        reason: String,
    },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl<T> From<std::sync::PoisonError<T>> for SyncError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}
