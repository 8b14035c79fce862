use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Added,
    Updated,
    Removed,
    Cleared,
    /// The UI should open the panel showing this collection.
    Reveal,
    ReorderOk,
    ReorderFailed,
    AdmissionChanged,
    AdmissionFailed,
    CapacityExceeded,
    Reloaded,
}

impl NotificationKind {
    /// Kinds a UI should surface as an error toast.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ReorderFailed | Self::AdmissionFailed | Self::CapacityExceeded
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub collection: String,
    pub kind: NotificationKind,
    pub detail: String,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:?}: {}", self.collection, self.kind, self.detail)
    }
}

/// Fan-out of store notifications to any number of subscribers.
///
/// Cloning shares the channel, so several stores can publish on one bus.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn emit(&self, collection: &str, kind: NotificationKind, detail: impl Into<String>) {
        // No subscribers is not an error.
        let _ = self.sender.send(Notification {
            collection: collection.to_string(),
            kind,
            detail: detail.into(),
        });
    }
}
