use crate::core::{Result, SyncError};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Byte encoding used for local snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotCodec {
    #[default]
    Json,
    MessagePack,
}

impl SnapshotCodec {
    pub fn encode<S: Serialize>(&self, value: &S) -> Result<Vec<u8>> {
        match self {
            Self::Json => serde_json::to_vec(value)
                .map_err(|e| SyncError::Codec(format!("Failed to encode JSON snapshot: {}", e))),
            Self::MessagePack => rmp_serde::to_vec_named(value).map_err(|e| {
                SyncError::Codec(format!("Failed to encode MessagePack snapshot: {}", e))
            }),
        }
    }

    pub fn decode<S: DeserializeOwned>(&self, bytes: &[u8]) -> Result<S> {
        match self {
            Self::Json => serde_json::from_slice(bytes)
                .map_err(|e| SyncError::Codec(format!("Failed to decode JSON snapshot: {}", e))),
            Self::MessagePack => rmp_serde::from_slice(bytes).map_err(|e| {
                SyncError::Codec(format!("Failed to decode MessagePack snapshot: {}", e))
            }),
        }
    }
}
