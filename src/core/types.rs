use super::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rejects empty or whitespace-only identifiers before they reach a store.
pub fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(SyncError::InvalidKey(
            "identifier must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Element of a keyed collection (cart line, wishlist entry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<T> {
    pub key: String,
    pub payload: T,
    pub quantity: u32,
}

impl<T> Entry<T> {
    pub fn new(key: impl Into<String>, payload: T, quantity: u32) -> Self {
        Self {
            key: key.into(),
            payload,
            quantity,
        }
    }
}

/// Element of an ordered collection.
///
/// `position` is one-based. `active` is `None` for collections that have no
/// activation concept (membership in the list is the admission).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedItem<T> {
    pub id: String,
    pub payload: T,
    pub position: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl<T> OrderedItem<T> {
    pub fn new(id: impl Into<String>, payload: T, position: u32) -> Self {
        Self {
            id: id.into(),
            payload,
            position,
            active: None,
        }
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn is_active(&self) -> bool {
        self.active == Some(true)
    }
}

/// Immutable, timestamped copy of a collection's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<S> {
    pub version: u64,
    pub taken_at: DateTime<Utc>,
    pub data: S,
}

impl<S> Snapshot<S> {
    pub fn new(version: u64, data: S) -> Self {
        Self {
            version,
            taken_at: Utc::now(),
            data,
        }
    }

    pub fn into_data(self) -> S {
        self.data
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Index of the neighbour in this direction, `None` at the list edges.
    pub fn adjacent(self, index: usize, len: usize) -> Option<usize> {
        match self {
            Self::Up => index.checked_sub(1),
            Self::Down => {
                let next = index + 1;
                (next < len).then_some(next)
            }
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(SyncError::Config(format!(
                "unknown direction '{}', expected 'up' or 'down'",
                other
            ))),
        }
    }
}
