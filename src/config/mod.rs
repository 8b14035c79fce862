use crate::core::{Result, SyncError};
use crate::storage::SnapshotCodec;
use crate::sync::CommitStrategy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default limit of active navigation categories.
pub const DEFAULT_CATEGORY_CAPACITY: usize = 9;

/// Default limit of items in the hero carousel.
pub const DEFAULT_HERO_CAPACITY: usize = 5;

fn default_true() -> bool {
    true
}

/// Keyed store configuration (cart, wishlist)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedStoreConfig {
    /// Namespace of the snapshot in the local medium
    pub namespace: String,

    /// Emit a reveal signal after non-silent inserts
    #[serde(default = "default_true")]
    pub reveal_on_insert: bool,

    /// Snapshot encoding
    #[serde(default)]
    pub codec: SnapshotCodec,
}

impl KeyedStoreConfig {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            reveal_on_insert: true,
            codec: SnapshotCodec::Json,
        }
    }

    /// Set whether inserts reveal the collection
    pub fn reveal_on_insert(mut self, reveal: bool) -> Self {
        self.reveal_on_insert = reveal;
        self
    }

    /// Set the snapshot codec
    pub fn codec(mut self, codec: SnapshotCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(SyncError::Config("namespace cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Which items count against an ordered collection's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionRule {
    /// Items whose `active` flag is `true`.
    #[default]
    ActiveFlag,
    /// Every item in the collection.
    Membership,
}

/// Ordered store configuration (navigation categories, hero items)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedStoreConfig {
    /// Collection name in the remote store
    pub collection: String,

    /// Maximum number of admitted items
    #[serde(default)]
    pub capacity: Option<usize>,

    /// Admission predicate used by the capacity check
    #[serde(default)]
    pub admission: AdmissionRule,

    /// How multi-item intents are committed
    #[serde(default)]
    pub commit_strategy: CommitStrategy,
}

impl OrderedStoreConfig {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            capacity: None,
            admission: AdmissionRule::ActiveFlag,
            commit_strategy: CommitStrategy::Auto,
        }
    }

    /// Navigation categories: at most nine active entries.
    pub fn navigation_categories() -> Self {
        Self::new("categories").capacity(DEFAULT_CATEGORY_CAPACITY)
    }

    /// Hero carousel: at most five members.
    pub fn hero_items() -> Self {
        Self::new("hero_items")
            .capacity(DEFAULT_HERO_CAPACITY)
            .admission(AdmissionRule::Membership)
    }

    /// Set the capacity limit
    pub fn capacity(mut self, limit: usize) -> Self {
        self.capacity = Some(limit);
        self
    }

    /// Remove the capacity limit
    pub fn unbounded(mut self) -> Self {
        self.capacity = None;
        self
    }

    /// Set the admission rule
    pub fn admission(mut self, rule: AdmissionRule) -> Self {
        self.admission = rule;
        self
    }

    /// Set the commit strategy
    pub fn commit_strategy(mut self, strategy: CommitStrategy) -> Self {
        self.commit_strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(SyncError::Config("collection cannot be empty".to_string()));
        }
        if self.capacity == Some(0) {
            return Err(SyncError::Config(format!(
                "capacity of '{}' must be > 0",
                self.collection
            )));
        }
        Ok(())
    }
}

/// Configuration of every store a storefront opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorefrontConfig {
    pub cart: KeyedStoreConfig,
    pub wishlist: KeyedStoreConfig,
    pub categories: OrderedStoreConfig,
    pub hero: OrderedStoreConfig,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            cart: KeyedStoreConfig::new("cart"),
            wishlist: KeyedStoreConfig::new("wishlist").reveal_on_insert(false),
            categories: OrderedStoreConfig::navigation_categories(),
            hero: OrderedStoreConfig::hero_items(),
        }
    }
}

impl StorefrontConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SyncError::Config(format!("Invalid storefront config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.cart.validate()?;
        self.wishlist.validate()?;
        self.categories.validate()?;
        self.hero.validate()?;

        if self.cart.namespace == self.wishlist.namespace {
            return Err(SyncError::Config(format!(
                "cart and wishlist share namespace '{}'",
                self.cart.namespace
            )));
        }
        if self.categories.collection == self.hero.collection {
            return Err(SyncError::Config(format!(
                "categories and hero items share collection '{}'",
                self.hero.collection
            )));
        }
        Ok(())
    }
}
