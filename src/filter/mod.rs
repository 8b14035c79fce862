//! Read-only filtered views over keyed collection snapshots.

use crate::catalog::Filterable;
use crate::core::{Entry, Result, Snapshot};
use crate::sync::KeyedCollectionStore;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Conjunction of optional predicates. An empty criteria set matches
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub brands: Vec<String>,
    /// Inclusive bounds on the effective price.
    #[serde(default)]
    pub min_price: Option<u64>,
    #[serde(default)]
    pub max_price: Option<u64>,
    #[serde(default)]
    pub in_stock_only: bool,
    #[serde(default)]
    pub search: Option<String>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: &str) -> Self {
        self.categories.push(category.to_string());
        self
    }

    pub fn brand(mut self, brand: &str) -> Self {
        self.brands.push(brand.to_string());
        self
    }

    pub fn price_range(mut self, min: u64, max: u64) -> Self {
        self.min_price = Some(min);
        self.max_price = Some(max);
        self
    }

    pub fn in_stock_only(mut self) -> Self {
        self.in_stock_only = true;
        self
    }

    pub fn search(mut self, term: &str) -> Self {
        let term = term.trim();
        self.search = (!term.is_empty()).then(|| term.to_lowercase());
        self
    }

    pub fn matches<T: Filterable>(&self, payload: &T) -> bool {
        if !self.categories.is_empty()
            && !self
                .categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(payload.category()))
        {
            return false;
        }
        if !self.brands.is_empty()
            && !self
                .brands
                .iter()
                .any(|b| b.eq_ignore_ascii_case(payload.brand()))
        {
            return false;
        }

        let price = payload.effective_price();
        if self.min_price.is_some_and(|min| price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| price > max) {
            return false;
        }
        if self.in_stock_only && !payload.in_stock() {
            return false;
        }
        // Deserialized terms keep their original case and padding.
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => payload
                .search_text()
                .to_lowercase()
                .contains(&term.to_lowercase()),
            _ => true,
        }
    }
}

/// Polls a keyed store and re-filters only when its snapshot version or the
/// criteria changed.
#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    criteria: FilterCriteria,
    seen_version: Option<u64>,
}

impl FilterPipeline {
    pub fn new(criteria: FilterCriteria) -> Self {
        Self {
            criteria,
            seen_version: None,
        }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Replaces the criteria; the next poll always yields a view.
    pub fn configure(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
        self.seen_version = None;
    }

    /// Filters a snapshot, preserving its order.
    pub fn apply<T>(&self, snapshot: &Snapshot<Vec<Entry<T>>>) -> Vec<Entry<T>>
    where
        T: Filterable + Clone,
    {
        snapshot
            .data
            .iter()
            .filter(|entry| self.criteria.matches(&entry.payload))
            .cloned()
            .collect()
    }

    /// `Some(view)` when the store changed since the previous poll.
    pub fn poll<T>(&mut self, store: &KeyedCollectionStore<T>) -> Result<Option<Vec<Entry<T>>>>
    where
        T: Filterable + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let snapshot = store.snapshot()?;
        if self.seen_version == Some(snapshot.version) {
            return Ok(None);
        }
        self.seen_version = Some(snapshot.version);
        Ok(Some(self.apply(&snapshot)))
    }
}
