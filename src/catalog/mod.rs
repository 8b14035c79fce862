//! Storefront payloads carried by the stores.
//!
//! Prices are integer minor units (cents). The catalog itself is owned by an
//! external data service; these types are the slices of it the stores keep.

use serde::{Deserialize, Serialize};

pub trait Priced {
    fn base_price(&self) -> u64;

    fn discounted_price(&self) -> Option<u64> {
        None
    }

    /// Discounted price when present and non-zero, base price otherwise.
    fn effective_price(&self) -> u64 {
        match self.discounted_price() {
            Some(price) if price > 0 => price,
            _ => self.base_price(),
        }
    }
}

/// Attributes a filter pipeline can match on.
pub trait Filterable: Priced {
    fn category(&self) -> &str;
    fn brand(&self) -> &str;
    fn in_stock(&self) -> bool;
    /// Text the search term is matched against.
    fn search_text(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: u64,
    #[serde(default)]
    pub discounted_price: Option<u64>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub stock: u32,
}

impl Product {
    pub fn new(id: &str, name: &str, price: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            price,
            discounted_price: None,
            category: String::new(),
            brand: String::new(),
            stock: 0,
        }
    }

    pub fn with_discount(mut self, price: u64) -> Self {
        self.discounted_price = Some(price);
        self
    }

    pub fn in_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn by_brand(mut self, brand: &str) -> Self {
        self.brand = brand.to_string();
        self
    }

    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }
}

impl Priced for Product {
    fn base_price(&self) -> u64 {
        self.price
    }

    fn discounted_price(&self) -> Option<u64> {
        self.discounted_price
    }
}

impl Filterable for Product {
    fn category(&self) -> &str {
        &self.category
    }

    fn brand(&self) -> &str {
        &self.brand
    }

    fn in_stock(&self) -> bool {
        self.stock > 0
    }

    fn search_text(&self) -> String {
        format!("{} {} {}", self.name, self.brand, self.category)
    }
}

/// Navigation category shown in the storefront header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub slug: String,
}

impl Category {
    pub fn new(name: &str) -> Self {
        let slug = name
            .split_whitespace()
            .map(|word| word.to_lowercase())
            .collect::<Vec<_>>()
            .join("-");
        Self {
            name: name.to_string(),
            slug,
        }
    }
}

/// Carousel slide referencing a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroItem {
    pub product_id: String,
    pub headline: String,
}

impl HeroItem {
    pub fn new(product_id: &str, headline: &str) -> Self {
        Self {
            product_id: product_id.to_string(),
            headline: headline.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_price_prefers_nonzero_discount() {
        let plain = Product::new("a", "Lamp", 1000);
        assert_eq!(plain.effective_price(), 1000);
        assert_eq!(plain.clone().with_discount(800).effective_price(), 800);
        assert_eq!(plain.with_discount(0).effective_price(), 1000);
    }

    #[test]
    fn test_category_slug() {
        assert_eq!(Category::new("Home  Office").slug, "home-office");
    }
}
