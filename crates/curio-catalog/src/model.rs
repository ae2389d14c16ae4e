//! Catalog and cart data models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Product category used for filtering and recommendations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Electronics,
    Clothing,
    Home,
    Books,
    Sports,
    Beauty,
}

impl ProductCategory {
    /// Return the category as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Electronics => "electronics",
            ProductCategory::Clothing => "clothing",
            ProductCategory::Home => "home",
            ProductCategory::Books => "books",
            ProductCategory::Sports => "sports",
            ProductCategory::Beauty => "beauty",
        }
    }

    /// Parse a category from a lowercase string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "electronics" => Some(ProductCategory::Electronics),
            "clothing" => Some(ProductCategory::Clothing),
            "home" => Some(ProductCategory::Home),
            "books" => Some(ProductCategory::Books),
            "sports" => Some(ProductCategory::Sports),
            "beauty" => Some(ProductCategory::Beauty),
            _ => None,
        }
    }
}

/// Catalog product row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    /// Opaque product id, e.g. `prod_001`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short description shown in search results.
    pub description: String,
    /// Unit price.
    pub price: f64,
    /// Category for filtering and recommendations.
    pub category: ProductCategory,
    /// Display image.
    pub image_url: String,
    /// Whether the product is currently purchasable.
    pub in_stock: bool,
    /// Units available for reservation.
    pub stock_quantity: u32,
    /// Average review rating.
    pub rating: f64,
    /// Number of reviews behind the rating.
    pub reviews_count: u32,
    /// Free-form specification table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub specifications: BTreeMap<String, String>,
    /// Marketing feature bullets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

/// Search outcome: the page of matches plus the unpaged match count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResults {
    /// Matching products, capped at the requested limit.
    pub products: Vec<Product>,
    /// Matches before the limit was applied.
    pub total_count: usize,
}

/// One cart line for a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    /// Line id within the cart.
    pub id: u64,
    /// Product the line refers to.
    pub product_id: String,
    /// Product display name at add time.
    pub product_name: String,
    /// Units in the line.
    pub quantity: u32,
    /// Unit price at add time.
    pub unit_price: f64,
    /// Line total.
    pub total_price: f64,
}

/// Aggregate view of a session's cart.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CartSummary {
    /// Total units across all lines.
    pub total_items: u32,
    /// Distinct product lines.
    pub total_products: usize,
    /// Sum of line totals.
    pub subtotal: f64,
    /// Estimated tax on the subtotal.
    pub estimated_tax: f64,
    /// Subtotal plus estimated tax.
    pub estimated_total: f64,
}
