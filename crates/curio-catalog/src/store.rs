//! In-memory catalog and cart stores behind collaborator traits.

use crate::error::CatalogError;
use crate::model::{CartItem, CartSummary, Product, ProductCategory, SearchResults};
use async_trait::async_trait;
use curio_protocol::SessionId;
use log::debug;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

/// Estimated sales tax applied to cart subtotals.
const TAX_RATE: f64 = 0.10;

/// Read-mostly product catalog collaborator.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Case-insensitive substring search over name and description.
    ///
    /// An empty query matches every in-stock product. Never errors on empty
    /// input; an empty result set is a valid outcome.
    async fn search(
        &self,
        query: &str,
        category: Option<ProductCategory>,
        limit: usize,
    ) -> Result<SearchResults, CatalogError>;

    /// Fetch a product by id.
    async fn get(&self, product_id: &str) -> Result<Option<Product>, CatalogError>;

    /// In-stock products sharing the category of `product_id`, excluding it.
    async fn similar(&self, product_id: &str, limit: usize) -> Result<Vec<Product>, CatalogError>;

    /// In-stock products in a category.
    async fn by_category(
        &self,
        category: ProductCategory,
        limit: usize,
    ) -> Result<Vec<Product>, CatalogError>;

    /// Atomically check and decrement stock; returns the remaining quantity.
    ///
    /// The check and the write happen under one lock per store so concurrent
    /// carts can never oversell a product.
    async fn reserve_stock(&self, product_id: &str, quantity: u32) -> Result<u32, CatalogError>;

    /// Return previously reserved stock, e.g. when the cart write fails.
    async fn release_stock(&self, product_id: &str, quantity: u32) -> Result<u32, CatalogError>;
}

/// Session-scoped cart collaborator.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Add units of a product, merging with an existing line for the same id.
    async fn add_item(
        &self,
        session_id: SessionId,
        product: &Product,
        quantity: u32,
    ) -> Result<(CartItem, CartSummary), CatalogError>;

    /// Aggregate view of the session's cart.
    async fn summary(&self, session_id: SessionId) -> Result<CartSummary, CatalogError>;

    /// Drop every line in the session's cart.
    async fn clear(&self, session_id: SessionId) -> Result<(), CatalogError>;
}

/// Catalog store backed by a guarded in-memory map.
#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<String, Product>>,
}

impl InMemoryCatalog {
    /// Create a catalog seeded with the given products.
    pub fn new(products: Vec<Product>) -> Self {
        let products = products
            .into_iter()
            .map(|product| (product.id.clone(), product))
            .collect();
        Self {
            products: RwLock::new(products),
        }
    }

    fn matching(&self, query: &str, category: Option<ProductCategory>) -> Vec<Product> {
        let needle = query.trim().to_lowercase();
        let mut matches: Vec<Product> = self
            .products
            .read()
            .values()
            .filter(|product| product.in_stock)
            .filter(|product| {
                needle.is_empty()
                    || product.name.to_lowercase().contains(&needle)
                    || product.description.to_lowercase().contains(&needle)
            })
            .filter(|product| category.is_none_or(|category| product.category == category))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn search(
        &self,
        query: &str,
        category: Option<ProductCategory>,
        limit: usize,
    ) -> Result<SearchResults, CatalogError> {
        let matches = self.matching(query, category);
        let total_count = matches.len();
        debug!(
            "catalog search (query_len={}, matches={}, limit={})",
            query.len(),
            total_count,
            limit
        );
        Ok(SearchResults {
            products: matches.into_iter().take(limit).collect(),
            total_count,
        })
    }

    async fn get(&self, product_id: &str) -> Result<Option<Product>, CatalogError> {
        Ok(self.products.read().get(product_id).cloned())
    }

    async fn similar(&self, product_id: &str, limit: usize) -> Result<Vec<Product>, CatalogError> {
        let Some(base) = self.products.read().get(product_id).cloned() else {
            return Ok(Vec::new());
        };
        let mut similar: Vec<Product> = self
            .products
            .read()
            .values()
            .filter(|product| {
                product.in_stock && product.category == base.category && product.id != base.id
            })
            .cloned()
            .collect();
        similar.sort_by(|a, b| a.id.cmp(&b.id));
        similar.truncate(limit);
        Ok(similar)
    }

    async fn by_category(
        &self,
        category: ProductCategory,
        limit: usize,
    ) -> Result<Vec<Product>, CatalogError> {
        let mut matches: Vec<Product> = self
            .products
            .read()
            .values()
            .filter(|product| product.in_stock && product.category == category)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn reserve_stock(&self, product_id: &str, quantity: u32) -> Result<u32, CatalogError> {
        let mut products = self.products.write();
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| CatalogError::ProductNotFound(product_id.to_string()))?;
        let available = if product.in_stock {
            product.stock_quantity
        } else {
            0
        };
        if available < quantity {
            return Err(CatalogError::InsufficientStock {
                product_id: product_id.to_string(),
                requested: quantity,
                available,
            });
        }
        product.stock_quantity -= quantity;
        if product.stock_quantity == 0 {
            product.in_stock = false;
        }
        debug!(
            "reserved stock (product_id={}, quantity={}, remaining={})",
            product_id, quantity, product.stock_quantity
        );
        Ok(product.stock_quantity)
    }

    async fn release_stock(&self, product_id: &str, quantity: u32) -> Result<u32, CatalogError> {
        let mut products = self.products.write();
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| CatalogError::ProductNotFound(product_id.to_string()))?;
        product.stock_quantity += quantity;
        if product.stock_quantity > 0 {
            product.in_stock = true;
        }
        Ok(product.stock_quantity)
    }
}

/// Cart store backed by a guarded in-memory map.
#[derive(Default)]
pub struct InMemoryCart {
    carts: Mutex<CartState>,
}

#[derive(Default)]
struct CartState {
    lines: HashMap<SessionId, Vec<CartItem>>,
    next_line_id: u64,
}

impl InMemoryCart {
    /// Create an empty cart store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for InMemoryCart {
    async fn add_item(
        &self,
        session_id: SessionId,
        product: &Product,
        quantity: u32,
    ) -> Result<(CartItem, CartSummary), CatalogError> {
        let mut state = self.carts.lock();
        state.next_line_id += 1;
        let next_line_id = state.next_line_id;
        let lines = state.lines.entry(session_id).or_default();
        let item = match lines.iter_mut().find(|line| line.product_id == product.id) {
            Some(line) => {
                line.quantity += quantity;
                line.total_price = round_cents(line.unit_price * f64::from(line.quantity));
                line.clone()
            }
            None => {
                let line = CartItem {
                    id: next_line_id,
                    product_id: product.id.clone(),
                    product_name: product.name.clone(),
                    quantity,
                    unit_price: product.price,
                    total_price: round_cents(product.price * f64::from(quantity)),
                };
                lines.push(line.clone());
                line
            }
        };
        let summary = summarize(lines);
        debug!(
            "cart item added (session_id={}, product_id={}, quantity={})",
            session_id, product.id, quantity
        );
        Ok((item, summary))
    }

    async fn summary(&self, session_id: SessionId) -> Result<CartSummary, CatalogError> {
        let state = self.carts.lock();
        Ok(state
            .lines
            .get(&session_id)
            .map(|lines| summarize(lines))
            .unwrap_or_default())
    }

    async fn clear(&self, session_id: SessionId) -> Result<(), CatalogError> {
        self.carts.lock().lines.remove(&session_id);
        Ok(())
    }
}

fn summarize(lines: &[CartItem]) -> CartSummary {
    let subtotal = round_cents(lines.iter().map(|line| line.total_price).sum());
    let estimated_tax = round_cents(subtotal * TAX_RATE);
    CartSummary {
        total_items: lines.iter().map(|line| line.quantity).sum(),
        total_products: lines.len(),
        subtotal,
        estimated_tax,
        estimated_total: round_cents(subtotal + estimated_tax),
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
