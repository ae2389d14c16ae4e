//! Error types for catalog and cart stores.

use thiserror::Error;

/// Errors returned by catalog and cart operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Product id does not exist in the catalog.
    #[error("product not found: {0}")]
    ProductNotFound(String),
    /// Stock reservation would oversell the product.
    #[error("insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Product whose stock was exhausted.
        product_id: String,
        /// Quantity the caller asked for.
        requested: u32,
        /// Quantity actually available.
        available: u32,
    },
    /// Backing store failure.
    #[error("store error: {0}")]
    Store(String),
}
