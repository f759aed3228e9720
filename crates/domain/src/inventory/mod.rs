//! Product catalog and the inventory ledger.
//!
//! The ledger is the only component that mutates stock for orders: orders
//! take stock with [`InventoryLedger::reserve`] and give it back with
//! [`InventoryLedger::release`].

mod ledger;
mod product;
mod search;

pub use ledger::{InMemoryInventory, InventoryLedger, ProductCatalog};
pub use product::{Category, NewProduct, Product, Reservation};
pub use search::ProductSearch;

use common::{PredicateError, ProductId};
use thiserror::Error;

/// Errors raised by the catalog and the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// No product has this slug.
    #[error("Product not found: {slug}")]
    ProductNotFound { slug: String },

    /// No product has this id.
    #[error("Product not found: {0}")]
    UnknownProduct(ProductId),

    /// The product exists but cannot be ordered.
    #[error("Product {slug} is inactive and cannot be ordered")]
    ProductInactive { slug: String },

    /// Not enough stock to cover the request.
    #[error("Product {slug} has only {available} units available, {requested} requested")]
    InsufficientStock {
        slug: String,
        requested: u32,
        available: u32,
    },

    /// Another product already uses this slug.
    #[error("Slug already in use: {slug}")]
    DuplicateSlug { slug: String },

    /// A product definition failed validation.
    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    /// A search filter could not be parsed.
    #[error("Invalid filter: {0}")]
    Filter(#[from] PredicateError),
}
