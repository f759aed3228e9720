use chrono::{DateTime, Utc};
use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::money::{DiscountPercent, Money};

/// Product category, referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
}

/// A catalog product as seen by the order engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub category: Option<Category>,
    pub unit_price: Money,
    pub discount: DiscountPercent,
    /// Units in stock.
    pub amount: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// The category as a zero- or one-element slice, for joined filters.
    pub fn category_slice(&self) -> &[Category] {
        self.category.as_slice()
    }
}

/// Input for registering a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub unit_price: Money,
    #[serde(default)]
    pub discount: DiscountPercent,
    #[serde(default)]
    pub amount: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// What a successful reservation captured, at the moment it was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub product_id: ProductId,
    pub slug: String,
    pub unit_price: Money,
    pub discount: DiscountPercent,
    pub quantity: u32,
}
