use common::{Predicate, PredicateError};
use serde::Deserialize;

use super::{Category, Product};

/// Product search criteria. Every field is optional; numeric bounds and the
/// `active` flag use `-1` for "not specified".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProductSearch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub category: Option<String>,
    /// Minimum unit price in cents.
    pub min_price: i64,
    /// Maximum unit price in cents.
    pub max_price: i64,
    pub min_amount: i64,
    /// `-1` any, `0` inactive only, `1` active only.
    pub active: i32,
    /// `YYYY-MM-DD`, inclusive.
    pub created_from: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    pub created_to: Option<String>,
}

impl Default for ProductSearch {
    fn default() -> Self {
        Self {
            name: None,
            slug: None,
            category: None,
            min_price: -1,
            max_price: -1,
            min_amount: -1,
            active: -1,
            created_from: None,
            created_to: None,
        }
    }
}

impl ProductSearch {
    pub fn to_predicate(&self) -> Result<Predicate<Product>, PredicateError> {
        Ok(Predicate::all([
            Predicate::contains(|p: &Product| p.name.as_str(), self.name.as_deref()),
            Predicate::contains(|p: &Product| p.slug.as_str(), self.slug.as_deref()),
            Predicate::joined_contains(
                Product::category_slice,
                |c: &Category| c.name.as_str(),
                self.category.as_deref(),
            ),
            Predicate::at_least(|p: &Product| p.unit_price.cents(), self.min_price),
            Predicate::at_most(|p: &Product| p.unit_price.cents(), self.max_price),
            Predicate::at_least(|p: &Product| i64::from(p.amount), self.min_amount),
            Predicate::boolean_flag(|p: &Product| p.active, self.active)?,
            Predicate::on_or_after(|p: &Product| p.created_at, self.created_from.as_deref())?,
            Predicate::on_or_before(|p: &Product| p.created_at, self.created_to.as_deref())?,
        ]))
    }
}
