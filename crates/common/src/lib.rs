//! Shared types for the order engine.
//!
//! - [`AggregateId`], [`ProductId`] and [`UserId`] identifiers
//! - [`PageRequest`] / [`Page`] for paginated collections
//! - [`Predicate`], the null-safe filter combinator used by every search

pub mod page;
pub mod predicate;
mod types;

pub use page::{Page, PageRequest};
pub use predicate::{Predicate, PredicateError, Sentinel, TriState};
pub use types::{AggregateId, ProductId, UserId};
