//! Domain error types.

use common::PredicateError;
use event_store::EventStoreError;
use thiserror::Error;

use crate::inventory::InventoryError;
use crate::money::InvalidDiscount;
use crate::order::OrderError;
use crate::services::PaymentError;

/// Errors surfaced at the order service boundary.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// The order aggregate rejected a command.
    #[error("{0}")]
    Order(#[from] OrderError),

    /// The inventory ledger or catalog rejected a request.
    #[error("{0}")]
    Inventory(#[from] InventoryError),

    /// The payment provider failed.
    #[error("{0}")]
    Payment(#[from] PaymentError),

    /// A search filter could not be parsed.
    #[error("Invalid filter: {0}")]
    Filter(#[from] PredicateError),

    /// Aggregate not found.
    #[error("{aggregate_type} not found: {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true if this is an optimistic-concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_conflict())
    }
}

impl From<InvalidDiscount> for DomainError {
    fn from(e: InvalidDiscount) -> Self {
        DomainError::Validation(e.to_string())
    }
}
