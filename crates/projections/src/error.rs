use common::{AggregateId, PredicateError};
use thiserror::Error;

/// Errors raised while feeding or querying read models.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An order event arrived before the order was placed in the view.
    #[error("{projection} has no order {order_id} to apply {event_type} to")]
    MissingOrder {
        projection: &'static str,
        order_id: AggregateId,
        event_type: String,
    },

    /// Search criteria could not be turned into a filter.
    #[error(transparent)]
    Filter(#[from] PredicateError),
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
