//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use commands::{CancelOrder, ChangeStatus, ConfirmPayment, PlaceOrder};
pub use events::{
    OrderCanceledData, OrderEvent, OrderPlacedData, PaymentConfirmedData,
    PaymentReferenceAttachedData, StatusChangedData,
};
pub use service::{Collaborators, OrderService, PaymentConfirmation};
pub use state::{OrderStatus, UnknownStatus};
pub use value_objects::{LineRequest, OrderLine, StatusHistoryEntry, merge_lines};

use common::{AggregateId, UserId};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Order is already created.
    #[error("Order already created")]
    AlreadyCreated,

    /// The command targets an order that was never placed.
    #[error("Order has not been placed")]
    NotPlaced,

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// A requested line has no product slug.
    #[error("Order line is missing a product slug")]
    BlankSlug,

    /// Invalid quantity.
    #[error("Invalid quantity {quantity} for product {slug}")]
    InvalidQuantity { slug: String, quantity: u32 },

    /// A line price or the order total does not fit in an amount.
    #[error("Price of order line {slug} is out of range")]
    PriceOverflow { slug: String },

    /// The transition is not an edge of the status graph.
    #[error("Order {order_id} cannot move from {current} to {attempted}")]
    InvalidStatusTransition {
        order_id: AggregateId,
        current: OrderStatus,
        attempted: OrderStatus,
    },

    /// The actor has no rights over this order.
    #[error("User {actor} is not allowed to manage order {order_id}")]
    PermissionInsufficient {
        order_id: AggregateId,
        actor: UserId,
    },
}
