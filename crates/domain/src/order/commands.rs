//! Order commands.

use common::AggregateId;
use serde::{Deserialize, Serialize};

use super::{LineRequest, OrderStatus};

/// Command to place a new order for the calling user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub items: Vec<LineRequest>,
}

impl PlaceOrder {
    pub fn new(items: impl IntoIterator<Item = LineRequest>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }
}

/// Command to cancel an order.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: AggregateId,
    pub reason: Option<String>,
}

impl CancelOrder {
    pub fn new(order_id: AggregateId) -> Self {
        Self {
            order_id,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Staff command to move an order to `target`.
#[derive(Debug, Clone)]
pub struct ChangeStatus {
    pub order_id: AggregateId,
    pub target: OrderStatus,
    /// Shown to the customer next to the status's default message.
    pub reason: Option<String>,
}

impl ChangeStatus {
    pub fn new(order_id: AggregateId, target: OrderStatus) -> Self {
        Self {
            order_id,
            target,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Payment confirmation reported by the provider.
#[derive(Debug, Clone)]
pub struct ConfirmPayment {
    pub order_id: AggregateId,
    pub payment_reference: String,
}

impl ConfirmPayment {
    pub fn new(order_id: AggregateId, payment_reference: impl Into<String>) -> Self {
        Self {
            order_id,
            payment_reference: payment_reference.into(),
        }
    }
}
