//! Order status state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// ```text
/// WAITING ──► PAID ──► SHIPPED ──► ON_THE_WAY ──► DELIVERED
///    │          │         │            │
///    └──────────┴─────────┴────────────┴──► CANCELED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed, stock reserved, awaiting payment.
    #[default]
    Waiting,

    Paid,

    Shipped,

    OnTheWay,

    /// Terminal.
    Delivered,

    /// Terminal.
    Canceled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Waiting,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::OnTheWay,
        OrderStatus::Delivered,
        OrderStatus::Canceled,
    ];

    /// The next status on the forward path, if any.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Waiting => Some(OrderStatus::Paid),
            OrderStatus::Paid => Some(OrderStatus::Shipped),
            OrderStatus::Shipped => Some(OrderStatus::OnTheWay),
            OrderStatus::OnTheWay => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Canceled => None,
        }
    }

    /// Returns true if `target` is reachable in one step.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == OrderStatus::Canceled || self.next() == Some(target)
    }

    /// Returns true if the order can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Canceled)
    }

    /// Statuses the customer is told about when an order enters them.
    pub fn is_customer_visible(&self) -> bool {
        !matches!(self, OrderStatus::Waiting)
    }

    /// Customer-facing message used when no other text is given.
    pub fn default_message(&self) -> &'static str {
        match self {
            OrderStatus::Waiting => "Your order was received and is waiting for payment.",
            OrderStatus::Paid => "We received your payment and are preparing your order.",
            OrderStatus::Shipped => "Your order has been shipped.",
            OrderStatus::OnTheWay => "Your order is on the way.",
            OrderStatus::Delivered => "Your order has been delivered.",
            OrderStatus::Canceled => "Your order has been canceled.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Waiting => "WAITING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::OnTheWay => "ON_THE_WAY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string that names no status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
