//! Order domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

use super::{OrderLine, OrderStatus};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was placed with its priced lines; stock is already reserved.
    OrderPlaced(OrderPlacedData),

    /// A payment was opened at the provider.
    PaymentReferenceAttached(PaymentReferenceAttachedData),

    /// The provider confirmed payment.
    PaymentConfirmed(PaymentConfirmedData),

    /// Staff moved the order forward.
    StatusChanged(StatusChangedData),

    /// Order was canceled; its stock is to be released.
    OrderCanceled(OrderCanceledData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::PaymentReferenceAttached(_) => "PaymentReferenceAttached",
            OrderEvent::PaymentConfirmed(_) => "PaymentConfirmed",
            OrderEvent::StatusChanged(_) => "StatusChanged",
            OrderEvent::OrderCanceled(_) => "OrderCanceled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub owner: UserId,
    pub lines: Vec<OrderLine>,
    /// Sum of line totals, frozen at placement.
    pub total_price: Money,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReferenceAttachedData {
    pub reference: String,
    pub attached_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmedData {
    /// Reference reported by the provider as settled.
    pub payment_reference: String,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_by: UserId,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCanceledData {
    pub from: OrderStatus,
    pub canceled_by: UserId,
    pub reason: Option<String>,
    /// Payment reference that was attached when the order was canceled.
    pub voided_payment_reference: Option<String>,
    pub canceled_at: DateTime<Utc>,
}

// Event construction helpers
impl OrderEvent {
    pub fn order_placed(
        order_id: AggregateId,
        owner: UserId,
        lines: Vec<OrderLine>,
        total_price: Money,
    ) -> Self {
        OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            owner,
            lines,
            total_price,
            placed_at: Utc::now(),
        })
    }

    pub fn payment_reference_attached(reference: impl Into<String>) -> Self {
        OrderEvent::PaymentReferenceAttached(PaymentReferenceAttachedData {
            reference: reference.into(),
            attached_at: Utc::now(),
        })
    }

    pub fn payment_confirmed(payment_reference: impl Into<String>) -> Self {
        OrderEvent::PaymentConfirmed(PaymentConfirmedData {
            payment_reference: payment_reference.into(),
            confirmed_at: Utc::now(),
        })
    }

    pub fn status_changed(
        from: OrderStatus,
        to: OrderStatus,
        changed_by: UserId,
        reason: Option<String>,
    ) -> Self {
        OrderEvent::StatusChanged(StatusChangedData {
            from,
            to,
            changed_by,
            reason,
            changed_at: Utc::now(),
        })
    }

    pub fn order_canceled(
        from: OrderStatus,
        canceled_by: UserId,
        reason: Option<String>,
        voided_payment_reference: Option<String>,
    ) -> Self {
        OrderEvent::OrderCanceled(OrderCanceledData {
            from,
            canceled_by,
            reason,
            voided_payment_reference,
            canceled_at: Utc::now(),
        })
    }

    /// Status the order is in after this event, if the event moves it.
    pub fn resulting_status(&self) -> Option<OrderStatus> {
        match self {
            OrderEvent::OrderPlaced(_) => Some(OrderStatus::Waiting),
            OrderEvent::PaymentReferenceAttached(_) => None,
            OrderEvent::PaymentConfirmed(_) => Some(OrderStatus::Paid),
            OrderEvent::StatusChanged(data) => Some(data.to),
            OrderEvent::OrderCanceled(_) => Some(OrderStatus::Canceled),
        }
    }
}
