//! Searchable order summaries.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, Page, PageRequest, Predicate, PredicateError, UserId};
use domain::{AccessPolicy, Actor, Money, OrderEvent, OrderLine, OrderStatus};
use event_store::EventEnvelope;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::Result;
use crate::error::ProjectionError;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

const NAME: &str = "OrderSearchView";

/// One row of the order search view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub order_id: AggregateId,
    pub owner: UserId,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub total_price: Money,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderSummary {
    pub fn has_payment(&self) -> bool {
        self.payment_reference.is_some()
    }

    fn line_slice(&self) -> &[OrderLine] {
        &self.lines
    }
}

/// Order search criteria.
///
/// Absent strings and `-1` numbers leave their filter open. Totals are in
/// cents; dates are `YYYY-MM-DD` and inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OrderSearch {
    pub owner: Option<UserId>,
    pub status: Option<OrderStatus>,
    /// Substring of any line's product slug.
    pub product: Option<String>,
    pub min_total: i64,
    pub max_total: i64,
    pub created_from: Option<String>,
    pub created_to: Option<String>,
    /// `-1` any, `0` without a payment reference, `1` with one.
    pub has_payment: i32,
}

impl Default for OrderSearch {
    fn default() -> Self {
        Self {
            owner: None,
            status: None,
            product: None,
            min_total: -1,
            max_total: -1,
            created_from: None,
            created_to: None,
            has_payment: -1,
        }
    }
}

impl OrderSearch {
    /// Pins the search to the caller's own orders unless the caller is staff.
    pub fn visible_to(mut self, actor: &Actor, policy: &AccessPolicy) -> Self {
        if !policy.is_staff(actor) {
            self.owner = Some(actor.user_id);
        }
        self
    }

    pub fn to_predicate(&self) -> std::result::Result<Predicate<OrderSummary>, PredicateError> {
        Ok(Predicate::all([
            Predicate::equals(|o: &OrderSummary| o.owner, self.owner),
            Predicate::equals(|o: &OrderSummary| o.status, self.status),
            Predicate::joined_contains(
                OrderSummary::line_slice,
                |line: &OrderLine| line.slug.as_str(),
                self.product.as_deref(),
            ),
            Predicate::at_least(|o: &OrderSummary| o.total_price.cents(), self.min_total),
            Predicate::at_most(|o: &OrderSummary| o.total_price.cents(), self.max_total),
            Predicate::on_or_after(|o: &OrderSummary| o.created_at, self.created_from.as_deref())?,
            Predicate::on_or_before(|o: &OrderSummary| o.created_at, self.created_to.as_deref())?,
            Predicate::boolean_flag(OrderSummary::has_payment, self.has_payment)?,
        ]))
    }
}

/// Order summaries keyed by order id, fed from `Order` events.
#[derive(Clone, Default)]
pub struct OrderSearchView {
    orders: Arc<RwLock<HashMap<AggregateId, OrderSummary>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl OrderSearchView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, order_id: AggregateId) -> Option<OrderSummary> {
        self.orders.read().await.get(&order_id).cloned()
    }

    /// Matching orders, newest first.
    pub async fn search(
        &self,
        criteria: &OrderSearch,
        page: PageRequest,
    ) -> Result<Page<OrderSummary>> {
        let predicate = criteria.to_predicate()?;
        let mut matches: Vec<OrderSummary> = {
            let orders = self.orders.read().await;
            predicate.select(orders.values()).into_iter().cloned().collect()
        };
        matches.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.order_id.cmp(&b.order_id))
        });
        Ok(Page::slice(matches, page))
    }

    fn missing(order_id: AggregateId, event: &EventEnvelope) -> ProjectionError {
        ProjectionError::MissingOrder {
            projection: NAME,
            order_id,
            event_type: event.event_type.clone(),
        }
    }
}

#[async_trait]
impl Projection for OrderSearchView {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn apply(&self, event: &EventEnvelope, position: ProjectionPosition) -> Result<()> {
        let mut current = self.position.write().await;
        if !current.is_behind(position) {
            return Ok(());
        }
        if event.aggregate_type != "Order" {
            *current = position;
            return Ok(());
        }

        let order_event: OrderEvent = serde_json::from_value(event.payload.clone())?;
        let order_id = event.aggregate_id;
        let mut orders = self.orders.write().await;

        if let OrderEvent::OrderPlaced(data) = order_event {
            orders.insert(
                order_id,
                OrderSummary {
                    order_id,
                    owner: data.owner,
                    status: OrderStatus::Waiting,
                    lines: data.lines,
                    total_price: data.total_price,
                    payment_reference: None,
                    created_at: data.placed_at,
                    updated_at: data.placed_at,
                },
            );
            *current = position;
            return Ok(());
        }

        let summary = orders
            .get_mut(&order_id)
            .ok_or_else(|| Self::missing(order_id, event))?;
        match order_event {
            OrderEvent::OrderPlaced(_) => {}
            OrderEvent::PaymentReferenceAttached(data) => {
                summary.payment_reference = Some(data.reference);
            }
            OrderEvent::PaymentConfirmed(data) => {
                summary.status = OrderStatus::Paid;
                summary.payment_reference = Some(data.payment_reference);
            }
            OrderEvent::StatusChanged(data) => {
                summary.status = data.to;
            }
            OrderEvent::OrderCanceled(_) => {
                summary.status = OrderStatus::Canceled;
                summary.payment_reference = None;
            }
        }
        summary.updated_at = event.timestamp;
        *current = position;

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        let mut current = self.position.write().await;
        self.orders.write().await.clear();
        *current = ProjectionPosition::zero();
        Ok(())
    }
}

#[async_trait]
impl ReadModel for OrderSearchView {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn len(&self) -> usize {
        self.orders.read().await.len()
    }
}
