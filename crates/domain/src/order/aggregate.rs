//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::access::{AccessPolicy, Actor};
use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{
    OrderError, OrderEvent, OrderLine, OrderStatus, StatusHistoryEntry, events::OrderPlacedData,
};

/// Order aggregate root.
///
/// Lines and total price are fixed by [`Order::place`]. Status only moves
/// through the command methods below, each of which checks the transition
/// against the current status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    owner: Option<UserId>,

    status: OrderStatus,

    lines: Vec<OrderLine>,

    total_price: Money,

    /// Open or settled payment at the provider. Cleared on cancellation.
    payment_reference: Option<String>,

    created_at: Option<DateTime<Utc>>,

    updated_at: Option<DateTime<Utc>>,

    history: Vec<StatusHistoryEntry>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::PaymentReferenceAttached(data) => {
                self.payment_reference = Some(data.reference);
                self.updated_at = Some(data.attached_at);
            }
            OrderEvent::PaymentConfirmed(data) => {
                self.payment_reference = Some(data.payment_reference);
                self.move_to(OrderStatus::Paid, None, data.confirmed_at);
            }
            OrderEvent::StatusChanged(data) => {
                self.move_to(data.to, data.reason, data.changed_at);
            }
            OrderEvent::OrderCanceled(data) => {
                self.payment_reference = None;
                self.move_to(OrderStatus::Canceled, data.reason, data.canceled_at);
            }
        }
    }
}

// Query methods
impl Order {
    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Total frozen at placement.
    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Status changes, oldest first, starting with placement.
    pub fn history(&self) -> &[StatusHistoryEntry] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Fails unless `actor` owns the order or is staff.
    pub fn ensure_manageable_by(
        &self,
        actor: &Actor,
        policy: &AccessPolicy,
    ) -> Result<(), OrderError> {
        let (order_id, owner) = self.placed()?;
        if policy.may_manage(actor, owner) {
            Ok(())
        } else {
            Err(OrderError::PermissionInsufficient {
                order_id,
                actor: actor.user_id,
            })
        }
    }
}

// Command methods (return events)
impl Order {
    /// Places a new order from already reserved and priced lines.
    pub fn place(
        &self,
        order_id: AggregateId,
        owner: UserId,
        lines: Vec<OrderLine>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyCreated);
        }
        if lines.is_empty() {
            return Err(OrderError::NoItems);
        }
        if let Some(line) = lines.iter().find(|line| line.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                slug: line.slug.clone(),
                quantity: 0,
            });
        }

        let mut total_price = Money::zero();
        for line in &lines {
            total_price = total_price.checked_add(line.line_total).ok_or_else(|| {
                OrderError::PriceOverflow {
                    slug: line.slug.clone(),
                }
            })?;
        }
        Ok(vec![OrderEvent::order_placed(
            order_id,
            owner,
            lines,
            total_price,
        )])
    }

    /// Records a payment opened at the provider.
    ///
    /// Only from `WAITING`. If a reference is already attached the command is
    /// a no-op, so the caller can tell that another payment won.
    pub fn attach_payment_reference(
        &self,
        reference: String,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let (order_id, _) = self.placed()?;
        if self.status != OrderStatus::Waiting {
            return Err(OrderError::InvalidStatusTransition {
                order_id,
                current: self.status,
                attempted: OrderStatus::Paid,
            });
        }
        if self.payment_reference.is_some() {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::payment_reference_attached(reference)])
    }

    /// Marks the order paid.
    ///
    /// Anything but `WAITING` yields no events: webhook deliveries repeat,
    /// and a late confirmation must not move or fail the order.
    pub fn confirm_payment(
        &self,
        payment_reference: String,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.placed()?;
        if self.status != OrderStatus::Waiting {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::payment_confirmed(payment_reference)])
    }

    /// Cancels on behalf of the owner or staff.
    pub fn cancel(
        &self,
        actor: &Actor,
        policy: &AccessPolicy,
        reason: Option<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_manageable_by(actor, policy)?;
        self.cancel_unchecked(actor, reason)
    }

    /// Staff-only move along the forward path, or to `CANCELED`.
    pub fn admin_transition(
        &self,
        actor: &Actor,
        policy: &AccessPolicy,
        target: OrderStatus,
        reason: Option<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let (order_id, _) = self.placed()?;
        if !policy.is_staff(actor) {
            return Err(OrderError::PermissionInsufficient {
                order_id,
                actor: actor.user_id,
            });
        }

        if target == OrderStatus::Canceled {
            return self.cancel_unchecked(actor, reason);
        }

        if !self.status.can_transition_to(target) {
            return Err(OrderError::InvalidStatusTransition {
                order_id,
                current: self.status,
                attempted: target,
            });
        }

        Ok(vec![OrderEvent::status_changed(
            self.status,
            target,
            actor.user_id,
            reason,
        )])
    }

    fn cancel_unchecked(
        &self,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let (order_id, _) = self.placed()?;
        if !self.status.can_cancel() {
            return Err(OrderError::InvalidStatusTransition {
                order_id,
                current: self.status,
                attempted: OrderStatus::Canceled,
            });
        }

        Ok(vec![OrderEvent::order_canceled(
            self.status,
            actor.user_id,
            reason,
            self.payment_reference.clone(),
        )])
    }

    fn placed(&self) -> Result<(AggregateId, UserId), OrderError> {
        match (self.id, self.owner) {
            (Some(id), Some(owner)) => Ok((id, owner)),
            _ => Err(OrderError::NotPlaced),
        }
    }
}

// Event application
impl Order {
    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.owner = Some(data.owner);
        self.status = OrderStatus::Waiting;
        self.lines = data.lines;
        self.total_price = data.total_price;
        self.created_at = Some(data.placed_at);
        self.updated_at = Some(data.placed_at);
        self.history.push(StatusHistoryEntry {
            from: None,
            to: OrderStatus::Waiting,
            reason: None,
            at: data.placed_at,
        });
    }

    fn move_to(&mut self, to: OrderStatus, reason: Option<String>, at: DateTime<Utc>) {
        self.history.push(StatusHistoryEntry {
            from: Some(self.status),
            to,
            reason,
            at,
        });
        self.status = to;
        self.updated_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::DiscountPercent;
    use common::ProductId;

    fn line(slug: &str, cents: i64, quantity: u32) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(),
            slug: slug.to_string(),
            unit_price: Money::from_cents(cents),
            discount: DiscountPercent::NONE,
            quantity,
            line_total: Money::from_cents(cents * i64::from(quantity)),
        }
    }

    fn placed_order(owner: UserId) -> Order {
        let mut order = Order::default();
        let events = order
            .place(
                AggregateId::new(),
                owner,
                vec![line("lamp", 2_500, 2), line("desk", 10_000, 1)],
            )
            .unwrap();
        order.apply_events(events);
        order
    }

    fn staff() -> Actor {
        Actor::new(UserId::new(), ["ADMIN"])
    }

    #[test]
    fn place_freezes_total() {
        let owner = UserId::new();
        let order = placed_order(owner);

        assert_eq!(order.status(), OrderStatus::Waiting);
        assert_eq!(order.owner(), Some(owner));
        assert_eq!(order.total_price(), Money::from_cents(15_000));
        assert_eq!(
            Money::checked_sum(order.lines().iter().map(|l| l.line_total)),
            Some(order.total_price())
        );
        assert_eq!(order.history().len(), 1);
    }

    #[test]
    fn total_that_does_not_fit_is_rejected() {
        let half = i64::MAX / 2 + 1;
        let result = Order::default().place(
            AggregateId::new(),
            UserId::new(),
            vec![line("lamp", half, 1), line("desk", half, 1)],
        );

        assert!(matches!(
            result,
            Err(OrderError::PriceOverflow { slug }) if slug == "desk"
        ));
    }

    #[test]
    fn place_twice_fails() {
        let order = placed_order(UserId::new());
        let result = order.place(AggregateId::new(), UserId::new(), vec![line("x", 1, 1)]);
        assert!(matches!(result, Err(OrderError::AlreadyCreated)));
    }

    #[test]
    fn place_without_lines_fails() {
        let result = Order::default().place(AggregateId::new(), UserId::new(), vec![]);
        assert!(matches!(result, Err(OrderError::NoItems)));
    }

    #[test]
    fn confirm_payment_only_from_waiting() {
        let mut order = placed_order(UserId::new());

        let events = order.confirm_payment("PAY-0001".to_string()).unwrap();
        assert_eq!(events.len(), 1);
        order.apply_events(events);
        assert_eq!(order.status(), OrderStatus::Paid);
        assert_eq!(order.payment_reference(), Some("PAY-0001"));

        // Replayed webhook.
        assert!(order.confirm_payment("PAY-0001".to_string()).unwrap().is_empty());
    }

    #[test]
    fn owner_can_cancel_and_reference_is_cleared() {
        let owner = UserId::new();
        let policy = AccessPolicy::default();
        let mut order = placed_order(owner);
        let attached = order.attach_payment_reference("PAY-0007".to_string()).unwrap();
        order.apply_events(attached);

        let events = order
            .cancel(&Actor::customer(owner), &policy, Some("changed my mind".into()))
            .unwrap();
        match &events[0] {
            OrderEvent::OrderCanceled(data) => {
                assert_eq!(data.from, OrderStatus::Waiting);
                assert_eq!(data.voided_payment_reference.as_deref(), Some("PAY-0007"));
            }
            other => panic!("unexpected event {other:?}"),
        }

        order.apply_events(events);
        assert_eq!(order.status(), OrderStatus::Canceled);
        assert_eq!(order.payment_reference(), None);
    }

    #[test]
    fn stranger_cannot_cancel() {
        let order = placed_order(UserId::new());
        let result = order.cancel(
            &Actor::customer(UserId::new()),
            &AccessPolicy::default(),
            None,
        );
        assert!(matches!(
            result,
            Err(OrderError::PermissionInsufficient { .. })
        ));
    }

    #[test]
    fn cancel_twice_is_a_status_error() {
        let owner = UserId::new();
        let policy = AccessPolicy::default();
        let mut order = placed_order(owner);
        let actor = Actor::customer(owner);
        let canceled = order.cancel(&actor, &policy, None).unwrap();
        order.apply_events(canceled);

        let result = order.cancel(&actor, &policy, None);
        assert!(matches!(
            result,
            Err(OrderError::InvalidStatusTransition {
                current: OrderStatus::Canceled,
                attempted: OrderStatus::Canceled,
                ..
            })
        ));
    }

    #[test]
    fn admin_walks_the_forward_path() {
        let policy = AccessPolicy::default();
        let admin = staff();
        let mut order = placed_order(UserId::new());

        for target in [
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::OnTheWay,
            OrderStatus::Delivered,
        ] {
            let events = order
                .admin_transition(&admin, &policy, target, Some("ok".into()))
                .unwrap();
            order.apply_events(events);
            assert_eq!(order.status(), target);
        }

        assert!(order.is_terminal());
        assert_eq!(order.history().len(), 5);
        assert_eq!(order.history()[4].from, Some(OrderStatus::OnTheWay));
    }

    #[test]
    fn admin_cannot_skip_states() {
        let policy = AccessPolicy::default();
        let order = placed_order(UserId::new());

        let result = order.admin_transition(&staff(), &policy, OrderStatus::Shipped, None);
        assert!(matches!(
            result,
            Err(OrderError::InvalidStatusTransition {
                current: OrderStatus::Waiting,
                attempted: OrderStatus::Shipped,
                ..
            })
        ));
    }

    #[test]
    fn ship_after_cancel_names_both_states() {
        let policy = AccessPolicy::default();
        let admin = staff();
        let mut order = placed_order(UserId::new());
        let canceled = order
            .admin_transition(&admin, &policy, OrderStatus::Canceled, None)
            .unwrap();
        order.apply_events(canceled);

        let err = order
            .admin_transition(&admin, &policy, OrderStatus::Shipped, None)
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidStatusTransition {
                current: OrderStatus::Canceled,
                attempted: OrderStatus::Shipped,
                ..
            }
        ));
    }

    #[test]
    fn customer_cannot_use_admin_transition() {
        let owner = UserId::new();
        let order = placed_order(owner);
        let result = order.admin_transition(
            &Actor::customer(owner),
            &AccessPolicy::default(),
            OrderStatus::Paid,
            None,
        );
        assert!(matches!(
            result,
            Err(OrderError::PermissionInsufficient { .. })
        ));
    }

    #[test]
    fn second_payment_reference_is_ignored() {
        let mut order = placed_order(UserId::new());
        let attached = order.attach_payment_reference("PAY-0001".into()).unwrap();
        order.apply_events(attached);

        assert!(
            order
                .attach_payment_reference("PAY-0002".into())
                .unwrap()
                .is_empty()
        );
        assert_eq!(order.payment_reference(), Some("PAY-0001"));
    }

    #[test]
    fn commands_on_unplaced_order_fail() {
        let order = Order::default();
        assert!(matches!(
            order.confirm_payment("PAY".into()),
            Err(OrderError::NotPlaced)
        ));
    }
}
