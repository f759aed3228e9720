//! Order service: orchestrates the ledger, the order aggregate and the
//! external collaborators.

use std::sync::Arc;
use std::time::Instant;

use common::{AggregateId, UserId};
use event_store::EventStore;

use crate::access::{AccessPolicy, Actor};
use crate::aggregate::Aggregate;
use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::inventory::{
    InMemoryInventory, InventoryError, InventoryLedger, ProductCatalog, Reservation,
};
use crate::services::{Notification, NotificationCategory, NotificationSink, PaymentProvider};

use super::{
    CancelOrder, ChangeStatus, ConfirmPayment, Order, OrderError, OrderEvent, OrderLine,
    OrderStatus, PlaceOrder, merge_lines,
};

/// Default number of reload-and-retry rounds after a concurrency conflict.
const DEFAULT_CONFLICT_RETRIES: u32 = 3;

/// External collaborators of the order service.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn ProductCatalog>,
    pub ledger: Arc<dyn InventoryLedger>,
    pub payments: Arc<dyn PaymentProvider>,
    pub notifier: Arc<dyn NotificationSink>,
}

impl Collaborators {
    /// Uses one in-memory inventory as both catalog and ledger.
    pub fn with_inventory<P, N>(inventory: InMemoryInventory, payments: P, notifier: N) -> Self
    where
        P: PaymentProvider + 'static,
        N: NotificationSink + 'static,
    {
        let inventory = Arc::new(inventory);
        Self {
            catalog: inventory.clone(),
            ledger: inventory,
            payments: Arc::new(payments),
            notifier: Arc::new(notifier),
        }
    }
}

/// Outcome of a payment confirmation.
#[derive(Debug)]
pub enum PaymentConfirmation {
    /// The order moved from `WAITING` to `PAID`.
    Confirmed(Order),
    /// The order was not waiting; nothing changed.
    Ignored(Order),
}

impl PaymentConfirmation {
    pub fn order(&self) -> &Order {
        match self {
            PaymentConfirmation::Confirmed(order) | PaymentConfirmation::Ignored(order) => order,
        }
    }
}

/// Service for managing orders.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
    collaborators: Collaborators,
    policy: AccessPolicy,
    conflict_retries: u32,
}

impl<S: EventStore> OrderService<S> {
    pub fn new(store: S, collaborators: Collaborators) -> Self {
        Self {
            handler: CommandHandler::new(store),
            collaborators,
            policy: AccessPolicy::default(),
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }

    /// Replaces the staff role table.
    pub fn with_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn catalog(&self) -> &Arc<dyn ProductCatalog> {
        &self.collaborators.catalog
    }

    /// Places an order for `actor`.
    ///
    /// Every line is reserved before anything is written. If a reservation
    /// or the final append fails, all reservations made so far are released
    /// and no order exists.
    #[tracing::instrument(skip(self, actor, cmd), fields(owner = %actor.user_id))]
    pub async fn create_order(&self, actor: &Actor, cmd: PlaceOrder) -> Result<Order, DomainError> {
        let started = Instant::now();
        let result = self.place(actor.user_id, cmd).await;
        metrics::histogram!("order_creation_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = ?order.id(),
                    total = %order.total_price(),
                    "order placed"
                );
            }
            Err(error) => {
                metrics::counter!("orders_creation_failed_total").increment(1);
                tracing::info!(%error, "order rejected");
            }
        }

        result
    }

    async fn place(&self, owner: UserId, cmd: PlaceOrder) -> Result<Order, DomainError> {
        let requested = merge_lines(cmd.items)?;

        let mut reservations: Vec<Reservation> = Vec::with_capacity(requested.len());
        for line in &requested {
            match self.reserve_line(&line.slug, line.quantity).await {
                Ok(reservation) => reservations.push(reservation),
                Err(error) => {
                    self.release_all(&reservations).await;
                    return Err(error.into());
                }
            }
        }

        let lines = match reservations
            .iter()
            .map(OrderLine::from_reservation)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(lines) => lines,
            Err(error) => {
                self.release_all(&reservations).await;
                return Err(error.into());
            }
        };
        let order_id = AggregateId::new();

        match self
            .handler
            .execute(order_id, |order| order.place(order_id, owner, lines))
            .await
        {
            Ok(result) => Ok(result.aggregate),
            Err(error) => {
                self.release_all(&reservations).await;
                Err(error)
            }
        }
    }

    async fn reserve_line(&self, slug: &str, quantity: u32) -> Result<Reservation, InventoryError> {
        let product = self.collaborators.catalog.find_by_slug(slug).await?;
        self.collaborators.ledger.reserve(product.id, quantity).await
    }

    async fn release_all(&self, reservations: &[Reservation]) {
        if reservations.is_empty() {
            return;
        }
        for reservation in reservations.iter().rev() {
            self.collaborators
                .ledger
                .release(reservation.product_id, reservation.quantity)
                .await;
        }
        tracing::info!(lines = reservations.len(), "reservations rolled back");
    }

    /// Loads an order visible to `actor`: its owner or staff.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn get_order(
        &self,
        actor: &Actor,
        order_id: AggregateId,
    ) -> Result<Order, DomainError> {
        let order = self.load(order_id).await?;
        order.ensure_manageable_by(actor, &self.policy)?;
        Ok(order)
    }

    /// Cancels on behalf of the owner or staff and returns the stock.
    #[tracing::instrument(
        skip(self, actor, cmd),
        fields(order_id = %cmd.order_id, actor = %actor.user_id)
    )]
    pub async fn cancel_order(
        &self,
        actor: &Actor,
        cmd: CancelOrder,
    ) -> Result<Order, DomainError> {
        let result = self
            .execute_with_retry(cmd.order_id, |order| {
                order.cancel(actor, &self.policy, cmd.reason.clone())
            })
            .await?;

        self.after_cancel(&result, false).await;
        Ok(result.aggregate)
    }

    /// Staff transition along the status graph, with a reason for the
    /// customer.
    #[tracing::instrument(
        skip(self, actor, cmd),
        fields(order_id = %cmd.order_id, target = %cmd.target, actor = %actor.user_id)
    )]
    pub async fn admin_transition(
        &self,
        actor: &Actor,
        cmd: ChangeStatus,
    ) -> Result<Order, DomainError> {
        let result = self
            .execute_with_retry(cmd.order_id, |order| {
                order.admin_transition(actor, &self.policy, cmd.target, cmd.reason.clone())
            })
            .await?;

        if cmd.target == OrderStatus::Canceled {
            self.after_cancel(&result, true).await;
        } else {
            metrics::counter!("order_transitions_total", "to" => cmd.target.as_str())
                .increment(1);
            tracing::info!(status = %cmd.target, "order status changed");
            if cmd.target.is_customer_visible() {
                self.notify_owner(
                    &result.aggregate,
                    NotificationCategory::OrderStatus,
                    status_message(cmd.target, cmd.reason.as_deref()),
                )
                .await;
            }
        }

        Ok(result.aggregate)
    }

    /// Opens a payment at the provider and attaches its reference.
    ///
    /// Returns the existing reference when one is already attached. If the
    /// reference cannot be recorded, it is cancelled at the provider.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn initiate_payment(
        &self,
        actor: &Actor,
        order_id: AggregateId,
    ) -> Result<String, DomainError> {
        let order = self.load(order_id).await?;
        order.ensure_manageable_by(actor, &self.policy)?;

        if let Some(existing) = order.payment_reference() {
            return Ok(existing.to_string());
        }
        if order.status() != OrderStatus::Waiting {
            return Err(OrderError::InvalidStatusTransition {
                order_id,
                current: order.status(),
                attempted: OrderStatus::Paid,
            }
            .into());
        }

        let reference = self
            .collaborators
            .payments
            .create_external_reference(&order)
            .await?;

        let attached = self
            .execute_with_retry(order_id, |order| {
                order.attach_payment_reference(reference.clone())
            })
            .await;

        match attached {
            Ok(result) => match result.aggregate.payment_reference() {
                Some(current) if current == reference => {
                    tracing::info!(%reference, "payment initiated");
                    Ok(reference)
                }
                // A concurrent request attached its reference first.
                Some(current) => {
                    let current = current.to_string();
                    self.void_reference(&reference).await;
                    Ok(current)
                }
                None => {
                    self.void_reference(&reference).await;
                    Err(OrderError::NotPlaced.into())
                }
            },
            Err(error) => {
                self.void_reference(&reference).await;
                Err(error)
            }
        }
    }

    /// Applies a provider confirmation. Replays and late deliveries are
    /// absorbed and reported as [`PaymentConfirmation::Ignored`].
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn confirm_payment(
        &self,
        cmd: ConfirmPayment,
    ) -> Result<PaymentConfirmation, DomainError> {
        let result = self
            .execute_with_retry(cmd.order_id, |order| {
                order.confirm_payment(cmd.payment_reference.clone())
            })
            .await?;

        if result.events.is_empty() {
            tracing::warn!(
                status = %result.aggregate.status(),
                reference = %cmd.payment_reference,
                "payment confirmation ignored: order is not waiting"
            );
            return Ok(PaymentConfirmation::Ignored(result.aggregate));
        }

        metrics::counter!("order_transitions_total", "to" => OrderStatus::Paid.as_str())
            .increment(1);
        tracing::info!(reference = %cmd.payment_reference, "payment confirmed");
        self.notify_owner(
            &result.aggregate,
            NotificationCategory::Payment,
            OrderStatus::Paid.default_message().to_string(),
        )
        .await;

        Ok(PaymentConfirmation::Confirmed(result.aggregate))
    }

    async fn load(&self, order_id: AggregateId) -> Result<Order, DomainError> {
        self.handler
            .load_existing(order_id)
            .await?
            .ok_or_else(|| DomainError::AggregateNotFound {
                aggregate_type: Order::aggregate_type(),
                aggregate_id: order_id.to_string(),
            })
    }

    /// Runs a command, reloading and retrying when another writer got to the
    /// order first. The command re-checks its guards against fresh state on
    /// every attempt.
    async fn execute_with_retry<F>(
        &self,
        order_id: AggregateId,
        mut command: F,
    ) -> Result<CommandResult<Order>, DomainError>
    where
        F: FnMut(&Order) -> Result<Vec<OrderEvent>, OrderError>,
    {
        let mut attempt = 0;
        loop {
            match self.handler.execute_existing(order_id, &mut command).await {
                Err(error) if error.is_conflict() && attempt < self.conflict_retries => {
                    attempt += 1;
                    tracing::debug!(%order_id, attempt, "concurrent update, retrying");
                }
                other => return other,
            }
        }
    }

    /// Side effects of a committed cancellation. Runs once per order: only
    /// the writer whose cancel event was appended gets here.
    async fn after_cancel(&self, result: &CommandResult<Order>, notify: bool) {
        let Some(OrderEvent::OrderCanceled(data)) = result.events.first() else {
            return;
        };
        let order = &result.aggregate;

        for line in order.lines() {
            self.collaborators
                .ledger
                .release(line.product_id, line.quantity)
                .await;
        }

        if let Some(reference) = &data.voided_payment_reference {
            self.void_reference(reference).await;
        }

        metrics::counter!("order_transitions_total", "to" => OrderStatus::Canceled.as_str())
            .increment(1);
        tracing::info!(
            from = %data.from,
            lines = order.lines().len(),
            "order canceled, stock released"
        );

        if notify {
            self.notify_owner(
                order,
                NotificationCategory::OrderStatus,
                status_message(OrderStatus::Canceled, data.reason.as_deref()),
            )
            .await;
        }
    }

    async fn void_reference(&self, reference: &str) {
        if let Err(error) = self
            .collaborators
            .payments
            .cancel_external_reference(reference)
            .await
        {
            tracing::warn!(
                %reference,
                code = %error.code,
                %error,
                "failed to cancel payment at provider"
            );
        }
    }

    async fn notify_owner(&self, order: &Order, category: NotificationCategory, message: String) {
        let Some(user) = order.owner() else {
            return;
        };
        let notification = Notification {
            user,
            category,
            message,
        };
        if let Err(error) = self.collaborators.notifier.notify(notification).await {
            tracing::warn!(%error, "notification not delivered");
        }
    }
}

fn status_message(status: OrderStatus, reason: Option<&str>) -> String {
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("{} {}", status.default_message(), reason),
        None => status.default_message().to_string(),
    }
}
