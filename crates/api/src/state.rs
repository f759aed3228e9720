//! Shared application state.

use std::sync::Arc;

use common::PageRequest;
use domain::{
    Collaborators, InMemoryInventory, InMemoryPaymentProvider, LogNotificationSink,
    NotificationSink, OrderService, PaymentProvider,
};
use event_store::EventStore;
use projections::{OrderSearchView, ProjectionProcessor};

use crate::config::Config;

/// Everything a handler can reach.
pub struct AppState<S: EventStore> {
    pub orders: OrderService<S>,
    /// Catalog administration; order flows reach it through the service.
    pub inventory: InMemoryInventory,
    pub order_search: OrderSearchView,
    pub processor: ProjectionProcessor<S>,
    pub config: Config,
}

impl<S: EventStore + Clone + 'static> AppState<S> {
    /// Wires the order service, its collaborators and the read side.
    pub fn new<P, N>(
        store: S,
        inventory: InMemoryInventory,
        payments: P,
        notifier: N,
        config: Config,
    ) -> Self
    where
        P: PaymentProvider + 'static,
        N: NotificationSink + 'static,
    {
        let orders = OrderService::new(
            store.clone(),
            Collaborators::with_inventory(inventory.clone(), payments, notifier),
        )
        .with_policy(config.access_policy())
        .with_conflict_retries(config.conflict_retries);

        let order_search = OrderSearchView::new();
        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(order_search.clone()));

        Self {
            orders,
            inventory,
            order_search,
            processor,
            config,
        }
    }

    /// Sandbox payments and log-only notifications.
    pub fn with_defaults(store: S, config: Config) -> Self {
        Self::new(
            store,
            InMemoryInventory::new(),
            InMemoryPaymentProvider::new(),
            LogNotificationSink,
            config,
        )
    }

    /// Turns raw paging parameters into a bounded request.
    pub fn page_request(&self, page: Option<usize>, size: Option<usize>) -> PageRequest {
        PageRequest::new(
            page.unwrap_or(0),
            size.unwrap_or(self.config.default_page_size),
        )
        .clamped(self.config.max_page_size)
    }
}

pub type SharedState<S> = Arc<AppState<S>>;
