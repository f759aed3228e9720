//! Payment provider contract and an in-memory sandbox.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::aggregate::Aggregate;
use crate::money::Money;
use crate::order::Order;

/// A failure reported by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Payment provider error [{code}]: {message}")]
pub struct PaymentError {
    /// Provider error code, kept for diagnostics.
    pub code: String,
    pub message: String,
}

impl PaymentError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// External payment provider.
///
/// Calls are treated as opaque and idempotent on the provider side.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Opens a payment (checkout session) for the order and returns its
    /// reference.
    async fn create_external_reference(&self, order: &Order) -> Result<String, PaymentError>;

    /// Voids a previously created reference.
    async fn cancel_external_reference(&self, reference: &str) -> Result<(), PaymentError>;
}

#[derive(Debug, Default)]
struct SandboxState {
    open: HashMap<String, (AggregateId, Money)>,
    canceled: Vec<String>,
    next_id: u32,
    fail_on_create: bool,
    fail_on_cancel: bool,
}

/// In-memory payment provider.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProvider {
    state: Arc<Mutex<SandboxState>>,
}

impl InMemoryPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `create_external_reference` calls fail.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.lock().await.fail_on_create = fail;
    }

    /// Makes subsequent `cancel_external_reference` calls fail.
    pub async fn set_fail_on_cancel(&self, fail: bool) {
        self.state.lock().await.fail_on_cancel = fail;
    }

    /// Returns true if the reference was created and not canceled.
    pub async fn is_open(&self, reference: &str) -> bool {
        self.state.lock().await.open.contains_key(reference)
    }

    /// References canceled so far, in order.
    pub async fn canceled(&self) -> Vec<String> {
        self.state.lock().await.canceled.clone()
    }

    /// Amount charged by an open reference.
    pub async fn amount_for(&self, reference: &str) -> Option<Money> {
        self.state
            .lock()
            .await
            .open
            .get(reference)
            .map(|(_, amount)| *amount)
    }
}

#[async_trait]
impl PaymentProvider for InMemoryPaymentProvider {
    async fn create_external_reference(&self, order: &Order) -> Result<String, PaymentError> {
        let order_id = order
            .id()
            .ok_or_else(|| PaymentError::new("invalid_order", "order has not been placed"))?;

        let mut state = self.state.lock().await;
        if state.fail_on_create {
            return Err(PaymentError::new("card_declined", "Payment declined"));
        }

        state.next_id += 1;
        let reference = format!("PAY-{:04}", state.next_id);
        state
            .open
            .insert(reference.clone(), (order_id, order.total_price()));
        Ok(reference)
    }

    async fn cancel_external_reference(&self, reference: &str) -> Result<(), PaymentError> {
        let mut state = self.state.lock().await;
        if state.fail_on_cancel {
            return Err(PaymentError::new("provider_unavailable", "Provider unavailable"));
        }

        if state.open.remove(reference).is_some() {
            state.canceled.push(reference.to_string());
        }
        Ok(())
    }
}
