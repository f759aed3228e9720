//! Signed payment provider webhooks.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use common::AggregateId;
use domain::{ConfirmPayment, DomainError, PaymentConfirmation};
use event_store::EventStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signature;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-signature";

/// Event types that settle a payment.
const COMPLETED_TYPES: [&str; 2] = ["checkout.session.completed", "checkout.completed"];

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub order_id: AggregateId,
    pub payment_reference: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: &'static str,
}

/// Why a delivery was refused before reaching the order service.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing X-Signature header")]
    MissingSignature,

    #[error("Signature does not match payload")]
    BadSignature,

    #[error("Malformed webhook payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Event {0} carries no order data")]
    MissingData(String),
}

impl WebhookError {
    fn outcome(&self) -> &'static str {
        match self {
            WebhookError::MissingSignature | WebhookError::BadSignature => "rejected_signature",
            WebhookError::Malformed(_) | WebhookError::MissingData(_) => "malformed",
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match self {
            WebhookError::MissingSignature | WebhookError::BadSignature => StatusCode::UNAUTHORIZED,
            WebhookError::Malformed(_) | WebhookError::MissingData(_) => StatusCode::BAD_REQUEST,
        };
        let body = serde_json::json!({
            "error": self.to_string(),
            "code": self.outcome().to_uppercase(),
        });
        (status, Json(body)).into_response()
    }
}

fn ack(outcome: &'static str) -> Json<WebhookAck> {
    metrics::counter!("payment_webhooks_total", "outcome" => outcome).increment(1);
    Json(WebhookAck {
        received: true,
        outcome,
    })
}

fn refuse(error: WebhookError) -> WebhookError {
    tracing::warn!(%error, "payment webhook refused");
    metrics::counter!("payment_webhooks_total", "outcome" => error.outcome()).increment(1);
    error
}

fn verify_and_parse(
    secret: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<WebhookEvent, WebhookError> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;
    if !signature::verify(secret, body, provided) {
        return Err(WebhookError::BadSignature);
    }
    Ok(serde_json::from_slice(body)?)
}

/// POST /webhooks/payments
///
/// Authentic, well-formed deliveries are always acknowledged with 200, even
/// when the confirmation is a replay or names an unknown order, so the
/// provider stops redelivering them.
#[tracing::instrument(skip(state, headers, body))]
pub async fn payments<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, WebhookError> {
    let event = match verify_and_parse(&state.config.webhook_secret, &headers, &body) {
        Ok(event) => event,
        Err(error) => return Err(refuse(error)),
    };

    if !COMPLETED_TYPES.contains(&event.event_type.as_str()) {
        tracing::debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            "webhook type ignored"
        );
        return Ok(ack("skipped"));
    }

    let Some(data) = event.data else {
        return Err(refuse(WebhookError::MissingData(event.id)));
    };

    let cmd = ConfirmPayment::new(data.order_id, data.payment_reference);
    let outcome = match state.orders.confirm_payment(cmd).await {
        Ok(PaymentConfirmation::Confirmed(_)) => "confirmed",
        Ok(PaymentConfirmation::Ignored(_)) => "ignored",
        Err(DomainError::AggregateNotFound { .. }) => {
            tracing::warn!(
                event_id = %event.id,
                order_id = %data.order_id,
                "payment webhook for unknown order"
            );
            "unknown_order"
        }
        Err(error) => {
            tracing::error!(
                event_id = %event.id,
                order_id = %data.order_id,
                %error,
                "payment confirmation failed"
            );
            "failed"
        }
    };

    Ok(ack(outcome))
}
