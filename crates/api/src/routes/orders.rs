//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{AggregateId, Page, UserId};
use domain::{
    Aggregate, CancelOrder, ChangeStatus, Money, Order, OrderLine, OrderStatus, PlaceOrder,
    StatusHistoryEntry,
};
use event_store::EventStore;
use projections::{OrderSearch, OrderSummary};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extract::CurrentActor;
use crate::routes::PageParams;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: OrderStatus,
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: AggregateId,
    pub owner: Option<UserId>,
    pub status: OrderStatus,
    pub status_message: &'static str,
    pub lines: Vec<OrderLine>,
    pub total_price: Money,
    pub payment_reference: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub history: Vec<StatusHistoryEntry>,
}

impl OrderResponse {
    fn from_order(order: &Order) -> Result<Self, ApiError> {
        let id = order
            .id()
            .ok_or_else(|| ApiError::Internal("order has no id".to_string()))?;
        Ok(Self {
            id,
            owner: order.owner(),
            status: order.status(),
            status_message: order.status().default_message(),
            lines: order.lines().to_vec(),
            total_price: order.total_price(),
            payment_reference: order.payment_reference().map(str::to_string),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
            history: order.history().to_vec(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub order_id: AggregateId,
    pub payment_reference: String,
}

fn parse_order_id(id: &str) -> Result<AggregateId, ApiError> {
    AggregateId::parse(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id '{id}': {e}")))
}

// -- Handlers --

/// POST /orders
#[tracing::instrument(skip(state, actor, cmd), fields(user_id = %actor.user_id))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Json(cmd): Json<PlaceOrder>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state.orders.create_order(&actor, cmd).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from_order(&order)?)))
}

/// GET /orders
///
/// Customers only ever see their own orders, whatever `owner` they pass.
#[tracing::instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn search<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Query(criteria): Query<OrderSearch>,
    Query(paging): Query<PageParams>,
) -> Result<Json<Page<OrderSummary>>, ApiError> {
    state.processor.run_catch_up().await?;

    let criteria = criteria.visible_to(&actor, state.orders.policy());
    let page = state
        .order_search
        .search(&criteria, state.page_request(paging.page, paging.size))
        .await?;
    Ok(Json(page))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orders.get_order(&actor, order_id).await?;
    Ok(Json(OrderResponse::from_order(&order)?))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state, actor, body), fields(user_id = %actor.user_id))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    body: Option<Json<ReasonRequest>>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let mut cmd = CancelOrder::new(order_id);
    if let Some(reason) = body.and_then(|Json(body)| body.reason) {
        cmd = cmd.with_reason(reason);
    }

    let order = state.orders.cancel_order(&actor, cmd).await?;
    Ok(Json(OrderResponse::from_order(&order)?))
}

/// POST /orders/{id}/payment
#[tracing::instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn initiate_payment<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let payment_reference = state.orders.initiate_payment(&actor, order_id).await?;
    Ok(Json(PaymentResponse {
        order_id,
        payment_reference,
    }))
}

/// POST /orders/{id}/status
#[tracing::instrument(
    skip(state, actor, req),
    fields(user_id = %actor.user_id, status = %req.status)
)]
pub async fn change_status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let mut cmd = ChangeStatus::new(order_id, req.status);
    if let Some(reason) = req.reason {
        cmd = cmd.with_reason(reason);
    }

    let order = state.orders.admin_transition(&actor, cmd).await?;
    Ok(Json(OrderResponse::from_order(&order)?))
}
