//! Product catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::Page;
use domain::{Actor, DiscountPercent, Money, NewProduct, Product, ProductCatalog, ProductSearch};
use event_store::EventStore;
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::CurrentActor;
use crate::routes::PageParams;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PricingRequest {
    /// Cents.
    pub unit_price: Money,
    #[serde(default)]
    pub discount: DiscountPercent,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

fn require_staff<S: EventStore>(state: &AppState<S>, actor: &Actor) -> Result<(), ApiError> {
    if state.orders.policy().is_staff(actor) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "User {} may not manage the catalog",
            actor.user_id
        )))
    }
}

/// POST /products
#[tracing::instrument(
    skip(state, actor, product),
    fields(user_id = %actor.user_id, slug = %product.slug)
)]
pub async fn register<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Json(product): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    require_staff(&state, &actor)?;
    let product = state.inventory.register_product(product).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products
#[tracing::instrument(skip(state))]
pub async fn search<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(criteria): Query<ProductSearch>,
    Query(paging): Query<PageParams>,
) -> Result<Json<Page<Product>>, ApiError> {
    let page = state
        .inventory
        .search(&criteria, state.page_request(paging.page, paging.size))
        .await?;
    Ok(Json(page))
}

/// GET /products/{slug}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(slug): Path<String>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.inventory.find_by_slug(&slug).await?))
}

/// PUT /products/{slug}/pricing
#[tracing::instrument(skip(state, actor, req), fields(user_id = %actor.user_id))]
pub async fn update_pricing<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(slug): Path<String>,
    Json(req): Json<PricingRequest>,
) -> Result<Json<Product>, ApiError> {
    require_staff(&state, &actor)?;
    let product = state.inventory.find_by_slug(&slug).await?;
    let product = state
        .inventory
        .update_pricing(product.id, req.unit_price, req.discount)
        .await?;
    Ok(Json(product))
}

/// PUT /products/{slug}/active
#[tracing::instrument(skip(state, actor, req), fields(user_id = %actor.user_id))]
pub async fn set_active<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(slug): Path<String>,
    Json(req): Json<ActiveRequest>,
) -> Result<Json<Product>, ApiError> {
    require_staff(&state, &actor)?;
    let product = state.inventory.find_by_slug(&slug).await?;
    let product = state.inventory.set_active(product.id, req.active).await?;
    Ok(Json(product))
}

/// POST /products/{slug}/restock
#[tracing::instrument(
    skip(state, actor, req),
    fields(user_id = %actor.user_id, quantity = req.quantity)
)]
pub async fn restock<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(slug): Path<String>,
    Json(req): Json<RestockRequest>,
) -> Result<Json<Product>, ApiError> {
    require_staff(&state, &actor)?;
    let product = state.inventory.find_by_slug(&slug).await?;
    let product = state.inventory.restock(product.id, req.quantity).await?;
    Ok(Json(product))
}
