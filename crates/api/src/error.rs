//! API error types with HTTP response mapping.
//!
//! Every error renders as `{ "error": <message>, "code": <CODE>, ...details }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, InventoryError, OrderError};
use event_store::EventStoreError;
use projections::ProjectionError;
use serde_json::{Map, Value};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// The caller could not be identified.
    Unauthorized(String),
    Forbidden(String),
    Domain(DomainError),
    Projection(ProjectionError),
    Internal(String),
}

/// Status, machine code and extra body fields for one error.
struct Rendered {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Map<String, Value>,
}

impl Rendered {
    fn new(status: StatusCode, code: &'static str, message: impl ToString) -> Self {
        Self {
            status,
            code,
            message: message.to_string(),
            details: Map::new(),
        }
    }

    fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    fn internal(message: impl ToString) -> Self {
        let message = message.to_string();
        tracing::error!(error = %message, "internal server error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let rendered = match self {
            ApiError::NotFound(msg) => Rendered::new(StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => Rendered::new(StatusCode::BAD_REQUEST, "VALIDATION", msg),
            ApiError::Unauthorized(msg) => {
                Rendered::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", msg)
            }
            ApiError::Forbidden(msg) => {
                Rendered::new(StatusCode::FORBIDDEN, "PERMISSION_INSUFFICIENT", msg)
            }
            ApiError::Domain(err) => render_domain(err),
            ApiError::Projection(err) => render_projection(err),
            ApiError::Internal(msg) => Rendered::internal(msg),
        };

        let mut body = Map::new();
        body.insert("error".to_string(), Value::String(rendered.message));
        body.insert("code".to_string(), Value::String(rendered.code.to_string()));
        body.extend(rendered.details);
        (rendered.status, axum::Json(Value::Object(body))).into_response()
    }
}

fn render_domain(err: DomainError) -> Rendered {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) | DomainError::Filter(_) => {
            Rendered::new(StatusCode::BAD_REQUEST, "VALIDATION", message)
        }
        DomainError::AggregateNotFound { .. } => {
            Rendered::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
        }
        DomainError::Order(order_err) => render_order(order_err, message),
        DomainError::Inventory(inventory_err) => render_inventory(inventory_err, message),
        DomainError::Payment(payment_err) => {
            Rendered::new(StatusCode::BAD_GATEWAY, "PAYMENT_PROVIDER", message)
                .with("provider_code", payment_err.code)
        }
        DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => Rendered::new(
            StatusCode::CONFLICT,
            "CONCURRENCY_CONFLICT",
            "The order was modified concurrently, please retry",
        ),
        DomainError::EventStore(_) | DomainError::Serialization(_) => Rendered::internal(message),
    }
}

fn render_order(err: OrderError, message: String) -> Rendered {
    match err {
        OrderError::NoItems
        | OrderError::BlankSlug
        | OrderError::InvalidQuantity { .. }
        | OrderError::PriceOverflow { .. } => {
            Rendered::new(StatusCode::BAD_REQUEST, "VALIDATION", message)
        }
        OrderError::NotPlaced => Rendered::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
        OrderError::AlreadyCreated => {
            Rendered::new(StatusCode::CONFLICT, "CONCURRENCY_CONFLICT", message)
        }
        OrderError::InvalidStatusTransition {
            current, attempted, ..
        } => Rendered::new(StatusCode::CONFLICT, "ORDER_STATUS", message)
            .with("current", current.as_str())
            .with("attempted", attempted.as_str()),
        OrderError::PermissionInsufficient { .. } => Rendered::new(
            StatusCode::FORBIDDEN,
            "ORDER_PERMISSION_INSUFFICIENT",
            message,
        ),
    }
}

fn render_inventory(err: InventoryError, message: String) -> Rendered {
    match err {
        InventoryError::ProductNotFound { .. } | InventoryError::UnknownProduct(_) => {
            Rendered::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
        }
        InventoryError::ProductInactive { slug } => Rendered::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "INACTIVE_PRODUCT_ON_ORDER",
            message,
        )
        .with("slug", slug),
        InventoryError::InsufficientStock {
            slug, available, ..
        } => Rendered::new(StatusCode::CONFLICT, "PRODUCT_OVERFLOW_AMOUNT", message)
            .with("slug", slug)
            .with("available", available),
        InventoryError::DuplicateSlug { .. }
        | InventoryError::InvalidProduct(_)
        | InventoryError::Filter(_) => {
            Rendered::new(StatusCode::BAD_REQUEST, "VALIDATION", message)
        }
    }
}

fn render_projection(err: ProjectionError) -> Rendered {
    match err {
        ProjectionError::Filter(filter_err) => {
            Rendered::new(StatusCode::BAD_REQUEST, "VALIDATION", filter_err)
        }
        other => Rendered::internal(other),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        ApiError::Domain(DomainError::Inventory(err))
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Projection(err)
    }
}
