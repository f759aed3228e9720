//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::{AppState, Config};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::UserId;
use domain::{
    DiscountPercent, InMemoryInventory, InMemoryNotificationSink, InMemoryPaymentProvider, Money,
    NewProduct,
};
use event_store::InMemoryEventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    payments: InMemoryPaymentProvider,
    notifier: InMemoryNotificationSink,
    secret: String,
}

async fn setup() -> TestApp {
    let inventory = InMemoryInventory::new();
    for (slug, cents, discount, amount, active) in [
        ("desk-lamp", 10_000, 10, 5, true),
        ("oak-desk", 25_000, 0, 2, true),
        ("retired-chair", 5_000, 0, 10, false),
    ] {
        inventory
            .register_product(NewProduct {
                slug: slug.to_string(),
                name: slug.replace('-', " "),
                category: Some("Furniture".to_string()),
                unit_price: Money::from_cents(cents),
                discount: DiscountPercent::new(discount).unwrap(),
                amount,
                active,
            })
            .await
            .unwrap();
    }

    let config = Config::default();
    let secret = config.webhook_secret.clone();
    let payments = InMemoryPaymentProvider::new();
    let notifier = InMemoryNotificationSink::new();
    let state = Arc::new(AppState::new(
        InMemoryEventStore::new(),
        inventory,
        payments.clone(),
        notifier.clone(),
        config,
    ));

    TestApp {
        app: api::create_app(state, get_metrics_handle()),
        payments,
        notifier,
        secret,
    }
}

struct Caller {
    user_id: UserId,
    roles: &'static str,
}

fn customer() -> Caller {
    Caller {
        user_id: UserId::new(),
        roles: "",
    }
}

fn admin() -> Caller {
    Caller {
        user_id: UserId::new(),
        roles: "ADMIN",
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn call(
        &self,
        caller: &Caller,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", caller.user_id.to_string())
            .header("x-user-roles", caller.roles);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    async fn place(&self, caller: &Caller, items: Value) -> (StatusCode, Value) {
        self.call(caller, "POST", "/orders", Some(json!({ "items": items })))
            .await
    }

    async fn stock(&self, slug: &str) -> u64 {
        let (_, product) = self.call(&customer(), "GET", &format!("/products/{slug}"), None).await;
        product["amount"].as_u64().unwrap()
    }

    async fn webhook(&self, body: &str, signature: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/webhooks/payments")
            .header("content-type", "application/json")
            .header("x-signature", signature)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }
}

fn completion(order_id: &str, reference: &str) -> String {
    json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": { "order_id": order_id, "payment_reference": reference }
    })
    .to_string()
}

mod system {
    use super::*;

    #[tokio::test]
    async fn health_check() {
        let app = setup().await;
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn metrics_endpoint_renders() {
        let app = setup().await;
        let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();

        let response = app.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }
}

mod orders {
    use super::*;

    #[tokio::test]
    async fn create_prices_lines_and_reserves_stock() {
        let app = setup().await;
        let caller = customer();

        let (status, order) = app
            .place(&caller, json!([{ "slug": "desk-lamp", "quantity": 2 }]))
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["status"], "WAITING");
        assert_eq!(order["total_price"], 18_000);
        assert_eq!(order["owner"], caller.user_id.to_string());
        assert_eq!(app.stock("desk-lamp").await, 3);
    }

    #[tokio::test]
    async fn anonymous_callers_are_rejected() {
        let app = setup().await;
        let request = Request::builder()
            .method("POST")
            .uri("/orders")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "items": [] }).to_string()))
            .unwrap();

        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn stock_and_activity_errors() {
        let app = setup().await;
        let caller = customer();

        let (status, body) = app
            .place(
                &caller,
                json!([
                    { "slug": "desk-lamp", "quantity": 1 },
                    { "slug": "oak-desk", "quantity": 3 }
                ]),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "PRODUCT_OVERFLOW_AMOUNT");
        assert_eq!(body["slug"], "oak-desk");
        assert_eq!(body["available"], 2);
        // The lamp reserved before the failure was given back.
        assert_eq!(app.stock("desk-lamp").await, 5);

        let (status, body) = app
            .place(&caller, json!([{ "slug": "retired-chair", "quantity": 1 }]))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "INACTIVE_PRODUCT_ON_ORDER");

        let (status, body) = app
            .place(&caller, json!([{ "slug": "desk-lamp", "quantity": 0 }]))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION");

        let (status, body) = app
            .place(&caller, json!([{ "slug": "no-such-thing", "quantity": 1 }]))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn reads_are_limited_to_owner_and_staff() {
        let app = setup().await;
        let owner = customer();
        let (_, order) = app
            .place(&owner, json!([{ "slug": "oak-desk", "quantity": 1 }]))
            .await;
        let uri = format!("/orders/{}", order["id"].as_str().unwrap());

        let (status, _) = app.call(&owner, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app.call(&admin(), "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app.call(&customer(), "GET", &uri, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "ORDER_PERMISSION_INSUFFICIENT");

        let unknown = format!("/orders/{}", common::AggregateId::new());
        let (status, _) = app.call(&owner, "GET", &unknown, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.call(&owner, "GET", "/orders/not-an-id", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cancel_releases_stock_once() {
        let app = setup().await;
        let owner = customer();
        let (_, order) = app
            .place(&owner, json!([{ "slug": "desk-lamp", "quantity": 4 }]))
            .await;
        let uri = format!("/orders/{}/cancel", order["id"].as_str().unwrap());
        assert_eq!(app.stock("desk-lamp").await, 1);

        let (status, canceled) = app
            .call(&owner, "POST", &uri, Some(json!({ "reason": "changed my mind" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(canceled["status"], "CANCELED");
        assert_eq!(app.stock("desk-lamp").await, 5);

        let (status, body) = app.call(&owner, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ORDER_STATUS");
        assert_eq!(body["current"], "CANCELED");
        assert_eq!(app.stock("desk-lamp").await, 5);
    }

    #[tokio::test]
    async fn staff_drive_the_status_machine() {
        let app = setup().await;
        let owner = customer();
        let staff = admin();
        let (_, order) = app
            .place(&owner, json!([{ "slug": "oak-desk", "quantity": 1 }]))
            .await;
        let uri = format!("/orders/{}/status", order["id"].as_str().unwrap());

        let (status, _) = app
            .call(&owner, "POST", &uri, Some(json!({ "status": "PAID" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .call(
                &staff,
                "POST",
                &uri,
                Some(json!({ "status": "PAID", "reason": "paid at the counter" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "PAID");
        assert_eq!(body["history"].as_array().unwrap().len(), 2);

        let (status, body) = app
            .call(&staff, "POST", &uri, Some(json!({ "status": "DELIVERED" })))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ORDER_STATUS");
        assert_eq!(body["attempted"], "DELIVERED");

        let sent = app.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user, owner.user_id);
    }

    #[tokio::test]
    async fn search_is_scoped_for_customers() {
        let app = setup().await;
        let alice = customer();
        let bob = customer();
        app.place(&alice, json!([{ "slug": "desk-lamp", "quantity": 1 }])).await;
        app.place(&alice, json!([{ "slug": "oak-desk", "quantity": 1 }])).await;
        app.place(&bob, json!([{ "slug": "desk-lamp", "quantity": 1 }])).await;

        let (status, page) = app.call(&alice, "GET", "/orders", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total_items"], 2);

        // Naming someone else's id does not widen a customer's search.
        let uri = format!("/orders?owner={}", bob.user_id);
        let (_, page) = app.call(&alice, "GET", &uri, None).await;
        assert_eq!(page["total_items"], 2);

        let (_, page) = app.call(&admin(), "GET", "/orders?product=lamp&size=1", None).await;
        assert_eq!(page["total_items"], 2);
        assert_eq!(page["items"].as_array().unwrap().len(), 1);
        assert_eq!(page["total_pages"], 2);

        let (status, body) = app
            .call(&admin(), "GET", "/orders?created_from=yesterday", None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION");
    }
}

mod payments {
    use super::*;
    use api::signature;

    async fn waiting_order(app: &TestApp, owner: &Caller) -> String {
        let (_, order) = app
            .place(owner, json!([{ "slug": "desk-lamp", "quantity": 1 }]))
            .await;
        order["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn initiate_then_confirm_by_webhook() {
        let app = setup().await;
        let owner = customer();
        let order_id = waiting_order(&app, &owner).await;
        let uri = format!("/orders/{order_id}/payment");

        let (status, body) = app.call(&owner, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let reference = body["payment_reference"].as_str().unwrap().to_string();
        assert!(app.payments.is_open(&reference).await);

        let (_, again) = app.call(&owner, "POST", &uri, None).await;
        assert_eq!(again["payment_reference"], reference.as_str());

        let payload = completion(&order_id, &reference);
        let signed = signature::sign(&app.secret, payload.as_bytes());
        let (status, ack) = app.webhook(&payload, &signed).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["outcome"], "confirmed");

        let (_, order) = app.call(&owner, "GET", &format!("/orders/{order_id}"), None).await;
        assert_eq!(order["status"], "PAID");

        let (status, ack) = app.webhook(&payload, &signed).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["outcome"], "ignored");
    }

    #[tokio::test]
    async fn provider_failure_is_a_bad_gateway() {
        let app = setup().await;
        let owner = customer();
        let order_id = waiting_order(&app, &owner).await;
        app.payments.set_fail_on_create(true).await;

        let (status, body) = app
            .call(&owner, "POST", &format!("/orders/{order_id}/payment"), None)
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "PAYMENT_PROVIDER");
        assert_eq!(body["provider_code"], "card_declined");
    }

    #[tokio::test]
    async fn webhook_refusals() {
        let app = setup().await;
        let owner = customer();
        let order_id = waiting_order(&app, &owner).await;
        let payload = completion(&order_id, "PAY-0001");

        let (status, _) = app.webhook(&payload, "deadbeef").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let forged = signature::sign("not-the-secret", payload.as_bytes());
        let (status, _) = app.webhook(&payload, &forged).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let garbage = "{\"id\": 42";
        let signed = signature::sign(&app.secret, garbage.as_bytes());
        let (status, _) = app.webhook(garbage, &signed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, order) = app.call(&owner, "GET", &format!("/orders/{order_id}"), None).await;
        assert_eq!(order["status"], "WAITING");
    }

    #[tokio::test]
    async fn unrelated_and_unknown_events_are_acknowledged() {
        let app = setup().await;

        let other = json!({ "id": "evt_9", "type": "customer.updated", "data": null }).to_string();
        let signed = signature::sign(&app.secret, other.as_bytes());
        let (status, ack) = app.webhook(&other, &signed).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["outcome"], "skipped");

        let stray = completion(&common::AggregateId::new().to_string(), "PAY-0404");
        let signed = signature::sign(&app.secret, stray.as_bytes());
        let (status, ack) = app.webhook(&stray, &signed).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["outcome"], "unknown_order");
    }
}

mod products {
    use super::*;

    #[tokio::test]
    async fn only_staff_register_products() {
        let app = setup().await;
        let product = json!({
            "slug": "floor-lamp",
            "name": "Floor lamp",
            "unit_price": 7_500,
            "discount": 5,
            "amount": 3
        });

        let (status, _) = app
            .call(&customer(), "POST", "/products", Some(product.clone()))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, created) = app
            .call(&admin(), "POST", "/products", Some(product.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["slug"], "floor-lamp");
        assert_eq!(created["active"], true);

        let (status, body) = app.call(&admin(), "POST", "/products", Some(product)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION");
    }

    #[tokio::test]
    async fn search_with_sentinels() {
        let app = setup().await;
        let caller = customer();

        let (status, page) = app.call(&caller, "GET", "/products", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total_items"], 3);

        let (_, page) = app
            .call(&caller, "GET", "/products?min_price=-1&active=1&category=furn", None)
            .await;
        assert_eq!(page["total_items"], 2);

        let (_, page) = app
            .call(&caller, "GET", "/products?min_price=10000&max_price=30000", None)
            .await;
        let slugs: Vec<&str> = page["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["slug"].as_str().unwrap())
            .collect();
        assert_eq!(slugs, vec!["desk-lamp", "oak-desk"]);

        let (status, _) = app.call(&caller, "GET", "/products?active=7", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn staff_maintain_pricing_stock_and_activity() {
        let app = setup().await;
        let staff = admin();

        let (status, product) = app
            .call(
                &staff,
                "PUT",
                "/products/oak-desk/pricing",
                Some(json!({ "unit_price": 20_000, "discount": 25 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(product["unit_price"], 20_000);
        assert_eq!(product["discount"], 25);

        let (_, product) = app
            .call(&staff, "POST", "/products/oak-desk/restock", Some(json!({ "quantity": 8 })))
            .await;
        assert_eq!(product["amount"], 10);

        let (_, product) = app
            .call(&staff, "PUT", "/products/retired-chair/active", Some(json!({ "active": true })))
            .await;
        assert_eq!(product["active"], true);

        let buyer = customer();
        let (status, order) = app
            .place(
                &buyer,
                json!([
                    { "slug": "oak-desk", "quantity": 2 },
                    { "slug": "retired-chair", "quantity": 1 }
                ]),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        // 20000 at 25% off, twice, plus one chair at full price.
        assert_eq!(order["total_price"], 15_000 * 2 + 5_000);

        let (status, _) = app
            .call(&customer(), "POST", "/products/oak-desk/restock", Some(json!({ "quantity": 1 })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
