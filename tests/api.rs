//! Router tests for requests that are answered before any query runs.

use std::sync::Arc;

use axum::{body::Body, http::{Request, StatusCode}, Router};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

use opensase_marketplace::infra::{EventPublisher, HttpPaymentGateway};
use opensase_marketplace::{router, AppState, Config};

fn app() -> Router {
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://localhost/marketplace_test".to_string()),
        "PAYMENT_GATEWAY_URL" => Some("http://127.0.0.1:9".to_string()),
        "PAYMENT_SECRET_KEY" => Some("test_sk".to_string()),
        _ => None,
    })
    .unwrap();
    let db = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
    let gateway = HttpPaymentGateway::new(&config.payment_gateway_url, &config.payment_secret_key).unwrap();
    router(AppState { db, events: EventPublisher::default(), gateway: Arc::new(gateway), config: Arc::new(config) })
}

fn request(method: &str, uri: &str, role: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-tenant-id", Uuid::new_v4().to_string())
        .header("x-user-id", Uuid::new_v4().to_string());
    if let Some(role) = role {
        builder = builder.header("x-user-role", role);
    }
    match body {
        Some(body) => builder.header("content-type", "application/json").body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(req: Request<Body>) -> (StatusCode, Value) {
    let res = app().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(Request::builder().uri("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "opensase-marketplace");
}

#[tokio::test]
async fn test_missing_tenant_is_unauthorized() {
    let req = Request::builder().uri("/api/v1/products").header("x-user-id", Uuid::new_v4().to_string()).body(Body::empty()).unwrap();
    let (status, body) = send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("x-tenant-id"));
}

#[tokio::test]
async fn test_unknown_role_is_unauthorized() {
    let (status, _) = send(request("GET", "/api/v1/cart", Some("superuser"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_reject_customers() {
    let coupon = json!({
        "code": "WELCOME", "name": "Welcome", "discount_type": "fixed", "discount_value": 1000,
        "starts_at": "2024-01-01T00:00:00Z", "expires_at": "2030-01-01T00:00:00Z"
    });
    let (status, body) = send(request("POST", "/api/v1/coupons", None, Some(coupon))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let uri = format!("/api/v1/orders/{}/status", Uuid::new_v4());
    let (status, _) = send(request("PUT", &uri, Some("customer"), Some(json!({"status": "shipped"})))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/v1/returns/{}/approve", Uuid::new_v4());
    let (status, _) = send(request("PUT", &uri, None, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/v1/orders/{}/refunds", Uuid::new_v4());
    let refund = json!({"items": [{"order_item_id": Uuid::new_v4(), "quantity": 1}], "reason": "damaged"});
    let (status, _) = send(request("POST", &uri, Some("seller"), Some(refund))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_catalog_writes_need_seller_or_admin() {
    let product = json!({"name": "Desk lamp", "price": 15000});
    let (status, _) = send(request("POST", "/api/v1/products", None, Some(product))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/v1/orders/{}/shipments", Uuid::new_v4());
    let shipment = json!({"carrier": "GIG", "tracking_number": "T1", "allocations": [{"order_item_id": Uuid::new_v4(), "quantity": 1}]});
    let (status, _) = send(request("POST", &uri, Some("customer"), Some(shipment))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_bodies_are_unprocessable() {
    let (status, _) = send(request("POST", "/api/v1/cart/items", None, Some(json!({"product_id": Uuid::new_v4(), "quantity": 0})))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let seller = json!({"name": "Ada Stores", "business_number": "RC-1", "contact_email": "not-an-email"});
    let (status, _) = send(request("POST", "/api/v1/sellers", None, Some(seller))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let review = json!({"order_item_id": Uuid::new_v4(), "rating": 6, "content": "Great lamp, bright and sturdy"});
    let (status, _) = send(request("POST", "/api/v1/reviews", None, Some(review))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let review = json!({"order_item_id": Uuid::new_v4(), "rating": 4, "content": "short"});
    let (status, _) = send(request("POST", "/api/v1/reviews", None, Some(review))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(request("POST", "/api/v1/checkout", None, Some(json!({"shipping_address": "somewhere"})))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "shipping_address must be an object");

    let payment = json!({"order_id": Uuid::new_v4(), "payment_key": "pk_1", "amount": 0});
    let (status, _) = send(request("POST", "/api/v1/payments/confirm", None, Some(payment))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_return_lines_need_positive_quantities() {
    let uri = format!("/api/v1/orders/{}/returns", Uuid::new_v4());
    let body = json!({"kind": "return", "reason": "defective", "items": [{"order_item_id": Uuid::new_v4(), "quantity": 0}]});
    let (status, _) = send(request("POST", &uri, None, Some(body))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let body = json!({"kind": "return", "reason": "defective", "items": []});
    let (status, _) = send(request("POST", &uri, None, Some(body))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_extractor_rejections_use_error_body() {
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/checkout")
        .header("x-tenant-id", Uuid::new_v4().to_string())
        .header("x-user-id", Uuid::new_v4().to_string())
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());

    let uri = format!("/api/v1/orders/{}/status", Uuid::new_v4());
    let (status, body) = send(request("PUT", &uri, Some("admin"), Some(json!({"status": "bogus"})))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("bogus"));

    let (status, body) = send(request("GET", "/api/v1/orders/abc", None, None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());

    let (status, body) = send(request("GET", "/api/v1/products?page=first", None, None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());
}
