//! Checkout, payment, cancellation, refund and return flows against a real
//! Postgres database. `sqlx::test` creates a fresh database per test from
//! `DATABASE_URL` and applies the migrations.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use opensase_marketplace::api::context::{RequestContext, Role};
use opensase_marketplace::domain::aggregates::{ReturnKind, ReturnReason, ShipmentStatus};
use opensase_marketplace::infra::{ApprovedPayment, CancelledPayment, EventPublisher, PaymentError, PaymentGateway};
use opensase_marketplace::services::checkout::{self, CheckoutInput};
use opensase_marketplace::services::returns::{self, NewReturn};
use opensase_marketplace::services::shipments::{self, NewShipment};
use opensase_marketplace::services::{orders, refunds};
use opensase_marketplace::{router, AppState, CommerceError, Config};

/// Records every call. Cancels can be made to fail, and a confirm can cancel
/// the order behind the caller's back.
#[derive(Default)]
struct StubGateway {
    fail_cancel: bool,
    cancel_order_during_confirm: Option<PgPool>,
    confirms: Mutex<Vec<(String, i64)>>,
    cancels: Mutex<Vec<(String, i64)>>,
}

impl StubGateway {
    fn cancels(&self) -> Vec<(String, i64)> { self.cancels.lock().unwrap().clone() }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn confirm(&self, payment_key: &str, order_number: &str, amount: i64) -> Result<ApprovedPayment, PaymentError> {
        self.confirms.lock().unwrap().push((payment_key.to_string(), amount));
        if let Some(pool) = &self.cancel_order_during_confirm {
            sqlx::query("UPDATE orders SET status = 'cancelled' WHERE order_number = $1")
                .bind(order_number).execute(pool).await.unwrap();
        }
        Ok(ApprovedPayment {
            payment_key: payment_key.to_string(), order_id: order_number.to_string(), method: Some("card".into()),
            total_amount: amount, approved_at: None,
        })
    }

    async fn cancel(&self, payment_key: &str, _reason: &str, amount: i64) -> Result<CancelledPayment, PaymentError> {
        self.cancels.lock().unwrap().push((payment_key.to_string(), amount));
        if self.fail_cancel {
            return Err(PaymentError::Rejected { code: "NOT_CANCELABLE".into(), message: "settlement in progress".into() });
        }
        Ok(CancelledPayment { payment_key: payment_key.to_string(), transaction_key: Some(format!("tx-{amount}")), cancel_amount: amount })
    }
}

fn app_state(pool: &PgPool, gateway: Arc<StubGateway>) -> AppState {
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://unused".to_string()),
        "PAYMENT_GATEWAY_URL" => Some("http://127.0.0.1:9".to_string()),
        "PAYMENT_SECRET_KEY" => Some("sk_test".to_string()),
        _ => None,
    })
    .unwrap();
    AppState { db: pool.clone(), events: EventPublisher::default(), gateway, config: Arc::new(config) }
}

/// A tenant with one approved seller selling a 10 000 lamp (stock 5) and a 20 000 rug (stock 2).
struct Shop {
    buyer: RequestContext,
    seller: RequestContext,
    lamp: Uuid,
    rug: Uuid,
}

impl Shop {
    async fn open(pool: &PgPool) -> Self {
        let tenant_id = Uuid::new_v4();
        let seller = RequestContext { tenant_id, user_id: Uuid::new_v4(), role: Role::Seller };
        let seller_id = Self::seller_account(pool, &seller, "ADAS42", "approved").await;
        let lamp = Self::product(pool, tenant_id, seller_id, "ADAS42-GEN-LAMP01", "Desk lamp", 10_000, 5).await;
        let rug = Self::product(pool, tenant_id, seller_id, "ADAS42-GEN-RUG001", "Wool rug", 20_000, 2).await;
        let buyer = RequestContext { tenant_id, user_id: Uuid::new_v4(), role: Role::Customer };
        Self { buyer, seller, lamp, rug }
    }

    async fn seller_account(pool: &PgPool, owner: &RequestContext, code: &str, status: &str) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO sellers (id, tenant_id, owner_user_id, code, name, business_number, contact_email, status) VALUES ($1, $2, $3, $4, $4, 'RC-1', 'ops@shop.test', $5)")
            .bind(id).bind(owner.tenant_id).bind(owner.user_id).bind(code).bind(status).execute(pool).await.unwrap();
        id
    }

    /// Another seller in the same tenant, with no lines on any order.
    async fn other_seller(&self, pool: &PgPool, code: &str, status: &str) -> RequestContext {
        let ctx = RequestContext { tenant_id: self.buyer.tenant_id, user_id: Uuid::new_v4(), role: Role::Seller };
        Self::seller_account(pool, &ctx, code, status).await;
        ctx
    }

    async fn product(pool: &PgPool, tenant_id: Uuid, seller_id: Uuid, sku: &str, name: &str, price: i64, stock: i32) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO products (id, tenant_id, seller_id, sku, name, price, currency, inventory_quantity, status) VALUES ($1, $2, $3, $4, $5, $6, 'NGN', $7, 'active')")
            .bind(id).bind(tenant_id).bind(seller_id).bind(sku).bind(name).bind(price).bind(stock)
            .execute(pool).await.unwrap();
        id
    }

    async fn add_to_cart(&self, pool: &PgPool, product_id: Uuid, quantity: i32) {
        sqlx::query("INSERT INTO cart_items (id, tenant_id, user_id, product_id, quantity) VALUES ($1, $2, $3, $4, $5)")
            .bind(Uuid::new_v4()).bind(self.buyer.tenant_id).bind(self.buyer.user_id).bind(product_id).bind(quantity)
            .execute(pool).await.unwrap();
    }

    /// Issues a fixed 4 000 coupon to the buyer.
    async fn issue_coupon(&self, pool: &PgPool) -> Uuid {
        let coupon_id = Uuid::new_v4();
        sqlx::query("INSERT INTO coupons (id, tenant_id, code, name, discount_type, discount_value, starts_at, expires_at, issued_count) VALUES ($1, $2, 'WELCOME', 'Welcome', 'fixed', 4000, NOW() - INTERVAL '1 day', NOW() + INTERVAL '30 days', 1)")
            .bind(coupon_id).bind(self.buyer.tenant_id).execute(pool).await.unwrap();
        let user_coupon_id = Uuid::new_v4();
        sqlx::query("INSERT INTO user_coupons (id, tenant_id, coupon_id, user_id) VALUES ($1, $2, $3, $4)")
            .bind(user_coupon_id).bind(self.buyer.tenant_id).bind(coupon_id).bind(self.buyer.user_id)
            .execute(pool).await.unwrap();
        user_coupon_id
    }

    /// Two lamps and a rug with the coupon: subtotal 40 000, discount 4 000, shipping 3 000, total 39 000.
    async fn place_order(&self, state: &AppState) -> (Uuid, Uuid, Uuid, i64) {
        self.add_to_cart(&state.db, self.lamp, 2).await;
        self.add_to_cart(&state.db, self.rug, 1).await;
        let coupon = self.issue_coupon(&state.db).await;
        let input = CheckoutInput { shipping_address: json!({"city": "Lagos"}), billing_address: None, user_coupon_id: Some(coupon) };
        let (order, items) = checkout::place_order(state, &self.buyer, input).await.unwrap();
        let lamp_line = items.iter().find(|i| i.product_id == self.lamp).unwrap().id;
        let rug_line = items.iter().find(|i| i.product_id == self.rug).unwrap().id;
        assert_eq!((order.subtotal, order.discount, order.shipping_fee, order.total), (40_000, 4000, 3000, 39_000));
        (order.id, lamp_line, rug_line, order.total)
    }

    async fn place_paid_order(&self, state: &AppState) -> (Uuid, Uuid, Uuid) {
        let (order_id, lamp_line, rug_line, total) = self.place_order(state).await;
        checkout::confirm_payment(state, &self.buyer, order_id, "pk_live_1", total).await.unwrap();
        (order_id, lamp_line, rug_line)
    }
}

async fn stock(pool: &PgPool, product_id: Uuid) -> i32 {
    sqlx::query_scalar("SELECT inventory_quantity FROM products WHERE id = $1").bind(product_id).fetch_one(pool).await.unwrap()
}

async fn coupon_redeemed(pool: &PgPool, order_id: Uuid) -> bool {
    sqlx::query_scalar("SELECT uc.deleted_at IS NOT NULL FROM user_coupons uc JOIN orders o ON o.user_coupon_id = uc.id WHERE o.id = $1")
        .bind(order_id).fetch_one(pool).await.unwrap()
}

async fn order_statuses(pool: &PgPool, order_id: Uuid) -> (String, String) {
    sqlx::query_as("SELECT status, payment_status FROM orders WHERE id = $1").bind(order_id).fetch_one(pool).await.unwrap()
}

async fn payment_state(pool: &PgPool, order_id: Uuid) -> (i64, String) {
    sqlx::query_as("SELECT cancelled_amount, status FROM payments WHERE order_id = $1").bind(order_id).fetch_one(pool).await.unwrap()
}

#[sqlx::test(migrations = "./migrations")]
async fn test_checkout_reserves_stock_and_redeems_coupon(pool: PgPool) {
    let shop = Shop::open(&pool).await;
    let state = app_state(&pool, Arc::new(StubGateway::default()));

    let (order_id, _, _, _) = shop.place_order(&state).await;

    assert_eq!(stock(&pool, shop.lamp).await, 3);
    assert_eq!(stock(&pool, shop.rug).await, 1);
    assert!(coupon_redeemed(&pool, order_id).await);
    let cart: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items").fetch_one(&pool).await.unwrap();
    assert_eq!(cart, 0);
    assert_eq!(order_statuses(&pool, order_id).await, ("pending_payment".into(), "pending".into()));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_checkout_with_short_stock_conflicts_and_reserves_nothing(pool: PgPool) {
    let shop = Shop::open(&pool).await;
    let state = app_state(&pool, Arc::new(StubGateway::default()));
    shop.add_to_cart(&pool, shop.lamp, 2).await;
    shop.add_to_cart(&pool, shop.rug, 3).await;

    let input = CheckoutInput { shipping_address: json!({"city": "Lagos"}), billing_address: None, user_coupon_id: None };
    let err = checkout::place_order(&state, &shop.buyer, input).await.unwrap_err();

    assert!(matches!(err, CommerceError::Conflict(_)), "{err}");
    assert_eq!(stock(&pool, shop.lamp).await, 5);
    assert_eq!(stock(&pool, shop.rug).await, 2);
    let (orders, cart): (i64, i64) = sqlx::query_as("SELECT (SELECT COUNT(*) FROM orders), (SELECT COUNT(*) FROM cart_items)")
        .fetch_one(&pool).await.unwrap();
    assert_eq!((orders, cart), (0, 2));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_cancel_unpaid_order_restores_stock_and_coupon(pool: PgPool) {
    let shop = Shop::open(&pool).await;
    let gateway = Arc::new(StubGateway::default());
    let state = app_state(&pool, gateway.clone());
    let (order_id, _, _, _) = shop.place_order(&state).await;

    orders::cancel_order(&state, &shop.buyer, order_id, None).await.unwrap();

    assert_eq!(order_statuses(&pool, order_id).await, ("cancelled".into(), "failed".into()));
    assert_eq!(stock(&pool, shop.lamp).await, 5);
    assert_eq!(stock(&pool, shop.rug).await, 2);
    assert!(!coupon_redeemed(&pool, order_id).await);
    assert!(gateway.cancels().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_cancel_paid_order_refunds_everything(pool: PgPool) {
    let shop = Shop::open(&pool).await;
    let gateway = Arc::new(StubGateway::default());
    let state = app_state(&pool, gateway.clone());
    let (order_id, _, _) = shop.place_paid_order(&state).await;

    let order = orders::cancel_order(&state, &shop.buyer, order_id, Some("changed plans".into())).await.unwrap();

    assert_eq!((order.status.as_str(), order.payment_status.as_str()), ("cancelled", "refunded"));
    assert_eq!(gateway.cancels(), vec![("pk_live_1".to_string(), 39_000)]);
    assert_eq!(payment_state(&pool, order_id).await, (39_000, "refunded".into()));
    assert_eq!(stock(&pool, shop.lamp).await, 5);
    assert_eq!(stock(&pool, shop.rug).await, 2);
    assert!(!coupon_redeemed(&pool, order_id).await);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_partial_refunds_keep_coupon_until_order_closes(pool: PgPool) {
    let shop = Shop::open(&pool).await;
    let gateway = Arc::new(StubGateway::default());
    let state = app_state(&pool, gateway.clone());
    let (order_id, lamp_line, rug_line) = shop.place_paid_order(&state).await;

    // One lamp: 10 000 less its 1 000 share of the discount.
    let refund = refunds::refund_order_items(&state, shop.buyer.tenant_id, order_id, vec![(lamp_line, 1)], "scratched".into()).await.unwrap();
    assert_eq!(refund.amount, 9000);
    assert_eq!(refund.gateway_transaction_key.as_deref(), Some("tx-9000"));
    assert_eq!(payment_state(&pool, order_id).await, (9000, "partially_refunded".into()));
    assert_eq!(order_statuses(&pool, order_id).await, ("paid".into(), "partially_refunded".into()));
    assert_eq!(stock(&pool, shop.lamp).await, 4);
    assert!(coupon_redeemed(&pool, order_id).await);

    // The rest closes the order and returns whatever is left of the payment, shipping included.
    let refund = refunds::refund_order_items(&state, shop.buyer.tenant_id, order_id, vec![(lamp_line, 1), (rug_line, 1)], "out of stock".into())
        .await
        .unwrap();
    assert_eq!(refund.amount, 30_000);
    assert_eq!(payment_state(&pool, order_id).await, (39_000, "refunded".into()));
    assert_eq!(order_statuses(&pool, order_id).await, ("cancelled".into(), "refunded".into()));
    assert_eq!(stock(&pool, shop.lamp).await, 5);
    assert_eq!(stock(&pool, shop.rug).await, 2);
    assert!(!coupon_redeemed(&pool, order_id).await);

    let err = refunds::refund_order_items(&state, shop.buyer.tenant_id, order_id, vec![(lamp_line, 1)], "again".into()).await.unwrap_err();
    assert!(matches!(err, CommerceError::InvalidState(_)), "{err}");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_gateway_refusal_rolls_back_and_records_failed_refund(pool: PgPool) {
    let shop = Shop::open(&pool).await;
    let gateway = Arc::new(StubGateway { fail_cancel: true, ..Default::default() });
    let state = app_state(&pool, gateway.clone());
    let (order_id, lamp_line, _) = shop.place_paid_order(&state).await;

    let err = refunds::refund_order_items(&state, shop.buyer.tenant_id, order_id, vec![(lamp_line, 1)], "scratched".into()).await.unwrap_err();

    assert!(matches!(err, CommerceError::Payment(_)), "{err}");
    assert_eq!(gateway.cancels(), vec![("pk_live_1".to_string(), 9000)]);
    let rows = refunds::list_refunds(&pool, shop.buyer.tenant_id, order_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!((rows[0].status.as_str(), rows[0].amount), ("failed", 9000));
    assert!(rows[0].failure_message.as_deref().unwrap().contains("NOT_CANCELABLE"));

    let refunded: i32 = sqlx::query_scalar("SELECT refunded_quantity FROM order_items WHERE id = $1").bind(lamp_line).fetch_one(&pool).await.unwrap();
    assert_eq!(refunded, 0);
    assert_eq!(stock(&pool, shop.lamp).await, 3);
    assert_eq!(payment_state(&pool, order_id).await, (0, "paid".into()));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_confirm_payment_reverses_capture_when_order_moved_on(pool: PgPool) {
    let shop = Shop::open(&pool).await;
    let gateway = Arc::new(StubGateway { cancel_order_during_confirm: Some(pool.clone()), ..Default::default() });
    let state = app_state(&pool, gateway.clone());
    let (order_id, _, _, total) = shop.place_order(&state).await;

    let err = checkout::confirm_payment(&state, &shop.buyer, order_id, "pk_live_2", total).await.unwrap_err();

    assert!(matches!(err, CommerceError::Conflict(_)), "{err}");
    assert_eq!(gateway.cancels(), vec![("pk_live_2".to_string(), total)]);
    let payments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments").fetch_one(&pool).await.unwrap();
    assert_eq!(payments, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_confirm_payment_rejects_wrong_amount_before_capture(pool: PgPool) {
    let shop = Shop::open(&pool).await;
    let gateway = Arc::new(StubGateway::default());
    let state = app_state(&pool, gateway.clone());
    let (order_id, _, _, total) = shop.place_order(&state).await;

    let err = checkout::confirm_payment(&state, &shop.buyer, order_id, "pk_live_3", total - 1).await.unwrap_err();

    assert!(matches!(err, CommerceError::Validation(_)), "{err}");
    assert!(gateway.confirms.lock().unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_change_of_mind_return_deducts_postage(pool: PgPool) {
    let shop = Shop::open(&pool).await;
    let gateway = Arc::new(StubGateway::default());
    let state = app_state(&pool, gateway.clone());
    let (order_id, lamp_line, _) = shop.place_paid_order(&state).await;
    sqlx::query("UPDATE orders SET status = 'delivered', delivered_at = NOW() WHERE id = $1").bind(order_id).execute(&pool).await.unwrap();

    let input = NewReturn { kind: ReturnKind::Return, reason: ReturnReason::ChangedMind, reason_detail: None, items: vec![(lamp_line, 1)] };
    let detail = returns::request_return(&state, &shop.buyer, order_id, input).await.unwrap();
    returns::approve(&state, shop.buyer.tenant_id, detail.request.id, None).await.unwrap();
    let completed = returns::complete(&state, shop.buyer.tenant_id, detail.request.id).await.unwrap();

    assert_eq!(completed.status, "completed");
    let refund_id = completed.refund_id.unwrap();
    let amount: i64 = sqlx::query_scalar("SELECT amount FROM refunds WHERE id = $1").bind(refund_id).fetch_one(&pool).await.unwrap();
    assert_eq!(amount, 9000 - 3000);
    assert_eq!(stock(&pool, shop.lamp).await, 4);
    assert_eq!(payment_state(&pool, order_id).await, (6000, "partially_refunded".into()));
    assert_eq!(order_statuses(&pool, order_id).await.0, "delivered");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_exchange_completes_without_refund(pool: PgPool) {
    let shop = Shop::open(&pool).await;
    let gateway = Arc::new(StubGateway::default());
    let state = app_state(&pool, gateway.clone());
    let (order_id, _, rug_line) = shop.place_paid_order(&state).await;
    sqlx::query("UPDATE orders SET status = 'delivered', delivered_at = NOW() WHERE id = $1").bind(order_id).execute(&pool).await.unwrap();

    let input = NewReturn { kind: ReturnKind::Exchange, reason: ReturnReason::Damaged, reason_detail: Some("torn corner".into()), items: vec![(rug_line, 1)] };
    let detail = returns::request_return(&state, &shop.buyer, order_id, input).await.unwrap();
    returns::approve(&state, shop.buyer.tenant_id, detail.request.id, Some("sending a new one")).await.unwrap();
    let completed = returns::complete(&state, shop.buyer.tenant_id, detail.request.id).await.unwrap();

    assert_eq!(completed.status, "completed");
    assert!(completed.refund_id.is_none());
    assert!(gateway.cancels().is_empty());
    assert_eq!(stock(&pool, shop.rug).await, 1);
    assert_eq!(payment_state(&pool, order_id).await, (0, "paid".into()));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_seller_ships_own_lines_through_to_delivery(pool: PgPool) {
    let shop = Shop::open(&pool).await;
    let state = app_state(&pool, Arc::new(StubGateway::default()));
    let (order_id, lamp_line, rug_line) = shop.place_paid_order(&state).await;

    let input = NewShipment { carrier: "GIG".into(), tracking_number: "GIG-001".into(), allocations: vec![(lamp_line, 2), (rug_line, 1)] };
    let view = shipments::create_shipment(&state, &shop.seller, order_id, input).await.unwrap();
    assert_eq!(view.allocations.len(), 2);
    assert_eq!(order_statuses(&pool, order_id).await.0, "shipped");

    shipments::update_status(&state, &shop.seller, view.shipment.id, ShipmentStatus::Delivered).await.unwrap();
    assert_eq!(order_statuses(&pool, order_id).await.0, "delivered");

    let listed = shipments::list_for_order(&state, &shop.buyer, order_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].shipment.status, "delivered");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_sellers_cannot_touch_shipments_of_other_sellers(pool: PgPool) {
    let shop = Shop::open(&pool).await;
    let state = app_state(&pool, Arc::new(StubGateway::default()));
    let (order_id, lamp_line, _) = shop.place_paid_order(&state).await;
    let input = NewShipment { carrier: "GIG".into(), tracking_number: "GIG-002".into(), allocations: vec![(lamp_line, 2)] };
    let shipment_id = shipments::create_shipment(&state, &shop.seller, order_id, input).await.unwrap().shipment.id;

    let stranger = shop.other_seller(&pool, "BOLA77", "approved").await;
    let err = shipments::update_status(&state, &stranger, shipment_id, ShipmentStatus::InTransit).await.unwrap_err();
    assert!(matches!(err, CommerceError::Forbidden(_)), "{err}");
    let err = shipments::list_for_order(&state, &stranger, order_id).await.unwrap_err();
    assert!(matches!(err, CommerceError::Forbidden(_)), "{err}");

    let status: String = sqlx::query_scalar("SELECT status FROM shipments WHERE id = $1").bind(shipment_id).fetch_one(&pool).await.unwrap();
    assert_eq!(status, "ready");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_suspended_seller_cannot_ship_or_list(pool: PgPool) {
    let shop = Shop::open(&pool).await;
    let state = app_state(&pool, Arc::new(StubGateway::default()));
    let (order_id, lamp_line, _) = shop.place_paid_order(&state).await;
    sqlx::query("UPDATE sellers SET status = 'suspended' WHERE owner_user_id = $1").bind(shop.seller.user_id).execute(&pool).await.unwrap();

    let input = NewShipment { carrier: "GIG".into(), tracking_number: "GIG-003".into(), allocations: vec![(lamp_line, 1)] };
    let err = shipments::create_shipment(&state, &shop.seller, order_id, input).await.unwrap_err();
    assert!(matches!(err, CommerceError::Forbidden(_)), "{err}");
    let err = shipments::list_for_order(&state, &shop.seller, order_id).await.unwrap_err();
    assert!(matches!(err, CommerceError::Forbidden(_)), "{err}");
    assert_eq!(order_statuses(&pool, order_id).await.0, "paid");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_cart_merge_stops_at_line_limit(pool: PgPool) {
    let shop = Shop::open(&pool).await;
    let state = app_state(&pool, Arc::new(StubGateway::default()));
    let add = |quantity: i32| {
        let body = json!({"product_id": shop.lamp, "quantity": quantity}).to_string();
        Request::builder()
            .method("POST")
            .uri("/api/v1/cart/items")
            .header("x-tenant-id", shop.buyer.tenant_id.to_string())
            .header("x-user-id", shop.buyer.user_id.to_string())
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    };

    let res = router(state.clone()).oneshot(add(600)).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let res = router(state.clone()).oneshot(add(600)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let res = router(state).oneshot(add(399)).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let quantity: i32 = sqlx::query_scalar("SELECT quantity FROM cart_items WHERE product_id = $1").bind(shop.lamp).fetch_one(&pool).await.unwrap();
    assert_eq!(quantity, 999);
}
