//! HTTP surface. Every `/api/v1` route expects the tenant and user headers.

pub mod carts;
pub mod categories;
pub mod context;
pub mod coupons;
pub mod extract;
pub mod orders;
pub mod pagination;
pub mod products;
pub mod returns;
pub mod reviews;
pub mod sellers;
pub mod shipments;

use axum::{routing::{delete, get, post, put}, Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/sellers", get(sellers::list_sellers).post(sellers::register_seller))
        .route("/sellers/:id", get(sellers::get_seller))
        .route("/sellers/:id/status", put(sellers::update_seller_status))
        .route("/categories", get(categories::list_categories).post(categories::create_category))
        .route("/categories/:id", get(categories::get_category))
        .route("/products", get(products::list_products).post(products::create_product))
        .route("/products/:id", get(products::get_product).put(products::update_product).delete(products::archive_product))
        .route("/products/:id/inventory", post(products::adjust_inventory))
        .route("/products/:id/reviews", get(reviews::list_product_reviews))
        .route("/cart", get(carts::get_cart).delete(carts::clear_cart))
        .route("/cart/items", post(carts::add_item))
        .route("/cart/items/:product_id", put(carts::update_item).delete(carts::remove_item))
        .route("/coupons", get(coupons::list_coupons).post(coupons::create_coupon))
        .route("/coupons/:id/deactivate", put(coupons::deactivate_coupon))
        .route("/coupons/issue", post(coupons::issue_coupon))
        .route("/coupons/mine", get(coupons::my_coupons))
        .route("/coupons/preview", post(coupons::preview_discount))
        .route("/checkout", post(orders::checkout))
        .route("/orders", get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/status", put(orders::update_order_status))
        .route("/orders/:id/confirm", post(orders::confirm_purchase))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .route("/orders/:id/payment", get(orders::get_payment))
        .route("/payments/confirm", post(orders::confirm_payment))
        .route("/orders/:id/shipments", get(shipments::list_shipments).post(shipments::create_shipment))
        .route("/shipments/:id/status", put(shipments::update_shipment_status))
        .route("/orders/:id/returns", get(returns::list_order_returns).post(returns::request_return))
        .route("/orders/:id/refunds", get(returns::list_refunds).post(returns::refund_items))
        .route("/returns", get(returns::list_returns))
        .route("/returns/:id", get(returns::get_return))
        .route("/returns/:id/withdraw", put(returns::withdraw_return))
        .route("/returns/:id/reject", put(returns::reject_return))
        .route("/returns/:id/approve", put(returns::approve_return))
        .route("/returns/:id/complete", put(returns::complete_return))
        .route("/reviews", post(reviews::create_review))
        .route("/reviews/:id", delete(reviews::delete_review));

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-marketplace"})) }))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
