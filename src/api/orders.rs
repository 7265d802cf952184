use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::context::RequestContext;
use super::extract::{Json, Path, Query};
use super::pagination::{ListParams, PaginatedResponse};
use crate::db::{self, records::{Order, OrderItem, Payment}};
use crate::domain::aggregates::OrderStatus;
use crate::error::{CommerceError, Result};
use crate::services::{checkout, orders};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub shipping_address: serde_json::Value,
    pub billing_address: Option<serde_json::Value>,
    pub user_coupon_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusRequest { pub status: OrderStatus }

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CancelRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmPaymentRequest {
    pub order_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub payment_key: String,
    #[validate(range(min = 1))]
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

pub async fn checkout(State(s): State<AppState>, ctx: RequestContext, Json(r): Json<CheckoutRequest>) -> Result<(StatusCode, Json<OrderDetail>)> {
    r.validate()?;
    if !r.shipping_address.is_object() {
        return Err(CommerceError::Validation("shipping_address must be an object".into()));
    }
    let input = checkout::CheckoutInput { shipping_address: r.shipping_address, billing_address: r.billing_address, user_coupon_id: r.user_coupon_id };
    let (order, items) = checkout::place_order(&s, &ctx, input).await?;
    Ok((StatusCode::CREATED, Json(OrderDetail { order, items })))
}

pub async fn list_orders(State(s): State<AppState>, ctx: RequestContext, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<Order>>> {
    let owner = if ctx.is_admin() { None } else { Some(ctx.user_id) };
    const FILTER: &str = "tenant_id = $1 AND ($2::UUID IS NULL OR user_id = $2) AND ($3::TEXT IS NULL OR status = $3)";
    let orders = sqlx::query_as::<_, Order>(&format!("SELECT * FROM orders WHERE {FILTER} ORDER BY created_at DESC LIMIT $4 OFFSET $5"))
        .bind(ctx.tenant_id).bind(owner).bind(&p.status).bind(p.limit()).bind(p.offset()).fetch_all(&s.db).await?;
    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM orders WHERE {FILTER}"))
        .bind(ctx.tenant_id).bind(owner).bind(&p.status).fetch_one(&s.db).await?;
    Ok(Json(PaginatedResponse::new(orders, total.0, &p)))
}

pub async fn get_order(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>) -> Result<Json<OrderDetail>> {
    let order = db::find_order(&s.db, ctx.tenant_id, id).await?;
    if !ctx.is_admin() && order.user_id != ctx.user_id { return Err(CommerceError::NotFound("Order")); }
    let items = db::order_items(&s.db, ctx.tenant_id, id).await?;
    Ok(Json(OrderDetail { order, items }))
}

pub async fn update_order_status(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>, Json(r): Json<OrderStatusRequest>) -> Result<Json<Order>> {
    ctx.require_admin()?;
    Ok(Json(orders::update_status(&s, ctx.tenant_id, id, r.status).await?))
}

pub async fn confirm_purchase(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>) -> Result<Json<Order>> {
    Ok(Json(orders::confirm_purchase(&s, &ctx, id).await?))
}

pub async fn cancel_order(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>, body: Option<Json<CancelRequest>>) -> Result<Json<Order>> {
    let r = body.map(|Json(r)| r).unwrap_or_default();
    r.validate()?;
    Ok(Json(orders::cancel_order(&s, &ctx, id, r.reason).await?))
}

pub async fn confirm_payment(State(s): State<AppState>, ctx: RequestContext, Json(r): Json<ConfirmPaymentRequest>) -> Result<(StatusCode, Json<Payment>)> {
    r.validate()?;
    let payment = checkout::confirm_payment(&s, &ctx, r.order_id, &r.payment_key, r.amount).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn get_payment(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>) -> Result<Json<Payment>> {
    let order = db::find_order(&s.db, ctx.tenant_id, id).await?;
    if !ctx.is_admin() && order.user_id != ctx.user_id { return Err(CommerceError::NotFound("Order")); }
    sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE tenant_id = $1 AND order_id = $2")
        .bind(ctx.tenant_id).bind(id).fetch_optional(&s.db).await?.map(Json).ok_or(CommerceError::NotFound("Payment"))
}
