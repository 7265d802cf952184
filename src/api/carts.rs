use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::context::RequestContext;
use super::extract::{Json, Path};
use crate::db::records::{CartLine, Product};
use crate::domain::aggregates::{Cart, CartError, CartItem, ProductStatus, MAX_LINE_QUANTITY};
use crate::domain::value_objects::Money;
use crate::error::{CommerceError, Result};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 999))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 0, max = 999))]
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CartLineView { pub product_id: Uuid, pub sku: String, pub name: String, pub quantity: u32, pub unit_price: i64, pub line_total: i64 }

#[derive(Debug, Serialize)]
pub struct CartView { pub items: Vec<CartLineView>, pub item_count: usize, pub subtotal: i64, pub currency: String }

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        let items = cart.items().iter().map(|i| CartLineView {
            product_id: i.product_id, sku: i.sku.clone(), name: i.name.clone(), quantity: i.quantity,
            unit_price: i.unit_price.amount(), line_total: i.line_total().amount(),
        }).collect();
        Self { items, item_count: cart.item_count(), subtotal: cart.subtotal().amount(), currency: cart.subtotal().currency().to_string() }
    }
}

/// Current cart with live product prices.
async fn load_cart(s: &AppState, ctx: &RequestContext) -> Result<Cart> {
    let lines = sqlx::query_as::<_, CartLine>("SELECT ci.product_id, p.seller_id, p.sku, p.name, ci.quantity, p.price AS unit_price, p.currency, p.status AS product_status, p.inventory_quantity FROM cart_items ci JOIN products p ON p.id = ci.product_id WHERE ci.tenant_id = $1 AND ci.user_id = $2 ORDER BY ci.created_at")
        .bind(ctx.tenant_id).bind(ctx.user_id).fetch_all(&s.db).await?;
    let mut cart = Cart::new(&s.config.currency);
    for l in lines {
        cart.add_item(CartItem { product_id: l.product_id, name: l.name, sku: l.sku, quantity: l.quantity.max(0) as u32, unit_price: Money::new(l.unit_price, &l.currency) })?;
    }
    Ok(cart)
}

pub async fn get_cart(State(s): State<AppState>, ctx: RequestContext) -> Result<Json<CartView>> {
    let cart = load_cart(&s, &ctx).await?;
    Ok(Json(CartView::from(&cart)))
}

pub async fn add_item(State(s): State<AppState>, ctx: RequestContext, Json(r): Json<AddToCartRequest>) -> Result<(StatusCode, Json<CartView>)> {
    r.validate()?;
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE tenant_id = $1 AND id = $2")
        .bind(ctx.tenant_id).bind(r.product_id).fetch_optional(&s.db).await?.ok_or(CommerceError::NotFound("Product"))?;
    if product.status != ProductStatus::Active.as_str() {
        return Err(CommerceError::Conflict(format!("product {} is not available", product.sku)));
    }
    let mut cart = load_cart(&s, &ctx).await?;
    cart.add_item(CartItem {
        product_id: product.id, name: product.name.clone(), sku: product.sku.clone(),
        quantity: r.quantity as u32, unit_price: Money::new(product.price, &product.currency),
    })?;
    let upserted = sqlx::query("INSERT INTO cart_items (id, tenant_id, user_id, product_id, quantity, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) ON CONFLICT (tenant_id, user_id, product_id) DO UPDATE SET quantity = cart_items.quantity + $5, updated_at = NOW() WHERE cart_items.quantity + $5 <= $6")
        .bind(Uuid::now_v7()).bind(ctx.tenant_id).bind(ctx.user_id).bind(r.product_id).bind(r.quantity).bind(MAX_LINE_QUANTITY as i32)
        .execute(&s.db).await?;
    if upserted.rows_affected() == 0 {
        return Err(CartError::QuantityLimit(MAX_LINE_QUANTITY).into());
    }
    let cart = load_cart(&s, &ctx).await?;
    Ok((StatusCode::CREATED, Json(CartView::from(&cart))))
}

pub async fn update_item(State(s): State<AppState>, ctx: RequestContext, Path(product_id): Path<Uuid>, Json(r): Json<UpdateCartItemRequest>) -> Result<Json<CartView>> {
    r.validate()?;
    let mut cart = load_cart(&s, &ctx).await?;
    cart.update_quantity(product_id, r.quantity as u32)?;
    if r.quantity == 0 {
        sqlx::query("DELETE FROM cart_items WHERE tenant_id = $1 AND user_id = $2 AND product_id = $3")
            .bind(ctx.tenant_id).bind(ctx.user_id).bind(product_id).execute(&s.db).await?;
    } else {
        sqlx::query("UPDATE cart_items SET quantity = $4, updated_at = NOW() WHERE tenant_id = $1 AND user_id = $2 AND product_id = $3")
            .bind(ctx.tenant_id).bind(ctx.user_id).bind(product_id).bind(r.quantity).execute(&s.db).await?;
    }
    Ok(Json(CartView::from(&cart)))
}

pub async fn remove_item(State(s): State<AppState>, ctx: RequestContext, Path(product_id): Path<Uuid>) -> Result<Json<CartView>> {
    let mut cart = load_cart(&s, &ctx).await?;
    cart.remove_item(product_id)?;
    sqlx::query("DELETE FROM cart_items WHERE tenant_id = $1 AND user_id = $2 AND product_id = $3")
        .bind(ctx.tenant_id).bind(ctx.user_id).bind(product_id).execute(&s.db).await?;
    Ok(Json(CartView::from(&cart)))
}

pub async fn clear_cart(State(s): State<AppState>, ctx: RequestContext) -> Result<StatusCode> {
    sqlx::query("DELETE FROM cart_items WHERE tenant_id = $1 AND user_id = $2").bind(ctx.tenant_id).bind(ctx.user_id).execute(&s.db).await?;
    Ok(StatusCode::NO_CONTENT)
}
