//! Checkout and payment capture

use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::api::context::RequestContext;
use crate::db::{self, records::{CartLine, Order, OrderItem, Payment}};
use crate::domain::aggregates::{Coupon, LineItem, OrderDraft, OrderStatus, PaymentStatus, UserCoupon};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::Money;
use crate::error::{CommerceError, Result};
use crate::AppState;

#[derive(Debug, Clone)]
pub struct CheckoutInput {
    pub shipping_address: serde_json::Value,
    pub billing_address: Option<serde_json::Value>,
    pub user_coupon_id: Option<Uuid>,
}

const CART_LINES: &str = r#"
SELECT ci.product_id, p.seller_id, p.sku, p.name, ci.quantity, p.price AS unit_price, p.currency,
       p.status AS product_status, p.inventory_quantity
FROM cart_items ci JOIN products p ON p.id = ci.product_id
WHERE ci.tenant_id = $1 AND ci.user_id = $2
ORDER BY ci.product_id
FOR UPDATE OF ci
"#;

/// Discount granted by `user_coupon_id` for `amount`, locking the user coupon row.
async fn coupon_discount(conn: &mut PgConnection, ctx: &RequestContext, user_coupon_id: Uuid, amount: i64) -> Result<i64> {
    let uc = sqlx::query_as::<_, db::records::UserCoupon>("SELECT * FROM user_coupons WHERE tenant_id = $1 AND id = $2 AND user_id = $3 FOR UPDATE")
        .bind(ctx.tenant_id).bind(user_coupon_id).bind(ctx.user_id)
        .fetch_optional(&mut *conn).await?.ok_or(CommerceError::NotFound("Coupon"))?;
    let record = sqlx::query_as::<_, db::records::Coupon>("SELECT * FROM coupons WHERE id = $1")
        .bind(uc.coupon_id).fetch_one(&mut *conn).await?;
    let coupon = Coupon::try_from(&record)?;
    Ok(coupon.redeem(&UserCoupon::from(&uc), amount, Utc::now())?)
}

#[tracing::instrument(skip(state, input), fields(tenant_id = %ctx.tenant_id, user_id = %ctx.user_id))]
pub async fn place_order(state: &AppState, ctx: &RequestContext, input: CheckoutInput) -> Result<(Order, Vec<OrderItem>)> {
    let mut tx = state.db.begin().await?;

    let lines = sqlx::query_as::<_, CartLine>(CART_LINES).bind(ctx.tenant_id).bind(ctx.user_id).fetch_all(&mut *tx).await?;
    if lines.is_empty() { return Err(CommerceError::Validation("cart is empty".into())); }

    let mut draft = OrderDraft::create(ctx.user_id, &state.config.currency);
    for line in &lines {
        if line.product_status != "active" {
            return Err(CommerceError::Conflict(format!("product {} is no longer available", line.sku)));
        }
        let reserved = sqlx::query("UPDATE products SET inventory_quantity = inventory_quantity - $3, updated_at = NOW() WHERE tenant_id = $1 AND id = $2 AND inventory_quantity >= $3")
            .bind(ctx.tenant_id).bind(line.product_id).bind(line.quantity).execute(&mut *tx).await?;
        if reserved.rows_affected() == 0 {
            return Err(CommerceError::Conflict(format!("insufficient stock for {}", line.sku)));
        }
        draft.add_item(LineItem {
            product_id: line.product_id, seller_id: line.seller_id, sku: line.sku.clone(), name: line.name.clone(),
            quantity: u32::try_from(line.quantity).unwrap_or(0), unit_price: Money::new(line.unit_price, &line.currency),
        })?;
    }

    let discount = match input.user_coupon_id {
        Some(id) => coupon_discount(&mut *tx, ctx, id, draft.subtotal()).await?,
        None => 0,
    };
    draft.price(discount, &state.config.shipping_policy())?;

    let billing = input.billing_address.unwrap_or_else(|| input.shipping_address.clone());
    let order = sqlx::query_as::<_, Order>("INSERT INTO orders (id, tenant_id, order_number, user_id, status, payment_status, subtotal, discount, shipping_fee, total, currency, user_coupon_id, shipping_address, billing_address, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15) RETURNING *")
        .bind(draft.id()).bind(ctx.tenant_id).bind(draft.order_number()).bind(ctx.user_id)
        .bind(OrderStatus::PendingPayment.as_str()).bind(PaymentStatus::Pending.as_str())
        .bind(draft.subtotal()).bind(draft.discount()).bind(draft.shipping_fee()).bind(draft.total()).bind(&state.config.currency)
        .bind(input.user_coupon_id).bind(&input.shipping_address).bind(&billing).bind(draft.created_at())
        .fetch_one(&mut *tx).await?;

    let mut items = Vec::with_capacity(draft.items().len());
    for item in draft.items() {
        let row = sqlx::query_as::<_, OrderItem>("INSERT INTO order_items (id, tenant_id, order_id, product_id, seller_id, sku, name, unit_price, quantity, total) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *")
            .bind(Uuid::now_v7()).bind(ctx.tenant_id).bind(order.id).bind(item.product_id).bind(item.seller_id)
            .bind(&item.sku).bind(&item.name).bind(item.unit_price.amount()).bind(item.quantity as i32).bind(item.line_total().amount())
            .fetch_one(&mut *tx).await?;
        items.push(row);
    }

    if let Some(id) = input.user_coupon_id {
        sqlx::query("UPDATE user_coupons SET used_at = NOW(), used_order_id = $2, deleted_at = NOW() WHERE id = $1")
            .bind(id).bind(order.id).execute(&mut *tx).await?;
    }
    sqlx::query("DELETE FROM cart_items WHERE tenant_id = $1 AND user_id = $2").bind(ctx.tenant_id).bind(ctx.user_id).execute(&mut *tx).await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id, order_number = %order.order_number, total = order.total, "order placed");
    state.events.publish(ctx.tenant_id, draft.take_events()).await;
    Ok((order, items))
}

#[tracing::instrument(skip(state, payment_key), fields(tenant_id = %ctx.tenant_id))]
pub async fn confirm_payment(state: &AppState, ctx: &RequestContext, order_id: Uuid, payment_key: &str, amount: i64) -> Result<Payment> {
    let order = db::find_order(&state.db, ctx.tenant_id, order_id).await?;
    if order.user_id != ctx.user_id { return Err(CommerceError::NotFound("Order")); }
    if order.status.parse::<OrderStatus>()? != OrderStatus::PendingPayment {
        return Err(CommerceError::InvalidState(format!("order is {}, not awaiting payment", order.status)));
    }
    if amount != order.total {
        return Err(CommerceError::Validation(format!("amount {amount} does not match order total {}", order.total)));
    }

    let approved = state.gateway.confirm(payment_key, &order.order_number, amount).await?;

    let mut tx = state.db.begin().await?;
    let locked = db::lock_order(&mut *tx, ctx.tenant_id, order_id).await?;
    if locked.status != OrderStatus::PendingPayment.as_str() {
        drop(tx);
        tracing::error!(%order_id, status = %locked.status, "order changed while payment was captured, reversing");
        if let Err(e) = state.gateway.cancel(&approved.payment_key, "order no longer awaiting payment", approved.total_amount).await {
            tracing::error!(%order_id, error = %e, "failed to reverse captured payment");
        }
        return Err(CommerceError::Conflict("order is no longer awaiting payment".into()));
    }

    let payment = sqlx::query_as::<_, Payment>("INSERT INTO payments (id, tenant_id, order_id, payment_key, method, amount, cancelled_amount, status, approved_at, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8, NOW(), NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(ctx.tenant_id).bind(order_id).bind(&approved.payment_key).bind(&approved.method)
        .bind(approved.total_amount).bind(PaymentStatus::Paid.as_str()).bind(approved.approved_at.unwrap_or_else(Utc::now))
        .fetch_one(&mut *tx).await?;
    sqlx::query("UPDATE orders SET status = $2, payment_status = $3, updated_at = NOW() WHERE id = $1")
        .bind(order_id).bind(OrderStatus::Paid.as_str()).bind(PaymentStatus::Paid.as_str())
        .execute(&mut *tx).await?;
    tx.commit().await?;

    tracing::info!(%order_id, amount = payment.amount, "payment captured");
    let event = DomainEvent::Order(OrderEvent::Paid { order_id, payment_key: payment.payment_key.clone(), amount: payment.amount });
    state.events.publish(ctx.tenant_id, [event]).await;
    Ok(payment)
}
