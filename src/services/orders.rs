//! Order lifecycle after checkout: status changes, purchase confirmation and cancellation.

use uuid::Uuid;

use crate::api::context::RequestContext;
use crate::db::{self, records::Order};
use crate::domain::aggregates::{OrderStatus, PaymentStatus, ReturnStatus};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::error::{CommerceError, Result};
use crate::services::refunds::{self, RefundRequest};
use crate::AppState;

fn status_changed(order_id: Uuid, from: OrderStatus, to: OrderStatus) -> DomainEvent {
    DomainEvent::Order(OrderEvent::StatusChanged { order_id, from: from.to_string(), to: to.to_string() })
}

/// Moves an order forward along the status machine.
#[tracing::instrument(skip(state), fields(tenant_id = %tenant_id))]
pub async fn update_status(state: &AppState, tenant_id: Uuid, order_id: Uuid, next: OrderStatus) -> Result<Order> {
    if next == OrderStatus::Cancelled {
        return Err(CommerceError::Validation("use the cancel endpoint to cancel an order".into()));
    }
    let mut tx = state.db.begin().await?;
    let order = db::lock_order(&mut *tx, tenant_id, order_id).await?;
    let current: OrderStatus = order.status.parse()?;
    current.transition(next)?;
    db::set_order_status(&mut *tx, order_id, next.as_str()).await?;
    let order = db::find_order(&mut *tx, tenant_id, order_id).await?;
    tx.commit().await?;

    tracing::info!(%order_id, from = %current, to = %next, "order status changed");
    state.events.publish(tenant_id, [status_changed(order_id, current, next)]).await;
    Ok(order)
}

/// Buyer acknowledges receipt, closing the order.
#[tracing::instrument(skip(state), fields(tenant_id = %ctx.tenant_id))]
pub async fn confirm_purchase(state: &AppState, ctx: &RequestContext, order_id: Uuid) -> Result<Order> {
    let mut tx = state.db.begin().await?;
    let order = db::lock_order(&mut *tx, ctx.tenant_id, order_id).await?;
    if order.user_id != ctx.user_id { return Err(CommerceError::NotFound("Order")); }
    let current: OrderStatus = order.status.parse()?;
    let next = current.transition(OrderStatus::Completed)?;
    db::set_order_status(&mut *tx, order_id, next.as_str()).await?;
    let order = db::find_order(&mut *tx, ctx.tenant_id, order_id).await?;
    tx.commit().await?;

    tracing::info!(%order_id, "purchase confirmed");
    state.events.publish(ctx.tenant_id, [status_changed(order_id, current, next)]).await;
    Ok(order)
}

#[tracing::instrument(skip(state), fields(tenant_id = %ctx.tenant_id))]
pub async fn cancel_order(state: &AppState, ctx: &RequestContext, order_id: Uuid, reason: Option<String>) -> Result<Order> {
    let tenant_id = ctx.tenant_id;
    let mut tx = state.db.begin().await?;
    let order = db::lock_order(&mut *tx, tenant_id, order_id).await?;
    ctx.require_owner_or_admin(order.user_id)?;
    let current: OrderStatus = order.status.parse()?;

    let mut events = Vec::new();
    let refunded = match current {
        OrderStatus::PendingPayment => {
            let items = db::order_items(&mut *tx, tenant_id, order_id).await?;
            refunds::restock(&mut tx, items.iter().map(|i| (i.product_id, i.quantity - i.refunded_quantity))).await?;
            if let Some(user_coupon_id) = order.user_coupon_id {
                sqlx::query("UPDATE user_coupons SET used_at = NULL, used_order_id = NULL, deleted_at = NULL WHERE id = $1")
                    .bind(user_coupon_id).execute(&mut *tx).await?;
            }
            sqlx::query("UPDATE orders SET payment_status = $2, updated_at = NOW() WHERE id = $1")
                .bind(order_id).bind(PaymentStatus::Failed.as_str()).execute(&mut *tx).await?;
            0
        }
        OrderStatus::Paid | OrderStatus::Preparing => {
            let lines = db::line_quantities(&mut *tx, tenant_id, order_id, None).await?;
            if lines.values().any(|l| l.allocated > 0) {
                return Err(CommerceError::InvalidState("order already has shipments; request a return instead".into()));
            }
            let req = RefundRequest {
                order_id,
                return_id: None,
                lines: lines.iter().filter(|(_, l)| l.outstanding() > 0).map(|(id, l)| (*id, l.outstanding())).collect(),
                reason: reason.unwrap_or_else(|| "order cancelled".to_string()),
                deduction: 0,
            };
            let (returned_tx, outcome) = refunds::run(state, tx, tenant_id, &req).await?;
            tx = returned_tx;
            let withdrawn = sqlx::query("UPDATE return_requests SET status = $2, updated_at = NOW() WHERE order_id = $1 AND status IN ('requested', 'approved')")
                .bind(order_id).bind(ReturnStatus::Withdrawn.as_str()).execute(&mut *tx).await?;
            if withdrawn.rows_affected() > 0 {
                tracing::info!(%order_id, count = withdrawn.rows_affected(), "open requests withdrawn by cancellation");
            }
            events.extend(outcome.events);
            outcome.refund.amount
        }
        other => return Err(CommerceError::InvalidState(format!("orders in status {other} cannot be cancelled"))),
    };

    let next = current.transition(OrderStatus::Cancelled)?;
    db::set_order_status(&mut *tx, order_id, next.as_str()).await?;
    let order = db::find_order(&mut *tx, tenant_id, order_id).await?;
    tx.commit().await?;

    tracing::info!(%order_id, refunded, "order cancelled");
    events.push(DomainEvent::Order(OrderEvent::Cancelled { order_id, refunded }));
    state.events.publish(tenant_id, events).await;
    Ok(order)
}
