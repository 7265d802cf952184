//! Refund flow shared by order cancellation, return completion and admin refunds.
//!
//! Everything happens inside the caller's transaction, including the gateway
//! cancel call. When the gateway refuses, the caller rolls back and records a
//! failed refund with [`record_abort`].

use std::collections::{BTreeMap, HashMap};

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::{self, records::{OrderItem, Payment, Refund}};
use crate::domain::aggregates::{calculate_refund, OrderAmounts, OrderStatus, PaymentStatus, RefundError, RefundLine, RefundQuote, RefundStatus};
use crate::domain::events::{DomainEvent, OrderEvent, RefundEvent};
use crate::error::CommerceError;
use crate::infra::{PaymentError, PaymentGateway};
use crate::AppState;

#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub order_id: Uuid,
    pub return_id: Option<Uuid>,
    /// `(order_item_id, quantity)`
    pub lines: Vec<(Uuid, i32)>,
    pub reason: String,
    /// Withheld from the buyer, e.g. return postage.
    pub deduction: i64,
}

#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub refund: Refund,
    pub quote: RefundQuote,
    /// No refundable unit is left on the order.
    pub closes_order: bool,
    pub events: Vec<DomainEvent>,
}

/// Why a refund did not go through.
#[derive(Debug)]
pub enum RefundAbort {
    Gateway { amount: i64, source: PaymentError },
    Other(CommerceError),
}

impl From<CommerceError> for RefundAbort {
    fn from(e: CommerceError) -> Self { Self::Other(e) }
}

impl From<sqlx::Error> for RefundAbort {
    fn from(e: sqlx::Error) -> Self { Self::Other(e.into()) }
}

impl From<RefundError> for RefundAbort {
    fn from(e: RefundError) -> Self { Self::Other(e.into()) }
}

/// Merges duplicate lines and checks each against what is still refundable.
fn resolve_lines<'a>(items: &'a [OrderItem], requested: &[(Uuid, i32)]) -> Result<Vec<(&'a OrderItem, i32)>, CommerceError> {
    if requested.is_empty() { return Err(CommerceError::Validation("refund must include at least one item".into())); }
    let by_id: HashMap<Uuid, &OrderItem> = items.iter().map(|i| (i.id, i)).collect();
    let mut merged: BTreeMap<Uuid, i32> = BTreeMap::new();
    for (item_id, qty) in requested {
        if *qty <= 0 { return Err(CommerceError::Validation(format!("quantity for item {item_id} must be at least 1"))); }
        *merged.entry(*item_id).or_default() += qty;
    }
    merged
        .into_iter()
        .map(|(item_id, qty)| -> Result<(&'a OrderItem, i32), CommerceError> {
            let item = by_id.get(&item_id).ok_or_else(|| CommerceError::Validation(format!("item {item_id} does not belong to this order")))?;
            let left = item.quantity - item.refunded_quantity;
            if qty > left {
                return Err(CommerceError::Validation(format!("item {item_id} has only {left} refundable units")));
            }
            Ok((*item, qty))
        })
        .collect()
}

#[tracing::instrument(skip(tx, gateway, req), fields(order_id = %req.order_id, return_id = ?req.return_id))]
pub async fn refund_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    gateway: &dyn PaymentGateway,
    tenant_id: Uuid,
    req: &RefundRequest,
) -> Result<RefundOutcome, RefundAbort> {
    let order = db::lock_order(&mut **tx, tenant_id, req.order_id).await?;
    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE tenant_id = $1 AND order_id = $2 FOR UPDATE")
        .bind(tenant_id).bind(order.id).fetch_optional(&mut **tx).await?
        .ok_or_else(|| CommerceError::InvalidState("order has no captured payment".into()))?;
    let items = db::order_items(&mut **tx, tenant_id, order.id).await?;
    let lines = resolve_lines(&items, &req.lines)?;

    let outstanding: i32 = items.iter().map(|i| i.quantity - i.refunded_quantity).sum();
    let refunding: i32 = lines.iter().map(|(_, q)| q).sum();
    let closes_order = outstanding - refunding == 0;

    let amounts = OrderAmounts {
        subtotal: order.subtotal, discount: order.discount, shipping_fee: order.shipping_fee, total: order.total,
        already_refunded: payment.cancelled_amount,
    };
    let refund_lines: Vec<RefundLine> = lines.iter().map(|(i, q)| RefundLine { unit_price: i.unit_price, quantity: *q }).collect();
    let quote = calculate_refund(&amounts, &refund_lines, closes_order, req.deduction)?;

    for (item, qty) in &lines {
        sqlx::query("UPDATE order_items SET refunded_quantity = refunded_quantity + $2 WHERE id = $1")
            .bind(item.id).bind(qty).execute(&mut **tx).await?;
    }
    restock(&mut **tx, lines.iter().map(|(item, qty)| (item.product_id, *qty))).await?;

    let transaction_key = if quote.amount > 0 {
        match gateway.cancel(&payment.payment_key, &req.reason, quote.amount).await {
            Ok(cancelled) => cancelled.transaction_key,
            Err(source) => return Err(RefundAbort::Gateway { amount: quote.amount, source }),
        }
    } else {
        None
    };

    let refund = sqlx::query_as::<_, Refund>("INSERT INTO refunds (id, tenant_id, order_id, return_id, amount, reason, status, gateway_transaction_key, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(tenant_id).bind(order.id).bind(req.return_id).bind(quote.amount).bind(&req.reason)
        .bind(RefundStatus::Completed.as_str()).bind(&transaction_key)
        .fetch_one(&mut **tx).await?;
    for (item, qty) in &lines {
        sqlx::query("INSERT INTO refund_items (id, tenant_id, refund_id, order_item_id, quantity) VALUES ($1, $2, $3, $4, $5)")
            .bind(Uuid::now_v7()).bind(tenant_id).bind(refund.id).bind(item.id).bind(qty)
            .execute(&mut **tx).await?;
    }

    let cancelled_amount = payment.cancelled_amount + quote.amount;
    let payment_status = PaymentStatus::after_refund(payment.amount, cancelled_amount);
    sqlx::query("UPDATE payments SET cancelled_amount = $2, status = $3, updated_at = NOW() WHERE id = $1")
        .bind(payment.id).bind(cancelled_amount).bind(payment_status.as_str()).execute(&mut **tx).await?;
    sqlx::query("UPDATE orders SET payment_status = $2, updated_at = NOW() WHERE id = $1")
        .bind(order.id).bind(payment_status.as_str()).execute(&mut **tx).await?;

    if closes_order {
        if let Some(user_coupon_id) = order.user_coupon_id {
            sqlx::query("UPDATE user_coupons SET used_at = NULL, used_order_id = NULL, deleted_at = NULL WHERE id = $1")
                .bind(user_coupon_id).execute(&mut **tx).await?;
            tracing::info!(%user_coupon_id, "coupon restored after full refund");
        }
    }

    tracing::info!(refund_id = %refund.id, amount = quote.amount, closes_order, "refund issued");
    let events = vec![DomainEvent::Refund(RefundEvent::Completed { refund_id: refund.id, order_id: order.id, amount: quote.amount })];
    Ok(RefundOutcome { refund, quote, closes_order, events })
}

/// Puts units back on the shelf. Product rows are locked in id order, the
/// same order checkout reserves them in.
pub(crate) async fn restock(conn: &mut PgConnection, units: impl IntoIterator<Item = (Uuid, i32)>) -> Result<(), sqlx::Error> {
    let mut per_product: BTreeMap<Uuid, i32> = BTreeMap::new();
    for (product_id, qty) in units {
        *per_product.entry(product_id).or_default() += qty;
    }
    for (product_id, qty) in per_product.into_iter().filter(|(_, q)| *q > 0) {
        sqlx::query("UPDATE products SET inventory_quantity = inventory_quantity + $2, updated_at = NOW() WHERE id = $1")
            .bind(product_id).bind(qty).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Turns an aborted refund into the caller's error. Gateway refusals leave a
/// `failed` refund row behind; call this after the transaction is rolled back.
pub async fn record_abort(pool: &PgPool, tenant_id: Uuid, req: &RefundRequest, abort: RefundAbort) -> (CommerceError, Option<DomainEvent>) {
    match abort {
        RefundAbort::Other(e) => (e, None),
        RefundAbort::Gateway { amount, source } => {
            tracing::error!(order_id = %req.order_id, amount, error = %source, "payment gateway refused refund");
            let id = Uuid::now_v7();
            let inserted = sqlx::query("INSERT INTO refunds (id, tenant_id, order_id, return_id, amount, reason, status, failure_message, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())")
                .bind(id).bind(tenant_id).bind(req.order_id).bind(req.return_id).bind(amount).bind(&req.reason)
                .bind(RefundStatus::Failed.as_str()).bind(source.to_string())
                .execute(pool).await;
            if let Err(e) = inserted {
                tracing::error!(error = %e, "failed to record failed refund");
            }
            let event = DomainEvent::Refund(RefundEvent::Failed { refund_id: id, order_id: req.order_id, amount, reason: source.to_string() });
            (CommerceError::Payment(source), Some(event))
        }
    }
}

/// Runs [`refund_in_tx`] on `tx`. On failure the transaction is rolled back,
/// the attempt recorded, and the caller gets the error to return.
pub async fn run(
    state: &AppState,
    mut tx: Transaction<'static, Postgres>,
    tenant_id: Uuid,
    req: &RefundRequest,
) -> Result<(Transaction<'static, Postgres>, RefundOutcome), CommerceError> {
    match refund_in_tx(&mut tx, state.gateway.as_ref(), tenant_id, req).await {
        Ok(outcome) => Ok((tx, outcome)),
        Err(abort) => {
            tx.rollback().await?;
            let (err, event) = record_abort(&state.db, tenant_id, req, abort).await;
            state.events.publish(tenant_id, event).await;
            Err(err)
        }
    }
}

/// Direct refund of specific units, outside any return request.
#[tracing::instrument(skip(state, lines), fields(tenant_id = %tenant_id))]
pub async fn refund_order_items(state: &AppState, tenant_id: Uuid, order_id: Uuid, lines: Vec<(Uuid, i32)>, reason: String) -> Result<Refund, CommerceError> {
    let mut tx = state.db.begin().await?;
    let order = db::lock_order(&mut *tx, tenant_id, order_id).await?;
    let status: OrderStatus = order.status.parse()?;
    if matches!(status, OrderStatus::PendingPayment | OrderStatus::Cancelled) {
        return Err(CommerceError::InvalidState(format!("orders in status {status} cannot be refunded")));
    }
    let held = db::line_quantities(&mut *tx, tenant_id, order_id, None).await?;
    for (item_id, qty) in &lines {
        if let Some(line) = held.get(item_id) {
            let free = line.outstanding() - line.pending_cancel - line.pending_return;
            if *qty > free {
                return Err(CommerceError::Conflict(format!("item {item_id} has units held by an open request")));
            }
        }
    }

    let req = RefundRequest { order_id, return_id: None, lines, reason, deduction: 0 };
    let (mut tx, outcome) = run(state, tx, tenant_id, &req).await?;
    let mut events = outcome.events;
    if outcome.closes_order && status.can_transition_to(OrderStatus::Cancelled) {
        db::set_order_status(&mut *tx, order_id, OrderStatus::Cancelled.as_str()).await?;
        events.push(DomainEvent::Order(OrderEvent::Cancelled { order_id, refunded: outcome.refund.amount }));
    }
    tx.commit().await?;

    state.events.publish(tenant_id, events).await;
    Ok(outcome.refund)
}

pub async fn list_refunds(pool: &PgPool, tenant_id: Uuid, order_id: Uuid) -> Result<Vec<Refund>, CommerceError> {
    Ok(sqlx::query_as::<_, Refund>("SELECT * FROM refunds WHERE tenant_id = $1 AND order_id = $2 ORDER BY created_at DESC")
        .bind(tenant_id).bind(order_id).fetch_all(pool).await?)
}
