//! Return, exchange and partial-cancel requests

use chrono::Utc;
use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::api::context::RequestContext;
use crate::db::{self, records::{Order, ReturnItem, ReturnRequest}};
use crate::domain::aggregates::{OrderStatus, ReturnEligibility, ReturnKind, ReturnReason, ReturnStatus};
use crate::domain::events::{DomainEvent, OrderEvent, ReturnEvent};
use crate::error::{CommerceError, Result};
use crate::services::refunds::{self, RefundRequest};
use crate::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct ReturnDetail {
    #[serde(flatten)]
    pub request: ReturnRequest,
    pub items: Vec<ReturnItem>,
}

#[derive(Debug, Clone)]
pub struct NewReturn {
    pub kind: ReturnKind,
    pub reason: ReturnReason,
    pub reason_detail: Option<String>,
    pub items: Vec<(Uuid, i32)>,
}

pub async fn find_request(conn: &mut PgConnection, tenant_id: Uuid, return_id: Uuid) -> Result<ReturnRequest> {
    sqlx::query_as::<_, ReturnRequest>("SELECT * FROM return_requests WHERE tenant_id = $1 AND id = $2")
        .bind(tenant_id).bind(return_id).fetch_optional(&mut *conn).await?.ok_or(CommerceError::NotFound("Return request"))
}

pub async fn request_items(conn: &mut PgConnection, return_id: Uuid) -> Result<Vec<ReturnItem>> {
    Ok(sqlx::query_as::<_, ReturnItem>("SELECT * FROM return_items WHERE return_id = $1 ORDER BY id")
        .bind(return_id).fetch_all(&mut *conn).await?)
}

/// Locks the owning order, then the request. Order first, matching cancellation.
async fn lock_request(conn: &mut PgConnection, tenant_id: Uuid, return_id: Uuid) -> Result<(Order, ReturnRequest, ReturnStatus)> {
    let unlocked = find_request(conn, tenant_id, return_id).await?;
    let order = db::lock_order(&mut *conn, tenant_id, unlocked.order_id).await?;
    let request = sqlx::query_as::<_, ReturnRequest>("SELECT * FROM return_requests WHERE id = $1 FOR UPDATE")
        .bind(return_id).fetch_one(&mut *conn).await?;
    let status = request.status.parse()?;
    Ok((order, request, status))
}

async fn set_status(conn: &mut PgConnection, return_id: Uuid, status: ReturnStatus, note: Option<&str>, refund_id: Option<Uuid>) -> Result<ReturnRequest> {
    Ok(sqlx::query_as::<_, ReturnRequest>("UPDATE return_requests SET status = $2, admin_note = COALESCE($3, admin_note), refund_id = COALESCE($4, refund_id), updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(return_id).bind(status.as_str()).bind(note).bind(refund_id).fetch_one(&mut *conn).await?)
}

#[tracing::instrument(skip(state, input), fields(tenant_id = %ctx.tenant_id, kind = input.kind.as_str()))]
pub async fn request_return(state: &AppState, ctx: &RequestContext, order_id: Uuid, input: NewReturn) -> Result<ReturnDetail> {
    let mut tx = state.db.begin().await?;
    let order = db::lock_order(&mut *tx, ctx.tenant_id, order_id).await?;
    if order.user_id != ctx.user_id { return Err(CommerceError::NotFound("Order")); }

    let eligibility = ReturnEligibility {
        order_status: order.status.parse()?,
        delivered_at: order.delivered_at,
        window_days: state.config.return_window_days,
        lines: db::line_quantities(&mut *tx, ctx.tenant_id, order_id, None).await?,
    };
    eligibility.check(input.kind, &input.items, Utc::now())?;

    let request = sqlx::query_as::<_, ReturnRequest>("INSERT INTO return_requests (id, tenant_id, order_id, user_id, kind, status, reason, reason_detail, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(ctx.tenant_id).bind(order_id).bind(ctx.user_id).bind(input.kind.as_str())
        .bind(ReturnStatus::Requested.as_str()).bind(input.reason.as_str()).bind(&input.reason_detail)
        .fetch_one(&mut *tx).await?;
    let mut items = Vec::with_capacity(input.items.len());
    for (order_item_id, quantity) in &input.items {
        let item = sqlx::query_as::<_, ReturnItem>("INSERT INTO return_items (id, tenant_id, return_id, order_item_id, quantity) VALUES ($1, $2, $3, $4, $5) RETURNING *")
            .bind(Uuid::now_v7()).bind(ctx.tenant_id).bind(request.id).bind(order_item_id).bind(quantity)
            .fetch_one(&mut *tx).await?;
        items.push(item);
    }
    tx.commit().await?;

    tracing::info!(return_id = %request.id, %order_id, "return requested");
    let event = ReturnEvent::Requested { return_id: request.id, order_id, kind: request.kind.clone() };
    state.events.publish(ctx.tenant_id, [DomainEvent::Return(event)]).await;
    Ok(ReturnDetail { request, items })
}

#[tracing::instrument(skip(state), fields(tenant_id = %ctx.tenant_id))]
pub async fn withdraw(state: &AppState, ctx: &RequestContext, return_id: Uuid) -> Result<ReturnRequest> {
    let mut tx = state.db.begin().await?;
    let (_, request, status) = lock_request(&mut tx, ctx.tenant_id, return_id).await?;
    if request.user_id != ctx.user_id { return Err(CommerceError::NotFound("Return request")); }
    let next = status.transition(ReturnStatus::Withdrawn)?;
    let request = set_status(&mut tx, return_id, next, None, None).await?;
    tx.commit().await?;

    tracing::info!(%return_id, "return withdrawn");
    state.events.publish(ctx.tenant_id, [DomainEvent::Return(ReturnEvent::Withdrawn { return_id })]).await;
    Ok(request)
}

#[tracing::instrument(skip(state, note), fields(tenant_id = %tenant_id))]
pub async fn reject(state: &AppState, tenant_id: Uuid, return_id: Uuid, note: &str) -> Result<ReturnRequest> {
    let mut tx = state.db.begin().await?;
    let (_, _, status) = lock_request(&mut tx, tenant_id, return_id).await?;
    let next = status.transition(ReturnStatus::Rejected)?;
    let request = set_status(&mut tx, return_id, next, Some(note), None).await?;
    tx.commit().await?;

    tracing::info!(%return_id, "return rejected");
    state.events.publish(tenant_id, [DomainEvent::Return(ReturnEvent::Rejected { return_id })]).await;
    Ok(request)
}

/// Approves a request. Cancel requests settle at once through the refund flow.
#[tracing::instrument(skip(state, note), fields(tenant_id = %tenant_id))]
pub async fn approve(state: &AppState, tenant_id: Uuid, return_id: Uuid, note: Option<&str>) -> Result<ReturnRequest> {
    let mut tx = state.db.begin().await?;
    let (_, request, status) = lock_request(&mut tx, tenant_id, return_id).await?;
    let approved = status.transition(ReturnStatus::Approved)?;
    let request = set_status(&mut tx, return_id, approved, note, None).await?;
    tx.commit().await?;

    tracing::info!(%return_id, kind = %request.kind, "return approved");
    state.events.publish(tenant_id, [DomainEvent::Return(ReturnEvent::Approved { return_id })]).await;

    if request.kind.parse::<ReturnKind>()? == ReturnKind::Cancel {
        return complete(state, tenant_id, return_id).await;
    }
    Ok(request)
}

/// Settles an approved request: refunds returns and cancels, closes exchanges.
#[tracing::instrument(skip(state), fields(tenant_id = %tenant_id))]
pub async fn complete(state: &AppState, tenant_id: Uuid, return_id: Uuid) -> Result<ReturnRequest> {
    let mut tx = state.db.begin().await?;
    let (order, request, status) = lock_request(&mut tx, tenant_id, return_id).await?;
    let next = status.transition(ReturnStatus::Completed)?;
    let kind: ReturnKind = request.kind.parse()?;
    let reason: ReturnReason = request.reason.parse()?;

    let mut events = Vec::new();
    let refund_id = match kind {
        ReturnKind::Exchange => {
            events.push(DomainEvent::Return(ReturnEvent::ExchangeCompleted { return_id, order_id: order.id }));
            None
        }
        ReturnKind::Return | ReturnKind::Cancel => {
            let items = request_items(&mut tx, return_id).await?;
            let deduction = if kind == ReturnKind::Return && reason.is_buyer_fault() { state.config.return_shipping_fee } else { 0 };
            let req = RefundRequest {
                order_id: order.id,
                return_id: Some(return_id),
                lines: items.iter().map(|i| (i.order_item_id, i.quantity)).collect(),
                reason: format!("{} request {}", kind.as_str(), reason.as_str()),
                deduction,
            };
            let (returned_tx, outcome) = refunds::run(state, tx, tenant_id, &req).await?;
            tx = returned_tx;
            events.extend(outcome.events);

            let order_status: OrderStatus = order.status.parse()?;
            if outcome.closes_order && kind == ReturnKind::Cancel && order_status.can_transition_to(OrderStatus::Cancelled) {
                db::set_order_status(&mut *tx, order.id, OrderStatus::Cancelled.as_str()).await?;
                events.push(DomainEvent::Order(OrderEvent::Cancelled { order_id: order.id, refunded: outcome.refund.amount }));
            }
            Some(outcome.refund.id)
        }
    };

    let request = set_status(&mut tx, return_id, next, None, refund_id).await?;
    tx.commit().await?;

    tracing::info!(%return_id, ?refund_id, "return completed");
    events.push(DomainEvent::Return(ReturnEvent::Completed { return_id, refund_id }));
    state.events.publish(tenant_id, events).await;
    Ok(request)
}

pub async fn detail(state: &AppState, ctx: &RequestContext, return_id: Uuid) -> Result<ReturnDetail> {
    let mut conn = state.db.acquire().await?;
    let request = find_request(&mut conn, ctx.tenant_id, return_id).await?;
    ctx.require_owner_or_admin(request.user_id)?;
    let items = request_items(&mut conn, return_id).await?;
    Ok(ReturnDetail { request, items })
}

pub async fn list_for_order(state: &AppState, ctx: &RequestContext, order_id: Uuid) -> Result<Vec<ReturnDetail>> {
    let mut conn = state.db.acquire().await?;
    let order = db::find_order(&mut *conn, ctx.tenant_id, order_id).await?;
    ctx.require_owner_or_admin(order.user_id)?;
    let requests = sqlx::query_as::<_, ReturnRequest>("SELECT * FROM return_requests WHERE tenant_id = $1 AND order_id = $2 ORDER BY created_at DESC")
        .bind(ctx.tenant_id).bind(order_id).fetch_all(&mut *conn).await?;
    let mut details = Vec::with_capacity(requests.len());
    for request in requests {
        let items = request_items(&mut conn, request.id).await?;
        details.push(ReturnDetail { request, items });
    }
    Ok(details)
}
