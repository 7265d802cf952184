//! Return requests and refunds

use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::context::RequestContext;
use super::extract::{Json, Path, Query};
use super::pagination::{ListParams, PaginatedResponse};
use crate::db::{self, records::{Refund, ReturnRequest}};
use crate::domain::aggregates::{ReturnKind, ReturnReason};
use crate::error::{CommerceError, Result};
use crate::services::refunds;
use crate::services::returns::{self, NewReturn, ReturnDetail};
use crate::AppState;

#[derive(Debug, Deserialize, Serialize)]
pub struct LineRequest { pub order_item_id: Uuid, pub quantity: i32 }

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReturnRequest {
    pub kind: ReturnKind,
    pub reason: ReturnReason,
    #[validate(length(max = 2000))]
    pub reason_detail: Option<String>,
    #[validate(length(min = 1))]
    pub items: Vec<LineRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectRequest {
    #[validate(length(min = 1, max = 2000))]
    pub note: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ApproveRequest {
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundItemsRequest {
    #[validate(length(min = 1))]
    pub items: Vec<LineRequest>,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

fn check_lines(lines: &[LineRequest]) -> Result<Vec<(Uuid, i32)>> {
    if let Some(l) = lines.iter().find(|l| l.quantity < 1) {
        return Err(CommerceError::Validation(format!("quantity for item {} must be at least 1", l.order_item_id)));
    }
    Ok(lines.iter().map(|l| (l.order_item_id, l.quantity)).collect())
}

pub async fn request_return(State(s): State<AppState>, ctx: RequestContext, Path(order_id): Path<Uuid>, Json(r): Json<CreateReturnRequest>) -> Result<(StatusCode, Json<ReturnDetail>)> {
    r.validate()?;
    let items = check_lines(&r.items)?;
    let input = NewReturn { kind: r.kind, reason: r.reason, reason_detail: r.reason_detail, items };
    let detail = returns::request_return(&s, &ctx, order_id, input).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn list_order_returns(State(s): State<AppState>, ctx: RequestContext, Path(order_id): Path<Uuid>) -> Result<Json<Vec<ReturnDetail>>> {
    Ok(Json(returns::list_for_order(&s, &ctx, order_id).await?))
}

pub async fn list_returns(State(s): State<AppState>, ctx: RequestContext, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<ReturnRequest>>> {
    ctx.require_admin()?;
    let requests = sqlx::query_as::<_, ReturnRequest>("SELECT * FROM return_requests WHERE tenant_id = $1 AND ($2::TEXT IS NULL OR status = $2) ORDER BY created_at DESC LIMIT $3 OFFSET $4")
        .bind(ctx.tenant_id).bind(&p.status).bind(p.limit()).bind(p.offset()).fetch_all(&s.db).await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM return_requests WHERE tenant_id = $1 AND ($2::TEXT IS NULL OR status = $2)")
        .bind(ctx.tenant_id).bind(&p.status).fetch_one(&s.db).await?;
    Ok(Json(PaginatedResponse::new(requests, total.0, &p)))
}

pub async fn get_return(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>) -> Result<Json<ReturnDetail>> {
    Ok(Json(returns::detail(&s, &ctx, id).await?))
}

pub async fn withdraw_return(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>) -> Result<Json<ReturnRequest>> {
    Ok(Json(returns::withdraw(&s, &ctx, id).await?))
}

pub async fn reject_return(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>, Json(r): Json<RejectRequest>) -> Result<Json<ReturnRequest>> {
    ctx.require_admin()?;
    r.validate()?;
    Ok(Json(returns::reject(&s, ctx.tenant_id, id, r.note.trim()).await?))
}

pub async fn approve_return(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>, body: Option<Json<ApproveRequest>>) -> Result<Json<ReturnRequest>> {
    ctx.require_admin()?;
    let r = body.map(|Json(r)| r).unwrap_or_default();
    r.validate()?;
    Ok(Json(returns::approve(&s, ctx.tenant_id, id, r.note.as_deref()).await?))
}

pub async fn complete_return(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>) -> Result<Json<ReturnRequest>> {
    ctx.require_admin()?;
    Ok(Json(returns::complete(&s, ctx.tenant_id, id).await?))
}

pub async fn refund_items(State(s): State<AppState>, ctx: RequestContext, Path(order_id): Path<Uuid>, Json(r): Json<RefundItemsRequest>) -> Result<(StatusCode, Json<Refund>)> {
    ctx.require_admin()?;
    r.validate()?;
    let lines = check_lines(&r.items)?;
    let refund = refunds::refund_order_items(&s, ctx.tenant_id, order_id, lines, r.reason.trim().to_string()).await?;
    Ok((StatusCode::CREATED, Json(refund)))
}

pub async fn list_refunds(State(s): State<AppState>, ctx: RequestContext, Path(order_id): Path<Uuid>) -> Result<Json<Vec<Refund>>> {
    let order = db::find_order(&s.db, ctx.tenant_id, order_id).await?;
    ctx.require_owner_or_admin(order.user_id)?;
    Ok(Json(refunds::list_refunds(&s.db, ctx.tenant_id, order_id).await?))
}
