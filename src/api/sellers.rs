use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::context::RequestContext;
use super::extract::{Json, Path, Query};
use super::pagination::{ListParams, PaginatedResponse};
use crate::db::{self, records::Seller};
use crate::domain::aggregates::{generate_seller_code, SellerStatus};
use crate::domain::events::{DomainEvent, SellerEvent};
use crate::error::{CommerceError, Result};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterSellerRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub business_number: String,
    #[validate(email)]
    pub contact_email: String,
}

#[derive(Debug, Deserialize)]
pub struct SellerStatusRequest { pub status: SellerStatus }

/// Code collisions are retried a few times before giving up.
const CODE_ATTEMPTS: usize = 5;

pub async fn register_seller(State(s): State<AppState>, ctx: RequestContext, Json(r): Json<RegisterSellerRequest>) -> Result<(StatusCode, Json<Seller>)> {
    r.validate()?;
    if db::seller_for_user(&s.db, ctx.tenant_id, ctx.user_id).await?.is_some() {
        return Err(CommerceError::Conflict("user already has a seller account".into()));
    }
    for _ in 0..CODE_ATTEMPTS {
        let code = generate_seller_code(&r.name);
        let inserted = sqlx::query_as::<_, Seller>("INSERT INTO sellers (id, tenant_id, owner_user_id, code, name, business_number, contact_email, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) ON CONFLICT (tenant_id, code) DO NOTHING RETURNING *")
            .bind(Uuid::now_v7()).bind(ctx.tenant_id).bind(ctx.user_id).bind(&code).bind(r.name.trim()).bind(&r.business_number)
            .bind(&r.contact_email).bind(SellerStatus::Pending.as_str())
            .fetch_optional(&s.db).await
            .map_err(|e| db::conflict_on_unique(e, "user already has a seller account"))?;
        if let Some(seller) = inserted {
            tracing::info!(seller_id = %seller.id, code = %seller.code, "seller registered");
            s.events.publish(ctx.tenant_id, [DomainEvent::Seller(SellerEvent::Registered { seller_id: seller.id, code })]).await;
            return Ok((StatusCode::CREATED, Json(seller)));
        }
    }
    Err(CommerceError::Conflict("could not allocate a unique seller code".into()))
}

pub async fn list_sellers(State(s): State<AppState>, ctx: RequestContext, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<Seller>>> {
    let sellers = sqlx::query_as::<_, Seller>("SELECT * FROM sellers WHERE tenant_id = $1 AND ($2::TEXT IS NULL OR status = $2) ORDER BY created_at DESC LIMIT $3 OFFSET $4")
        .bind(ctx.tenant_id).bind(&p.status).bind(p.limit()).bind(p.offset()).fetch_all(&s.db).await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sellers WHERE tenant_id = $1 AND ($2::TEXT IS NULL OR status = $2)")
        .bind(ctx.tenant_id).bind(&p.status).fetch_one(&s.db).await?;
    Ok(Json(PaginatedResponse::new(sellers, total.0, &p)))
}

pub async fn get_seller(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>) -> Result<Json<Seller>> {
    sqlx::query_as::<_, Seller>("SELECT * FROM sellers WHERE tenant_id = $1 AND id = $2")
        .bind(ctx.tenant_id).bind(id).fetch_optional(&s.db).await?.map(Json).ok_or(CommerceError::NotFound("Seller"))
}

pub async fn update_seller_status(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>, Json(r): Json<SellerStatusRequest>) -> Result<Json<Seller>> {
    ctx.require_admin()?;
    let mut tx = s.db.begin().await?;
    let seller = sqlx::query_as::<_, Seller>("SELECT * FROM sellers WHERE tenant_id = $1 AND id = $2 FOR UPDATE")
        .bind(ctx.tenant_id).bind(id).fetch_optional(&mut *tx).await?.ok_or(CommerceError::NotFound("Seller"))?;
    let next = seller.status.parse::<SellerStatus>()?.transition(r.status)?;
    let seller = sqlx::query_as::<_, Seller>("UPDATE sellers SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(next.as_str()).fetch_one(&mut *tx).await?;
    tx.commit().await?;

    tracing::info!(seller_id = %id, status = %next, "seller status changed");
    s.events.publish(ctx.tenant_id, [DomainEvent::Seller(SellerEvent::StatusChanged { seller_id: id, status: next.to_string() })]).await;
    Ok(Json(seller))
}
