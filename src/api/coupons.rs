use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::context::RequestContext;
use super::extract::{Json, Path, Query};
use super::pagination::{ListParams, PaginatedResponse};
use crate::db::{self, records};
use crate::domain::aggregates::{Coupon, DiscountType, UserCoupon};
use crate::error::{CommerceError, Result};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCouponRequest {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    #[serde(default)]
    pub min_order_amount: i64,
    pub max_discount_amount: Option<i64>,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub total_quantity: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct IssueCouponRequest {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PreviewRequest {
    pub user_coupon_id: Uuid,
    #[validate(range(min = 0))]
    pub order_amount: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct MyCouponsParams {
    #[serde(default)]
    pub include_used: bool,
}

#[derive(Debug, Serialize)]
pub struct MyCoupon {
    #[serde(flatten)]
    pub user_coupon: records::UserCoupon,
    pub coupon: records::Coupon,
}

#[derive(Debug, Serialize)]
pub struct DiscountPreview { pub order_amount: i64, pub discount: i64, pub payable: i64 }

pub async fn create_coupon(State(s): State<AppState>, ctx: RequestContext, Json(r): Json<CreateCouponRequest>) -> Result<(StatusCode, Json<records::Coupon>)> {
    ctx.require_admin()?;
    r.validate()?;
    let coupon = Coupon {
        id: Uuid::now_v7(), code: r.code.trim().to_uppercase(), discount_type: r.discount_type, discount_value: r.discount_value,
        min_order_amount: r.min_order_amount, max_discount_amount: r.max_discount_amount, starts_at: r.starts_at,
        expires_at: r.expires_at, total_quantity: r.total_quantity, issued_count: 0, is_active: true,
    };
    coupon.validate_definition()?;
    let c = sqlx::query_as::<_, records::Coupon>("INSERT INTO coupons (id, tenant_id, code, name, discount_type, discount_value, min_order_amount, max_discount_amount, starts_at, expires_at, total_quantity, issued_count, is_active, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 0, TRUE, NOW()) RETURNING *")
        .bind(coupon.id).bind(ctx.tenant_id).bind(&coupon.code).bind(r.name.trim()).bind(coupon.discount_type.as_str())
        .bind(coupon.discount_value).bind(coupon.min_order_amount).bind(coupon.max_discount_amount)
        .bind(coupon.starts_at).bind(coupon.expires_at).bind(coupon.total_quantity)
        .fetch_one(&s.db).await.map_err(|e| db::conflict_on_unique(e, "coupon code already exists"))?;
    tracing::info!(coupon_id = %c.id, code = %c.code, "coupon created");
    Ok((StatusCode::CREATED, Json(c)))
}

pub async fn list_coupons(State(s): State<AppState>, ctx: RequestContext, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<records::Coupon>>> {
    ctx.require_admin()?;
    let coupons = sqlx::query_as::<_, records::Coupon>("SELECT * FROM coupons WHERE tenant_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3")
        .bind(ctx.tenant_id).bind(p.limit()).bind(p.offset()).fetch_all(&s.db).await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM coupons WHERE tenant_id = $1").bind(ctx.tenant_id).fetch_one(&s.db).await?;
    Ok(Json(PaginatedResponse::new(coupons, total.0, &p)))
}

pub async fn deactivate_coupon(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>) -> Result<Json<records::Coupon>> {
    ctx.require_admin()?;
    let c = sqlx::query_as::<_, records::Coupon>("UPDATE coupons SET is_active = FALSE WHERE tenant_id = $1 AND id = $2 RETURNING *")
        .bind(ctx.tenant_id).bind(id).fetch_optional(&s.db).await?.ok_or(CommerceError::NotFound("Coupon"))?;
    tracing::info!(coupon_id = %id, "coupon deactivated");
    Ok(Json(c))
}

/// Hands the caller one copy of the coupon with `code`.
pub async fn issue_coupon(State(s): State<AppState>, ctx: RequestContext, Json(r): Json<IssueCouponRequest>) -> Result<(StatusCode, Json<records::UserCoupon>)> {
    r.validate()?;
    let mut tx = s.db.begin().await?;
    let record = sqlx::query_as::<_, records::Coupon>("SELECT * FROM coupons WHERE tenant_id = $1 AND code = $2 FOR UPDATE")
        .bind(ctx.tenant_id).bind(r.code.trim().to_uppercase()).fetch_optional(&mut *tx).await?.ok_or(CommerceError::NotFound("Coupon"))?;
    Coupon::try_from(&record)?.can_issue(Utc::now())?;
    let uc = sqlx::query_as::<_, records::UserCoupon>("INSERT INTO user_coupons (id, tenant_id, coupon_id, user_id, issued_at) VALUES ($1, $2, $3, $4, NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(ctx.tenant_id).bind(record.id).bind(ctx.user_id)
        .fetch_one(&mut *tx).await.map_err(|e| db::conflict_on_unique(e, "coupon already issued to this user"))?;
    sqlx::query("UPDATE coupons SET issued_count = issued_count + 1 WHERE id = $1").bind(record.id).execute(&mut *tx).await?;
    tx.commit().await?;
    tracing::info!(coupon_id = %record.id, user_coupon_id = %uc.id, "coupon issued");
    Ok((StatusCode::CREATED, Json(uc)))
}

pub async fn my_coupons(State(s): State<AppState>, ctx: RequestContext, Query(p): Query<MyCouponsParams>) -> Result<Json<Vec<MyCoupon>>> {
    let owned = sqlx::query_as::<_, records::UserCoupon>("SELECT * FROM user_coupons WHERE tenant_id = $1 AND user_id = $2 AND ($3 OR deleted_at IS NULL) ORDER BY issued_at DESC")
        .bind(ctx.tenant_id).bind(ctx.user_id).bind(p.include_used).fetch_all(&s.db).await?;
    let ids: Vec<Uuid> = owned.iter().map(|uc| uc.coupon_id).collect();
    let coupons = sqlx::query_as::<_, records::Coupon>("SELECT * FROM coupons WHERE id = ANY($1)").bind(&ids).fetch_all(&s.db).await?;
    let mine = owned
        .into_iter()
        .filter_map(|user_coupon| {
            let coupon = coupons.iter().find(|c| c.id == user_coupon.coupon_id)?.clone();
            Some(MyCoupon { user_coupon, coupon })
        })
        .collect();
    Ok(Json(mine))
}

pub async fn preview_discount(State(s): State<AppState>, ctx: RequestContext, Json(r): Json<PreviewRequest>) -> Result<Json<DiscountPreview>> {
    r.validate()?;
    let uc = sqlx::query_as::<_, records::UserCoupon>("SELECT * FROM user_coupons WHERE tenant_id = $1 AND id = $2 AND user_id = $3")
        .bind(ctx.tenant_id).bind(r.user_coupon_id).bind(ctx.user_id).fetch_optional(&s.db).await?.ok_or(CommerceError::NotFound("Coupon"))?;
    let record = sqlx::query_as::<_, records::Coupon>("SELECT * FROM coupons WHERE id = $1").bind(uc.coupon_id).fetch_one(&s.db).await?;
    let discount = Coupon::try_from(&record)?.redeem(&UserCoupon::from(&uc), r.order_amount, Utc::now())?;
    Ok(Json(DiscountPreview { order_amount: r.order_amount, discount, payable: r.order_amount - discount }))
}
