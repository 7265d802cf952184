use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::context::RequestContext;
use super::extract::{Json, Path, Query};
use super::pagination::ListParams;
use crate::db::{self, records::Review};
use crate::domain::aggregates::{check_review, RatingSummary};
use crate::domain::events::{DomainEvent, ReviewEvent};
use crate::error::{CommerceError, Result};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    pub order_item_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(min = 10, max = 2000))]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ProductReviews {
    pub summary: RatingSummary,
    pub data: Vec<Review>,
    pub page: u32,
    pub per_page: u32,
}

#[derive(sqlx::FromRow)]
struct ReviewTarget { order_id: Uuid, product_id: Uuid }

pub async fn create_review(State(s): State<AppState>, ctx: RequestContext, Json(r): Json<CreateReviewRequest>) -> Result<(StatusCode, Json<Review>)> {
    r.validate()?;
    let target = sqlx::query_as::<_, ReviewTarget>("SELECT order_id, product_id FROM order_items WHERE tenant_id = $1 AND id = $2")
        .bind(ctx.tenant_id).bind(r.order_item_id).fetch_optional(&s.db).await?.ok_or(CommerceError::NotFound("Order item"))?;
    let order = db::find_order(&s.db, ctx.tenant_id, target.order_id).await?;
    if order.user_id != ctx.user_id { return Err(CommerceError::NotFound("Order item")); }
    let rating = check_review(order.status.parse()?, r.rating, &r.content)?;

    let review = sqlx::query_as::<_, Review>("INSERT INTO reviews (id, tenant_id, product_id, order_item_id, user_id, rating, content, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(ctx.tenant_id).bind(target.product_id).bind(r.order_item_id).bind(ctx.user_id)
        .bind(i32::from(rating.value())).bind(r.content.trim())
        .fetch_one(&s.db).await.map_err(|e| db::conflict_on_unique(e, "this item has already been reviewed"))?;

    tracing::info!(review_id = %review.id, product_id = %review.product_id, rating = rating.value(), "review posted");
    let event = ReviewEvent::Posted { review_id: review.id, product_id: review.product_id, rating: rating.value() };
    s.events.publish(ctx.tenant_id, [DomainEvent::Review(event)]).await;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn list_product_reviews(State(s): State<AppState>, ctx: RequestContext, Path(product_id): Path<Uuid>, Query(p): Query<ListParams>) -> Result<Json<ProductReviews>> {
    let data = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE tenant_id = $1 AND product_id = $2 AND deleted_at IS NULL ORDER BY created_at DESC LIMIT $3 OFFSET $4")
        .bind(ctx.tenant_id).bind(product_id).bind(p.limit()).bind(p.offset()).fetch_all(&s.db).await?;
    let (count, sum): (i64, i64) = sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(rating), 0)::BIGINT FROM reviews WHERE tenant_id = $1 AND product_id = $2 AND deleted_at IS NULL")
        .bind(ctx.tenant_id).bind(product_id).fetch_one(&s.db).await?;
    Ok(Json(ProductReviews { summary: RatingSummary::new(count, sum), data, page: p.page(), per_page: p.per_page() }))
}

pub async fn delete_review(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>) -> Result<StatusCode> {
    let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL")
        .bind(ctx.tenant_id).bind(id).fetch_optional(&s.db).await?.ok_or(CommerceError::NotFound("Review"))?;
    ctx.require_owner_or_admin(review.user_id)?;
    sqlx::query("UPDATE reviews SET deleted_at = NOW() WHERE id = $1").bind(id).execute(&s.db).await?;
    tracing::info!(review_id = %id, "review deleted");
    Ok(StatusCode::NO_CONTENT)
}
