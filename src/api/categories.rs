use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::context::RequestContext;
use super::extract::{Json, Path};
use crate::db::{self, records::Category};
use crate::domain::value_objects::Slug;
use crate::error::{CommerceError, Result};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
}

pub async fn list_categories(State(s): State<AppState>, ctx: RequestContext) -> Result<Json<Vec<Category>>> {
    let cats = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE tenant_id = $1 ORDER BY name")
        .bind(ctx.tenant_id).fetch_all(&s.db).await?;
    Ok(Json(cats))
}

pub async fn get_category(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>) -> Result<Json<Category>> {
    sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE tenant_id = $1 AND id = $2")
        .bind(ctx.tenant_id).bind(id).fetch_optional(&s.db).await?.map(Json).ok_or(CommerceError::NotFound("Category"))
}

pub async fn create_category(State(s): State<AppState>, ctx: RequestContext, Json(r): Json<CreateCategoryRequest>) -> Result<(StatusCode, Json<Category>)> {
    ctx.require_admin()?;
    r.validate()?;
    let slug = Slug::from_name(&r.name).ok_or_else(|| CommerceError::Validation("name must contain letters or digits".into()))?;
    let c = sqlx::query_as::<_, Category>("INSERT INTO categories (id, tenant_id, name, slug, description, parent_id, created_at) VALUES ($1, $2, $3, $4, $5, $6, NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(ctx.tenant_id).bind(r.name.trim()).bind(slug.as_str()).bind(&r.description).bind(r.parent_id)
        .fetch_one(&s.db).await.map_err(|e| db::conflict_on_unique(e, "category slug already exists"))?;
    tracing::info!(category_id = %c.id, slug = %c.slug, "category created");
    Ok((StatusCode::CREATED, Json(c)))
}
