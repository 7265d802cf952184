use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::context::{RequestContext, Role};
use super::extract::{Json, Path, Query};
use super::pagination::{ListParams, PaginatedResponse};
use crate::db::{self, records::{Product, Seller}};
use crate::domain::aggregates::{product, ProductStatus, SellerStatus};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Money, Sku};
use crate::error::{CommerceError, Result};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    /// Required when an admin lists on a seller's behalf.
    pub seller_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: i64,
    pub category_id: Option<Uuid>,
    #[validate(range(min = 0))]
    pub inventory_quantity: Option<i32>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    pub category_id: Option<Uuid>,
    pub images: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct InventoryRequest { pub delta: i32 }

async fn find_product(s: &AppState, tenant_id: Uuid, id: Uuid) -> Result<Product> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE tenant_id = $1 AND id = $2")
        .bind(tenant_id).bind(id).fetch_optional(&s.db).await?.ok_or(CommerceError::NotFound("Product"))
}

/// Admins manage everything; sellers only their own catalog.
async fn ensure_manages(s: &AppState, ctx: &RequestContext, seller_id: Uuid) -> Result<()> {
    match ctx.role {
        Role::Admin => Ok(()),
        Role::Seller => match db::seller_for_user(&s.db, ctx.tenant_id, ctx.user_id).await? {
            Some(seller) if seller.id == seller_id => Ok(()),
            _ => Err(CommerceError::Forbidden("not your product".into())),
        },
        Role::Customer => Err(CommerceError::Forbidden("seller or admin role required".into())),
    }
}

pub async fn list_products(State(s): State<AppState>, ctx: RequestContext, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<Product>>> {
    const FILTER: &str = "tenant_id = $1 AND status = 'active' AND ($2::UUID IS NULL OR category_id = $2) AND ($3::UUID IS NULL OR seller_id = $3) AND ($4::TEXT IS NULL OR name ILIKE '%' || $4 || '%')";
    let products = sqlx::query_as::<_, Product>(&format!("SELECT * FROM products WHERE {FILTER} ORDER BY created_at DESC LIMIT $5 OFFSET $6"))
        .bind(ctx.tenant_id).bind(p.category).bind(p.seller).bind(&p.search).bind(p.limit()).bind(p.offset())
        .fetch_all(&s.db).await?;
    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products WHERE {FILTER}"))
        .bind(ctx.tenant_id).bind(p.category).bind(p.seller).bind(&p.search).fetch_one(&s.db).await?;
    Ok(Json(PaginatedResponse::new(products, total.0, &p)))
}

pub async fn get_product(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>) -> Result<Json<Product>> {
    Ok(Json(find_product(&s, ctx.tenant_id, id).await?))
}

pub async fn create_product(State(s): State<AppState>, ctx: RequestContext, Json(r): Json<CreateProductRequest>) -> Result<(StatusCode, Json<Product>)> {
    ctx.require_seller_or_admin()?;
    r.validate()?;

    let seller = match ctx.role {
        Role::Admin => {
            let id = r.seller_id.ok_or_else(|| CommerceError::Validation("seller_id is required".into()))?;
            sqlx::query_as::<_, Seller>("SELECT * FROM sellers WHERE tenant_id = $1 AND id = $2")
                .bind(ctx.tenant_id).bind(id).fetch_optional(&s.db).await?.ok_or(CommerceError::NotFound("Seller"))?
        }
        _ => {
            let seller = db::seller_for_user(&s.db, ctx.tenant_id, ctx.user_id).await?
                .ok_or_else(|| CommerceError::Forbidden("no seller account for this user".into()))?;
            if !seller.status.parse::<SellerStatus>()?.can_sell() {
                return Err(CommerceError::Forbidden(format!("seller account is {}", seller.status)));
            }
            seller
        }
    };
    let category_slug: Option<String> = match r.category_id {
        Some(id) => Some(sqlx::query_scalar("SELECT slug FROM categories WHERE tenant_id = $1 AND id = $2")
            .bind(ctx.tenant_id).bind(id).fetch_optional(&s.db).await?.ok_or(CommerceError::NotFound("Category"))?),
        None => None,
    };

    let sku = Sku::generate(&seller.code, category_slug.as_deref())?;
    let mut product = product::Product::create(seller.id, sku, r.name.trim(), Money::new(r.price, &s.config.currency), r.inventory_quantity.unwrap_or(0))?;
    let p = sqlx::query_as::<_, Product>("INSERT INTO products (id, tenant_id, seller_id, category_id, sku, name, description, price, currency, inventory_quantity, status, images, tags, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW(), NOW()) RETURNING *")
        .bind(product.id()).bind(ctx.tenant_id).bind(product.seller_id()).bind(r.category_id).bind(product.sku().as_str()).bind(product.name())
        .bind(&r.description).bind(product.price().amount()).bind(product.price().currency()).bind(product.inventory().value() as i32)
        .bind(product.status().as_str()).bind(&r.images).bind(&r.tags)
        .fetch_one(&s.db).await.map_err(|e| db::conflict_on_unique(e, "generated SKU collided, retry"))?;

    tracing::info!(product_id = %p.id, sku = %p.sku, "product created");
    s.events.publish(ctx.tenant_id, product.take_events()).await;
    Ok((StatusCode::CREATED, Json(p)))
}

pub async fn update_product(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>, Json(r): Json<UpdateProductRequest>) -> Result<Json<Product>> {
    ctx.require_seller_or_admin()?;
    r.validate()?;
    let existing = find_product(&s, ctx.tenant_id, id).await?;
    ensure_manages(&s, &ctx, existing.seller_id).await?;
    let p = sqlx::query_as::<_, Product>("UPDATE products SET name = COALESCE($3, name), description = COALESCE($4, description), price = COALESCE($5, price), category_id = COALESCE($6, category_id), images = COALESCE($7, images), tags = COALESCE($8, tags), updated_at = NOW() WHERE tenant_id = $1 AND id = $2 RETURNING *")
        .bind(ctx.tenant_id).bind(id).bind(r.name.as_deref().map(str::trim)).bind(&r.description).bind(r.price).bind(r.category_id)
        .bind(&r.images).bind(&r.tags)
        .fetch_optional(&s.db).await?.ok_or(CommerceError::NotFound("Product"))?;
    Ok(Json(p))
}

pub async fn archive_product(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>) -> Result<StatusCode> {
    ctx.require_seller_or_admin()?;
    let existing = find_product(&s, ctx.tenant_id, id).await?;
    ensure_manages(&s, &ctx, existing.seller_id).await?;
    sqlx::query("UPDATE products SET status = $3, updated_at = NOW() WHERE tenant_id = $1 AND id = $2")
        .bind(ctx.tenant_id).bind(id).bind(ProductStatus::Archived.as_str()).execute(&s.db).await?;
    tracing::info!(product_id = %id, "product archived");
    s.events.publish(ctx.tenant_id, [DomainEvent::Product(ProductEvent::Archived { product_id: id })]).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn adjust_inventory(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>, Json(r): Json<InventoryRequest>) -> Result<Json<Product>> {
    ctx.require_seller_or_admin()?;
    let existing = find_product(&s, ctx.tenant_id, id).await?;
    ensure_manages(&s, &ctx, existing.seller_id).await?;

    let mut tx = s.db.begin().await?;
    let current: i32 = sqlx::query_scalar("SELECT inventory_quantity FROM products WHERE id = $1 FOR UPDATE")
        .bind(id).fetch_one(&mut *tx).await?;
    let inventory = product::adjust_inventory(current, r.delta)?;
    let p = sqlx::query_as::<_, Product>("UPDATE products SET inventory_quantity = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(inventory).fetch_one(&mut *tx).await?;
    tx.commit().await?;

    tracing::info!(product_id = %id, delta = r.delta, inventory, "inventory adjusted");
    s.events.publish(ctx.tenant_id, [DomainEvent::Product(ProductEvent::InventoryAdjusted { product_id: id, delta: r.delta, inventory })]).await;
    Ok(Json(p))
}
