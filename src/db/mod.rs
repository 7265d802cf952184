//! Postgres pool setup and queries shared across services

pub mod records;

use std::collections::HashMap;
use std::str::FromStr;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::aggregates::{Coupon, DiscountType, LineQuantities, UserCoupon};
use crate::error::{CommerceError, Result};
use records::{LineQuantityRow, Order, OrderItem, Seller};

pub async fn connect(config: &Config) -> std::result::Result<PgPool, sqlx::Error> {
    PgPoolOptions::new().max_connections(config.db_max_connections).connect(&config.database_url).await
}

pub async fn migrate(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub async fn find_order<'e, E: PgExecutor<'e>>(exec: E, tenant_id: Uuid, order_id: Uuid) -> Result<Order> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE tenant_id = $1 AND id = $2")
        .bind(tenant_id).bind(order_id).fetch_optional(exec).await?.ok_or(CommerceError::NotFound("Order"))
}

/// Locks the order row for the rest of the transaction.
pub async fn lock_order<'e, E: PgExecutor<'e>>(exec: E, tenant_id: Uuid, order_id: Uuid) -> Result<Order> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE tenant_id = $1 AND id = $2 FOR UPDATE")
        .bind(tenant_id).bind(order_id).fetch_optional(exec).await?.ok_or(CommerceError::NotFound("Order"))
}

pub async fn order_items<'e, E: PgExecutor<'e>>(exec: E, tenant_id: Uuid, order_id: Uuid) -> Result<Vec<OrderItem>> {
    Ok(sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE tenant_id = $1 AND order_id = $2 ORDER BY name, id")
        .bind(tenant_id).bind(order_id).fetch_all(exec).await?)
}

pub async fn set_order_status<'e, E: PgExecutor<'e>>(exec: E, order_id: Uuid, status: &str) -> Result<()> {
    sqlx::query("UPDATE orders SET status = $2, delivered_at = CASE WHEN $2 = 'delivered' THEN NOW() ELSE delivered_at END, updated_at = NOW() WHERE id = $1")
        .bind(order_id).bind(status).execute(exec).await?;
    Ok(())
}

pub async fn seller_for_user<'e, E: PgExecutor<'e>>(exec: E, tenant_id: Uuid, user_id: Uuid) -> Result<Option<Seller>> {
    Ok(sqlx::query_as::<_, Seller>("SELECT * FROM sellers WHERE tenant_id = $1 AND owner_user_id = $2")
        .bind(tenant_id).bind(user_id).fetch_optional(exec).await?)
}

const LINE_QUANTITIES: &str = r#"
SELECT oi.id AS order_item_id, oi.quantity, oi.refunded_quantity,
    COALESCE((SELECT SUM(sa.quantity) FROM shipment_allocations sa WHERE sa.order_item_id = oi.id), 0)::INT AS allocated,
    COALESCE((SELECT SUM(ri.quantity) FROM return_items ri JOIN return_requests rr ON rr.id = ri.return_id
              WHERE ri.order_item_id = oi.id AND rr.kind = 'cancel' AND rr.status IN ('requested', 'approved')
                AND rr.id IS DISTINCT FROM $3), 0)::INT AS pending_cancel,
    COALESCE((SELECT SUM(ri.quantity) FROM return_items ri JOIN return_requests rr ON rr.id = ri.return_id
              WHERE ri.order_item_id = oi.id AND rr.kind IN ('return', 'exchange') AND rr.status IN ('requested', 'approved')
                AND rr.id IS DISTINCT FROM $3), 0)::INT AS pending_return
FROM order_items oi
WHERE oi.tenant_id = $1 AND oi.order_id = $2
"#;

/// Unit accounting for every line of an order. Units held by `excluding_return` are not counted as pending.
pub async fn line_quantities<'e, E: PgExecutor<'e>>(exec: E, tenant_id: Uuid, order_id: Uuid, excluding_return: Option<Uuid>) -> Result<HashMap<Uuid, LineQuantities>> {
    let rows = sqlx::query_as::<_, LineQuantityRow>(LINE_QUANTITIES)
        .bind(tenant_id).bind(order_id).bind(excluding_return).fetch_all(exec).await?;
    Ok(rows
        .into_iter()
        .map(|r| (r.order_item_id, LineQuantities {
            purchased: r.quantity, refunded: r.refunded_quantity, allocated: r.allocated,
            pending_cancel: r.pending_cancel, pending_return: r.pending_return,
        }))
        .collect())
}

impl TryFrom<&records::Coupon> for Coupon {
    type Error = CommerceError;
    fn try_from(r: &records::Coupon) -> Result<Self> {
        Ok(Coupon {
            id: r.id, code: r.code.clone(), discount_type: DiscountType::from_str(&r.discount_type)?,
            discount_value: r.discount_value, min_order_amount: r.min_order_amount, max_discount_amount: r.max_discount_amount,
            starts_at: r.starts_at, expires_at: r.expires_at, total_quantity: r.total_quantity, issued_count: r.issued_count,
            is_active: r.is_active,
        })
    }
}

impl From<&records::UserCoupon> for UserCoupon {
    fn from(r: &records::UserCoupon) -> Self {
        UserCoupon { id: r.id, coupon_id: r.coupon_id, user_id: r.user_id, used_at: r.used_at, deleted_at: r.deleted_at }
    }
}

/// Maps a unique-constraint violation to a conflict with `message`.
pub fn conflict_on_unique(e: sqlx::Error, message: &str) -> CommerceError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => CommerceError::Conflict(message.to_string()),
        _ => CommerceError::Storage(e),
    }
}
