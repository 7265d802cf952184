//! Shipments and their per-line allocations

use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::api::context::{RequestContext, Role};
use crate::db::{self, records::{Seller, Shipment, ShipmentAllocation}};
use crate::domain::aggregates::{check_allocations, delivery_steps, DeliveryStep, OrderStatus, SellerStatus, ShipmentStatus, ShipmentTimeline};
use crate::domain::events::{DomainEvent, OrderEvent, ShipmentEvent};
use crate::error::{CommerceError, Result};
use crate::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct ShipmentView {
    #[serde(flatten)]
    pub shipment: Shipment,
    pub allocations: Vec<ShipmentAllocation>,
    pub steps: Vec<DeliveryStep>,
}

#[derive(Debug, Clone)]
pub struct NewShipment {
    pub carrier: String,
    pub tracking_number: String,
    pub allocations: Vec<(Uuid, i32)>,
}

/// The caller's seller account. It must be approved to handle shipments.
async fn approved_seller(conn: &mut PgConnection, ctx: &RequestContext) -> Result<Seller> {
    let seller = db::seller_for_user(&mut *conn, ctx.tenant_id, ctx.user_id).await?
        .ok_or_else(|| CommerceError::Forbidden("no seller account for this user".into()))?;
    let status: SellerStatus = seller.status.parse()?;
    if !status.can_sell() {
        return Err(CommerceError::Forbidden(format!("seller account is {status}")));
    }
    Ok(seller)
}

/// Sellers may only handle their own lines.
async fn check_seller_lines(conn: &mut PgConnection, ctx: &RequestContext, order_id: Uuid, item_ids: &[Uuid]) -> Result<()> {
    if ctx.role != Role::Seller { return Ok(()); }
    let seller = approved_seller(&mut *conn, ctx).await?;
    let foreign: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_items WHERE order_id = $1 AND id = ANY($2) AND seller_id <> $3")
        .bind(order_id).bind(item_ids).bind(seller.id).fetch_one(&mut *conn).await?;
    if foreign > 0 { return Err(CommerceError::Forbidden("sellers can only ship their own items".into())); }
    Ok(())
}

#[tracing::instrument(skip(state, input), fields(tenant_id = %ctx.tenant_id))]
pub async fn create_shipment(state: &AppState, ctx: &RequestContext, order_id: Uuid, input: NewShipment) -> Result<ShipmentView> {
    ctx.require_seller_or_admin()?;
    let mut tx = state.db.begin().await?;
    let order = db::lock_order(&mut *tx, ctx.tenant_id, order_id).await?;
    let current: OrderStatus = order.status.parse()?;
    if !current.accepts_shipments() {
        return Err(CommerceError::InvalidState(format!("orders in status {current} cannot be shipped")));
    }
    let item_ids: Vec<Uuid> = input.allocations.iter().map(|(id, _)| *id).collect();
    check_seller_lines(&mut tx, ctx, order_id, &item_ids).await?;

    let lines = db::line_quantities(&mut *tx, ctx.tenant_id, order_id, None).await?;
    let fully_shipped = check_allocations(&lines, &input.allocations)?;

    let shipment = sqlx::query_as::<_, Shipment>("INSERT INTO shipments (id, tenant_id, order_id, carrier, tracking_number, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(ctx.tenant_id).bind(order_id).bind(&input.carrier).bind(&input.tracking_number)
        .bind(ShipmentStatus::Ready.as_str()).fetch_one(&mut *tx).await?;
    let mut allocations = Vec::with_capacity(input.allocations.len());
    for (order_item_id, quantity) in &input.allocations {
        let row = sqlx::query_as::<_, ShipmentAllocation>("INSERT INTO shipment_allocations (id, tenant_id, shipment_id, order_item_id, quantity) VALUES ($1, $2, $3, $4, $5) RETURNING *")
            .bind(Uuid::now_v7()).bind(ctx.tenant_id).bind(shipment.id).bind(order_item_id).bind(quantity)
            .fetch_one(&mut *tx).await?;
        allocations.push(row);
    }

    let mut events = vec![DomainEvent::Shipment(ShipmentEvent::Created {
        shipment_id: shipment.id, order_id, tracking_number: shipment.tracking_number.clone(),
    })];
    let next = if fully_shipped { OrderStatus::Shipped } else { OrderStatus::PartiallyShipped };
    if next != current {
        current.transition(next)?;
        db::set_order_status(&mut *tx, order_id, next.as_str()).await?;
        events.push(DomainEvent::Order(OrderEvent::StatusChanged { order_id, from: current.to_string(), to: next.to_string() }));
    }
    tx.commit().await?;

    tracing::info!(shipment_id = %shipment.id, %order_id, fully_shipped, "shipment created");
    state.events.publish(ctx.tenant_id, events).await;
    let steps = steps_for(&shipment, order.created_at)?;
    Ok(ShipmentView { shipment, allocations, steps })
}

#[tracing::instrument(skip(state), fields(tenant_id = %ctx.tenant_id))]
pub async fn update_status(state: &AppState, ctx: &RequestContext, shipment_id: Uuid, next: ShipmentStatus) -> Result<Shipment> {
    ctx.require_seller_or_admin()?;
    let mut tx = state.db.begin().await?;
    let unlocked = sqlx::query_as::<_, Shipment>("SELECT * FROM shipments WHERE tenant_id = $1 AND id = $2")
        .bind(ctx.tenant_id).bind(shipment_id).fetch_optional(&mut *tx).await?.ok_or(CommerceError::NotFound("Shipment"))?;
    let order = db::lock_order(&mut *tx, ctx.tenant_id, unlocked.order_id).await?;
    let current: ShipmentStatus = sqlx::query_scalar::<_, String>("SELECT status FROM shipments WHERE id = $1 FOR UPDATE")
        .bind(shipment_id).fetch_one(&mut *tx).await?.parse()?;
    let next = current.advance_to(next)?;
    let item_ids: Vec<Uuid> = sqlx::query_scalar("SELECT order_item_id FROM shipment_allocations WHERE shipment_id = $1")
        .bind(shipment_id).fetch_all(&mut *tx).await?;
    check_seller_lines(&mut tx, ctx, order.id, &item_ids).await?;

    let shipment = sqlx::query_as::<_, Shipment>(r#"
        UPDATE shipments SET status = $2,
            shipped_at = CASE WHEN $2 IN ('in_transit', 'out_for_delivery', 'delivered') THEN COALESCE(shipped_at, NOW()) ELSE shipped_at END,
            out_for_delivery_at = CASE WHEN $2 IN ('out_for_delivery', 'delivered') THEN COALESCE(out_for_delivery_at, NOW()) ELSE out_for_delivery_at END,
            delivered_at = CASE WHEN $2 = 'delivered' THEN COALESCE(delivered_at, NOW()) ELSE delivered_at END,
            updated_at = NOW()
        WHERE id = $1 RETURNING *"#)
        .bind(shipment_id).bind(next.as_str()).fetch_one(&mut *tx).await?;

    let mut events = vec![DomainEvent::Shipment(ShipmentEvent::StatusChanged { shipment_id, status: next.to_string() })];
    let order_status: OrderStatus = order.status.parse()?;
    if next == ShipmentStatus::Delivered && order_status == OrderStatus::Shipped {
        let undelivered: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shipments WHERE order_id = $1 AND status <> 'delivered'")
            .bind(order.id).fetch_one(&mut *tx).await?;
        if undelivered == 0 {
            let delivered = order_status.transition(OrderStatus::Delivered)?;
            db::set_order_status(&mut *tx, order.id, delivered.as_str()).await?;
            tracing::info!(order_id = %order.id, "all shipments delivered");
            events.push(DomainEvent::Order(OrderEvent::StatusChanged {
                order_id: order.id, from: order_status.to_string(), to: delivered.to_string(),
            }));
        }
    }
    tx.commit().await?;

    tracing::info!(%shipment_id, from = %current, to = %next, "shipment status changed");
    state.events.publish(ctx.tenant_id, events).await;
    Ok(shipment)
}

fn steps_for(shipment: &Shipment, ordered_at: chrono::DateTime<chrono::Utc>) -> Result<Vec<DeliveryStep>> {
    let timeline = ShipmentTimeline {
        ordered_at: Some(ordered_at),
        created_at: Some(shipment.created_at),
        shipped_at: shipment.shipped_at,
        out_for_delivery_at: shipment.out_for_delivery_at,
        delivered_at: shipment.delivered_at,
    };
    Ok(delivery_steps(shipment.status.parse()?, &shipment.carrier, &shipment.tracking_number, &timeline))
}

pub async fn list_for_order(state: &AppState, ctx: &RequestContext, order_id: Uuid) -> Result<Vec<ShipmentView>> {
    let order = db::find_order(&state.db, ctx.tenant_id, order_id).await?;
    match ctx.role {
        Role::Customer => ctx.require_owner_or_admin(order.user_id)?,
        Role::Seller => {
            let mut conn = state.db.acquire().await?;
            let seller = approved_seller(&mut conn, ctx).await?;
            let own: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_items WHERE order_id = $1 AND seller_id = $2")
                .bind(order_id).bind(seller.id).fetch_one(&mut *conn).await?;
            if own == 0 { return Err(CommerceError::Forbidden("order has no items from this seller".into())); }
        }
        Role::Admin => {}
    }
    let shipments = sqlx::query_as::<_, Shipment>("SELECT * FROM shipments WHERE tenant_id = $1 AND order_id = $2 ORDER BY created_at")
        .bind(ctx.tenant_id).bind(order_id).fetch_all(&state.db).await?;
    let allocations = sqlx::query_as::<_, ShipmentAllocation>("SELECT sa.* FROM shipment_allocations sa JOIN shipments s ON s.id = sa.shipment_id WHERE s.order_id = $1")
        .bind(order_id).fetch_all(&state.db).await?;
    shipments
        .into_iter()
        .map(|shipment| -> Result<ShipmentView> {
            let steps = steps_for(&shipment, order.created_at)?;
            let allocations = allocations.iter().filter(|a| a.shipment_id == shipment.id).cloned().collect();
            Ok(ShipmentView { shipment, allocations, steps })
        })
        .collect()
}
