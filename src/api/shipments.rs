use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::context::RequestContext;
use super::extract::{Json, Path};
use crate::db::records::Shipment;
use crate::domain::aggregates::ShipmentStatus;
use crate::error::{CommerceError, Result};
use crate::services::shipments::{self, NewShipment, ShipmentView};
use crate::AppState;

#[derive(Debug, Deserialize, Serialize)]
pub struct AllocationRequest { pub order_item_id: Uuid, pub quantity: i32 }

#[derive(Debug, Deserialize, Validate)]
pub struct CreateShipmentRequest {
    #[validate(length(min = 1, max = 100))]
    pub carrier: String,
    #[validate(length(min = 1, max = 100))]
    pub tracking_number: String,
    #[validate(length(min = 1))]
    pub allocations: Vec<AllocationRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ShipmentStatusRequest { pub status: ShipmentStatus }

pub async fn create_shipment(State(s): State<AppState>, ctx: RequestContext, Path(order_id): Path<Uuid>, Json(r): Json<CreateShipmentRequest>) -> Result<(StatusCode, Json<ShipmentView>)> {
    ctx.require_seller_or_admin()?;
    r.validate()?;
    if let Some(a) = r.allocations.iter().find(|a| a.quantity < 1) {
        return Err(CommerceError::Validation(format!("quantity for item {} must be at least 1", a.order_item_id)));
    }
    let input = NewShipment {
        carrier: r.carrier.trim().to_string(),
        tracking_number: r.tracking_number.trim().to_string(),
        allocations: r.allocations.iter().map(|a| (a.order_item_id, a.quantity)).collect(),
    };
    let view = shipments::create_shipment(&s, &ctx, order_id, input).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn update_shipment_status(State(s): State<AppState>, ctx: RequestContext, Path(id): Path<Uuid>, Json(r): Json<ShipmentStatusRequest>) -> Result<Json<Shipment>> {
    ctx.require_seller_or_admin()?;
    Ok(Json(shipments::update_status(&s, &ctx, id, r.status).await?))
}

pub async fn list_shipments(State(s): State<AppState>, ctx: RequestContext, Path(order_id): Path<Uuid>) -> Result<Json<Vec<ShipmentView>>> {
    Ok(Json(shipments::list_for_order(&s, &ctx, order_id).await?))
}
