//! Shipment Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::order::LineQuantities;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Ready,
    InTransit,
    OutForDelivery,
    Delivered,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::InTransit => "in_transit",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
        }
    }

    /// Shipments only move forward.
    pub fn advance_to(&self, next: ShipmentStatus) -> Result<ShipmentStatus, ShipmentError> {
        if next > *self { Ok(next) } else { Err(ShipmentError::Backwards { from: *self, to: next }) }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ShipmentStatus {
    type Err = ShipmentError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ready" => Self::Ready,
            "in_transit" => Self::InTransit,
            "out_for_delivery" => Self::OutForDelivery,
            "delivered" => Self::Delivered,
            other => return Err(ShipmentError::UnknownStatus(other.to_string())),
        })
    }
}

/// Checks requested allocations against what each line still owes.
/// Returns whether every owed unit is shipped once these are applied.
pub fn check_allocations(lines: &HashMap<Uuid, LineQuantities>, allocations: &[(Uuid, i32)]) -> Result<bool, ShipmentError> {
    if allocations.is_empty() { return Err(ShipmentError::NoAllocations); }
    let mut requested: HashMap<Uuid, i32> = HashMap::new();
    for (item_id, qty) in allocations {
        if *qty <= 0 { return Err(ShipmentError::InvalidQuantity(*item_id)); }
        *requested.entry(*item_id).or_default() += qty;
    }
    for (item_id, qty) in &requested {
        let line = lines.get(item_id).ok_or(ShipmentError::UnknownItem(*item_id))?;
        if *qty > line.shippable() {
            return Err(ShipmentError::OverAllocated { item_id: *item_id, requested: *qty, available: line.shippable() });
        }
    }
    let fully_shipped = lines.iter().all(|(id, line)| line.shippable() - requested.get(id).copied().unwrap_or(0) == 0);
    Ok(fully_shipped)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeliveryStep {
    pub label: String,
    pub done: bool,
    pub current: bool,
    pub at: Option<DateTime<Utc>>,
}

/// Timestamps recorded as a shipment progresses.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShipmentTimeline {
    pub ordered_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub out_for_delivery_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Customer-facing progress text for one shipment.
pub fn delivery_steps(status: ShipmentStatus, carrier: &str, tracking_number: &str, timeline: &ShipmentTimeline) -> Vec<DeliveryStep> {
    let reached = match status {
        ShipmentStatus::Ready => 1,
        ShipmentStatus::InTransit => 2,
        ShipmentStatus::OutForDelivery => 3,
        ShipmentStatus::Delivered => 4,
    };
    let steps = [
        ("Order received".to_string(), timeline.ordered_at),
        ("Preparing for shipment".to_string(), timeline.created_at),
        (format!("Shipped via {} (tracking {})", carrier, tracking_number), timeline.shipped_at),
        ("Out for delivery".to_string(), timeline.out_for_delivery_at),
        ("Delivered".to_string(), timeline.delivered_at),
    ];
    steps
        .into_iter()
        .enumerate()
        .map(|(i, (label, at))| DeliveryStep { label, done: i <= reached, current: i == reached, at: if i <= reached { at } else { None } })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShipmentError {
    #[error("Shipment must allocate at least one item")]
    NoAllocations,
    #[error("Quantity for item {0} must be at least 1")]
    InvalidQuantity(Uuid),
    #[error("Item {0} does not belong to this order")]
    UnknownItem(Uuid),
    #[error("Allocated {requested} of item {item_id} but only {available} remain to ship")]
    OverAllocated { item_id: Uuid, requested: i32, available: i32 },
    #[error("Shipment cannot go from {from} back to {to}")]
    Backwards { from: ShipmentStatus, to: ShipmentStatus },
    #[error("Unknown shipment status: {0}")]
    UnknownStatus(String),
}
