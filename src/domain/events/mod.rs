//! Domain events
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
    Refund(RefundEvent),
    Return(ReturnEvent),
    Shipment(ShipmentEvent),
    Review(ReviewEvent),
    Seller(SellerEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, sku: String },
    Archived { product_id: Uuid },
    InventoryAdjusted { product_id: Uuid, delta: i32, inventory: i32 },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, user_id: Uuid, total: i64 },
    Paid { order_id: Uuid, payment_key: String, amount: i64 },
    StatusChanged { order_id: Uuid, from: String, to: String },
    Cancelled { order_id: Uuid, refunded: i64 },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RefundEvent {
    Completed { refund_id: Uuid, order_id: Uuid, amount: i64 },
    Failed { refund_id: Uuid, order_id: Uuid, amount: i64, reason: String },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReturnEvent {
    Requested { return_id: Uuid, order_id: Uuid, kind: String },
    Approved { return_id: Uuid },
    Rejected { return_id: Uuid },
    Withdrawn { return_id: Uuid },
    Completed { return_id: Uuid, refund_id: Option<Uuid> },
    ExchangeCompleted { return_id: Uuid, order_id: Uuid },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ShipmentEvent {
    Created { shipment_id: Uuid, order_id: Uuid, tracking_number: String },
    StatusChanged { shipment_id: Uuid, status: String },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReviewEvent {
    Posted { review_id: Uuid, product_id: Uuid, rating: u8 },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SellerEvent {
    Registered { seller_id: Uuid, code: String },
    StatusChanged { seller_id: Uuid, status: String },
}

impl DomainEvent {
    /// Dotted name used as the NATS subject suffix, e.g. `order.placed`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Product(e) => match e {
                ProductEvent::Created { .. } => "product.created",
                ProductEvent::Archived { .. } => "product.archived",
                ProductEvent::InventoryAdjusted { .. } => "product.inventory_adjusted",
            },
            Self::Order(e) => match e {
                OrderEvent::Placed { .. } => "order.placed",
                OrderEvent::Paid { .. } => "order.paid",
                OrderEvent::StatusChanged { .. } => "order.status_changed",
                OrderEvent::Cancelled { .. } => "order.cancelled",
            },
            Self::Refund(e) => match e {
                RefundEvent::Completed { .. } => "refund.completed",
                RefundEvent::Failed { .. } => "refund.failed",
            },
            Self::Return(e) => match e {
                ReturnEvent::Requested { .. } => "return.requested",
                ReturnEvent::Approved { .. } => "return.approved",
                ReturnEvent::Rejected { .. } => "return.rejected",
                ReturnEvent::Withdrawn { .. } => "return.withdrawn",
                ReturnEvent::Completed { .. } => "return.completed",
                ReturnEvent::ExchangeCompleted { .. } => "return.exchange_completed",
            },
            Self::Shipment(e) => match e {
                ShipmentEvent::Created { .. } => "shipment.created",
                ShipmentEvent::StatusChanged { .. } => "shipment.status_changed",
            },
            Self::Review(ReviewEvent::Posted { .. }) => "review.posted",
            Self::Seller(e) => match e {
                SellerEvent::Registered { .. } => "seller.registered",
                SellerEvent::StatusChanged { .. } => "seller.status_changed",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_and_payload() {
        let id = Uuid::nil();
        let e = DomainEvent::Order(OrderEvent::Placed { order_id: id, user_id: id, total: 500 });
        assert_eq!(e.name(), "order.placed");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "order");
        assert_eq!(json["event"], "placed");
        assert_eq!(json["total"], 500);
    }
}
