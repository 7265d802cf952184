//! Order Aggregate

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    PendingPayment,
    Paid,
    Preparing,
    PartiallyShipped,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Paid => "paid",
            Self::Preparing => "preparing",
            Self::PartiallyShipped => "partially_shipped",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, next),
            (PendingPayment, Paid | Cancelled)
                | (Paid, Preparing | PartiallyShipped | Shipped | Cancelled)
                | (Preparing, PartiallyShipped | Shipped | Cancelled)
                | (PartiallyShipped, Shipped)
                | (Shipped, Delivered)
                | (Delivered, Completed)
        )
    }

    pub fn transition(&self, next: OrderStatus) -> Result<OrderStatus, OrderError> {
        if self.can_transition_to(next) { Ok(next) } else { Err(OrderError::InvalidTransition { from: *self, to: next }) }
    }

    /// Statuses in which shipments may still be created.
    pub fn accepts_shipments(&self) -> bool {
        matches!(self, Self::Paid | Self::Preparing | Self::PartiallyShipped)
    }

    pub fn is_reviewable(&self) -> bool { matches!(self, Self::Delivered | Self::Completed) }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending_payment" => Self::PendingPayment,
            "paid" => Self::Paid,
            "preparing" => Self::Preparing,
            "partially_shipped" => Self::PartiallyShipped,
            "shipped" => Self::Shipped,
            "delivered" => Self::Delivered,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            other => return Err(OrderError::UnknownStatus(other.to_string())),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    PartiallyRefunded,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::PartiallyRefunded => "partially_refunded",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
        }
    }

    /// Status after `cancelled` of `amount` has been returned to the buyer.
    pub fn after_refund(amount: i64, cancelled: i64) -> Self {
        if cancelled <= 0 { Self::Paid } else if cancelled >= amount { Self::Refunded } else { Self::PartiallyRefunded }
    }
}

impl FromStr for PaymentStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "paid" => Self::Paid,
            "partially_refunded" => Self::PartiallyRefunded,
            "refunded" => Self::Refunded,
            "failed" => Self::Failed,
            other => return Err(OrderError::UnknownStatus(other.to_string())),
        })
    }
}

/// Flat shipping fee, waived above a threshold.
#[derive(Clone, Copy, Debug)]
pub struct ShippingPolicy { pub fee: i64, pub free_threshold: i64 }

impl ShippingPolicy {
    pub fn fee_for(&self, discounted_subtotal: i64) -> i64 {
        if discounted_subtotal >= self.free_threshold { 0 } else { self.fee }
    }
}

#[derive(Clone, Debug)]
pub struct LineItem {
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl LineItem {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

/// Order being assembled at checkout, before it is persisted.
#[derive(Clone, Debug)]
pub struct OrderDraft {
    id: Uuid,
    order_number: String,
    user_id: Uuid,
    items: Vec<LineItem>,
    subtotal: Money,
    discount: Money,
    shipping_fee: Money,
    total: Money,
    created_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

impl OrderDraft {
    pub fn create(user_id: Uuid, currency: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), order_number: generate_order_number(now), user_id, items: vec![],
            subtotal: Money::zero(currency), discount: Money::zero(currency), shipping_fee: Money::zero(currency),
            total: Money::zero(currency), created_at: now, events: vec![],
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn subtotal(&self) -> i64 { self.subtotal.amount() }
    pub fn discount(&self) -> i64 { self.discount.amount() }
    pub fn shipping_fee(&self) -> i64 { self.shipping_fee.amount() }
    pub fn total(&self) -> i64 { self.total.amount() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn add_item(&mut self, item: LineItem) -> Result<(), OrderError> {
        if item.quantity == 0 { return Err(OrderError::InvalidQuantity); }
        if item.unit_price.currency() != self.subtotal.currency() { return Err(OrderError::CurrencyMismatch); }
        self.items.push(item);
        self.subtotal = self.items.iter().fold(Money::zero(self.subtotal.currency()), |acc, i| acc.add(&i.line_total()).unwrap_or(acc));
        Ok(())
    }

    /// Fixes discount, shipping and total. Call once all items are added.
    pub fn price(&mut self, discount: i64, shipping: &ShippingPolicy) -> Result<(), OrderError> {
        if self.items.is_empty() { return Err(OrderError::NoItems); }
        let currency = self.subtotal.currency().to_string();
        let discount = discount.clamp(0, self.subtotal.amount());
        let discounted = self.subtotal.amount() - discount;
        self.discount = Money::new(discount, &currency);
        self.shipping_fee = Money::new(shipping.fee_for(discounted), &currency);
        self.total = Money::new(discounted + self.shipping_fee.amount(), &currency);
        self.raise_event(DomainEvent::Order(OrderEvent::Placed { order_id: self.id, user_id: self.user_id, total: self.total.amount() }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

/// `ORD-YYYYMMDD-XXXXXXXX`
pub fn generate_order_number(at: DateTime<Utc>) -> String {
    format!("ORD-{}-{:08X}", at.format("%Y%m%d"), rand::thread_rng().gen::<u32>())
}

/// Unit accounting for one order line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineQuantities {
    pub purchased: i32,
    pub refunded: i32,
    pub allocated: i32,
    /// Units held by open cancel requests.
    pub pending_cancel: i32,
    /// Units held by open return/exchange requests.
    pub pending_return: i32,
}

impl LineQuantities {
    /// Units that still need to go into a shipment.
    pub fn shippable(&self) -> i32 { (self.purchased - self.refunded - self.allocated - self.pending_cancel).max(0) }

    /// Units a buyer may still ask to cancel before shipping.
    pub fn cancellable(&self) -> i32 { self.shippable() }

    /// Units a buyer may still send back or swap after delivery.
    pub fn returnable(&self) -> i32 { (self.purchased - self.refunded - self.pending_return - self.pending_cancel).max(0) }

    pub fn outstanding(&self) -> i32 { (self.purchased - self.refunded).max(0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Order has no items")]
    NoItems,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Currency mismatch")]
    CurrencyMismatch,
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Unknown status: {0}")]
    UnknownStatus(String),
}
