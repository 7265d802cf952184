//! Row types for the marketplace schema

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Seller {
    pub id: Uuid, pub tenant_id: Uuid, pub owner_user_id: Uuid, pub code: String, pub name: String,
    pub business_number: String, pub contact_email: String, pub status: String,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category { pub id: Uuid, pub tenant_id: Uuid, pub name: String, pub slug: String, pub description: Option<String>, pub parent_id: Option<Uuid>, pub created_at: DateTime<Utc> }

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid, pub tenant_id: Uuid, pub seller_id: Uuid, pub category_id: Option<Uuid>, pub sku: String, pub name: String,
    pub description: Option<String>, pub price: i64, pub currency: String, pub inventory_quantity: i32, pub status: String,
    pub images: Vec<String>, pub tags: Vec<String>, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

/// Cart line joined with its product's current price.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartLine {
    pub product_id: Uuid, pub seller_id: Uuid, pub sku: String, pub name: String, pub quantity: i32,
    pub unit_price: i64, pub currency: String, pub product_status: String, pub inventory_quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Coupon {
    pub id: Uuid, pub tenant_id: Uuid, pub code: String, pub name: String, pub discount_type: String, pub discount_value: i64,
    pub min_order_amount: i64, pub max_discount_amount: Option<i64>, pub starts_at: DateTime<Utc>, pub expires_at: DateTime<Utc>,
    pub total_quantity: Option<i32>, pub issued_count: i32, pub is_active: bool, pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserCoupon {
    pub id: Uuid, pub tenant_id: Uuid, pub coupon_id: Uuid, pub user_id: Uuid, pub issued_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>, pub used_order_id: Option<Uuid>, pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid, pub tenant_id: Uuid, pub order_number: String, pub user_id: Uuid, pub status: String, pub payment_status: String,
    pub subtotal: i64, pub discount: i64, pub shipping_fee: i64, pub total: i64, pub currency: String,
    pub user_coupon_id: Option<Uuid>, pub shipping_address: serde_json::Value, pub billing_address: serde_json::Value,
    pub delivered_at: Option<DateTime<Utc>>, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid, pub tenant_id: Uuid, pub order_id: Uuid, pub product_id: Uuid, pub seller_id: Uuid, pub sku: String, pub name: String,
    pub unit_price: i64, pub quantity: i32, pub refunded_quantity: i32, pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid, pub tenant_id: Uuid, pub order_id: Uuid, pub payment_key: String, pub method: Option<String>, pub amount: i64,
    pub cancelled_amount: i64, pub status: String, pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Shipment {
    pub id: Uuid, pub tenant_id: Uuid, pub order_id: Uuid, pub carrier: String, pub tracking_number: String, pub status: String,
    pub created_at: DateTime<Utc>, pub shipped_at: Option<DateTime<Utc>>, pub out_for_delivery_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShipmentAllocation { pub id: Uuid, pub tenant_id: Uuid, pub shipment_id: Uuid, pub order_item_id: Uuid, pub quantity: i32 }

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Refund {
    pub id: Uuid, pub tenant_id: Uuid, pub order_id: Uuid, pub return_id: Option<Uuid>, pub amount: i64, pub reason: String,
    pub status: String, pub gateway_transaction_key: Option<String>, pub failure_message: Option<String>, pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefundItem { pub id: Uuid, pub tenant_id: Uuid, pub refund_id: Uuid, pub order_item_id: Uuid, pub quantity: i32 }

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReturnRequest {
    pub id: Uuid, pub tenant_id: Uuid, pub order_id: Uuid, pub user_id: Uuid, pub kind: String, pub status: String, pub reason: String,
    pub reason_detail: Option<String>, pub admin_note: Option<String>, pub refund_id: Option<Uuid>,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReturnItem { pub id: Uuid, pub tenant_id: Uuid, pub return_id: Uuid, pub order_item_id: Uuid, pub quantity: i32 }

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid, pub tenant_id: Uuid, pub product_id: Uuid, pub order_item_id: Uuid, pub user_id: Uuid, pub rating: i32,
    pub content: String, pub created_at: DateTime<Utc>, pub deleted_at: Option<DateTime<Utc>>,
}

/// Per-line unit accounting, see [`crate::domain::aggregates::LineQuantities`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LineQuantityRow { pub order_item_id: Uuid, pub quantity: i32, pub refunded_quantity: i32, pub allocated: i32, pub pending_cancel: i32, pub pending_return: i32 }
