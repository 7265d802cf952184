//! Product Aggregate

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Money, Quantity, Sku};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus { #[default] Active, Archived }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Active => "active", Self::Archived => "archived" }
    }
}

impl FromStr for ProductStatus {
    type Err = ProductError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            other => Err(ProductError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Product {
    id: Uuid,
    seller_id: Uuid,
    sku: Sku,
    name: String,
    price: Money,
    inventory: Quantity,
    status: ProductStatus,
    events: Vec<DomainEvent>,
}

impl Product {
    pub fn create(seller_id: Uuid, sku: Sku, name: impl Into<String>, price: Money, inventory: i32) -> Result<Self, ProductError> {
        let name = name.into();
        if name.trim().is_empty() { return Err(ProductError::MissingName); }
        if price.amount() < 0 { return Err(ProductError::NegativePrice); }
        if inventory < 0 { return Err(ProductError::InsufficientInventory); }
        let id = Uuid::now_v7();
        let mut product = Self {
            id, seller_id, sku: sku.clone(), name, price, inventory: Quantity::new(inventory as u32),
            status: ProductStatus::Active, events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id, sku: sku.to_string() }));
        Ok(product)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn seller_id(&self) -> Uuid { self.seller_id }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn name(&self) -> &str { &self.name }
    pub fn price(&self) -> &Money { &self.price }
    pub fn inventory(&self) -> &Quantity { &self.inventory }
    pub fn status(&self) -> ProductStatus { self.status }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

/// Stock after applying a signed delta. Stock never goes negative.
pub fn adjust_inventory(current: i32, delta: i32) -> Result<i32, ProductError> {
    let current = Quantity::new(current.max(0) as u32);
    let next = if delta >= 0 {
        current.add(delta as u32)
    } else {
        current.subtract(delta.unsigned_abs()).ok_or(ProductError::InsufficientInventory)?
    };
    i32::try_from(next.value()).map_err(|_| ProductError::InventoryOverflow)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("Missing name")]
    MissingName,
    #[error("Price must not be negative")]
    NegativePrice,
    #[error("Insufficient inventory")]
    InsufficientInventory,
    #[error("Inventory overflow")]
    InventoryOverflow,
    #[error("Unknown product status: {0}")]
    UnknownStatus(String),
}
