//! Cart Aggregate
//!
//! One cart per user and tenant. Lines are keyed by product and always carry
//! the product's current price.

use uuid::Uuid;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug)]
pub struct CartItem {
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

/// Upper bound on the quantity of a single cart line.
pub const MAX_LINE_QUANTITY: u32 = 999;

#[derive(Clone, Debug)]
pub struct Cart {
    currency: String,
    lines: Vec<CartItem>,
}

impl Cart {
    pub fn new(currency: &str) -> Self {
        Self { currency: currency.to_string(), lines: Vec::new() }
    }

    pub fn items(&self) -> &[CartItem] { &self.lines }
    pub fn item_count(&self) -> usize { self.lines.len() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    /// Sum of line totals. Lines in a foreign currency are skipped.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().fold(Money::zero(&self.currency), |acc, line| {
            let total = line.line_total();
            acc.add(&total).unwrap_or(acc)
        })
    }

    fn position(&self, product_id: Uuid) -> Result<usize, CartError> {
        self.lines.iter().position(|l| l.product_id == product_id).ok_or(CartError::ItemNotFound)
    }

    /// Adding a product already in the cart bumps its quantity and refreshes the price.
    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        match self.position(item.product_id) {
            Ok(idx) => {
                let line = &mut self.lines[idx];
                let merged = line.quantity.saturating_add(item.quantity);
                if merged > MAX_LINE_QUANTITY { return Err(CartError::QuantityLimit(MAX_LINE_QUANTITY)); }
                line.quantity = merged;
                line.unit_price = item.unit_price;
            }
            Err(_) => {
                if item.quantity > MAX_LINE_QUANTITY { return Err(CartError::QuantityLimit(MAX_LINE_QUANTITY)); }
                self.lines.push(item);
            }
        }
        Ok(())
    }

    /// A quantity of zero drops the line.
    pub fn update_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        if quantity > MAX_LINE_QUANTITY { return Err(CartError::QuantityLimit(MAX_LINE_QUANTITY)); }
        let idx = self.position(product_id)?;
        if quantity == 0 {
            self.lines.remove(idx);
        } else {
            self.lines[idx].quantity = quantity;
        }
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> Result<CartItem, CartError> {
        let idx = self.position(product_id)?;
        Ok(self.lines.remove(idx))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Item not found in cart")]
    ItemNotFound,
    #[error("A cart line cannot hold more than {0} units")]
    QuantityLimit(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: Uuid, qty: u32, price: i64) -> CartItem {
        CartItem { product_id: id, name: "Desk lamp".into(), sku: "LAMP-1".into(), quantity: qty, unit_price: Money::new(price, "NGN") }
    }

    #[test]
    fn test_same_product_merges_at_latest_price() {
        let lamp = Uuid::new_v4();
        let mut cart = Cart::new("NGN");
        cart.add_item(line(lamp, 2, 1000)).unwrap();
        assert_eq!(cart.subtotal().amount(), 2000);
        cart.add_item(line(lamp, 1, 1200)).unwrap();
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.subtotal().amount(), 3600);
    }

    #[test]
    fn test_merge_cannot_exceed_line_limit() {
        let lamp = Uuid::new_v4();
        let mut cart = Cart::new("NGN");
        cart.add_item(line(lamp, 990, 1000)).unwrap();
        assert_eq!(cart.add_item(line(lamp, 10, 1000)), Err(CartError::QuantityLimit(MAX_LINE_QUANTITY)));
        assert_eq!(cart.items()[0].quantity, 990);
        cart.add_item(line(lamp, 9, 1000)).unwrap();
        assert_eq!(cart.items()[0].quantity, MAX_LINE_QUANTITY);
        assert_eq!(cart.add_item(line(lamp, u32::MAX, 1000)), Err(CartError::QuantityLimit(MAX_LINE_QUANTITY)));
        assert_eq!(cart.add_item(line(Uuid::new_v4(), 1000, 1000)), Err(CartError::QuantityLimit(MAX_LINE_QUANTITY)));
        assert_eq!(cart.update_quantity(lamp, 1000), Err(CartError::QuantityLimit(MAX_LINE_QUANTITY)));
    }

    #[test]
    fn test_zero_quantity_drops_line() {
        let lamp = Uuid::new_v4();
        let mut cart = Cart::new("NGN");
        cart.add_item(line(lamp, 2, 1000)).unwrap();
        cart.update_quantity(lamp, 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal().amount(), 0);
    }

    #[test]
    fn test_missing_lines() {
        let mut cart = Cart::new("NGN");
        assert_eq!(cart.remove_item(Uuid::new_v4()).unwrap_err(), CartError::ItemNotFound);
        assert_eq!(cart.update_quantity(Uuid::new_v4(), 3), Err(CartError::ItemNotFound));
        let kept = Uuid::new_v4();
        cart.add_item(line(kept, 1, 500)).unwrap();
        assert_eq!(cart.remove_item(kept).unwrap().sku, "LAMP-1");
        assert!(cart.is_empty());
    }
}
