//! Partial-refund calculator
//!
//! Splits an order's coupon discount across refunded lines in proportion to
//! their value. Shipping is only returned once nothing refundable remains, at
//! which point the buyer gets back exactly what is left of the payment.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::domain::value_objects::prorate;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Completed,
    Failed,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Completed => "completed", Self::Failed => "failed" }
    }
}

impl FromStr for RefundStatus {
    type Err = RefundError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(RefundError::UnknownStatus(other.to_string())),
        }
    }
}

/// Monetary snapshot of an order at refund time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderAmounts {
    pub subtotal: i64,
    pub discount: i64,
    pub shipping_fee: i64,
    pub total: i64,
    pub already_refunded: i64,
}

impl OrderAmounts {
    pub fn refundable(&self) -> i64 { (self.total - self.already_refunded).max(0) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefundLine {
    pub unit_price: i64,
    pub quantity: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefundQuote {
    pub items_amount: i64,
    pub discount_share: i64,
    pub shipping_refund: i64,
    pub deduction: i64,
    pub amount: i64,
}

/// Works out how much to send back for `lines`.
///
/// `closes_order` means no refundable unit is left once these lines are
/// refunded. `deduction` is withheld from the buyer, e.g. return postage.
pub fn calculate_refund(order: &OrderAmounts, lines: &[RefundLine], closes_order: bool, deduction: i64) -> Result<RefundQuote, RefundError> {
    if lines.is_empty() { return Err(RefundError::NoLines); }
    if lines.iter().any(|l| l.quantity <= 0 || l.unit_price < 0) { return Err(RefundError::InvalidLine); }
    let refundable = order.refundable();
    if refundable == 0 { return Err(RefundError::NothingRefundable); }

    let items_amount: i64 = lines.iter().map(|l| l.unit_price * i64::from(l.quantity)).sum();
    let discount_share = prorate(order.discount, items_amount, order.subtotal).min(items_amount);
    let deduction = deduction.max(0);

    let (base, shipping_refund) = if closes_order {
        let base = refundable;
        (base, order.shipping_fee.min(base))
    } else {
        (items_amount - discount_share, 0)
    };

    let after_deduction = (base - deduction).max(0);
    let amount = after_deduction.min(refundable);
    Ok(RefundQuote { items_amount, discount_share, shipping_refund, deduction: base - after_deduction, amount })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefundError {
    #[error("Refund must include at least one line")]
    NoLines,
    #[error("Refund line quantity must be positive")]
    InvalidLine,
    #[error("Nothing left to refund on this order")]
    NothingRefundable,
    #[error("Unknown refund status: {0}")]
    UnknownStatus(String),
}
