//! Coupon Aggregate
//!
//! A [`Coupon`] defines the discount; a [`UserCoupon`] is one user's copy of
//! it. Redeeming soft-deletes the user coupon, and a full refund restores it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::percent_of;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Fixed,
    Percent,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Fixed => "fixed", Self::Percent => "percent" }
    }
}

impl FromStr for DiscountType {
    type Err = CouponError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "percent" => Ok(Self::Percent),
            other => Err(CouponError::UnknownDiscountType(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub min_order_amount: i64,
    pub max_discount_amount: Option<i64>,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub total_quantity: Option<i32>,
    pub issued_count: i32,
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserCoupon {
    pub id: Uuid,
    pub coupon_id: Uuid,
    pub user_id: Uuid,
    pub used_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UserCoupon {
    pub fn is_usable(&self) -> bool { self.used_at.is_none() && self.deleted_at.is_none() }
}

impl Coupon {
    /// Checks the definition itself, before it is stored.
    pub fn validate_definition(&self) -> Result<(), CouponError> {
        if self.code.trim().is_empty() { return Err(CouponError::InvalidDefinition("code is required")); }
        if self.expires_at <= self.starts_at { return Err(CouponError::InvalidDefinition("expires_at must be after starts_at")); }
        if self.min_order_amount < 0 { return Err(CouponError::InvalidDefinition("min_order_amount must not be negative")); }
        if matches!(self.max_discount_amount, Some(max) if max <= 0) {
            return Err(CouponError::InvalidDefinition("max_discount_amount must be positive"));
        }
        if matches!(self.total_quantity, Some(q) if q <= 0) {
            return Err(CouponError::InvalidDefinition("total_quantity must be positive"));
        }
        match self.discount_type {
            DiscountType::Fixed if self.discount_value <= 0 => Err(CouponError::InvalidDefinition("fixed discount must be positive")),
            DiscountType::Percent if !(1..=100).contains(&self.discount_value) => Err(CouponError::InvalidDefinition("percent discount must be between 1 and 100")),
            _ => Ok(()),
        }
    }

    /// Whether one more copy may be handed out.
    pub fn can_issue(&self, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.is_active { return Err(CouponError::Inactive); }
        if now >= self.expires_at { return Err(CouponError::Expired); }
        if matches!(self.total_quantity, Some(total) if self.issued_count >= total) { return Err(CouponError::SoldOut); }
        Ok(())
    }

    /// Runs the redemption checks in order; the first failure wins.
    pub fn check_redeemable(&self, user_coupon: &UserCoupon, order_amount: i64, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.is_active { return Err(CouponError::Inactive); }
        if now < self.starts_at { return Err(CouponError::NotStarted); }
        if now >= self.expires_at { return Err(CouponError::Expired); }
        if !user_coupon.is_usable() { return Err(CouponError::AlreadyUsed); }
        if order_amount < self.min_order_amount {
            return Err(CouponError::BelowMinimum { required: self.min_order_amount, actual: order_amount });
        }
        Ok(())
    }

    pub fn discount_for(&self, order_amount: i64) -> i64 {
        let amount = order_amount.max(0);
        let discount = match self.discount_type {
            DiscountType::Fixed => self.discount_value,
            DiscountType::Percent => {
                let d = percent_of(amount, self.discount_value);
                self.max_discount_amount.map_or(d, |max| d.min(max))
            }
        };
        discount.clamp(0, amount)
    }

    pub fn redeem(&self, user_coupon: &UserCoupon, order_amount: i64, now: DateTime<Utc>) -> Result<i64, CouponError> {
        self.check_redeemable(user_coupon, order_amount, now)?;
        Ok(self.discount_for(order_amount))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("Coupon is not active")]
    Inactive,
    #[error("Coupon is not valid yet")]
    NotStarted,
    #[error("Coupon has expired")]
    Expired,
    #[error("Coupon has already been used")]
    AlreadyUsed,
    #[error("Order amount {actual} is below the coupon minimum of {required}")]
    BelowMinimum { required: i64, actual: i64 },
    #[error("Coupon has no copies left")]
    SoldOut,
    #[error("Invalid coupon: {0}")]
    InvalidDefinition(&'static str),
    #[error("Unknown discount type: {0}")]
    UnknownDiscountType(String),
}
