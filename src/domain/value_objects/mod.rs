//! Value Objects for the marketplace

use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }

    /// Builds `SELLERCODE-CAT-XXXXXX`. `CAT` comes from the category slug,
    /// or `GEN` for uncategorised products.
    pub fn generate(seller_code: &str, category_slug: Option<&str>) -> Result<Self, SkuError> {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        Self::compose(seller_code, category_slug, &suffix)
    }

    fn compose(seller_code: &str, category_slug: Option<&str>, suffix: &str) -> Result<Self, SkuError> {
        let category: String = category_slug
            .map(|slug| slug.chars().filter(|c| c.is_ascii_alphanumeric()).take(3).collect())
            .filter(|c: &String| !c.is_empty())
            .unwrap_or_else(|| "GEN".to_string());
        Self::new(format!("{}-{}-{}", seller_code, category, suffix))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkuError {
    #[error("SKU empty")]
    Empty,
    #[error("SKU too long")]
    TooLong,
}

/// URL slug derived from a display name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slug(String);

impl Slug {
    pub fn from_name(name: &str) -> Option<Self> {
        let mut slug = String::with_capacity(name.len());
        let mut pending_dash = false;
        for c in name.trim().chars() {
            if c.is_alphanumeric() {
                if pending_dash && !slug.is_empty() { slug.push('-'); }
                pending_dash = false;
                slug.extend(c.to_lowercase());
            } else {
                pending_dash = true;
            }
        }
        if slug.is_empty() { None } else { Some(Self(slug)) }
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

/// Money in minor currency units
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: i64, currency: String }

impl Money {
    pub fn new(amount: i64, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn zero(currency: &str) -> Self { Self::new(0, currency) }
    pub fn amount(&self) -> i64 { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * i64::from(qty), &self.currency) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Currency mismatch")]
    CurrencyMismatch,
}

/// `amount * numerator / denominator`, rounded half-up to a whole minor unit.
pub fn prorate(amount: i64, numerator: i64, denominator: i64) -> i64 {
    if denominator == 0 { return 0; }
    (Decimal::from(amount) * Decimal::from(numerator) / Decimal::from(denominator))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

/// `floor(amount * percent / 100)`
pub fn percent_of(amount: i64, percent: i64) -> i64 {
    (Decimal::from(amount) * Decimal::from(percent) / Decimal::ONE_HUNDRED)
        .floor()
        .to_i64()
        .unwrap_or(0)
}

/// Quantity value object
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
}

/// Review rating, 1 to 5 stars
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating(u8);

impl Rating {
    pub fn new(value: i32) -> Option<Self> {
        (1..=5).contains(&value).then_some(Self(value as u8))
    }
    pub fn value(&self) -> u8 { self.0 }
}
