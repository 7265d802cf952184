//! Service configuration read from the environment

use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::aggregates::ShippingPolicy;

pub const MAX_RETURN_WINDOW_DAYS: i64 = 3650;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub nats_url: Option<String>,
    pub payment_gateway_url: String,
    pub payment_secret_key: String,
    pub currency: String,
    pub shipping_fee: i64,
    pub free_shipping_threshold: i64,
    pub return_window_days: i64,
    pub return_shipping_fee: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

impl Config {
    /// Reads settings from the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty()).ok_or(ConfigError::Missing(key));
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            port: parse_or(&lookup, "PORT", 8083)?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            nats_url: lookup("NATS_URL").filter(|v| !v.trim().is_empty()),
            payment_gateway_url: required("PAYMENT_GATEWAY_URL")?.trim_end_matches('/').to_string(),
            payment_secret_key: required("PAYMENT_SECRET_KEY")?,
            currency: lookup("CURRENCY").unwrap_or_else(|| "NGN".to_string()).to_uppercase(),
            shipping_fee: parse_or(&lookup, "SHIPPING_FEE", 3000)?,
            free_shipping_threshold: parse_or(&lookup, "FREE_SHIPPING_THRESHOLD", 50000)?,
            return_window_days: parse_in(&lookup, "RETURN_WINDOW_DAYS", 7, 1..=MAX_RETURN_WINDOW_DAYS)?,
            return_shipping_fee: parse_or(&lookup, "RETURN_SHIPPING_FEE", 3000)?,
        })
    }

    pub fn shipping_policy(&self) -> ShippingPolicy {
        ShippingPolicy { fee: self.shipping_fee, free_threshold: self.free_shipping_threshold }
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn parse_in<F>(lookup: &F, key: &'static str, default: i64, range: RangeInclusive<i64>) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, key, default)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid { key, value: value.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgres://localhost/marketplace"),
        ("PAYMENT_GATEWAY_URL", "https://pay.example.com/"),
        ("PAYMENT_SECRET_KEY", "sk_test"),
    ];

    #[test]
    fn test_defaults() {
        let cfg = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.db_max_connections, 10);
        assert_eq!(cfg.currency, "NGN");
        assert_eq!(cfg.payment_gateway_url, "https://pay.example.com");
        assert_eq!(cfg.return_window_days, 7);
        assert!(cfg.nats_url.is_none());
        assert_eq!(cfg.shipping_policy().fee_for(49_999), 3000);
    }

    #[test]
    fn test_missing_required() {
        let err = Config::from_lookup(lookup_from(&REQUIRED[1..])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn test_invalid_number() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert_eq!(err, ConfigError::Invalid { key: "PORT", value: "eighty".into() });
    }

    #[test]
    fn test_return_window_bounds() {
        for bad in ["0", "-3", "3651", "9223372036854775807"] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push(("RETURN_WINDOW_DAYS", bad));
            let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: "RETURN_WINDOW_DAYS", .. }), "{bad}");
        }
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RETURN_WINDOW_DAYS", "3650"));
        assert_eq!(Config::from_lookup(lookup_from(&pairs)).unwrap().return_window_days, 3650);
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([("SHIPPING_FEE", "0"), ("CURRENCY", "usd"), ("NATS_URL", "nats://localhost:4222")]);
        let cfg = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(cfg.shipping_fee, 0);
        assert_eq!(cfg.currency, "USD");
        assert_eq!(cfg.nats_url.as_deref(), Some("nats://localhost:4222"));
    }
}
