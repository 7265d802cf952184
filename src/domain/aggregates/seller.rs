//! Seller accounts

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellerStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl SellerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Suspended => "suspended",
        }
    }

    pub fn transition(&self, next: SellerStatus) -> Result<SellerStatus, SellerError> {
        use SellerStatus::*;
        match (*self, next) {
            (Pending, Approved | Rejected) | (Approved, Suspended) | (Suspended, Approved) => Ok(next),
            (from, to) => Err(SellerError::InvalidTransition { from, to }),
        }
    }

    pub fn can_sell(&self) -> bool { *self == Self::Approved }
}

impl std::fmt::Display for SellerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for SellerStatus {
    type Err = SellerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            "suspended" => Self::Suspended,
            other => return Err(SellerError::UnknownStatus(other.to_string())),
        })
    }
}

/// Up to four letters of the name, padded with `X`, plus two random digits.
pub fn generate_seller_code(name: &str) -> String {
    seller_code_with(name, rand::thread_rng().gen_range(0..100))
}

fn seller_code_with(name: &str, digits: u32) -> String {
    let mut prefix: String = name.chars().filter(|c| c.is_ascii_alphanumeric()).take(4).collect::<String>().to_uppercase();
    while prefix.len() < 4 { prefix.push('X'); }
    format!("{}{:02}", prefix, digits)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SellerError {
    #[error("Cannot move seller from {from} to {to}")]
    InvalidTransition { from: SellerStatus, to: SellerStatus },
    #[error("Unknown seller status: {0}")]
    UnknownStatus(String),
}
