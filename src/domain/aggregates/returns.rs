//! Return requests: send back, swap, or cancel part of an order

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::order::{LineQuantities, OrderStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    Return,
    Exchange,
    Cancel,
}

impl ReturnKind {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Return => "return", Self::Exchange => "exchange", Self::Cancel => "cancel" }
    }
}

impl FromStr for ReturnKind {
    type Err = ReturnError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "return" => Ok(Self::Return),
            "exchange" => Ok(Self::Exchange),
            "cancel" => Ok(Self::Cancel),
            other => Err(ReturnError::Unknown(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Requested,
    Approved,
    Rejected,
    Completed,
    Withdrawn,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Withdrawn => "withdrawn",
        }
    }

    pub fn transition(&self, next: ReturnStatus) -> Result<ReturnStatus, ReturnError> {
        use ReturnStatus::*;
        match (*self, next) {
            (Requested, Approved | Rejected | Withdrawn) | (Approved, Completed) => Ok(next),
            (from, to) => Err(ReturnError::InvalidTransition { from, to }),
        }
    }
}

impl FromStr for ReturnStatus {
    type Err = ReturnError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "requested" => Self::Requested,
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            "completed" => Self::Completed,
            "withdrawn" => Self::Withdrawn,
            other => return Err(ReturnError::Unknown(other.to_string())),
        })
    }
}

impl std::fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnReason {
    Defective,
    WrongItem,
    Damaged,
    ChangedMind,
    Other,
}

impl ReturnReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Defective => "defective",
            Self::WrongItem => "wrong_item",
            Self::Damaged => "damaged",
            Self::ChangedMind => "changed_mind",
            Self::Other => "other",
        }
    }

    /// The buyer pays return postage when the seller is not at fault.
    pub fn is_buyer_fault(&self) -> bool { matches!(self, Self::ChangedMind) }
}

impl FromStr for ReturnReason {
    type Err = ReturnError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "defective" => Self::Defective,
            "wrong_item" => Self::WrongItem,
            "damaged" => Self::Damaged,
            "changed_mind" => Self::ChangedMind,
            "other" => Self::Other,
            other => return Err(ReturnError::Unknown(other.to_string())),
        })
    }
}

/// Everything needed to decide whether a request may be filed.
#[derive(Clone, Debug)]
pub struct ReturnEligibility {
    pub order_status: OrderStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub window_days: i64,
    pub lines: HashMap<Uuid, LineQuantities>,
}

impl ReturnEligibility {
    pub fn check(&self, kind: ReturnKind, items: &[(Uuid, i32)], now: DateTime<Utc>) -> Result<(), ReturnError> {
        if items.is_empty() { return Err(ReturnError::NoItems); }
        match kind {
            ReturnKind::Cancel => {
                if !matches!(self.order_status, OrderStatus::Paid | OrderStatus::Preparing) {
                    return Err(ReturnError::NotCancellable(self.order_status));
                }
            }
            ReturnKind::Return | ReturnKind::Exchange => {
                if self.order_status != OrderStatus::Delivered { return Err(ReturnError::NotDelivered(self.order_status)); }
                let delivered_at = self.delivered_at.ok_or(ReturnError::NotDelivered(self.order_status))?;
                let closes_at = Duration::try_days(self.window_days).and_then(|d| delivered_at.checked_add_signed(d));
                if closes_at.map_or(true, |closes_at| now > closes_at) {
                    return Err(ReturnError::WindowClosed { days: self.window_days });
                }
            }
        }

        let mut requested: HashMap<Uuid, i32> = HashMap::new();
        for (item_id, qty) in items {
            if *qty <= 0 { return Err(ReturnError::InvalidQuantity(*item_id)); }
            *requested.entry(*item_id).or_default() += qty;
        }
        for (item_id, qty) in requested {
            let line = self.lines.get(&item_id).ok_or(ReturnError::UnknownItem(item_id))?;
            let available = match kind {
                ReturnKind::Cancel => line.cancellable(),
                ReturnKind::Return | ReturnKind::Exchange => line.returnable(),
            };
            if qty > available { return Err(ReturnError::ExceedsAvailable { item_id, requested: qty, available }); }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReturnError {
    #[error("Request must include at least one item")]
    NoItems,
    #[error("Quantity for item {0} must be at least 1")]
    InvalidQuantity(Uuid),
    #[error("Item {0} does not belong to this order")]
    UnknownItem(Uuid),
    #[error("Requested {requested} of item {item_id} but only {available} available")]
    ExceedsAvailable { item_id: Uuid, requested: i32, available: i32 },
    #[error("Orders in status {0} cannot be cancelled")]
    NotCancellable(OrderStatus),
    #[error("Order is {0}, returns open after delivery")]
    NotDelivered(OrderStatus),
    #[error("Return window of {days} days has closed")]
    WindowClosed { days: i64 },
    #[error("Cannot move request from {from} to {to}")]
    InvalidTransition { from: ReturnStatus, to: ReturnStatus },
    #[error("Unknown value: {0}")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eligibility(status: OrderStatus, delivered_days_ago: Option<i64>) -> (ReturnEligibility, Uuid) {
        let item = Uuid::new_v4();
        let lines = HashMap::from([(item, LineQuantities { purchased: 3, refunded: 0, allocated: 1, pending_cancel: 0, pending_return: 1 })]);
        let delivered_at = delivered_days_ago.map(|d| Utc::now() - Duration::days(d));
        (ReturnEligibility { order_status: status, delivered_at, window_days: 7, lines }, item)
    }

    #[test]
    fn test_cancel_before_shipment_limited_to_unallocated() {
        let (e, item) = eligibility(OrderStatus::Preparing, None);
        assert!(e.check(ReturnKind::Cancel, &[(item, 2)], Utc::now()).is_ok());
        assert_eq!(
            e.check(ReturnKind::Cancel, &[(item, 3)], Utc::now()),
            Err(ReturnError::ExceedsAvailable { item_id: item, requested: 3, available: 2 })
        );
        let (e, item) = eligibility(OrderStatus::Shipped, None);
        assert_eq!(e.check(ReturnKind::Cancel, &[(item, 1)], Utc::now()), Err(ReturnError::NotCancellable(OrderStatus::Shipped)));
    }

    #[test]
    fn test_return_needs_delivery_within_window() {
        let (e, item) = eligibility(OrderStatus::Delivered, Some(3));
        assert!(e.check(ReturnKind::Return, &[(item, 2)], Utc::now()).is_ok());
        assert!(e.check(ReturnKind::Exchange, &[(item, 3)], Utc::now()).is_err());
        let (e, item) = eligibility(OrderStatus::Delivered, Some(8));
        assert_eq!(e.check(ReturnKind::Return, &[(item, 1)], Utc::now()), Err(ReturnError::WindowClosed { days: 7 }));
        let (e, item) = eligibility(OrderStatus::Shipped, None);
        assert_eq!(e.check(ReturnKind::Return, &[(item, 1)], Utc::now()), Err(ReturnError::NotDelivered(OrderStatus::Shipped)));
    }

    #[test]
    fn test_duplicate_lines_are_summed() {
        let (e, item) = eligibility(OrderStatus::Delivered, Some(1));
        assert!(e.check(ReturnKind::Return, &[(item, 1), (item, 2)], Utc::now()).is_err());
    }

    #[test]
    fn test_rejects_foreign_and_zero_items() {
        let (e, item) = eligibility(OrderStatus::Delivered, Some(1));
        let stranger = Uuid::new_v4();
        assert_eq!(e.check(ReturnKind::Return, &[(stranger, 1)], Utc::now()), Err(ReturnError::UnknownItem(stranger)));
        assert_eq!(e.check(ReturnKind::Return, &[(item, 0)], Utc::now()), Err(ReturnError::InvalidQuantity(item)));
        assert_eq!(e.check(ReturnKind::Return, &[], Utc::now()), Err(ReturnError::NoItems));
    }

    #[test]
    fn test_status_transitions() {
        use ReturnStatus::*;
        assert_eq!(Requested.transition(Approved), Ok(Approved));
        assert_eq!(Approved.transition(Completed), Ok(Completed));
        assert!(Approved.transition(Withdrawn).is_err());
        assert!(Rejected.transition(Approved).is_err());
    }

    #[test]
    fn test_buyer_fault() {
        assert!(ReturnReason::ChangedMind.is_buyer_fault());
        assert!(!ReturnReason::Defective.is_buyer_fault());
        assert_eq!("wrong_item".parse::<ReturnReason>().unwrap(), ReturnReason::WrongItem);
    }
}
