//! Product reviews

use serde::Serialize;
use thiserror::Error;

use super::order::OrderStatus;
use crate::domain::value_objects::Rating;

pub const MIN_CONTENT_CHARS: usize = 10;
pub const MAX_CONTENT_CHARS: usize = 2000;

/// A buyer may review a line once its order has arrived.
pub fn check_review(order_status: OrderStatus, rating: i32, content: &str) -> Result<Rating, ReviewError> {
    if !order_status.is_reviewable() { return Err(ReviewError::NotDelivered(order_status)); }
    let rating = Rating::new(rating).ok_or(ReviewError::InvalidRating(rating))?;
    let chars = content.trim().chars().count();
    if !(MIN_CONTENT_CHARS..=MAX_CONTENT_CHARS).contains(&chars) { return Err(ReviewError::ContentLength(chars)); }
    Ok(rating)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RatingSummary {
    pub count: i64,
    pub average: f64,
}

impl RatingSummary {
    /// Average rounded to one decimal place.
    pub fn new(count: i64, rating_sum: i64) -> Self {
        let average = if count == 0 { 0.0 } else { (rating_sum as f64 / count as f64 * 10.0).round() / 10.0 };
        Self { count, average }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(i32),
    #[error("Review must be between 10 and 2000 characters, got {0}")]
    ContentLength(usize),
    #[error("Order is {0}; reviews open once it is delivered")]
    NotDelivered(OrderStatus),
}
