//! Service-level errors and their HTTP mapping

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use thiserror::Error;

use crate::domain::aggregates::{
    CartError, CouponError, OrderError, ProductError, RefundError, ReturnError, ReviewError, SellerError, ShipmentError,
};
use crate::domain::value_objects::SkuError;
use crate::infra::PaymentError;

#[derive(Error, Debug)]
pub enum CommerceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Payment gateway error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, CommerceError>;

impl CommerceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) | Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CommerceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Storage(e) => {
                tracing::error!(error = %e, "storage error");
                "internal error".to_string()
            }
            Self::Payment(e) => {
                tracing::error!(error = %e, "payment gateway error");
                self.to_string()
            }
            _ => self.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<validator::ValidationErrors> for CommerceError {
    fn from(e: validator::ValidationErrors) -> Self { Self::Validation(e.to_string()) }
}

impl From<SkuError> for CommerceError {
    fn from(e: SkuError) -> Self { Self::Validation(e.to_string()) }
}

impl From<ProductError> for CommerceError {
    fn from(e: ProductError) -> Self {
        match e {
            ProductError::InsufficientInventory => Self::Conflict(e.to_string()),
            _ => Self::Validation(e.to_string()),
        }
    }
}

impl From<CartError> for CommerceError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::ItemNotFound => Self::NotFound("Cart item"),
            CartError::QuantityLimit(_) => Self::Validation(e.to_string()),
        }
    }
}

impl From<OrderError> for CommerceError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::InvalidTransition { .. } => Self::InvalidState(e.to_string()),
            _ => Self::Validation(e.to_string()),
        }
    }
}

impl From<CouponError> for CommerceError {
    fn from(e: CouponError) -> Self {
        match e {
            CouponError::SoldOut => Self::Conflict(e.to_string()),
            _ => Self::Validation(e.to_string()),
        }
    }
}

impl From<RefundError> for CommerceError {
    fn from(e: RefundError) -> Self {
        match e {
            RefundError::NothingRefundable => Self::InvalidState(e.to_string()),
            _ => Self::Validation(e.to_string()),
        }
    }
}

impl From<ReturnError> for CommerceError {
    fn from(e: ReturnError) -> Self {
        match e {
            ReturnError::InvalidTransition { .. } | ReturnError::NotCancellable(_) | ReturnError::NotDelivered(_) | ReturnError::WindowClosed { .. } => {
                Self::InvalidState(e.to_string())
            }
            _ => Self::Validation(e.to_string()),
        }
    }
}

impl From<ShipmentError> for CommerceError {
    fn from(e: ShipmentError) -> Self {
        match e {
            ShipmentError::Backwards { .. } => Self::InvalidState(e.to_string()),
            _ => Self::Validation(e.to_string()),
        }
    }
}

impl From<ReviewError> for CommerceError {
    fn from(e: ReviewError) -> Self {
        match e {
            ReviewError::NotDelivered(_) => Self::InvalidState(e.to_string()),
            _ => Self::Validation(e.to_string()),
        }
    }
}

impl From<SellerError> for CommerceError {
    fn from(e: SellerError) -> Self {
        match e {
            SellerError::InvalidTransition { .. } => Self::InvalidState(e.to_string()),
            _ => Self::Validation(e.to_string()),
        }
    }
}
