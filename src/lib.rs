//! OpenSASE Marketplace
//!
//! Self-hosted multi-tenant marketplace: sellers list products, buyers check
//! out with coupons, and the platform tracks orders through shipment,
//! returns and refunds.
//!
//! ## Features
//! - Seller onboarding and product catalog with SKU generation
//! - Carts, coupons and checkout
//! - Payment capture and cancellation through an external gateway
//! - Shipments with per-line allocations and delivery steps
//! - Returns, exchanges, cancellations and prorated refunds
//! - Product reviews

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;

use std::sync::Arc;

pub use api::router;
pub use config::Config;
pub use error::{CommerceError, Result};

use infra::{EventPublisher, PaymentGateway};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub events: EventPublisher,
    pub gateway: Arc<dyn PaymentGateway>,
    pub config: Arc<Config>,
}
