//! Outbound integrations
pub mod events;
pub mod payment;

pub use events::EventPublisher;
pub use payment::{ApprovedPayment, CancelledPayment, HttpPaymentGateway, PaymentError, PaymentGateway};
