//! Multi-step operations that span several tables in one transaction.
//! Single-table reads and writes stay in the HTTP handlers.

pub mod checkout;
pub mod orders;
pub mod refunds;
pub mod returns;
pub mod shipments;
