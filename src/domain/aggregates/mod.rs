//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod coupon;
pub mod refund;
pub mod returns;
pub mod shipment;
pub mod review;
pub mod seller;

pub use product::{Product, ProductError, ProductStatus};
pub use order::{LineItem, LineQuantities, OrderDraft, OrderError, OrderStatus, PaymentStatus, ShippingPolicy};
pub use cart::{Cart, CartError, CartItem, MAX_LINE_QUANTITY};
pub use coupon::{Coupon, CouponError, DiscountType, UserCoupon};
pub use refund::{calculate_refund, OrderAmounts, RefundError, RefundLine, RefundQuote, RefundStatus};
pub use returns::{ReturnEligibility, ReturnError, ReturnKind, ReturnReason, ReturnStatus};
pub use shipment::{check_allocations, delivery_steps, DeliveryStep, ShipmentError, ShipmentStatus, ShipmentTimeline};
pub use review::{check_review, RatingSummary, ReviewError};
pub use seller::{generate_seller_code, SellerError, SellerStatus};
