//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod coupon;
pub mod return_request;
pub mod payment;
pub mod user;
pub mod shipping;

pub use product::{Category, Product, ProductDetails, ProductError, ProductStatus};
pub use order::{AddressSnapshot, Order, OrderError, OrderItem, OrderStatus};
pub use cart::{Cart, CartError, CartItem, CartOwner};
pub use coupon::{Coupon, CouponCategory, CouponDiscount, CouponError, CouponScope, CouponState, CouponTargets, NewCoupon, RedemptionContext};
pub use return_request::{ReturnError, ReturnRequest, ReturnStatus};
pub use payment::{Payment, PaymentError, PaymentMethod, PaymentStatus, Refund};
pub use user::{Address, AddressDetails, AddressType, Follow, PrivacySettings, User, UserError};
pub use shipping::{OrderShipping, PackageDimensions, ShippingDetails, ShippingError, ShippingTracking};
