//! E-commerce backend: carts, coupon pricing, checkout, payments, returns,
//! profiles and the admin surface, served over HTTP.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod http;
pub mod ports;
pub mod services;

use uuid::Uuid;

use crate::domain::aggregates::{
    CartError, CouponError, OrderError, PaymentError, ProductError, ReturnError, ShippingError, UserError,
};
use crate::ports::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum EcommerceError {
    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),
    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),
    #[error("Cart not found")]
    CartNotFound,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Coupon(#[from] CouponError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Return(#[from] ReturnError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Product(#[from] ProductError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Shipping(#[from] ShippingError),
    #[error("Payment provider error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("Storage error: {0}")]
    StorageError(#[from] ports::Error),
}

impl EcommerceError {
    pub fn not_found(what: impl std::fmt::Display) -> Self { Self::NotFound(what.to_string()) }
    pub fn bad_request(message: impl Into<String>) -> Self { Self::BadRequest(message.into()) }
    pub fn forbidden(message: impl Into<String>) -> Self { Self::Forbidden(message.into()) }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;
