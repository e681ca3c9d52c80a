use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::aggregates::{Payment, PaymentMethod, PaymentStatus};

use super::Error;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_payment_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>, Error>;
    /// Oldest first.
    async fn list_payments_by_order(&self, order_id: Uuid) -> Result<Vec<Payment>, Error>;
    async fn save_payment(&self, payment: &Payment) -> Result<(), Error>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub order_id: Uuid,
    pub order_number: String,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSession {
    pub transaction_id: String,
    /// Where the buyer completes payment, for redirect-based methods.
    pub checkout_url: Option<String>,
}

/// External payment provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayError>;
    /// Current state of a checkout: `Pending`, `Completed` or `Failed`.
    async fn confirm(&self, method: PaymentMethod, transaction_id: &str) -> Result<PaymentStatus, GatewayError>;
    /// Returns the refund's transaction id.
    async fn refund(&self, transaction_id: &str, amount: Decimal) -> Result<String, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("payment declined: {0}")]
    Declined(String),
    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
}
