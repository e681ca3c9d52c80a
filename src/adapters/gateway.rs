//! Sandbox payment provider.
//!
//! Card and wallet checkouts confirm immediately; bank transfers stay pending
//! until settled out of band.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::aggregates::{PaymentMethod, PaymentStatus};
use crate::ports::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway};

#[derive(Clone, Debug, Default)]
pub struct SandboxGateway {
    sessions: Arc<Mutex<HashMap<String, PaymentMethod>>>,
}

impl SandboxGateway {
    pub fn new() -> Self { Self::default() }
}

fn token() -> String { Uuid::new_v4().simple().to_string() }

#[async_trait::async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        if request.amount <= Decimal::ZERO {
            return Err(GatewayError::Declined(format!("invalid amount {}", request.amount)));
        }
        let (transaction_id, checkout_url) = match request.method {
            PaymentMethod::Stripe => {
                let tx = format!("cs_test_{}", token());
                let url = format!("https://checkout.stripe.com/c/pay/{tx}");
                (tx, Some(url))
            }
            PaymentMethod::PayPal => {
                let tx = format!("PAYID-{}", token().to_uppercase());
                let url = format!("https://www.sandbox.paypal.com/checkoutnow?token={tx}");
                (tx, Some(url))
            }
            PaymentMethod::BankTransfer => (format!("BT-{}", &token()[..12].to_uppercase()), None),
        };
        self.sessions
            .lock()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?
            .insert(transaction_id.clone(), request.method);
        tracing::debug!(order_number = %request.order_number, %transaction_id, "sandbox checkout created");
        Ok(CheckoutSession { transaction_id, checkout_url })
    }

    async fn confirm(&self, method: PaymentMethod, transaction_id: &str) -> Result<PaymentStatus, GatewayError> {
        let sessions = self.sessions.lock().map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        match sessions.get(transaction_id) {
            None => Err(GatewayError::UnknownTransaction(transaction_id.to_string())),
            Some(stored) if *stored != method => Ok(PaymentStatus::Failed),
            Some(PaymentMethod::BankTransfer) => Ok(PaymentStatus::Pending),
            Some(_) => Ok(PaymentStatus::Completed),
        }
    }

    async fn refund(&self, transaction_id: &str, amount: Decimal) -> Result<String, GatewayError> {
        let known = self
            .sessions
            .lock()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?
            .contains_key(transaction_id);
        if !known {
            return Err(GatewayError::UnknownTransaction(transaction_id.to_string()));
        }
        tracing::debug!(%transaction_id, %amount, "sandbox refund issued");
        Ok(format!("re_{}", token()))
    }
}
