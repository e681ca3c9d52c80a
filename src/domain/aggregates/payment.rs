//! Payment Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::events::{DomainEvent, PaymentEvent};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    id: Uuid,
    order_id: Uuid,
    buyer_id: Uuid,
    method: PaymentMethod,
    status: PaymentStatus,
    amount: Decimal,
    currency: String,
    transaction_id: String,
    checkout_url: Option<String>,
    refunds: Vec<Refund>,
    refunded_amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod { Stripe, PayPal, BankTransfer }

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Stripe => "STRIPE", Self::PayPal => "PAY_PAL", Self::BankTransfer => "BANK_TRANSFER" }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().replace(['-', ' '], "_").as_str() {
            "STRIPE" => Some(Self::Stripe),
            "PAYPAL" | "PAY_PAL" => Some(Self::PayPal),
            "BANK_TRANSFER" | "BANKTRANSFER" => Some(Self::BankTransfer),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus { #[default] Pending, Completed, Failed, PartiallyRefunded, Refunded }

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::PartiallyRefunded => "PARTIALLY_REFUNDED",
            Self::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub return_request_id: Uuid,
    pub amount: Decimal,
    pub transaction_id: String,
    pub refunded_at: DateTime<Utc>,
}

impl Payment {
    #[allow(clippy::too_many_arguments)]
    pub fn initiate(
        order_id: Uuid, buyer_id: Uuid, method: PaymentMethod, amount: Decimal, currency: impl Into<String>,
        transaction_id: impl Into<String>, checkout_url: Option<String>,
    ) -> Self {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let mut payment = Self {
            id, order_id, buyer_id, method, status: PaymentStatus::Pending, amount, currency: currency.into(),
            transaction_id: transaction_id.into(), checkout_url, refunds: vec![], refunded_amount: Decimal::ZERO,
            created_at: now, updated_at: now, events: vec![],
        };
        payment.raise_event(DomainEvent::Payment(PaymentEvent::Initiated { payment_id: id, order_id, amount }));
        payment
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_id(&self) -> Uuid { self.order_id }
    pub fn buyer_id(&self) -> Uuid { self.buyer_id }
    pub fn method(&self) -> PaymentMethod { self.method }
    pub fn status(&self) -> PaymentStatus { self.status }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn transaction_id(&self) -> &str { &self.transaction_id }
    pub fn checkout_url(&self) -> Option<&str> { self.checkout_url.as_deref() }
    pub fn refunds(&self) -> &[Refund] { &self.refunds }
    pub fn refunded_amount(&self) -> Decimal { self.refunded_amount }
    pub fn remaining_refundable(&self) -> Decimal { self.amount - self.refunded_amount }

    /// Applies the gateway's verdict. Only pending payments can settle.
    pub fn settle(&mut self, outcome: PaymentStatus) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::Pending {
            return Err(PaymentError::AlreadySettled(self.status));
        }
        let event = match outcome {
            PaymentStatus::Pending => return Ok(()),
            PaymentStatus::Completed => PaymentEvent::Completed { payment_id: self.id, order_id: self.order_id },
            PaymentStatus::Failed => PaymentEvent::Failed { payment_id: self.id, order_id: self.order_id },
            other => return Err(PaymentError::InvalidOutcome(other)),
        };
        self.status = outcome;
        self.touch();
        self.raise_event(DomainEvent::Payment(event));
        Ok(())
    }

    pub fn ensure_refundable(&self, amount: Decimal) -> Result<(), PaymentError> {
        if !matches!(self.status, PaymentStatus::Completed | PaymentStatus::PartiallyRefunded) {
            return Err(PaymentError::NotRefundable(self.status));
        }
        if amount > self.remaining_refundable() {
            return Err(PaymentError::RefundExceedsPayment { requested: amount, remaining: self.remaining_refundable() });
        }
        Ok(())
    }

    pub fn record_refund(&mut self, return_request_id: Uuid, amount: Decimal, transaction_id: impl Into<String>) -> Result<PaymentStatus, PaymentError> {
        self.ensure_refundable(amount)?;
        self.refunds.push(Refund { return_request_id, amount, transaction_id: transaction_id.into(), refunded_at: Utc::now() });
        self.refunded_amount += amount;
        self.status = if self.refunded_amount >= self.amount { PaymentStatus::Refunded } else { PaymentStatus::PartiallyRefunded };
        self.touch();
        Ok(self.status)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment already settled with status {0}")]
    AlreadySettled(PaymentStatus),
    #[error("Gateway returned an unexpected payment status {0}")]
    InvalidOutcome(PaymentStatus),
    #[error("Payment cannot be refunded in status {0}")]
    NotRefundable(PaymentStatus),
    #[error("Refund of {requested} exceeds the remaining {remaining}")]
    RefundExceedsPayment { requested: Decimal, remaining: Decimal },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn payment(amount: i64) -> Payment {
        Payment::initiate(Uuid::new_v4(), Uuid::new_v4(), PaymentMethod::Stripe, Decimal::from(amount), "EUR", "tx_1", None)
    }

    #[rstest]
    #[case("stripe", Some(PaymentMethod::Stripe))]
    #[case("PayPal", Some(PaymentMethod::PayPal))]
    #[case("bank-transfer", Some(PaymentMethod::BankTransfer))]
    #[case("cash", None)]
    fn test_method_parse(#[case] input: &str, #[case] expected: Option<PaymentMethod>) {
        assert_eq!(PaymentMethod::parse(input), expected);
    }

    #[test]
    fn test_pending_outcome_leaves_payment_open() {
        let mut p = payment(50);
        p.settle(PaymentStatus::Pending).unwrap();
        assert_eq!(p.status(), PaymentStatus::Pending);
        p.settle(PaymentStatus::Completed).unwrap();
        assert_eq!(p.settle(PaymentStatus::Failed), Err(PaymentError::AlreadySettled(PaymentStatus::Completed)));
    }

    #[test]
    fn test_refunds_accumulate() {
        let mut p = payment(100);
        assert_eq!(p.record_refund(Uuid::new_v4(), Decimal::from(10), "r1"), Err(PaymentError::NotRefundable(PaymentStatus::Pending)));
        p.settle(PaymentStatus::Completed).unwrap();
        assert_eq!(p.record_refund(Uuid::new_v4(), Decimal::from(40), "r1"), Ok(PaymentStatus::PartiallyRefunded));
        assert!(p.record_refund(Uuid::new_v4(), Decimal::from(61), "r2").is_err());
        assert_eq!(p.record_refund(Uuid::new_v4(), Decimal::from(60), "r2"), Ok(PaymentStatus::Refunded));
        assert_eq!(p.refunded_amount(), Decimal::from(100));
        assert_eq!(p.refunds().len(), 2);
    }
}
