//! Return Request Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::order::Order;
use crate::domain::events::{DomainEvent, ReturnEvent};
use crate::domain::value_objects::round_money;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReturnRequest {
    id: Uuid,
    order_id: Uuid,
    buyer_id: Uuid,
    order_item_ids: Vec<Uuid>,
    reason: String,
    status: ReturnStatus,
    /// Share of the returned lines' value paid back, in `[0, 1]`.
    refund_percentage: Decimal,
    refund_amount: Decimal,
    requested_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnStatus { #[default] Pending, Approved, Rejected, Refunded }

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "PENDING", Self::Approved => "APPROVED", Self::Rejected => "REJECTED", Self::Refunded => "REFUNDED" }
    }
}

impl std::fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl ReturnRequest {
    pub fn request(order: &Order, order_item_ids: Vec<Uuid>, reason: impl Into<String>, refund_percentage: Option<Decimal>) -> Result<Self, ReturnError> {
        if !order.status().accepts_returns() {
            return Err(ReturnError::OrderNotReturnable(order.status().to_string()));
        }
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(ReturnError::MissingReason);
        }
        let pct = refund_percentage.unwrap_or(Decimal::ONE);
        if pct < Decimal::ZERO || pct > Decimal::ONE {
            return Err(ReturnError::InvalidRefundPercentage);
        }
        if order_item_ids.is_empty() {
            return Err(ReturnError::InvalidItems);
        }
        let mut value = Decimal::ZERO;
        for item_id in &order_item_ids {
            value += order.item(*item_id).ok_or(ReturnError::InvalidItems)?.line_total();
        }
        let id = Uuid::now_v7();
        let refund_amount = round_money(value * pct);
        let mut request = Self {
            id, order_id: order.id(), buyer_id: order.buyer_id(), order_item_ids, reason,
            status: ReturnStatus::Pending, refund_percentage: pct, refund_amount, requested_at: Utc::now(),
            decided_at: None, refunded_at: None, events: vec![],
        };
        request.raise_event(DomainEvent::Return(ReturnEvent::Requested { return_id: id, order_id: order.id(), refund_amount }));
        Ok(request)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_id(&self) -> Uuid { self.order_id }
    pub fn buyer_id(&self) -> Uuid { self.buyer_id }
    pub fn order_item_ids(&self) -> &[Uuid] { &self.order_item_ids }
    pub fn reason(&self) -> &str { &self.reason }
    pub fn status(&self) -> ReturnStatus { self.status }
    pub fn refund_percentage(&self) -> Decimal { self.refund_percentage }
    pub fn refund_amount(&self) -> Decimal { self.refund_amount }
    pub fn requested_at(&self) -> DateTime<Utc> { self.requested_at }
    pub fn decided_at(&self) -> Option<DateTime<Utc>> { self.decided_at }

    /// A rejected request releases its items for a new return.
    pub fn claims_item(&self, item_id: Uuid) -> bool {
        self.status != ReturnStatus::Rejected && self.order_item_ids.contains(&item_id)
    }

    pub fn approve(&mut self) -> Result<(), ReturnError> {
        self.ensure_pending()?;
        self.status = ReturnStatus::Approved;
        self.decided_at = Some(Utc::now());
        self.raise_event(DomainEvent::Return(ReturnEvent::Approved { return_id: self.id, order_id: self.order_id }));
        Ok(())
    }

    pub fn reject(&mut self, why: &str) -> Result<(), ReturnError> {
        self.ensure_pending()?;
        self.status = ReturnStatus::Rejected;
        self.reason = format!("{} [Rejection: {}]", self.reason, why.trim());
        self.decided_at = Some(Utc::now());
        self.raise_event(DomainEvent::Return(ReturnEvent::Rejected { return_id: self.id, order_id: self.order_id }));
        Ok(())
    }

    /// Records the amount actually paid back, which may be below the
    /// requested value when the payment had less left to refund.
    pub fn mark_refunded(&mut self, amount: Decimal) -> Result<(), ReturnError> {
        if self.status != ReturnStatus::Approved {
            return Err(ReturnError::NotApproved(self.status));
        }
        self.refund_amount = amount;
        self.status = ReturnStatus::Refunded;
        self.refunded_at = Some(Utc::now());
        self.raise_event(DomainEvent::Return(ReturnEvent::Refunded { return_id: self.id, order_id: self.order_id, amount: self.refund_amount }));
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), ReturnError> {
        if self.status == ReturnStatus::Pending { Ok(()) } else { Err(ReturnError::NotPending(self.status)) }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReturnError {
    #[error("Order is not eligible for return in status {0}")]
    OrderNotReturnable(String),
    #[error("Invalid order items for return.")]
    InvalidItems,
    #[error("Some items already have an open return request.")]
    ItemsAlreadyReturned,
    #[error("Refund percentage must be between 0 and 1.")]
    InvalidRefundPercentage,
    #[error("A reason for the return is required.")]
    MissingReason,
    #[error("Return request is not pending: {0}")]
    NotPending(ReturnStatus),
    #[error("Return request must be approved before refund: {0}")]
    NotApproved(ReturnStatus),
}
