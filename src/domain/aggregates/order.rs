//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::user::Address;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::pricing::OrderTotals;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    id: Uuid,
    order_number: String,
    buyer_id: Uuid,
    status: OrderStatus,
    items: Vec<OrderItem>,
    coupon_code: Option<String>,
    subtotal: Decimal,
    discount: Decimal,
    shipping: Decimal,
    vat: Decimal,
    total: Decimal,
    shipping_address: Option<AddressSnapshot>,
    billing_address: Option<AddressSnapshot>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// A purchased line, priced at checkout time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub seller_id: Uuid,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal { self.unit_price * Decimal::from(self.quantity) }
}

/// Copy of an address at the moment the order was placed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub recipient: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

impl From<&Address> for AddressSnapshot {
    fn from(a: &Address) -> Self {
        Self {
            recipient: a.recipient.clone(), line1: a.line1.clone(), line2: a.line2.clone(), city: a.city.clone(),
            postal_code: a.postal_code.clone(), country: a.country.clone(), phone: a.phone.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    PendingPayment,
    PaymentFailed,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    ReturnRequested,
    ReturnApproved,
    ReturnRejected,
    Refunded,
    PartiallyRefunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 12] = [
        Self::PendingPayment, Self::PaymentFailed, Self::Paid, Self::Processing, Self::Shipped, Self::Delivered,
        Self::Cancelled, Self::ReturnRequested, Self::ReturnApproved, Self::ReturnRejected, Self::Refunded,
        Self::PartiallyRefunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "PENDING_PAYMENT",
            Self::PaymentFailed => "PAYMENT_FAILED",
            Self::Paid => "PAID",
            Self::Processing => "PROCESSING",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
            Self::ReturnRequested => "RETURN_REQUESTED",
            Self::ReturnApproved => "RETURN_APPROVED",
            Self::ReturnRejected => "RETURN_REJECTED",
            Self::Refunded => "REFUNDED",
            Self::PartiallyRefunded => "PARTIALLY_REFUNDED",
        }
    }

    /// Case-insensitive parse; accepts `-` or space in place of `_`.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::ALL.into_iter().find(|s| s.as_str() == normalized)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (PendingPayment, Paid | PaymentFailed | Cancelled)
                | (PaymentFailed, Paid | Cancelled)
                | (Paid, Processing | Cancelled | Refunded)
                | (Processing, Shipped | Cancelled)
                | (Shipped, Delivered)
                | (Delivered, ReturnRequested)
                | (ReturnRequested, ReturnApproved | ReturnRejected)
                | (ReturnApproved, Refunded | PartiallyRefunded)
                | (ReturnRejected, ReturnRequested)
                | (PartiallyRefunded, ReturnRequested | Refunded)
        )
    }

    pub fn awaits_payment(&self) -> bool { matches!(self, Self::PendingPayment | Self::PaymentFailed) }
    pub fn accepts_returns(&self) -> bool { matches!(self, Self::Delivered | Self::ReturnRejected | Self::PartiallyRefunded) }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl Order {
    pub fn place(
        buyer_id: Uuid,
        items: Vec<OrderItem>,
        coupon_code: Option<String>,
        totals: OrderTotals,
        shipping_address: Option<AddressSnapshot>,
        billing_address: Option<AddressSnapshot>,
    ) -> Result<Self, OrderError> {
        if items.is_empty() { return Err(OrderError::NoItems); }
        let id = Uuid::now_v7();
        let now = Utc::now();
        let mut order = Self {
            id, order_number: generate_order_number(), buyer_id, status: OrderStatus::PendingPayment, items,
            coupon_code, subtotal: totals.subtotal, discount: totals.discount, shipping: totals.shipping,
            vat: totals.vat, total: totals.total, shipping_address, billing_address, created_at: now,
            updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Created { order_id: id, buyer_id, total: order.total }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn buyer_id(&self) -> Uuid { self.buyer_id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn item(&self, item_id: Uuid) -> Option<&OrderItem> { self.items.iter().find(|i| i.id == item_id) }
    pub fn coupon_code(&self) -> Option<&str> { self.coupon_code.as_deref() }
    pub fn subtotal(&self) -> Decimal { self.subtotal }
    pub fn discount(&self) -> Decimal { self.discount }
    pub fn shipping(&self) -> Decimal { self.shipping }
    pub fn vat(&self) -> Decimal { self.vat }
    pub fn total(&self) -> Decimal { self.total }
    pub fn shipping_address(&self) -> Option<&AddressSnapshot> { self.shipping_address.as_ref() }
    pub fn billing_address(&self) -> Option<&AddressSnapshot> { self.billing_address.as_ref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_owned_by(&self, user_id: Uuid) -> bool { self.buyer_id == user_id }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        let from = self.status;
        self.status = next;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged {
            order_id: self.id, from: from.as_str().into(), to: next.as_str().into(),
        }));
        Ok(())
    }

    /// Buyer cancellation, possible until the order ships.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        use OrderStatus::*;
        if !matches!(self.status, PendingPayment | PaymentFailed | Paid | Processing) {
            return Err(OrderError::CannotCancel(self.status));
        }
        self.status = Cancelled;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

fn generate_order_number() -> String {
    let simple = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("ORD-{}", &simple[..8])
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Order cannot be cancelled in status {0}")]
    CannotCancel(OrderStatus),
}
