//! Order shipping aggregate: carrier details plus the latest tracking state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::order::{Order, OrderStatus};
use crate::domain::events::{DomainEvent, ShippingEvent};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderShipping {
    id: Uuid,
    order_id: Uuid,
    buyer_id: Uuid,
    details: ShippingDetails,
    tracking: Option<ShippingTracking>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub carrier: String,
    pub method: String,
    pub currency: String,
    pub price: Decimal,
    pub tracking_url: Option<String>,
    pub tracking_number: Option<String>,
    pub label_url: Option<String>,
    pub label: Option<String>,
    /// Number of packages handed to the carrier.
    pub package_count: u32,
    pub weight: Option<String>,
    pub dimensions: Option<PackageDimensions>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDimensions {
    pub regular: bool,
    pub height: Option<String>,
    pub width: Option<String>,
    pub depth: Option<String>,
}

/// Carrier-side view of a shipment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingTracking {
    pub tracking_number: String,
    pub carrier_status: String,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

impl OrderShipping {
    /// Shipping can be attached once the order is paid and until it is delivered.
    pub fn create(order: &Order, details: ShippingDetails) -> Result<Self, ShippingError> {
        use OrderStatus::*;
        if !matches!(order.status(), Paid | Processing | Shipped | Delivered) {
            return Err(ShippingError::OrderNotShippable(order.status()));
        }
        let details = Self::check(details)?;
        let id = Uuid::now_v7();
        let now = Utc::now();
        let mut shipping = Self {
            id, order_id: order.id(), buyer_id: order.buyer_id(), details, tracking: None,
            created_at: now, updated_at: now, events: vec![],
        };
        shipping.raise_event(DomainEvent::Shipping(ShippingEvent::DetailsAdded { order_id: order.id() }));
        Ok(shipping)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_id(&self) -> Uuid { self.order_id }
    pub fn buyer_id(&self) -> Uuid { self.buyer_id }
    pub fn details(&self) -> &ShippingDetails { &self.details }
    pub fn tracking(&self) -> Option<&ShippingTracking> { self.tracking.as_ref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Replaces carrier details. A changed tracking number drops the old
    /// tracking state.
    pub fn update_details(&mut self, details: ShippingDetails) -> Result<(), ShippingError> {
        let details = Self::check(details)?;
        if details.tracking_number != self.details.tracking_number {
            self.tracking = None;
        }
        self.details = details;
        self.touch();
        self.raise_event(DomainEvent::Shipping(ShippingEvent::DetailsUpdated { order_id: self.order_id }));
        Ok(())
    }

    pub fn record_tracking(&mut self, carrier_status: &str, estimated_delivery: Option<DateTime<Utc>>) -> Result<(), ShippingError> {
        let tracking_number = self.details.tracking_number.clone().ok_or(ShippingError::MissingTrackingNumber)?;
        let carrier_status = carrier_status.trim();
        if carrier_status.is_empty() {
            return Err(ShippingError::MissingField("carrier_status"));
        }
        self.tracking = Some(ShippingTracking {
            tracking_number,
            carrier_status: carrier_status.to_string(),
            estimated_delivery,
            last_updated: Utc::now(),
        });
        self.touch();
        self.raise_event(DomainEvent::Shipping(ShippingEvent::TrackingUpdated {
            order_id: self.order_id, carrier_status: carrier_status.to_string(),
        }));
        Ok(())
    }

    fn check(mut details: ShippingDetails) -> Result<ShippingDetails, ShippingError> {
        for (field, value) in [("carrier", &details.carrier), ("method", &details.method), ("currency", &details.currency)] {
            if value.trim().is_empty() {
                return Err(ShippingError::MissingField(field));
            }
        }
        if details.price.is_sign_negative() {
            return Err(ShippingError::NegativePrice);
        }
        details.currency = details.currency.trim().to_uppercase();
        details.tracking_number = details.tracking_number.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        Ok(details)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShippingError {
    #[error("Shipping details already exist for this order.")]
    AlreadyExists,
    #[error("Order cannot be shipped in status {0}")]
    OrderNotShippable(OrderStatus),
    #[error("Shipping {0} is required")]
    MissingField(&'static str),
    #[error("Shipping price cannot be negative")]
    NegativePrice,
    #[error("A tracking number is required before tracking updates")]
    MissingTrackingNumber,
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    pub fn details(carrier: &str, tracking_number: Option<&str>) -> ShippingDetails {
        ShippingDetails {
            carrier: carrier.into(),
            method: "standard".into(),
            currency: "eur".into(),
            price: Decimal::new(499, 2),
            tracking_number: tracking_number.map(str::to_string),
            package_count: 1,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::details;
    use super::*;
    use crate::domain::aggregates::order::fixtures::{order_in, order_item};
    use rstest::rstest;
    use speculoos::prelude::*;

    #[test]
    fn test_create_for_paid_order() {
        let order = order_in(Uuid::new_v4(), vec![order_item(10, 1)], OrderStatus::Paid);
        let mut shipping = OrderShipping::create(&order, details("DHL", Some(" 1Z999 "))).unwrap();
        assert_eq!(shipping.details().currency, "EUR");
        assert_eq!(shipping.details().tracking_number.as_deref(), Some("1Z999"));
        assert_eq!(shipping.buyer_id(), order.buyer_id());
        assert_eq!(shipping.take_events().len(), 1);
    }

    #[test]
    fn test_unpaid_order_cannot_ship() {
        let order = order_in(Uuid::new_v4(), vec![order_item(10, 1)], OrderStatus::PendingPayment);
        let res = OrderShipping::create(&order, details("DHL", None));
        assert_that!(res).is_err().is_equal_to(ShippingError::OrderNotShippable(OrderStatus::PendingPayment));
    }

    #[rstest]
    #[case(ShippingDetails { carrier: " ".into(), ..details("x", None) }, ShippingError::MissingField("carrier"))]
    #[case(ShippingDetails { method: String::new(), ..details("UPS", None) }, ShippingError::MissingField("method"))]
    #[case(ShippingDetails { price: Decimal::NEGATIVE_ONE, ..details("UPS", None) }, ShippingError::NegativePrice)]
    fn test_details_validation(#[case] input: ShippingDetails, #[case] expected: ShippingError) {
        let order = order_in(Uuid::new_v4(), vec![order_item(10, 1)], OrderStatus::Paid);
        assert_that!(OrderShipping::create(&order, input)).is_err().is_equal_to(expected);
    }

    #[test]
    fn test_tracking_follows_tracking_number() {
        let order = order_in(Uuid::new_v4(), vec![order_item(10, 1)], OrderStatus::Paid);
        let mut shipping = OrderShipping::create(&order, details("DHL", None)).unwrap();
        assert_eq!(shipping.record_tracking("IN_TRANSIT", None), Err(ShippingError::MissingTrackingNumber));

        shipping.update_details(details("DHL", Some("AB123"))).unwrap();
        shipping.record_tracking("IN_TRANSIT", None).unwrap();
        assert_eq!(shipping.tracking().map(|t| t.tracking_number.as_str()), Some("AB123"));

        // same number keeps tracking, a new one clears it
        shipping.update_details(details("DHL Express", Some("AB123"))).unwrap();
        assert_that!(shipping.tracking()).is_some();
        shipping.update_details(details("DHL", Some("CD456"))).unwrap();
        assert_that!(shipping.tracking()).is_none();
    }
}
