//! Domain events
use crate::domain::value_objects::Sku;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
    Return(ReturnEvent),
    Payment(PaymentEvent),
    Coupon(CouponEvent),
    Shipping(ShippingEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, sku: Sku },
    Published { product_id: Uuid },
    Archived { product_id: Uuid },
    InventoryAdded { product_id: Uuid, quantity: u32 },
    InventoryRemoved { product_id: Uuid, quantity: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, buyer_id: Uuid, total: Decimal },
    StatusChanged { order_id: Uuid, from: String, to: String },
    Cancelled { order_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReturnEvent {
    Requested { return_id: Uuid, order_id: Uuid, refund_amount: Decimal },
    Approved { return_id: Uuid, order_id: Uuid },
    Rejected { return_id: Uuid, order_id: Uuid },
    Refunded { return_id: Uuid, order_id: Uuid, amount: Decimal },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PaymentEvent {
    Initiated { payment_id: Uuid, order_id: Uuid, amount: Decimal },
    Completed { payment_id: Uuid, order_id: Uuid },
    Failed { payment_id: Uuid, order_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CouponEvent {
    Redeemed { code: String, order_id: Uuid, user_id: Option<Uuid> },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ShippingEvent {
    DetailsAdded { order_id: Uuid },
    DetailsUpdated { order_id: Uuid },
    TrackingUpdated { order_id: Uuid, carrier_status: String },
}

impl DomainEvent {
    /// Bus subject, `ecommerce.<aggregate>.<event>`.
    pub fn subject(&self) -> String {
        let (aggregate, name) = match self {
            Self::Product(e) => ("product", match e {
                ProductEvent::Created { .. } => "created",
                ProductEvent::Published { .. } => "published",
                ProductEvent::Archived { .. } => "archived",
                ProductEvent::InventoryAdded { .. } => "inventory_added",
                ProductEvent::InventoryRemoved { .. } => "inventory_removed",
            }),
            Self::Order(e) => ("order", match e {
                OrderEvent::Created { .. } => "created",
                OrderEvent::StatusChanged { .. } => "status_changed",
                OrderEvent::Cancelled { .. } => "cancelled",
            }),
            Self::Return(e) => ("return", match e {
                ReturnEvent::Requested { .. } => "requested",
                ReturnEvent::Approved { .. } => "approved",
                ReturnEvent::Rejected { .. } => "rejected",
                ReturnEvent::Refunded { .. } => "refunded",
            }),
            Self::Payment(e) => ("payment", match e {
                PaymentEvent::Initiated { .. } => "initiated",
                PaymentEvent::Completed { .. } => "completed",
                PaymentEvent::Failed { .. } => "failed",
            }),
            Self::Coupon(CouponEvent::Redeemed { .. }) => ("coupon", "redeemed"),
            Self::Shipping(e) => ("shipping", match e {
                ShippingEvent::DetailsAdded { .. } => "details_added",
                ShippingEvent::DetailsUpdated { .. } => "details_updated",
                ShippingEvent::TrackingUpdated { .. } => "tracking_updated",
            }),
        };
        format!("ecommerce.{aggregate}.{name}")
    }
}
