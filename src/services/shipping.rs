use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::aggregates::{OrderShipping, ShippingDetails, ShippingError};
use crate::ports::{self, EventPublisher, OrderRepository, ShippingRepository};
use crate::services::{publish_all, Actor};
use crate::{EcommerceError, Result};

#[derive(Clone)]
pub struct ShippingService {
    shipping: Arc<dyn ShippingRepository>,
    orders: Arc<dyn OrderRepository>,
    events: Arc<dyn EventPublisher>,
}

impl ShippingService {
    pub fn new(shipping: Arc<dyn ShippingRepository>, orders: Arc<dyn OrderRepository>, events: Arc<dyn EventPublisher>) -> Self {
        Self { shipping, orders, events }
    }

    pub async fn create(&self, order_id: Uuid, details: ShippingDetails) -> Result<OrderShipping> {
        info!(%order_id, carrier = %details.carrier, "creating shipping details");
        let order = self.orders.find_order(order_id).await?.ok_or_else(|| {
            error!(%order_id, "order not found for shipping");
            EcommerceError::OrderNotFound(order_id)
        })?;
        if self.shipping.find_shipping(order_id).await?.is_some() {
            error!(%order_id, "shipping details already exist");
            return Err(ShippingError::AlreadyExists.into());
        }
        let mut shipping = OrderShipping::create(&order, details)?;
        match self.shipping.insert_shipping(&shipping).await {
            Ok(()) => {}
            Err(ports::Error::Duplicate { .. }) => return Err(ShippingError::AlreadyExists.into()),
            Err(e) => return Err(e.into()),
        }
        publish_all(self.events.as_ref(), shipping.take_events()).await;
        Ok(shipping)
    }

    /// Buyers see the shipping of their own orders; admins see any.
    pub async fn get(&self, actor: Actor, order_id: Uuid) -> Result<OrderShipping> {
        let shipping = self.load(order_id).await?;
        if !actor.can_access(shipping.buyer_id()) {
            error!(user_id = %actor.user_id, %order_id, "shipping belongs to another buyer");
            return Err(EcommerceError::forbidden("Not authorized to view shipping details for this order."));
        }
        Ok(shipping)
    }

    pub async fn update(&self, order_id: Uuid, details: ShippingDetails) -> Result<OrderShipping> {
        info!(%order_id, "updating shipping details");
        let mut shipping = self.load(order_id).await?;
        shipping.update_details(details)?;
        self.save(&mut shipping).await?;
        Ok(shipping)
    }

    pub async fn record_tracking(
        &self,
        order_id: Uuid,
        carrier_status: &str,
        estimated_delivery: Option<DateTime<Utc>>,
    ) -> Result<OrderShipping> {
        info!(%order_id, %carrier_status, "recording tracking update");
        let mut shipping = self.load(order_id).await?;
        shipping.record_tracking(carrier_status, estimated_delivery)?;
        self.save(&mut shipping).await?;
        Ok(shipping)
    }

    async fn save(&self, shipping: &mut OrderShipping) -> Result<()> {
        self.shipping.update_shipping(shipping).await?;
        publish_all(self.events.as_ref(), shipping.take_events()).await;
        Ok(())
    }

    async fn load(&self, order_id: Uuid) -> Result<OrderShipping> {
        self.shipping.find_shipping(order_id).await?.ok_or_else(|| {
            error!(%order_id, "shipping details not found");
            EcommerceError::not_found("Shipping details not found.")
        })
    }
}
