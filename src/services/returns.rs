use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderStatus, ReturnError, ReturnRequest};
use crate::ports::{EventPublisher, OrderRepository, ReturnRepository};
use crate::services::{publish_all, Actor};
use crate::{EcommerceError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateReturn {
    pub order_item_ids: Vec<Uuid>,
    pub reason: String,
    /// Share of the item value refunded, `1` when absent.
    pub refund_percentage: Option<Decimal>,
}

#[derive(Clone)]
pub struct ReturnService {
    returns: Arc<dyn ReturnRepository>,
    orders: Arc<dyn OrderRepository>,
    events: Arc<dyn EventPublisher>,
}

impl ReturnService {
    pub fn new(returns: Arc<dyn ReturnRepository>, orders: Arc<dyn OrderRepository>, events: Arc<dyn EventPublisher>) -> Self {
        Self { returns, orders, events }
    }

    pub async fn create(&self, buyer_id: Uuid, order_id: Uuid, command: CreateReturn) -> Result<ReturnRequest> {
        info!(%buyer_id, %order_id, items = command.order_item_ids.len(), "creating return request");
        let mut order = self.load_order(order_id).await?;
        if !order.is_owned_by(buyer_id) {
            error!(%buyer_id, %order_id, "return for another buyer's order");
            return Err(EcommerceError::forbidden("Access denied to this order"));
        }
        let existing = self.returns.list_returns_by_order(order_id).await?;
        if command.order_item_ids.iter().any(|item| existing.iter().any(|r| r.claims_item(*item))) {
            error!(%order_id, "items already under return");
            return Err(ReturnError::ItemsAlreadyReturned.into());
        }

        let mut request = ReturnRequest::request(&order, command.order_item_ids, command.reason, command.refund_percentage)
            .map_err(|e| {
                error!(%order_id, error = %e, "return request rejected");
                e
            })?;
        order.transition_to(OrderStatus::ReturnRequested)?;
        self.returns.save_return(&request).await?;
        self.orders.save_order(&order).await?;

        info!(return_id = %request.id(), refund_amount = %request.refund_amount(), "return requested");
        self.publish(&mut request, &mut order).await;
        Ok(request)
    }

    pub async fn approve(&self, return_id: Uuid) -> Result<ReturnRequest> {
        info!(%return_id, "approving return");
        let mut request = self.load(return_id).await?;
        request.approve()?;
        self.decide(request, OrderStatus::ReturnApproved).await
    }

    pub async fn reject(&self, return_id: Uuid, why: &str) -> Result<ReturnRequest> {
        info!(%return_id, "rejecting return");
        if why.trim().is_empty() {
            return Err(EcommerceError::bad_request("A rejection reason is required."));
        }
        let mut request = self.load(return_id).await?;
        request.reject(why)?;
        self.decide(request, OrderStatus::ReturnRejected).await
    }

    pub async fn list_for_order(&self, actor: Actor, order_id: Uuid) -> Result<Vec<ReturnRequest>> {
        let order = self.load_order(order_id).await?;
        if !actor.can_access(order.buyer_id()) {
            return Err(EcommerceError::forbidden("Access denied to this order"));
        }
        Ok(self.returns.list_returns_by_order(order_id).await?)
    }

    async fn decide(&self, mut request: ReturnRequest, next: OrderStatus) -> Result<ReturnRequest> {
        let mut order = self.load_order(request.order_id()).await?;
        order.transition_to(next)?;
        self.returns.save_return(&request).await?;
        self.orders.save_order(&order).await?;
        self.publish(&mut request, &mut order).await;
        Ok(request)
    }

    async fn publish(&self, request: &mut ReturnRequest, order: &mut Order) {
        let mut events = request.take_events();
        events.extend(order.take_events());
        publish_all(self.events.as_ref(), events).await;
    }

    async fn load(&self, return_id: Uuid) -> Result<ReturnRequest> {
        self.returns
            .find_return(return_id)
            .await?
            .ok_or_else(|| EcommerceError::not_found(format!("Return request not found: {return_id}")))
    }

    async fn load_order(&self, order_id: Uuid) -> Result<Order> {
        self.orders.find_order(order_id).await?.ok_or(EcommerceError::OrderNotFound(order_id))
    }
}
