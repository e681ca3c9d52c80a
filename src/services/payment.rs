use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderStatus, Payment, PaymentMethod, PaymentStatus, ReturnRequest, ReturnStatus};
use crate::ports::{CheckoutRequest, EventPublisher, OrderRepository, PaymentGateway, PaymentRepository, ReturnRepository};
use crate::services::publish_all;
use crate::{EcommerceError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessPayment {
    pub order_id: Uuid,
    pub method: String,
    /// Amount the buyer expects to pay; must equal the order total.
    pub amount: Decimal,
}

#[derive(Clone)]
pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    orders: Arc<dyn OrderRepository>,
    returns: Arc<dyn ReturnRepository>,
    gateway: Arc<dyn PaymentGateway>,
    events: Arc<dyn EventPublisher>,
    currency: String,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        orders: Arc<dyn OrderRepository>,
        returns: Arc<dyn ReturnRepository>,
        gateway: Arc<dyn PaymentGateway>,
        events: Arc<dyn EventPublisher>,
        currency: String,
    ) -> Self {
        Self { payments, orders, returns, gateway, events, currency }
    }

    /// Opens a checkout session with the provider for an unpaid order.
    pub async fn process(&self, buyer_id: Uuid, request: ProcessPayment) -> Result<Payment> {
        info!(%buyer_id, order_id = %request.order_id, method = %request.method, "processing payment");
        let method = parse_method(&request.method)?;
        let mut order = self.load_order(request.order_id).await?;
        if !order.is_owned_by(buyer_id) {
            error!(%buyer_id, order_id = %order.id(), "payment for another buyer's order");
            return Err(EcommerceError::forbidden("Access denied to this order"));
        }
        if !order.status().awaits_payment() {
            error!(order_id = %order.id(), status = %order.status(), "order is not awaiting payment");
            return Err(EcommerceError::bad_request(format!("Order is not awaiting payment: {}", order.status())));
        }
        if request.amount != order.total() {
            error!(order_id = %order.id(), requested = %request.amount, expected = %order.total(), "payment amount mismatch");
            return Err(EcommerceError::bad_request("Requested payment amount does not match calculated amount."));
        }
        if order.total().is_zero() {
            return self.settle_free(&mut order, buyer_id, method).await;
        }

        let session = self
            .gateway
            .create_checkout(&CheckoutRequest {
                order_id: order.id(),
                order_number: order.order_number().to_string(),
                method,
                amount: order.total(),
                currency: self.currency.clone(),
            })
            .await
            .map_err(|e| {
                error!(order_id = %order.id(), error = %e, "payment provider rejected checkout");
                e
            })?;

        let mut payment = Payment::initiate(
            order.id(),
            buyer_id,
            method,
            order.total(),
            self.currency.as_str(),
            session.transaction_id,
            session.checkout_url,
        );
        self.payments.save_payment(&payment).await?;
        info!(payment_id = %payment.id(), transaction_id = %payment.transaction_id(), "payment initiated");
        publish_all(self.events.as_ref(), payment.take_events()).await;
        Ok(payment)
    }

    /// Asks the provider for the outcome of a checkout and moves the order along.
    pub async fn finalize(&self, transaction_id: &str, method: &str) -> Result<Payment> {
        info!(%transaction_id, %method, "finalizing payment");
        let method = parse_method(method)?;
        let mut payment = self.payments.find_payment_by_transaction(transaction_id).await?.ok_or_else(|| {
            error!(%transaction_id, "payment not found");
            EcommerceError::not_found(format!("Payment not found for transaction: {transaction_id}"))
        })?;

        let outcome = self.gateway.confirm(method, transaction_id).await?;
        payment.settle(outcome)?;

        let next = match payment.status() {
            PaymentStatus::Completed => Some(OrderStatus::Paid),
            PaymentStatus::Failed => Some(OrderStatus::PaymentFailed),
            _ => None,
        };
        // the order must accept the outcome before either side is persisted
        let mut moved = None;
        match next {
            Some(next) => {
                let mut order = self.load_order(payment.order_id()).await?;
                if order.status() != next {
                    order.transition_to(next).map_err(|e| {
                        error!(%transaction_id, order_id = %order.id(), error = %e, "order cannot take payment outcome");
                        e
                    })?;
                    moved = Some(order);
                }
            }
            None => info!(%transaction_id, "payment still pending at provider"),
        }

        self.payments.save_payment(&payment).await?;
        if let Some(mut order) = moved {
            self.orders.save_order(&order).await?;
            publish_all(self.events.as_ref(), order.take_events()).await;
        }
        publish_all(self.events.as_ref(), payment.take_events()).await;
        Ok(payment)
    }

    /// Orders discounted to nothing are paid without contacting the provider.
    async fn settle_free(&self, order: &mut Order, buyer_id: Uuid, method: PaymentMethod) -> Result<Payment> {
        let transaction_id = format!("FREE-{}", order.order_number());
        let mut payment = Payment::initiate(order.id(), buyer_id, method, Decimal::ZERO, self.currency.as_str(), transaction_id, None);
        payment.settle(PaymentStatus::Completed)?;
        order.transition_to(OrderStatus::Paid)?;
        self.payments.save_payment(&payment).await?;
        self.orders.save_order(order).await?;
        info!(order_id = %order.id(), payment_id = %payment.id(), "zero total order marked paid");
        let mut events = payment.take_events();
        events.extend(order.take_events());
        publish_all(self.events.as_ref(), events).await;
        Ok(payment)
    }

    /// Pays back an approved return through the order's settled payment.
    pub async fn refund_return(&self, return_id: Uuid) -> Result<ReturnRequest> {
        info!(%return_id, "refunding return");
        let mut request = self.returns.find_return(return_id).await?.ok_or_else(|| {
            error!(%return_id, "return request not found");
            EcommerceError::not_found(format!("Return request not found: {return_id}"))
        })?;
        if request.status() != ReturnStatus::Approved {
            error!(%return_id, status = %request.status(), "return not approved");
            return Err(crate::domain::aggregates::ReturnError::NotApproved(request.status()).into());
        }

        let mut payment = self
            .payments
            .list_payments_by_order(request.order_id())
            .await?
            .into_iter()
            .find(|p| matches!(p.status(), PaymentStatus::Completed | PaymentStatus::PartiallyRefunded))
            .ok_or_else(|| {
                error!(order_id = %request.order_id(), "no settled payment to refund");
                EcommerceError::bad_request("No completed payment found for this order")
            })?;
        // line values are pre-discount; never pay back more than was captured
        let amount = request.refund_amount().min(payment.remaining_refundable());
        if amount < request.refund_amount() {
            warn!(%return_id, requested = %request.refund_amount(), %amount, "refund capped at remaining payment");
        }
        payment.ensure_refundable(amount)?;

        let refund_tx = if amount > Decimal::ZERO {
            self.gateway.refund(payment.transaction_id(), amount).await?
        } else {
            warn!(%return_id, "zero refund, provider not contacted");
            String::new()
        };
        let status = payment.record_refund(request.id(), amount, refund_tx)?;
        self.payments.save_payment(&payment).await?;

        request.mark_refunded(amount)?;
        self.returns.save_return(&request).await?;

        let mut order = self.load_order(request.order_id()).await?;
        let next = if status == PaymentStatus::Refunded { OrderStatus::Refunded } else { OrderStatus::PartiallyRefunded };
        order.transition_to(next)?;
        self.orders.save_order(&order).await?;

        info!(%return_id, %amount, order_status = %order.status(), "return refunded");
        let mut events = request.take_events();
        events.extend(order.take_events());
        publish_all(self.events.as_ref(), events).await;
        Ok(request)
    }

    async fn load_order(&self, order_id: Uuid) -> Result<Order> {
        self.orders.find_order(order_id).await?.ok_or(EcommerceError::OrderNotFound(order_id))
    }
}

fn parse_method(value: &str) -> Result<PaymentMethod> {
    PaymentMethod::parse(value).ok_or_else(|| EcommerceError::bad_request(format!("Invalid payment method: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::fixtures::{order_in, order_item};
    use crate::ports::payment::MockPaymentGateway;
    use crate::domain::aggregates::coupon::fixtures::{new_coupon, percent};
    use crate::domain::aggregates::CartOwner;
    use crate::ports::{GatewayError, OrderRepository as _, PaymentRepository as _, ReturnRepository as _};
    use crate::services::testing::Harness;
    use crate::services::{CheckoutCommand, CreateReturn};
    use rstest::rstest;
    use speculoos::prelude::*;

    async fn pending_order(h: &Harness, buyer: Uuid) -> Order {
        let order = order_in(buyer, vec![order_item(40, 2), order_item(20, 1)], OrderStatus::PendingPayment);
        h.store.save_order(&order).await.unwrap();
        order
    }

    fn request(order: &Order, method: &str) -> ProcessPayment {
        ProcessPayment { order_id: order.id(), method: method.into(), amount: order.total() }
    }

    #[rstest]
    #[case("stripe", PaymentStatus::Completed, OrderStatus::Paid)]
    #[case("paypal", PaymentStatus::Completed, OrderStatus::Paid)]
    #[case("bank_transfer", PaymentStatus::Pending, OrderStatus::PendingPayment)]
    #[tokio::test]
    async fn test_process_and_finalize(#[case] method: &str, #[case] payment_status: PaymentStatus, #[case] order_status: OrderStatus) {
        let h = Harness::new();
        let buyer = Uuid::new_v4();
        let order = pending_order(&h, buyer).await;

        let payment = h.services.payments.process(buyer, request(&order, method)).await.unwrap();
        assert_eq!(payment.status(), PaymentStatus::Pending);
        assert_eq!(payment.amount(), Decimal::from(100));

        let payment = h.services.payments.finalize(payment.transaction_id(), method).await.unwrap();
        assert_eq!(payment.status(), payment_status);
        let stored = h.store.find_order(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), order_status);
    }

    #[tokio::test]
    async fn test_process_rejects_wrong_amount_and_owner() {
        let h = Harness::new();
        let buyer = Uuid::new_v4();
        let order = pending_order(&h, buyer).await;

        let wrong = ProcessPayment { amount: Decimal::from(99), ..request(&order, "stripe") };
        let res = h.services.payments.process(buyer, wrong).await;
        assert_that!(res).is_err().matches(|e| {
            matches!(e, EcommerceError::BadRequest(m) if m == "Requested payment amount does not match calculated amount.")
        });
        let res = h.services.payments.process(Uuid::new_v4(), request(&order, "stripe")).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::Forbidden(_)));
        let res = h.services.payments.process(buyer, request(&order, "cash")).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_paid_order_cannot_be_paid_again() {
        let h = Harness::new();
        let buyer = Uuid::new_v4();
        let order = order_in(buyer, vec![order_item(10, 1)], OrderStatus::Paid);
        h.store.save_order(&order).await.unwrap();
        let res = h.services.payments.process(buyer, request(&order, "stripe")).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_method_mismatch_fails_order_payment() {
        let h = Harness::new();
        let buyer = Uuid::new_v4();
        let order = pending_order(&h, buyer).await;
        let payment = h.services.payments.process(buyer, request(&order, "stripe")).await.unwrap();

        let payment = h.services.payments.finalize(payment.transaction_id(), "paypal").await.unwrap();
        assert_eq!(payment.status(), PaymentStatus::Failed);
        let stored = h.store.find_order(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::PaymentFailed);

        let res = h.services.payments.finalize("unknown", "stripe").await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_zero_total_order_skips_gateway() {
        let h = Harness::new();
        let buyer = Uuid::new_v4();
        let order = order_in(buyer, vec![order_item(0, 1)], OrderStatus::PendingPayment);
        h.store.save_order(&order).await.unwrap();
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_checkout().never();
        let svc = PaymentService::new(
            Arc::new(h.store.clone()),
            Arc::new(h.store.clone()),
            Arc::new(h.store.clone()),
            Arc::new(gateway),
            Arc::new(crate::adapters::LogPublisher),
            "EUR".into(),
        );

        let payment = svc.process(buyer, request(&order, "stripe")).await.unwrap();
        assert_eq!(payment.status(), PaymentStatus::Completed);
        assert_eq!(payment.amount(), Decimal::ZERO);
        let stored = h.store.find_order(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Paid);
        assert_that!(h.store.find_payment_by_transaction(payment.transaction_id()).await).is_ok().is_some();
    }

    #[tokio::test]
    async fn test_finalize_for_cancelled_order_leaves_payment_pending() {
        let h = Harness::new();
        let buyer = Uuid::new_v4();
        let mut order = pending_order(&h, buyer).await;
        let payment = h.services.payments.process(buyer, request(&order, "stripe")).await.unwrap();
        order.cancel().unwrap();
        h.store.save_order(&order).await.unwrap();

        let res = h.services.payments.finalize(payment.transaction_id(), "stripe").await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::Order(_)));
        let stored = h.store.find_payment_by_transaction(payment.transaction_id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_gateway_outage_surfaces() {
        let h = Harness::new();
        let buyer = Uuid::new_v4();
        let order = pending_order(&h, buyer).await;
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_checkout().returning(|_| Err(GatewayError::Unavailable("timeout".into())));
        let svc = PaymentService::new(
            Arc::new(h.store.clone()),
            Arc::new(h.store.clone()),
            Arc::new(h.store.clone()),
            Arc::new(gateway),
            Arc::new(crate::adapters::LogPublisher),
            "EUR".into(),
        );
        let res = svc.process(buyer, request(&order, "stripe")).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::Gateway(GatewayError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_partial_then_full_refund() {
        let h = Harness::new();
        let buyer = Uuid::new_v4();
        let mut order = pending_order(&h, buyer).await;
        let payment = h.services.payments.process(buyer, request(&order, "stripe")).await.unwrap();
        h.services.payments.finalize(payment.transaction_id(), "stripe").await.unwrap();
        // ship and deliver
        order = h.store.find_order(order.id()).await.unwrap().unwrap();
        for next in [OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered] {
            order.transition_to(next).unwrap();
        }
        h.store.save_order(&order).await.unwrap();

        let first = order.items()[0].id;
        let second = order.items()[1].id;
        let ret = h.services.returns
            .create(buyer, order.id(), CreateReturn { order_item_ids: vec![first], reason: "broken".into(), refund_percentage: None })
            .await
            .unwrap();
        let res = h.services.payments.refund_return(ret.id()).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::Return(_)));

        h.services.returns.approve(ret.id()).await.unwrap();
        let refunded = h.services.payments.refund_return(ret.id()).await.unwrap();
        assert_eq!(refunded.status(), ReturnStatus::Refunded);
        assert_eq!(refunded.refund_amount(), Decimal::from(80));
        let stored = h.store.find_order(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::PartiallyRefunded);

        let ret = h.services.returns
            .create(buyer, order.id(), CreateReturn { order_item_ids: vec![second], reason: "late".into(), refund_percentage: None })
            .await
            .unwrap();
        h.services.returns.approve(ret.id()).await.unwrap();
        h.services.payments.refund_return(ret.id()).await.unwrap();
        let stored = h.store.find_order(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Refunded);
        assert_that!(h.store.find_return(ret.id()).await.unwrap().map(|r| r.status())).is_equal_to(Some(ReturnStatus::Refunded));
    }

    #[tokio::test]
    async fn test_refund_of_discounted_order_is_capped_at_payment() {
        let h = Harness::new();
        let buyer = h.user("buyer@example.com").await;
        let product = h.product(Uuid::nil(), 100, 5).await;
        h.services.coupons.create_coupon(Uuid::nil(), new_coupon("HALF", percent(50))).await.unwrap();
        let owner = CartOwner::User(buyer.id());
        h.services.carts.add_item(&owner, product.id(), 1).await.unwrap();
        h.services.carts.apply_coupon(&owner, "HALF").await.unwrap();
        let order = h.services.orders.checkout(buyer.id(), CheckoutCommand::default()).await.unwrap();
        assert_eq!(order.total(), Decimal::new(6000, 2));

        let payment = h.services.payments.process(buyer.id(), request(&order, "stripe")).await.unwrap();
        h.services.payments.finalize(payment.transaction_id(), "stripe").await.unwrap();
        let mut order = h.store.find_order(order.id()).await.unwrap().unwrap();
        for next in [OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered] {
            order.transition_to(next).unwrap();
        }
        h.store.save_order(&order).await.unwrap();

        let item = order.items()[0].id;
        let ret = h.services.returns
            .create(buyer.id(), order.id(), CreateReturn { order_item_ids: vec![item], reason: "broken".into(), refund_percentage: None })
            .await
            .unwrap();
        assert_eq!(ret.refund_amount(), Decimal::from(100));
        h.services.returns.approve(ret.id()).await.unwrap();

        let refunded = h.services.payments.refund_return(ret.id()).await.unwrap();
        assert_eq!(refunded.status(), ReturnStatus::Refunded);
        assert_eq!(refunded.refund_amount(), Decimal::from(60));
        let stored = h.store.find_order(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Refunded);
        let payments = h.store.list_payments_by_order(order.id()).await.unwrap();
        assert_eq!(payments[0].status(), PaymentStatus::Refunded);
    }
}
