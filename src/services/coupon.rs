use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Coupon, CouponError, NewCoupon, RedemptionContext};
use crate::domain::events::{CouponEvent, DomainEvent};
use crate::domain::pricing::{self, PricedItem};
use crate::ports::{self, CouponRepository, EventPublisher, UserRepository};
use crate::services::publish_all;
use crate::{EcommerceError, Result};

const USAGE_RETRIES: u32 = 3;
const USAGE_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct CouponService {
    coupons: Arc<dyn CouponRepository>,
    users: Arc<dyn UserRepository>,
    events: Arc<dyn EventPublisher>,
}

impl CouponService {
    pub fn new(coupons: Arc<dyn CouponRepository>, users: Arc<dyn UserRepository>, events: Arc<dyn EventPublisher>) -> Self {
        Self { coupons, users, events }
    }

    pub async fn create_coupon(&self, author_id: Uuid, new: NewCoupon) -> Result<Coupon> {
        info!(%author_id, code = %new.code, "creating coupon");
        let company_id = self.users.find_user(author_id).await?.and_then(|u| u.company_id());
        let coupon = Coupon::create(new, author_id, company_id)?;
        match self.coupons.insert_coupon(&coupon).await {
            Ok(()) => Ok(coupon),
            Err(ports::Error::Duplicate { .. }) => {
                error!(code = %coupon.code(), "coupon code already exists");
                Err(EcommerceError::bad_request(format!("Coupon code already exists: {}", coupon.code())))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_seller_coupons(&self, author_id: Uuid) -> Result<Vec<Coupon>> {
        Ok(self.coupons.list_coupons_by_author(author_id).await?)
    }

    pub async fn deactivate_coupon(&self, author_id: Uuid, code: &str) -> Result<Coupon> {
        info!(%author_id, %code, "deactivating coupon");
        let mut coupon = self.find(code).await?;
        if coupon.author_id() != author_id {
            error!(%author_id, %code, "coupon belongs to another seller");
            return Err(EcommerceError::forbidden("Coupon belongs to another seller"));
        }
        coupon.deactivate();
        Ok(self.coupons.update_coupon(&coupon).await?)
    }

    /// Loads `code` and runs the full redemption check for `user_id` against `items`.
    pub async fn validate_for(&self, code: &str, user_id: Option<Uuid>, items: &[PricedItem]) -> Result<Coupon> {
        let coupon = self.find(code).await?;
        let user_company_id = match user_id {
            Some(id) => self.users.find_user(id).await?.and_then(|u| u.company_id()),
            None => None,
        };
        let ctx = RedemptionContext { user_id, user_company_id, subtotal: pricing::subtotal(items), items, now: Utc::now() };
        if let Err(err) = coupon.validate(&ctx) {
            debug!(%code, error = %err, "coupon rejected");
            return Err(err.into());
        }
        Ok(coupon)
    }

    /// Discount for an already applied coupon; zero when it no longer applies.
    pub async fn discount_for(&self, code: &str, user_id: Option<Uuid>, items: &[PricedItem]) -> Result<Decimal> {
        match self.validate_for(code, user_id, items).await {
            Ok(coupon) => Ok(coupon.calculate_discount(items, pricing::subtotal(items))),
            Err(EcommerceError::Coupon(err)) => {
                warn!(%code, error = %err, "applied coupon no longer valid, ignoring discount");
                Ok(Decimal::ZERO)
            }
            Err(e) => Err(e),
        }
    }

    /// Appends a usage record, retrying on concurrent coupon updates. Each
    /// attempt re-checks the usage caps against the freshly loaded coupon.
    pub async fn record_usage(&self, code: &str, user_id: Option<Uuid>, order_id: Uuid) -> Result<()> {
        let mut attempt = 1;
        loop {
            let mut coupon = self.find(code).await?;
            if let Err(err) = coupon.record_usage(user_id, order_id) {
                warn!(%code, %order_id, error = %err, "coupon usage cap reached");
                return Err(err.into());
            }
            match self.coupons.update_coupon(&coupon).await {
                Ok(_) => break,
                Err(ports::Error::Conflict { .. }) if attempt < USAGE_RETRIES => {
                    warn!(%code, attempt, "coupon usage conflict, retrying");
                    attempt += 1;
                    tokio::time::sleep(USAGE_BACKOFF).await;
                }
                Err(e) => {
                    error!(%code, %order_id, error = %e, "failed to record coupon usage");
                    return Err(e.into());
                }
            }
        }
        info!(%code, %order_id, "coupon usage recorded");
        let event = DomainEvent::Coupon(CouponEvent::Redeemed { code: code.to_string(), order_id, user_id });
        publish_all(self.events.as_ref(), vec![event]).await;
        Ok(())
    }

    async fn find(&self, code: &str) -> Result<Coupon> {
        self.coupons
            .find_coupon(code)
            .await?
            .ok_or_else(|| CouponError::NotFound(code.to_uppercase()).into())
    }
}
