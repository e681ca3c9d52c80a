use uuid::Uuid;

use crate::domain::aggregates::Coupon;

use super::Error;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CouponRepository: Send + Sync {
    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, Error>;
    async fn list_coupons_by_author(&self, author_id: Uuid) -> Result<Vec<Coupon>, Error>;
    async fn insert_coupon(&self, coupon: &Coupon) -> Result<(), Error>;
    /// Compare-and-swap on [`Coupon::version`]: succeeds only if the stored
    /// version still matches, and returns the coupon with its new version.
    async fn update_coupon(&self, coupon: &Coupon) -> Result<Coupon, Error>;
}
