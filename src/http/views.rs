//! Response shapes that differ from the stored aggregates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::{Cart, Coupon, CouponCategory, CouponDiscount, CouponScope, CouponState, CouponTargets};
use crate::domain::value_objects::{PageRequest, Paginated};
use crate::services::cart::AppliedCoupon;

/// `?page&per_page` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageParams {
    pub fn request(&self) -> PageRequest { PageRequest::new(self.page, self.per_page) }
}

/// Wraps an unpaginated collection in the list envelope.
pub fn listing<T>(items: Vec<T>) -> Paginated<T> {
    let count = items.len();
    Paginated {
        data: items,
        total: i64::try_from(count).unwrap_or(i64::MAX),
        page: 1,
        per_page: u32::try_from(count).unwrap_or(u32::MAX),
    }
}

/// Coupon as shown to its seller: usage history collapsed to a count.
#[derive(Debug, Serialize)]
pub struct CouponView {
    pub code: String,
    pub description: Option<String>,
    pub state: CouponState,
    pub category: CouponCategory,
    pub scope: CouponScope,
    pub discount: CouponDiscount,
    pub minimum_order_amount: Option<Decimal>,
    pub max_uses: u32,
    pub max_uses_per_user: u32,
    pub times_used: usize,
    pub start_from: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub targets: CouponTargets,
}

impl From<Coupon> for CouponView {
    fn from(c: Coupon) -> Self {
        Self {
            code: c.code().to_string(),
            description: c.description().map(str::to_string),
            state: c.state(),
            category: c.category(),
            scope: c.scope(),
            discount: c.discount(),
            minimum_order_amount: c.minimum_order_amount(),
            max_uses: c.max_uses(),
            max_uses_per_user: c.max_uses_per_user(),
            times_used: c.usages().len(),
            start_from: c.start_from(),
            end_at: c.end_at(),
            targets: c.targets().clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AppliedCouponView {
    pub code: String,
    pub discount: Decimal,
    pub cart: Cart,
}

impl From<AppliedCoupon> for AppliedCouponView {
    fn from(applied: AppliedCoupon) -> Self {
        Self { code: applied.code, discount: applied.discount, cart: applied.cart }
    }
}
