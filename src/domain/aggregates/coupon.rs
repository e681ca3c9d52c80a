//! Coupon Aggregate
//!
//! A coupon is authored by a seller and only ever discounts that seller's
//! (or that seller's company's) products. Targeting and usage history live
//! on the aggregate so that validation is a pure function of the coupon, the
//! buyer and the priced cart lines.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pricing::PricedItem;
use crate::domain::value_objects::round_money;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    code: String,
    description: Option<String>,
    state: CouponState,
    category: CouponCategory,
    scope: CouponScope,
    discount: CouponDiscount,
    minimum_order_amount: Option<Decimal>,
    /// Total redemptions allowed, zero meaning unlimited.
    max_uses: u32,
    /// Redemptions allowed per buyer, zero meaning unlimited.
    max_uses_per_user: u32,
    author_id: Uuid,
    author_company_id: Option<Uuid>,
    start_from: DateTime<Utc>,
    end_at: DateTime<Utc>,
    targets: CouponTargets,
    usages: Vec<CouponUsage>,
    created_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by the store on every write.
    version: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponState { #[default] Active, Inactive, Expired }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponCategory { #[default] General, UserSpecific, ProductSpecific, CategorySpecific, CompanySpecific }

/// Whether the discount applies to the whole order or only eligible lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponScope { #[default] Order, Item }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponDiscount {
    /// Percentage in `(0, 100]`.
    Percentage(Decimal),
    Fixed(Decimal),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponTargets {
    #[serde(default)]
    pub users: BTreeSet<Uuid>,
    #[serde(default)]
    pub products: BTreeSet<Uuid>,
    #[serde(default)]
    pub categories: BTreeSet<Uuid>,
    #[serde(default)]
    pub companies: BTreeSet<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponUsage {
    pub user_id: Option<Uuid>,
    pub order_id: Uuid,
    pub used_at: DateTime<Utc>,
}

/// Everything coupon validation needs to know about the buyer and the cart.
#[derive(Clone, Copy, Debug)]
pub struct RedemptionContext<'a> {
    pub user_id: Option<Uuid>,
    pub user_company_id: Option<Uuid>,
    pub subtotal: Decimal,
    pub items: &'a [PricedItem],
    pub now: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewCoupon {
    pub code: String,
    pub description: Option<String>,
    pub category: CouponCategory,
    pub scope: CouponScope,
    pub discount: CouponDiscount,
    pub minimum_order_amount: Option<Decimal>,
    pub max_uses: u32,
    pub max_uses_per_user: u32,
    pub start_from: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub targets: CouponTargets,
}

impl Coupon {
    pub fn create(new: NewCoupon, author_id: Uuid, author_company_id: Option<Uuid>) -> Result<Self, CouponError> {
        let code = new.code.trim().to_uppercase();
        if code.is_empty() {
            return Err(CouponError::Definition("coupon code must not be empty".into()));
        }
        if new.end_at <= new.start_from {
            return Err(CouponError::Definition("coupon must end after it starts".into()));
        }
        match new.discount {
            CouponDiscount::Percentage(pct) if pct <= Decimal::ZERO || pct > Decimal::ONE_HUNDRED => {
                return Err(CouponError::Definition("percentage must be in (0, 100]".into()));
            }
            CouponDiscount::Fixed(amount) if amount <= Decimal::ZERO => {
                return Err(CouponError::Definition("fixed amount must be positive".into()));
            }
            _ => {}
        }
        if new.minimum_order_amount.is_some_and(|m| m.is_sign_negative()) {
            return Err(CouponError::Definition("minimum order amount must not be negative".into()));
        }
        let missing_targets = match new.category {
            CouponCategory::General => false,
            CouponCategory::UserSpecific => new.targets.users.is_empty(),
            CouponCategory::ProductSpecific => new.targets.products.is_empty(),
            CouponCategory::CategorySpecific => new.targets.categories.is_empty(),
            CouponCategory::CompanySpecific => new.targets.companies.is_empty(),
        };
        if missing_targets {
            return Err(CouponError::Definition(format!("{:?} coupon needs at least one target", new.category)));
        }
        Ok(Self {
            code, description: new.description, state: CouponState::Active, category: new.category,
            scope: new.scope, discount: new.discount, minimum_order_amount: new.minimum_order_amount,
            max_uses: new.max_uses, max_uses_per_user: new.max_uses_per_user, author_id,
            author_company_id, start_from: new.start_from, end_at: new.end_at, targets: new.targets,
            usages: vec![], created_at: Utc::now(), version: 0,
        })
    }

    pub fn code(&self) -> &str { &self.code }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn state(&self) -> CouponState { self.state }
    pub fn category(&self) -> CouponCategory { self.category }
    pub fn scope(&self) -> CouponScope { self.scope }
    pub fn discount(&self) -> CouponDiscount { self.discount }
    pub fn minimum_order_amount(&self) -> Option<Decimal> { self.minimum_order_amount }
    pub fn max_uses(&self) -> u32 { self.max_uses }
    pub fn max_uses_per_user(&self) -> u32 { self.max_uses_per_user }
    pub fn author_id(&self) -> Uuid { self.author_id }
    pub fn start_from(&self) -> DateTime<Utc> { self.start_from }
    pub fn end_at(&self) -> DateTime<Utc> { self.end_at }
    pub fn targets(&self) -> &CouponTargets { &self.targets }
    pub fn usages(&self) -> &[CouponUsage] { &self.usages }
    pub fn version(&self) -> i64 { self.version }
    pub fn set_version(&mut self, version: i64) { self.version = version; }

    pub fn deactivate(&mut self) { self.state = CouponState::Inactive; }

    /// Checks, in order: state, validity window, minimum amount, seller
    /// ownership of every line, category targeting and usage caps.
    pub fn validate(&self, ctx: &RedemptionContext<'_>) -> Result<(), CouponError> {
        let code = self.code.clone();
        if self.state != CouponState::Active {
            return Err(CouponError::NotActive(code));
        }
        if ctx.now < self.start_from || ctx.now > self.end_at {
            return Err(CouponError::Expired(code));
        }
        if self.minimum_order_amount.is_some_and(|min| ctx.subtotal < min) {
            return Err(CouponError::BelowMinimum(code));
        }
        if !ctx.items.iter().all(|item| self.sold_by_author(item)) {
            return Err(CouponError::WrongSeller(code));
        }
        match self.category {
            CouponCategory::General => {}
            CouponCategory::UserSpecific => {
                if !ctx.user_id.is_some_and(|u| self.targets.users.contains(&u)) {
                    return Err(CouponError::NotForUser(code));
                }
            }
            CouponCategory::ProductSpecific => {
                if !ctx.items.iter().any(|i| self.targets.products.contains(&i.product_id)) {
                    return Err(CouponError::NotForProducts(code));
                }
            }
            CouponCategory::CategorySpecific => {
                let targeted = ctx.items.iter().any(|i| i.category_id.is_some_and(|c| self.targets.categories.contains(&c)));
                if !targeted {
                    return Err(CouponError::NotForCategories(code));
                }
            }
            CouponCategory::CompanySpecific => {
                if !ctx.user_company_id.is_some_and(|c| self.targets.companies.contains(&c)) {
                    return Err(CouponError::NotForCompany(code));
                }
            }
        }
        self.check_usage_caps(ctx.user_id)
    }

    fn check_usage_caps(&self, user_id: Option<Uuid>) -> Result<(), CouponError> {
        if self.max_uses > 0 && self.usages.len() >= self.max_uses as usize {
            return Err(CouponError::UsageLimitExceeded(self.code.clone()));
        }
        if let (true, Some(user_id)) = (self.max_uses_per_user > 0, user_id) {
            let used = self.usages.iter().filter(|u| u.user_id == Some(user_id)).count();
            if used >= self.max_uses_per_user as usize {
                return Err(CouponError::UserUsageLimitExceeded(self.code.clone()));
            }
        }
        Ok(())
    }

    /// Discount for the given lines, never larger than the amount it applies to.
    pub fn calculate_discount(&self, items: &[PricedItem], subtotal: Decimal) -> Decimal {
        let applicable = match self.scope {
            CouponScope::Order => subtotal,
            CouponScope::Item => items.iter().filter(|i| self.is_item_eligible(i)).map(PricedItem::line_total).sum(),
        };
        let discount = match self.discount {
            CouponDiscount::Fixed(amount) => amount,
            CouponDiscount::Percentage(pct) => round_money(applicable * pct / Decimal::ONE_HUNDRED),
        };
        discount.min(applicable).max(Decimal::ZERO)
    }

    pub fn is_item_eligible(&self, item: &PricedItem) -> bool {
        if !self.sold_by_author(item) {
            return false;
        }
        match self.category {
            CouponCategory::ProductSpecific => self.targets.products.contains(&item.product_id),
            CouponCategory::CategorySpecific => item.category_id.is_some_and(|c| self.targets.categories.contains(&c)),
            CouponCategory::General | CouponCategory::UserSpecific | CouponCategory::CompanySpecific => true,
        }
    }

    /// Appends a usage unless it would exceed either cap. Callers holding a
    /// copy loaded before a concurrent redemption get the cap error here.
    pub fn record_usage(&mut self, user_id: Option<Uuid>, order_id: Uuid) -> Result<(), CouponError> {
        self.check_usage_caps(user_id)?;
        self.usages.push(CouponUsage { user_id, order_id, used_at: Utc::now() });
        Ok(())
    }

    fn sold_by_author(&self, item: &PricedItem) -> bool {
        item.author_id == self.author_id
            || matches!((item.company_id, self.author_company_id), (Some(a), Some(b)) if a == b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponError {
    #[error("Coupon not found: {0}")]
    NotFound(String),
    #[error("Coupon is not active: {0}")]
    NotActive(String),
    #[error("Coupon is expired or not yet valid: {0}")]
    Expired(String),
    #[error("Order total does not meet minimum amount for coupon: {0}")]
    BelowMinimum(String),
    #[error("Coupon is not valid for the products in the cart: {0}")]
    WrongSeller(String),
    #[error("Coupon is not valid for this user: {0}")]
    NotForUser(String),
    #[error("Coupon is not valid for any products in the cart: {0}")]
    NotForProducts(String),
    #[error("Coupon is not valid for any categories in the cart: {0}")]
    NotForCategories(String),
    #[error("Coupon is not valid for this company: {0}")]
    NotForCompany(String),
    #[error("Coupon total usage limit exceeded: {0}")]
    UsageLimitExceeded(String),
    #[error("Coupon usage limit exceeded for user: {0}")]
    UserUsageLimitExceeded(String),
    #[error("invalid coupon definition: {0}")]
    Definition(String),
}
