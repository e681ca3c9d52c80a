//! Seller coupons and own products.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::admin::{CreateProductBody, UpdateProductBody};
use super::error::ApiError;
use super::extract::{Path, Query, Seller, ValidatedJson};
use super::views::{listing, CouponView, PageParams};
use super::AppState;
use crate::domain::aggregates::{CouponCategory, CouponDiscount, CouponScope, CouponTargets, NewCoupon, Product};
use crate::domain::value_objects::Paginated;
use crate::services::catalog::NewProduct;

#[derive(Debug, Deserialize, Validate)]
pub struct CouponBody {
    #[validate(length(min = 3, max = 32, message = "Coupon code must be between 3 and 32 characters"))]
    pub code: String,
    pub description: Option<String>,
    #[serde(default)]
    pub category: CouponCategory,
    #[serde(default)]
    pub scope: CouponScope,
    pub discount: CouponDiscount,
    pub minimum_order_amount: Option<Decimal>,
    #[serde(default)]
    pub max_uses: u32,
    #[serde(default)]
    pub max_uses_per_user: u32,
    pub start_from: Option<DateTime<Utc>>,
    pub end_at: DateTime<Utc>,
    #[serde(default)]
    pub targets: CouponTargets,
}

impl From<CouponBody> for NewCoupon {
    fn from(body: CouponBody) -> Self {
        NewCoupon {
            code: body.code,
            description: body.description,
            category: body.category,
            scope: body.scope,
            discount: body.discount,
            minimum_order_amount: body.minimum_order_amount,
            max_uses: body.max_uses,
            max_uses_per_user: body.max_uses_per_user,
            start_from: body.start_from.unwrap_or_else(Utc::now),
            end_at: body.end_at,
            targets: body.targets,
        }
    }
}

pub async fn list_coupons(State(s): State<AppState>, Seller(who): Seller) -> Result<Json<Paginated<CouponView>>, ApiError> {
    let coupons = s.services.coupons.list_seller_coupons(who.user_id).await?;
    Ok(Json(listing(coupons.into_iter().map(CouponView::from).collect())))
}

pub async fn create_coupon(
    State(s): State<AppState>,
    Seller(who): Seller,
    ValidatedJson(body): ValidatedJson<CouponBody>,
) -> Result<(StatusCode, Json<CouponView>), ApiError> {
    let coupon = s.services.coupons.create_coupon(who.user_id, body.into()).await?;
    Ok((StatusCode::CREATED, Json(coupon.into())))
}

pub async fn deactivate_coupon(
    State(s): State<AppState>,
    Seller(who): Seller,
    Path(code): Path<String>,
) -> Result<Json<CouponView>, ApiError> {
    Ok(Json(s.services.coupons.deactivate_coupon(who.user_id, &code).await?.into()))
}

pub async fn list_products(
    State(s): State<AppState>,
    Seller(who): Seller,
    Query(p): Query<PageParams>,
) -> Result<Json<Paginated<Product>>, ApiError> {
    Ok(Json(s.services.catalog.list_seller_products(who.user_id, p.request()).await?))
}

/// Any `author_id` in the body is ignored; sellers always author their own products.
pub async fn create_product(
    State(s): State<AppState>,
    Seller(who): Seller,
    ValidatedJson(body): ValidatedJson<CreateProductBody>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let new = NewProduct {
        sku: body.sku,
        author_id: None,
        details: body.details.into(),
        stock: body.stock,
        publish: body.publish,
    };
    let product = s.services.catalog.create_seller_product(who.user_id, new).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(s): State<AppState>,
    Seller(who): Seller,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<UpdateProductBody>,
) -> Result<Json<Product>, ApiError> {
    let product = s.services.catalog.update_seller_product(who.actor(), id, body.details.into(), body.status).await?;
    Ok(Json(product))
}

pub async fn archive_product(State(s): State<AppState>, Seller(who): Seller, Path(id): Path<Uuid>) -> Result<Json<Product>, ApiError> {
    Ok(Json(s.services.catalog.archive_seller_product(who.actor(), id).await?))
}
