//! Admin surface: catalog, users, order status, shipping and return decisions.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::error::ApiError;
use super::extract::{Admin, Path, Query, ValidatedJson};
use super::views::PageParams;
use super::AppState;
use crate::domain::aggregates::{
    Category, Order, OrderShipping, PackageDimensions, Product, ProductDetails, ProductStatus, ReturnRequest,
    ShippingDetails, User,
};
use crate::domain::value_objects::Paginated;
use crate::services::catalog::{CategoryInput, NewProduct};

#[derive(Debug, Deserialize, Validate)]
pub struct ProductDetailsBody {
    #[validate(length(min = 1, max = 200, message = "Product name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub offer_price: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    pub each_additional_item_shipping_cost: Option<Decimal>,
    pub category_id: Option<Uuid>,
}

impl From<ProductDetailsBody> for ProductDetails {
    fn from(b: ProductDetailsBody) -> Self {
        ProductDetails {
            name: b.name,
            description: b.description,
            price: b.price,
            offer_price: b.offer_price,
            shipping_cost: b.shipping_cost,
            each_additional_item_shipping_cost: b.each_additional_item_shipping_cost,
            category_id: b.category_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductBody {
    #[validate(length(min = 1, max = 50))]
    pub sku: Option<String>,
    pub author_id: Option<Uuid>,
    #[serde(flatten)]
    #[validate]
    pub details: ProductDetailsBody,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub publish: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductBody {
    #[serde(flatten)]
    #[validate]
    pub details: ProductDetailsBody,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StockBody {
    #[validate(range(min = 1, message = "Restock quantity must be positive"))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryBody {
    #[validate(length(min = 1, max = 100, message = "Category name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
}

impl From<CategoryBody> for CategoryInput {
    fn from(b: CategoryBody) -> Self {
        CategoryInput { name: b.name, description: b.description, parent_id: b.parent_id }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserBody {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 100, message = "Display name is required"))]
    pub display_name: String,
    pub company_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusBody {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectBody {
    #[validate(length(min = 1, max = 1000, message = "A rejection reason is required."))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ShippingBody {
    #[validate(length(min = 1, max = 100, message = "Carrier is required"))]
    pub carrier: String,
    #[validate(length(min = 1, max = 100, message = "Shipping method is required"))]
    pub method: String,
    #[validate(length(equal = 3, message = "Currency must be an ISO 4217 code"))]
    pub currency: String,
    pub price: Decimal,
    #[validate(url(message = "Tracking URL must be a valid URL"))]
    pub tracking_url: Option<String>,
    pub tracking_number: Option<String>,
    #[validate(url(message = "Label URL must be a valid URL"))]
    pub label_url: Option<String>,
    pub label: Option<String>,
    #[serde(default = "one")]
    #[validate(range(min = 1, message = "At least one package is required"))]
    pub package_count: u32,
    pub weight: Option<String>,
    pub dimensions: Option<PackageDimensions>,
}

fn one() -> u32 { 1 }

impl From<ShippingBody> for ShippingDetails {
    fn from(b: ShippingBody) -> Self {
        ShippingDetails {
            carrier: b.carrier,
            method: b.method,
            currency: b.currency,
            price: b.price,
            tracking_url: b.tracking_url,
            tracking_number: b.tracking_number,
            label_url: b.label_url,
            label: b.label,
            package_count: b.package_count,
            weight: b.weight,
            dimensions: b.dimensions,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct TrackingBody {
    #[validate(length(min = 1, max = 100, message = "Carrier status is required"))]
    pub carrier_status: String,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

pub async fn create_product(
    State(s): State<AppState>,
    Admin(who): Admin,
    ValidatedJson(body): ValidatedJson<CreateProductBody>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let new = NewProduct {
        sku: body.sku,
        author_id: body.author_id,
        details: body.details.into(),
        stock: body.stock,
        publish: body.publish,
    };
    let product = s.services.catalog.create_product(who.user_id, new).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(s): State<AppState>,
    _: Admin,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<UpdateProductBody>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(s.services.catalog.update_product(id, body.details.into(), body.status).await?))
}

pub async fn archive_product(State(s): State<AppState>, _: Admin, Path(id): Path<Uuid>) -> Result<Json<Product>, ApiError> {
    Ok(Json(s.services.catalog.archive_product(id).await?))
}

pub async fn restock(
    State(s): State<AppState>,
    _: Admin,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<StockBody>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(s.services.catalog.restock(id, body.quantity).await?))
}

pub async fn create_category(
    State(s): State<AppState>,
    _: Admin,
    ValidatedJson(body): ValidatedJson<CategoryBody>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = s.services.catalog.create_category(body.into()).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(s): State<AppState>,
    _: Admin,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<CategoryBody>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(s.services.catalog.update_category(id, body.into()).await?))
}

pub async fn create_user(
    State(s): State<AppState>,
    _: Admin,
    ValidatedJson(body): ValidatedJson<CreateUserBody>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = s.services.users.create_user(&body.email, &body.display_name, body.company_id).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn delete_user(State(s): State<AppState>, _: Admin, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    s.services.users.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_orders(
    State(s): State<AppState>,
    _: Admin,
    Query(p): Query<PageParams>,
) -> Result<Json<Paginated<Order>>, ApiError> {
    Ok(Json(s.services.orders.list_orders(p.request()).await?))
}

pub async fn update_order_status(
    State(s): State<AppState>,
    _: Admin,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<StatusBody>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(s.services.orders.update_status(id, &body.status).await?))
}

pub async fn create_shipping(
    State(s): State<AppState>,
    _: Admin,
    Path(order_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<ShippingBody>,
) -> Result<(StatusCode, Json<OrderShipping>), ApiError> {
    let shipping = s.services.shipping.create(order_id, body.into()).await?;
    Ok((StatusCode::CREATED, Json(shipping)))
}

pub async fn update_shipping(
    State(s): State<AppState>,
    _: Admin,
    Path(order_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<ShippingBody>,
) -> Result<Json<OrderShipping>, ApiError> {
    Ok(Json(s.services.shipping.update(order_id, body.into()).await?))
}

pub async fn record_tracking(
    State(s): State<AppState>,
    _: Admin,
    Path(order_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<TrackingBody>,
) -> Result<Json<OrderShipping>, ApiError> {
    let shipping = s.services.shipping.record_tracking(order_id, &body.carrier_status, body.estimated_delivery).await?;
    Ok(Json(shipping))
}

pub async fn approve_return(State(s): State<AppState>, _: Admin, Path(id): Path<Uuid>) -> Result<Json<ReturnRequest>, ApiError> {
    Ok(Json(s.services.returns.approve(id).await?))
}

pub async fn reject_return(
    State(s): State<AppState>,
    _: Admin,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<RejectBody>,
) -> Result<Json<ReturnRequest>, ApiError> {
    Ok(Json(s.services.returns.reject(id, &body.reason).await?))
}

pub async fn refund_return(State(s): State<AppState>, _: Admin, Path(id): Path<Uuid>) -> Result<Json<ReturnRequest>, ApiError> {
    Ok(Json(s.services.payments.refund_return(id).await?))
}
