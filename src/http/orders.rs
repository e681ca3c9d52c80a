//! Buyer orders, shipping, returns and payments.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::error::ApiError;
use super::extract::{Buyer, Path, Query, ValidatedJson};
use super::views::{listing, PageParams};
use super::AppState;
use crate::domain::aggregates::{Order, OrderShipping, Payment, ReturnRequest};
use crate::domain::value_objects::Paginated;
use crate::services::{CheckoutCommand, CreateReturn, ProcessPayment};

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub selected_item_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub shipping_address_id: Option<Uuid>,
    #[serde(default)]
    pub billing_address_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReturnBody {
    #[validate(length(min = 1, message = "At least one item must be returned"))]
    pub order_item_ids: Vec<Uuid>,
    #[validate(length(min = 1, max = 1000, message = "A return reason is required"))]
    pub reason: String,
    pub refund_percentage: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentBody {
    pub order_id: Uuid,
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub method: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FinalizeBody {
    #[validate(length(min = 1, message = "Transaction id is required"))]
    pub transaction_id: String,
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub method: String,
}

pub async fn checkout(
    State(s): State<AppState>,
    Buyer(who): Buyer,
    body: Bytes,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    // an empty body checks out the whole cart
    let req: CheckoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CheckoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?
    };
    let command = CheckoutCommand {
        selected_item_ids: req.selected_item_ids,
        shipping_address_id: req.shipping_address_id,
        billing_address_id: req.billing_address_id,
    };
    let order = s.services.orders.checkout(who.user_id, command).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list(
    State(s): State<AppState>,
    Buyer(who): Buyer,
    Query(p): Query<PageParams>,
) -> Result<Json<Paginated<Order>>, ApiError> {
    Ok(Json(s.services.orders.list_buyer_orders(who.user_id, p.request()).await?))
}

pub async fn get(State(s): State<AppState>, Buyer(who): Buyer, Path(id): Path<Uuid>) -> Result<Json<Order>, ApiError> {
    Ok(Json(s.services.orders.get_order(who.actor(), id).await?))
}

pub async fn cancel(State(s): State<AppState>, Buyer(who): Buyer, Path(id): Path<Uuid>) -> Result<Json<Order>, ApiError> {
    Ok(Json(s.services.orders.cancel(who.actor(), id).await?))
}

pub async fn shipping(
    State(s): State<AppState>,
    Buyer(who): Buyer,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderShipping>, ApiError> {
    Ok(Json(s.services.shipping.get(who.actor(), id).await?))
}

pub async fn request_return(
    State(s): State<AppState>,
    Buyer(who): Buyer,
    Path(order_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<ReturnBody>,
) -> Result<(StatusCode, Json<ReturnRequest>), ApiError> {
    let command = CreateReturn {
        order_item_ids: body.order_item_ids,
        reason: body.reason,
        refund_percentage: body.refund_percentage,
    };
    let request = s.services.returns.create(who.user_id, order_id, command).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_returns(
    State(s): State<AppState>,
    Buyer(who): Buyer,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Paginated<ReturnRequest>>, ApiError> {
    Ok(Json(listing(s.services.returns.list_for_order(who.actor(), order_id).await?)))
}

pub async fn pay(
    State(s): State<AppState>,
    Buyer(who): Buyer,
    ValidatedJson(body): ValidatedJson<PaymentBody>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    let request = ProcessPayment { order_id: body.order_id, method: body.method, amount: body.amount };
    let payment = s.services.payments.process(who.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn finalize_payment(
    State(s): State<AppState>,
    Buyer(_): Buyer,
    ValidatedJson(body): ValidatedJson<FinalizeBody>,
) -> Result<Json<Payment>, ApiError> {
    Ok(Json(s.services.payments.finalize(&body.transaction_id, &body.method).await?))
}
