//! Cart routes. The same handlers serve the anonymous session cart under
//! `/api/cart` and the signed-in cart under `/buyer/cart`; the extractor
//! type picks the owner.

use axum::extract::{FromRequestParts, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::error::ApiError;
use super::extract::{Buyer, CartContext, CartSession, Path, ValidatedJson};
use super::views::AppliedCouponView;
use super::AppState;
use crate::domain::aggregates::Cart;

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    /// Range-checked by the cart itself so that zero and negative values
    /// report as an invalid quantity.
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CouponRequest {
    #[validate(length(min = 1, max = 64, message = "Coupon code is required"))]
    pub code: String,
}

pub async fn get<C>(State(s): State<AppState>, ctx: C) -> Result<Response, ApiError>
where
    C: CartContext + FromRequestParts<AppState> + Send + 'static,
{
    let cart = s.services.carts.get_cart(&ctx.owner()).await?;
    Ok(ctx.respond(Json(cart)))
}

pub async fn clear<C>(State(s): State<AppState>, ctx: C) -> Result<Response, ApiError>
where
    C: CartContext + FromRequestParts<AppState> + Send + 'static,
{
    let cart = s.services.carts.clear_cart(&ctx.owner()).await?;
    Ok(ctx.respond(Json(cart)))
}

pub async fn add_item<C>(
    State(s): State<AppState>,
    ctx: C,
    ValidatedJson(req): ValidatedJson<AddItemRequest>,
) -> Result<Response, ApiError>
where
    C: CartContext + FromRequestParts<AppState> + Send + 'static,
{
    let cart = s.services.carts.add_item(&ctx.owner(), req.product_id, req.quantity).await?;
    Ok(ctx.respond(Json(cart)))
}

pub async fn update_item<C>(
    State(s): State<AppState>,
    ctx: C,
    Path(item_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateItemRequest>,
) -> Result<Response, ApiError>
where
    C: CartContext + FromRequestParts<AppState> + Send + 'static,
{
    let cart = s.services.carts.update_item(&ctx.owner(), item_id, req.quantity).await?;
    Ok(ctx.respond(Json(cart)))
}

pub async fn remove_item<C>(State(s): State<AppState>, ctx: C, Path(item_id): Path<Uuid>) -> Result<Response, ApiError>
where
    C: CartContext + FromRequestParts<AppState> + Send + 'static,
{
    let cart = s.services.carts.remove_item(&ctx.owner(), item_id).await?;
    Ok(ctx.respond(Json(cart)))
}

pub async fn apply_coupon<C>(
    State(s): State<AppState>,
    ctx: C,
    ValidatedJson(req): ValidatedJson<CouponRequest>,
) -> Result<Response, ApiError>
where
    C: CartContext + FromRequestParts<AppState> + Send + 'static,
{
    let applied = s.services.carts.apply_coupon(&ctx.owner(), req.code.trim()).await?;
    Ok(ctx.respond(Json(AppliedCouponView::from(applied))))
}

pub async fn remove_coupon<C>(State(s): State<AppState>, ctx: C) -> Result<Response, ApiError>
where
    C: CartContext + FromRequestParts<AppState> + Send + 'static,
{
    let cart = s.services.carts.remove_coupon(&ctx.owner()).await?;
    Ok(ctx.respond(Json(cart)))
}

/// Folds the caller's anonymous session cart into their account cart.
pub async fn merge(State(s): State<AppState>, Buyer(who): Buyer, session: CartSession) -> Result<Json<Cart>, ApiError> {
    if session.issued {
        return Err(ApiError::bad_request("A cart session is required to merge carts"));
    }
    Ok(Json(s.services.carts.merge_on_login(&session.id, who.user_id).await?))
}
