//! Profiles, follows, favorites and saved addresses.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::error::ApiError;
use super::extract::{Buyer, Identity, Path, Query, ValidatedJson};
use super::views::{listing, PageParams};
use super::AppState;
use crate::domain::aggregates::{Address, AddressDetails, AddressType, PrivacySettings, Product};
use crate::domain::value_objects::Paginated;
use crate::services::{Profile, ProfileSummary};

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileBody {
    #[validate(length(min = 1, max = 100, message = "Display name must be between 1 and 100 characters"))]
    pub display_name: String,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PrivacyBody {
    pub profile_public: bool,
    pub show_followers: bool,
    pub show_following: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddressBody {
    pub address_type: AddressType,
    #[validate(length(min = 1, max = 200, message = "Recipient is required"))]
    pub recipient: String,
    #[validate(length(min = 1, max = 200, message = "Address line is required"))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, max = 20, message = "Postal code is required"))]
    pub postal_code: String,
    #[validate(length(equal = 2, message = "Country must be an ISO 3166-1 alpha-2 code"))]
    pub country: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressBody {
    fn into_details(self) -> (AddressDetails, bool) {
        let details = AddressDetails {
            address_type: self.address_type,
            recipient: self.recipient,
            line1: self.line1,
            line2: self.line2,
            city: self.city,
            postal_code: self.postal_code,
            country: self.country,
            phone: self.phone,
        };
        (details, self.is_default)
    }
}

pub async fn my_profile(State(s): State<AppState>, Buyer(who): Buyer) -> Result<Json<Profile>, ApiError> {
    Ok(Json(s.services.users.profile(who.user_id, Some(who.user_id)).await?))
}

pub async fn update_profile(
    State(s): State<AppState>,
    Buyer(who): Buyer,
    ValidatedJson(body): ValidatedJson<ProfileBody>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(s.services.users.update_profile(who.user_id, &body.display_name, body.bio).await?))
}

pub async fn update_privacy(
    State(s): State<AppState>,
    Buyer(who): Buyer,
    ValidatedJson(body): ValidatedJson<PrivacyBody>,
) -> Result<Json<Profile>, ApiError> {
    let privacy = PrivacySettings {
        profile_public: body.profile_public,
        show_followers: body.show_followers,
        show_following: body.show_following,
    };
    Ok(Json(s.services.users.update_privacy(who.user_id, privacy).await?))
}

pub async fn follow(State(s): State<AppState>, Buyer(who): Buyer, Path(user_id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    s.services.users.follow(who.user_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unfollow(State(s): State<AppState>, Buyer(who): Buyer, Path(user_id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    s.services.users.unfollow(who.user_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn public_profile(
    State(s): State<AppState>,
    viewer: Option<Identity>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(s.services.users.profile(user_id, viewer.map(|v| v.user_id)).await?))
}

pub async fn followers(
    State(s): State<AppState>,
    viewer: Option<Identity>,
    Path(user_id): Path<Uuid>,
    Query(p): Query<PageParams>,
) -> Result<Json<Paginated<ProfileSummary>>, ApiError> {
    Ok(Json(s.services.users.followers(user_id, viewer.map(|v| v.user_id), p.request()).await?))
}

pub async fn following(
    State(s): State<AppState>,
    viewer: Option<Identity>,
    Path(user_id): Path<Uuid>,
    Query(p): Query<PageParams>,
) -> Result<Json<Paginated<ProfileSummary>>, ApiError> {
    Ok(Json(s.services.users.following(user_id, viewer.map(|v| v.user_id), p.request()).await?))
}

pub async fn list_favorites(
    State(s): State<AppState>,
    Buyer(who): Buyer,
    Query(p): Query<PageParams>,
) -> Result<Json<Paginated<Product>>, ApiError> {
    Ok(Json(s.services.favorites.list(who.user_id, p.request()).await?))
}

pub async fn add_favorite(State(s): State<AppState>, Buyer(who): Buyer, Path(product_id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    s.services.favorites.add(who.user_id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_favorite(State(s): State<AppState>, Buyer(who): Buyer, Path(product_id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    s.services.favorites.remove(who.user_id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_addresses(State(s): State<AppState>, Buyer(who): Buyer) -> Result<Json<Paginated<Address>>, ApiError> {
    Ok(Json(listing(s.services.addresses.list(who.user_id).await?)))
}

pub async fn add_address(
    State(s): State<AppState>,
    Buyer(who): Buyer,
    ValidatedJson(body): ValidatedJson<AddressBody>,
) -> Result<(StatusCode, Json<Address>), ApiError> {
    let (details, make_default) = body.into_details();
    let address = s.services.addresses.add(who.user_id, details, make_default).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

pub async fn update_address(
    State(s): State<AppState>,
    Buyer(who): Buyer,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<AddressBody>,
) -> Result<Json<Address>, ApiError> {
    let (details, make_default) = body.into_details();
    let mut address = s.services.addresses.update(who.user_id, id, details).await?;
    if make_default && !address.is_default {
        address = s.services.addresses.set_default(who.user_id, id).await?;
    }
    Ok(Json(address))
}

pub async fn delete_address(State(s): State<AppState>, Buyer(who): Buyer, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    s.services.addresses.delete(who.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_default_address(
    State(s): State<AppState>,
    Buyer(who): Buyer,
    Path(id): Path<Uuid>,
) -> Result<Json<Address>, ApiError> {
    Ok(Json(s.services.addresses.set_default(who.user_id, id).await?))
}

pub async fn default_address(
    State(s): State<AppState>,
    Buyer(who): Buyer,
    Path(address_type): Path<String>,
) -> Result<Json<Address>, ApiError> {
    let kind = AddressType::parse(&address_type)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid address type: {address_type}")))?;
    Ok(Json(s.services.addresses.get_default(who.user_id, kind).await?))
}
