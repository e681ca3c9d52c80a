//! Request extractors: caller identity, role guards, cart sessions and
//! validated JSON bodies.
//!
//! Authentication happens upstream; the gateway forwards the caller as
//! `X-User-Id` and `X-User-Roles`.

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, IntoResponseParts, Response, ResponseParts};
use axum::Json;
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use super::error::ApiError;
use crate::domain::aggregates::CartOwner;
use crate::domain::value_objects::SessionId;
use crate::services::Actor;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";
pub const CART_SESSION_HEADER: &str = "x-cart-session";
pub const CART_SESSION_COOKIE: &str = "cart_session";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Buyer,
    Seller,
    Admin,
}

impl Role {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().trim_start_matches("ROLE_") {
            "BUYER" => Some(Self::Buyer),
            "SELLER" => Some(Self::Seller),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub roles: Vec<Role>,
}

impl Identity {
    pub fn has(&self, role: Role) -> bool { self.roles.contains(&role) }

    pub fn actor(&self) -> Actor {
        Actor { user_id: self.user_id, is_admin: self.has(Role::Admin) }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        let user_id = Uuid::parse_str(raw.trim()).map_err(|_| ApiError::unauthorized("Invalid user identity"))?;
        let roles = parts
            .headers
            .get(USER_ROLES_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').filter_map(Role::parse).collect())
            .unwrap_or_default();
        Ok(Self { user_id, roles })
    }
}

/// Any authenticated caller.
#[derive(Clone, Debug)]
pub struct Buyer(pub Identity);

/// Caller holding `SELLER` or `ADMIN`.
#[derive(Clone, Debug)]
pub struct Seller(pub Identity);

/// Caller holding `ADMIN`.
#[derive(Clone, Debug)]
pub struct Admin(pub Identity);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Buyer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(Identity::from_request_parts(parts, state).await?))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Seller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        if !(identity.has(Role::Seller) || identity.has(Role::Admin)) {
            return Err(ApiError::forbidden("Seller role required"));
        }
        Ok(Self(identity))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        if !identity.has(Role::Admin) {
            return Err(ApiError::forbidden("Admin role required"));
        }
        Ok(Self(identity))
    }
}

/// Anonymous cart session taken from the header or cookie, or freshly
/// issued. Issued ids are echoed back in both places.
#[derive(Clone, Debug)]
pub struct CartSession {
    pub id: SessionId,
    pub issued: bool,
}

impl CartSession {
    fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let from_header = headers.get(CART_SESSION_HEADER).and_then(|v| v.to_str().ok()).map(str::to_string);
        let from_cookie = || {
            headers
                .get_all(COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|v| v.split(';'))
                .filter_map(|pair| pair.trim().split_once('='))
                .find(|(name, _)| *name == CART_SESSION_COOKIE)
                .map(|(_, value)| value.to_string())
        };
        match from_header.or_else(from_cookie).filter(|v| !v.trim().is_empty()) {
            Some(raw) => Ok(Self { id: SessionId::parse(&raw)?, issued: false }),
            None => Ok(Self { id: SessionId::generate(), issued: true }),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CartSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}

impl IntoResponseParts for CartSession {
    type Error = std::convert::Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if self.issued {
            let cookie = format!("{CART_SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", self.id);
            if let Ok(value) = HeaderValue::from_str(self.id.as_str()) {
                res.headers_mut().insert(CART_SESSION_HEADER, value);
            }
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                res.headers_mut().append(SET_COOKIE, value);
            }
        }
        Ok(res)
    }
}

/// Whose cart a cart route operates on.
pub trait CartContext {
    fn owner(&self) -> CartOwner;
    fn respond(self, body: impl IntoResponse) -> Response;
}

impl CartContext for CartSession {
    fn owner(&self) -> CartOwner { CartOwner::Session(self.id.clone()) }
    fn respond(self, body: impl IntoResponse) -> Response { (self, body).into_response() }
}

impl CartContext for Buyer {
    fn owner(&self) -> CartOwner { CartOwner::User(self.0.user_id) }
    fn respond(self, body: impl IntoResponse) -> Response { body.into_response() }
}

/// `axum::extract::Path` with rejections rendered as [`ApiError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Path<T>(pub T);

/// `axum::extract::Query` with rejections rendered as [`ApiError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);

/// JSON body that is deserialized and then checked with `validator`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, Request as HttpRequest};
    use rstest::rstest;
    use speculoos::prelude::*;

    async fn identity(headers: &[(&str, &str)]) -> Result<Identity, ApiError> {
        let mut builder = HttpRequest::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Identity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_identity_headers() {
        let id = Uuid::new_v4().to_string();
        let who = identity(&[(USER_ID_HEADER, &id), (USER_ROLES_HEADER, "buyer, ROLE_ADMIN,unknown")]).await.unwrap();
        assert_eq!(who.roles, vec![Role::Buyer, Role::Admin]);
        assert!(who.actor().is_admin);

        let missing = identity(&[]).await;
        assert_that!(missing.map_err(|e| e.status())).is_err_containing(axum::http::StatusCode::UNAUTHORIZED);
    }

    #[rstest]
    #[case(&[], true)]
    #[case(&[(CART_SESSION_HEADER, "6f1c2a4e-8a8b-4c1e-9d3e-2b7f1a0c9e55")], false)]
    #[case(&[("cookie", "theme=dark; cart_session=6f1c2a4e-8a8b-4c1e-9d3e-2b7f1a0c9e55")], false)]
    fn test_cart_session_sources(#[case] headers: &[(&str, &str)], #[case] issued: bool) {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.insert(HeaderName::from_bytes(k.as_bytes()).unwrap(), HeaderValue::from_str(v).unwrap());
        }
        let session = CartSession::from_headers(&map).unwrap();
        assert_eq!(session.issued, issued);
    }

    #[test]
    fn test_malformed_cart_session() {
        let mut map = HeaderMap::new();
        map.insert(CART_SESSION_HEADER, HeaderValue::from_static("not-a-session"));
        let err = CartSession::from_headers(&map).unwrap_err();
        assert_eq!(err.message(), "Invalid session ID format");
    }
}
