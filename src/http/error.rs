//! HTTP error responses.
//!
//! Every failure leaves the API as
//! `{"status", "error", "message", "timestamp", "fieldErrors"?}`.

use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use validator::ValidationErrors;

use crate::domain::aggregates::CartError;
use crate::domain::value_objects::SessionIdError;
use crate::{ports, EcommerceError};

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    field_errors: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: u16,
    error: &'a str,
    message: &'a str,
    timestamp: String,
    #[serde(rename = "fieldErrors", skip_serializing_if = "Option::is_none")]
    field_errors: Option<&'a BTreeMap<String, Vec<String>>>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), field_errors: None }
    }

    pub fn bad_request(message: impl Into<String>) -> Self { Self::new(StatusCode::BAD_REQUEST, message) }
    pub fn unauthorized(message: impl Into<String>) -> Self { Self::new(StatusCode::UNAUTHORIZED, message) }
    pub fn forbidden(message: impl Into<String>) -> Self { Self::new(StatusCode::FORBIDDEN, message) }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn message(&self) -> &str { &self.message }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: self.status.as_u16(),
            error: self.status.canonical_reason().unwrap_or("Error"),
            message: &self.message,
            timestamp: Utc::now().to_rfc3339(),
            field_errors: self.field_errors.as_ref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<EcommerceError> for ApiError {
    fn from(err: EcommerceError) -> Self {
        use EcommerceError::*;
        let status = match &err {
            ProductNotFound(_) | OrderNotFound(_) | CartNotFound | NotFound(_) => StatusCode::NOT_FOUND,
            Cart(CartError::ItemNotFound(_)) => StatusCode::NOT_FOUND,
            Forbidden(_) => StatusCode::FORBIDDEN,
            Coupon(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BadRequest(_) | Cart(_) | Order(_) | Return(_) | Payment(_) | Product(_) | User(_) | Shipping(_) => {
                StatusCode::BAD_REQUEST
            }
            Gateway(_) => StatusCode::BAD_GATEWAY,
            StorageError(ports::Error::Duplicate { .. } | ports::Error::OutOfRange { .. }) => StatusCode::BAD_REQUEST,
            StorageError(ports::Error::Conflict { .. }) => StatusCode::CONFLICT,
            StorageError(ports::Error::Adapter(_)) => {
                tracing::error!(error = %err, "storage failure");
                return Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        };
        if status == StatusCode::BAD_GATEWAY {
            tracing::error!(error = %err, "payment provider failure");
        }
        Self::new(status, err.to_string())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| format!("failed {} check", e.code)))
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "Validation failed".into(),
            field_errors: Some(fields),
        }
    }
}

impl From<SessionIdError> for ApiError {
    fn from(_: SessionIdError) -> Self { Self::bad_request("Invalid session ID format") }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self { Self::new(rejection.status(), rejection.body_text()) }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self { Self::bad_request(rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self { Self::bad_request(rejection.body_text()) }
}
