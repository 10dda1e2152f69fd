//! Error taxonomy and the HTTP status/code mapping contract.
//!
//! Domain operations return `AppError` variants and never build HTTP shapes;
//! this module is the only place where a named condition becomes a status
//! code, a `code` string, and a user-facing message. Unexpected errors are
//! downgraded to a generic 500 with no internal detail leaked.

use axum::{
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::rate_limit::RateLimitExceeded;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// License key unknown, revoked, or the supplied email does not match
    /// the owner. One condition on purpose: callers must not be able to
    /// distinguish "wrong key" from "wrong email".
    #[error("Invalid license")]
    InvalidLicense,

    #[error("Device already activated")]
    DeviceAlreadyActivated,

    #[error("Maximum devices reached ({limit})")]
    MaxDevicesReached { limit: i64 },

    /// Validation heartbeat for a device that was never activated.
    #[error("Device not found or not activated")]
    ValidationFailed,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimited(RateLimitExceeded),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for AppError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::InvalidLicense => (
                StatusCode::UNAUTHORIZED,
                "INVALID_LICENSE",
                "License key is invalid or inactive".to_string(),
            ),
            AppError::DeviceAlreadyActivated => (
                StatusCode::CONFLICT,
                "DEVICE_ALREADY_ACTIVATED",
                "This device is already activated for this license".to_string(),
            ),
            AppError::MaxDevicesReached { limit } => (
                StatusCode::FORBIDDEN,
                "MAX_DEVICES_REACHED",
                format!(
                    "Maximum number of devices ({}) reached. Deactivate a device first.",
                    limit
                ),
            ),
            AppError::ValidationFailed => (
                StatusCode::NOT_FOUND,
                "VALIDATION_FAILED",
                "Device not found or not activated".to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::RateLimited(exceeded) => {
                return rate_limited_response(exceeded);
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code,
        };

        (status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct RateLimitBody {
    error: &'static str,
    code: &'static str,
    reset: String,
    remaining: u32,
}

/// 429 carries rate-limit headers so clients can back off intelligently.
fn rate_limited_response(exceeded: &RateLimitExceeded) -> Response {
    let reset = exceeded.reset.to_rfc3339();
    let body = RateLimitBody {
        error: "Too many requests. Please try again later.",
        code: "RATE_LIMIT_EXCEEDED",
        reset: reset.clone(),
        remaining: 0,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&reset) {
        headers.insert(HeaderName::from_static("x-ratelimit-reset"), value);
    }
    headers.insert(
        exceeded.scope.remaining_header(),
        HeaderValue::from_static("0"),
    );
    response
}

pub type Result<T> = std::result::Result<T, AppError>;
