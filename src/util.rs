//! Shared utility functions for the SupaLicense application.

use axum::http::HeaderMap;
use chrono::Utc;

const SECONDS_PER_DAY: i64 = 86400;

/// Grace window granted to licenses with no upcoming billing date.
pub const DEFAULT_VALIDATION_WINDOW_DAYS: i64 = 30;

/// Current time as epoch seconds. All persisted timestamps use this unit.
pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// When a freshly validated device must phone home again.
///
/// Subscriptions re-validate at their next billing date so a lapsed
/// payment is caught on the first check after renewal was due. Lifetime
/// licenses (no billing date) get a rolling 30-day window.
pub fn next_validation_after(next_billing_date: Option<i64>, base_time: i64) -> i64 {
    match next_billing_date {
        Some(billing) if billing > base_time => billing,
        _ => base_time + DEFAULT_VALIDATION_WINDOW_DAYS * SECONDS_PER_DAY,
    }
}

/// Extract the client IP address from request headers.
///
/// Tries `x-forwarded-for` first (for proxied requests), then `x-real-ip`.
/// Only the leftmost `x-forwarded-for` entry is used; trailing entries are
/// proxy hops, not the client.
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
}

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}
