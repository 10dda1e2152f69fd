mod activate;
mod devices;
mod license;
mod recover;
mod validate;

pub use activate::*;
pub use devices::*;
pub use license::*;
pub use recover::*;
pub use validate::*;

use axum::{
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::AppState;
use crate::error::AppError;
use crate::rate_limit::{LimitScope, RateLimitDecision, RateLimiter};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Budget left after the rate-limit checks a handler performed, attached
/// to every response (success or domain error) as
/// `X-RateLimit-Remaining-*` headers.
pub(crate) struct RateBudget {
    decisions: Vec<(LimitScope, RateLimitDecision)>,
}

impl RateBudget {
    /// Run the IP check and optional secondary checks against one limiter.
    ///
    /// The IP dimension is checked first so an abusive IP burns its own
    /// budget before it can touch any license's budget.
    pub(crate) fn enforce(
        limiter: &RateLimiter,
        ip: &str,
        secondary: &[(LimitScope, String)],
    ) -> Result<Self, AppError> {
        let mut decisions = Vec::with_capacity(1 + secondary.len());

        let ip_decision = limiter
            .check(LimitScope::Ip, &format!("ip:{}", ip))
            .map_err(AppError::RateLimited)?;
        decisions.push((LimitScope::Ip, ip_decision));

        for (scope, key) in secondary {
            let decision = limiter
                .check(*scope, key)
                .map_err(AppError::RateLimited)?;
            decisions.push((*scope, decision));
        }

        Ok(Self { decisions })
    }

    pub(crate) fn attach<R: IntoResponse>(&self, inner: R) -> Response {
        let mut response = inner.into_response();
        let headers = response.headers_mut();
        for (scope, decision) in &self.decisions {
            if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
                headers.insert(scope.remaining_header(), value);
            }
        }
        response
    }

    /// Finish a handler: the remaining-budget headers ride on the response
    /// whichever way the request went, 401s and 404s included.
    pub(crate) fn respond(&self, result: Result<Response, AppError>) -> Response {
        match result {
            Ok(response) => self.attach(response),
            Err(err) => self.attach(err),
        }
    }
}

/// Secondary rate-limit key for a license dimension.
pub(crate) fn license_limit_key(license_key: &str) -> (LimitScope, String) {
    (LimitScope::License, format!("license:{}", license_key))
}

pub fn router(create_license_enabled: bool) -> Router<AppState> {
    let mut v1 = Router::new()
        .route("/activate", post(activate_device))
        .route("/deactivate", delete(deactivate_device))
        .route("/validate", post(validate_device))
        // GET /license with ?key=, GET /license/info with Authorization header
        .route("/license", get(get_license))
        .route("/license/info", get(get_license_info))
        .route("/license/cancel", post(cancel_license))
        .route("/recover", post(recover_licenses));

    // Normally licenses arrive via the payment provider; direct creation is
    // for webhook-less dev and test setups.
    if create_license_enabled {
        v1 = v1.route("/license", post(create_license));
    }

    Router::new().route("/health", get(health)).nest("/v1", v1)
}
