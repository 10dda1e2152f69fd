use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{ClientIp, Json};
use crate::rate_limit::LimitScope;

use super::RateBudget;

#[derive(Debug, Deserialize)]
pub struct RecoverRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct RecoverResponse {
    pub success: bool,
    pub message: &'static str,
    pub count: usize,
}

/// POST /v1/recover
///
/// Emails the license keys registered to an address, one email per key.
/// The per-email rate limit keeps the 404-on-miss from being cheap to
/// probe at scale.
pub async fn recover_licenses(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<RecoverRequest>,
) -> Result<Response> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("email is required".into()));
    }

    let budget = RateBudget::enforce(
        &state.limiters.recovery,
        &ip,
        &[(LimitScope::Email, format!("email:{}", email))],
    )?;

    let result: Result<Response> = async {
        let licenses = {
            let conn = state.db.get()?;
            queries::get_licenses_by_email(&conn, &email)?
        };

        if licenses.is_empty() {
            return Err(AppError::NotFound("No licenses found for this email".into()));
        }

        let count = licenses.len();
        tracing::info!(count, "License recovery requested");

        // Delivery happens off the request path; Resend latency and retries
        // must not hold the response.
        let email_service = state.email.clone();
        tokio::spawn(async move {
            for license in licenses {
                if let Err(e) = email_service.send_license_recovery(&license).await {
                    tracing::error!(
                        license_key = %license.license_key,
                        error = %e,
                        "Failed to send recovery email"
                    );
                }
            }
        });

        Ok(Json(RecoverResponse {
            success: true,
            message: "Recovery email sent",
            count,
        })
        .into_response())
    }
    .await;

    Ok(budget.respond(result))
}
