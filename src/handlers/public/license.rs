use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{ClientIp, Json, Query};
use crate::keygen::is_valid_license_key;
use crate::models::{DeviceView, License, LicenseType, LicenseView};
use crate::util::extract_bearer_token;

use super::{license_limit_key, RateBudget};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseInfoResponse {
    pub license: LicenseView,
    pub devices: Vec<DeviceView>,
    pub devices_used: i64,
}

fn load_license_info(conn: &Connection, license_key: &str) -> Result<LicenseInfoResponse> {
    if !is_valid_license_key(license_key) {
        return Err(AppError::BadRequest("License key is malformed".into()));
    }

    let license = queries::get_license_by_key(conn, license_key)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;
    let devices = queries::list_devices_for_license(conn, &license.id)?;

    Ok(LicenseInfoResponse {
        license: LicenseView::from(&license),
        devices_used: devices.len() as i64,
        devices: devices.iter().map(DeviceView::from).collect(),
    })
}

#[derive(Debug, Deserialize)]
pub struct LicenseQuery {
    pub key: String,
}

/// GET /v1/license?key=XXXX-XXXX-XXXX-XXXX
pub async fn get_license(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Query(query): Query<LicenseQuery>,
) -> Result<Response> {
    let budget = RateBudget::enforce(
        &state.limiters.validation,
        &ip,
        &[license_limit_key(&query.key)],
    )?;

    let result: Result<Response> = async {
        let conn = state.db.get()?;
        let info = load_license_info(&conn, &query.key)?;
        Ok(Json(info).into_response())
    }
    .await;

    Ok(budget.respond(result))
}

/// GET /v1/license/info with the license key as a Bearer token.
///
/// Same payload as GET /v1/license, for clients that must keep the key out
/// of URLs (and therefore out of proxy and access logs).
pub async fn get_license_info(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
) -> Result<Response> {
    let license_key = extract_bearer_token(&headers)
        .ok_or(AppError::InvalidLicense)?
        .to_string();

    let budget = RateBudget::enforce(
        &state.limiters.validation,
        &ip,
        &[license_limit_key(&license_key)],
    )?;

    let result: Result<Response> = async {
        let conn = state.db.get()?;
        let info = load_license_info(&conn, &license_key)?;
        Ok(Json(info).into_response())
    }
    .await;

    Ok(budget.respond(result))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub message: &'static str,
    pub license: LicenseView,
}

/// POST /v1/license/cancel with the license key as a Bearer token.
///
/// Flags the license; activations keep working until next_billing_date,
/// after which the expiration sweep deactivates it. Idempotent.
pub async fn cancel_license(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
) -> Result<Response> {
    let license_key = extract_bearer_token(&headers)
        .ok_or(AppError::InvalidLicense)?
        .to_string();

    let budget = RateBudget::enforce(
        &state.limiters.activation,
        &ip,
        &[license_limit_key(&license_key)],
    )?;

    let result: Result<Response> = async {
        if !is_valid_license_key(&license_key) {
            return Err(AppError::InvalidLicense);
        }

        let conn = state.db.get()?;

        let license = queries::get_license_by_key(&conn, &license_key)?
            .ok_or(AppError::InvalidLicense)?;
        // Re-cancelling is a no-op; report current state rather than failing.
        let license = if license.cancelled {
            license
        } else {
            queries::cancel_license(&conn, &license.id)?.unwrap_or(license)
        };

        tracing::info!(license_key = %license.license_key, "License cancelled");

        Ok(Json(CancelResponse {
            message: "License cancelled. Access continues until the end of the paid period.",
            license: LicenseView::from(&license),
        })
        .into_response())
    }
    .await;

    Ok(budget.respond(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLicenseRequest {
    pub email: String,
    /// Defaults to a lifetime license when omitted.
    #[serde(default)]
    pub license_type: Option<LicenseType>,
    #[serde(default)]
    pub max_devices: Option<i64>,
    #[serde(default)]
    pub next_billing_date: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLicenseResponse {
    pub license: LicenseView,
}

/// POST /v1/license (only mounted when CREATE_LICENSE_ENABLED).
pub async fn create_license(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<CreateLicenseRequest>,
) -> Result<Response> {
    let budget = RateBudget::enforce(&state.limiters.creation, &ip, &[])?;

    let result: Result<Response> = async {
        let email = req.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::BadRequest("email is required".into()));
        }

        let max_devices = req.max_devices.unwrap_or(state.default_max_devices);

        let license: License = {
            let conn = state.db.get()?;
            queries::create_license(
                &conn,
                &email,
                req.license_type.unwrap_or(LicenseType::Lifetime),
                max_devices,
                req.next_billing_date,
            )?
        };

        tracing::info!(license_key = %license.license_key, "License created");

        let body = Json(CreateLicenseResponse {
            license: LicenseView::from(&license),
        });
        Ok((StatusCode::CREATED, body).into_response())
    }
    .await;

    Ok(budget.respond(result))
}
