use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{ClientIp, Json};
use crate::keygen::{is_valid_device_id, is_valid_license_key};

use super::{license_limit_key, RateBudget};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateRequest {
    pub license_key: String,
    pub device_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub success: bool,
    pub message: &'static str,
}

/// DELETE /v1/deactivate
///
/// Frees a device slot. Works on inactive licenses too: someone whose
/// subscription lapsed must still be able to move their remaining seats.
pub async fn deactivate_device(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<DeactivateRequest>,
) -> Result<Response> {
    let budget = RateBudget::enforce(
        &state.limiters.activation,
        &ip,
        &[license_limit_key(&req.license_key)],
    )?;

    let result: Result<Response> = async {
        if !is_valid_license_key(&req.license_key) {
            return Err(AppError::BadRequest("License key is malformed".into()));
        }
        if !is_valid_device_id(&req.device_id) {
            return Err(AppError::BadRequest("deviceId is malformed".into()));
        }

        let conn = state.db.get()?;

        let license = queries::get_license_by_key(&conn, &req.license_key)?
            .ok_or_else(|| AppError::NotFound("License not found".into()))?;

        let removed = queries::deactivate_device(&conn, &license.id, &req.device_id)?;
        if !removed {
            return Err(AppError::NotFound("Device not found".into()));
        }

        tracing::info!(
            license_key = %license.license_key,
            device_id = %req.device_id,
            "Device deactivated"
        );

        Ok(Json(DeactivateResponse {
            success: true,
            message: "Device deactivated successfully",
        })
        .into_response())
    }
    .await;

    Ok(budget.respond(result))
}
