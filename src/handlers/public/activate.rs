use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{ClientIp, Json};
use crate::keygen::{device_id_from_hardware, is_valid_license_key};
use crate::models::{DeviceView, HardwareInfo, LicenseView};
use crate::util::{next_validation_after, now};

use super::{license_limit_key, RateBudget};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    pub license_key: String,
    pub email: String,
    pub hardware_info: HardwareInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateResponse {
    pub success: bool,
    pub message: &'static str,
    pub code: &'static str,
    pub device_id: String,
    pub device_info: DeviceView,
    pub activated_at: i64,
    /// Epoch seconds by which the device should validate again
    pub next_validation: i64,
    pub license: LicenseView,
}

/// POST /v1/activate
///
/// Claims a device slot on the license. The slot count is enforced inside
/// an immediate transaction, so concurrent requests for the last slot
/// cannot both succeed.
pub async fn activate_device(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<ActivateRequest>,
) -> Result<Response> {
    let budget = RateBudget::enforce(
        &state.limiters.activation,
        &ip,
        &[license_limit_key(&req.license_key)],
    )?;

    let result: Result<Response> = async {
        let email = req.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::BadRequest("email is required".into()));
        }
        if req.hardware_info.serial_number.trim().is_empty()
            || req.hardware_info.hardware_uuid.trim().is_empty()
        {
            return Err(AppError::BadRequest(
                "hardwareInfo.serialNumber and hardwareInfo.hardwareUuid are required".into(),
            ));
        }
        // Malformed keys short-circuit without a lookup; the error is the same
        // as for an unknown key.
        if !is_valid_license_key(&req.license_key) {
            return Err(AppError::InvalidLicense);
        }

        let license = {
            let conn = state.db.get()?;
            queries::get_license_by_key(&conn, &req.license_key)?
        }
        .ok_or(AppError::InvalidLicense)?;

        if !license.email.eq_ignore_ascii_case(&email) {
            return Err(AppError::InvalidLicense);
        }
        if !license.is_usable(now()) {
            return Err(AppError::InvalidLicense);
        }

        let device_id = device_id_from_hardware(&req.hardware_info);
        let hostname = req
            .hardware_info
            .hostname
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty());

        let device = {
            let mut conn = state.db.get()?;
            queries::activate_device_atomic(&mut conn, &license, &device_id, hostname)?
        };

        tracing::info!(
            license_key = %license.license_key,
            device_id = %device.device_id,
            "Device activated"
        );

        let response = ActivateResponse {
            success: true,
            message: "License activated successfully",
            code: "ACTIVATION_SUCCESS",
            device_id: device.device_id.clone(),
            device_info: DeviceView::from(&device),
            activated_at: device.activated_at,
            next_validation: next_validation_after(license.next_billing_date, device.activated_at),
            license: LicenseView::from(&license),
        };

        Ok(Json(response).into_response())
    }
    .await;

    Ok(budget.respond(result))
}
