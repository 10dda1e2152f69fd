use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{ClientIp, Json};
use crate::keygen::{device_id_from_hardware, is_valid_device_id, is_valid_license_key};
use crate::models::{DeviceView, HardwareInfo, LicenseView};
use crate::util::{next_validation_after, now};

use super::{license_limit_key, RateBudget};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub license_key: String,
    pub email: String,
    /// Fingerprint from a previous activation; clients that did not
    /// persist it may send `hardwareInfo` instead.
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub hardware_info: Option<HardwareInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    /// Epoch seconds by which the device should validate again
    pub next_validation: i64,
    pub license: LicenseView,
    pub device: DeviceView,
}

/// POST /v1/validate
///
/// Periodic heartbeat from an activated device. A passing check refreshes
/// the device's last_used_at and tells the client when to check in next.
pub async fn validate_device(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<ValidateRequest>,
) -> Result<Response> {
    let budget = RateBudget::enforce(
        &state.limiters.validation,
        &ip,
        &[license_limit_key(&req.license_key)],
    )?;

    let result: Result<Response> = async {
        if !is_valid_license_key(&req.license_key) {
            return Err(AppError::InvalidLicense);
        }
        let email = req.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::BadRequest("email is required".into()));
        }

        let device_id = match (&req.device_id, &req.hardware_info) {
            (Some(id), _) => {
                if !is_valid_device_id(id) {
                    return Err(AppError::BadRequest("deviceId is malformed".into()));
                }
                id.clone()
            }
            (None, Some(hardware)) => {
                if hardware.serial_number.trim().is_empty()
                    || hardware.hardware_uuid.trim().is_empty()
                {
                    return Err(AppError::BadRequest(
                        "hardwareInfo.serialNumber and hardwareInfo.hardwareUuid are required"
                            .into(),
                    ));
                }
                device_id_from_hardware(hardware)
            }
            (None, None) => {
                return Err(AppError::BadRequest(
                    "deviceId or hardwareInfo is required".into(),
                ));
            }
        };

        let conn = state.db.get()?;

        let license = queries::get_license_by_key(&conn, &req.license_key)?
            .ok_or(AppError::InvalidLicense)?;
        if !license.email.eq_ignore_ascii_case(&email) {
            return Err(AppError::InvalidLicense);
        }
        if !license.is_usable(now()) {
            return Err(AppError::InvalidLicense);
        }

        let device = queries::touch_device_validation(&conn, &license.id, &device_id)?
            .ok_or(AppError::ValidationFailed)?;

        let response = ValidateResponse {
            valid: true,
            next_validation: next_validation_after(license.next_billing_date, device.last_used_at),
            license: LicenseView::from(&license),
            device: DeviceView::from(&device),
        };

        Ok(Json(response).into_response())
    }
    .await;

    Ok(budget.respond(result))
}
