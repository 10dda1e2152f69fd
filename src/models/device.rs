use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub license_id: String,
    /// 32-hex fingerprint derived from hardware identifiers
    pub device_id: String,
    pub hostname: Option<String>,
    pub activated_at: i64,
    pub last_used_at: i64,
}

/// Hardware descriptor bundle sent by the client at activation.
///
/// Only `serialNumber` and `hardwareUuid` contribute required entropy;
/// the rest are optional refinements. The hostname is display-only and
/// never affects the derived device ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareInfo {
    pub serial_number: String,
    pub hardware_uuid: String,
    #[serde(default)]
    pub disk_uuid: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
}

/// Client-facing device representation (camelCase, no internal ids).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceView {
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub activated_at: i64,
    pub last_used_at: i64,
}

impl From<&Device> for DeviceView {
    fn from(device: &Device) -> Self {
        Self {
            device_id: device.device_id.clone(),
            hostname: device.hostname.clone(),
            activated_at: device.activated_at,
            last_used_at: device.last_used_at,
        }
    }
}
