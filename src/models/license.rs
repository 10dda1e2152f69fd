use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Inactive,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Active => "active",
            LicenseStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(LicenseStatus::Active),
            "inactive" => Some(LicenseStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    Monthly,
    Yearly,
    Lifetime,
}

impl LicenseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseType::Monthly => "monthly",
            LicenseType::Yearly => "yearly",
            LicenseType::Lifetime => "lifetime",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(LicenseType::Monthly),
            "yearly" => Some(LicenseType::Yearly),
            "lifetime" => Some(LicenseType::Lifetime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    pub license_key: String,
    pub email: String,
    pub status: LicenseStatus,
    pub license_type: LicenseType,
    pub max_devices: i64,
    pub cancelled: bool,
    /// When cancellation was requested (None = never cancelled)
    pub cancelled_at: Option<i64>,
    /// Next subscription renewal (None for lifetime licenses)
    pub next_billing_date: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl License {
    /// A license authorizes activations only while active and uncancelled,
    /// or while a cancelled subscription is still inside its paid period.
    pub fn is_usable(&self, now: i64) -> bool {
        if self.status != LicenseStatus::Active {
            return false;
        }
        if self.cancelled {
            return matches!(self.next_billing_date, Some(billing) if billing > now);
        }
        true
    }
}

/// Client-facing license representation (camelCase, no internal id).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseView {
    pub license_key: String,
    pub email: String,
    pub status: LicenseStatus,
    pub license_type: LicenseType,
    pub max_devices: i64,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_billing_date: Option<i64>,
    pub created_at: i64,
}

impl From<&License> for LicenseView {
    fn from(license: &License) -> Self {
        Self {
            license_key: license.license_key.clone(),
            email: license.email.clone(),
            status: license.status,
            license_type: license.license_type,
            max_devices: license.max_devices,
            cancelled: license.cancelled,
            next_billing_date: license.next_billing_date,
            created_at: license.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn license(status: LicenseStatus, cancelled: bool, billing: Option<i64>) -> License {
        License {
            id: "lic-1".to_string(),
            license_key: "AAAA-BBBB-CCCC-DDDD".to_string(),
            email: "user@example.com".to_string(),
            status,
            license_type: LicenseType::Monthly,
            max_devices: 2,
            cancelled,
            cancelled_at: cancelled.then_some(500),
            next_billing_date: billing,
            created_at: 100,
            updated_at: 100,
        }
    }

    #[test]
    fn test_usable_active_uncancelled() {
        assert!(license(LicenseStatus::Active, false, None).is_usable(1_000));
    }

    #[test]
    fn test_unusable_when_inactive() {
        assert!(!license(LicenseStatus::Inactive, false, None).is_usable(1_000));
    }

    #[test]
    fn test_cancelled_usable_until_period_end() {
        let lic = license(LicenseStatus::Active, true, Some(2_000));
        assert!(lic.is_usable(1_000));
        assert!(!lic.is_usable(2_000));
        assert!(!lic.is_usable(3_000));
    }

    #[test]
    fn test_cancelled_without_billing_date_unusable() {
        assert!(!license(LicenseStatus::Active, true, None).is_usable(1_000));
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(LicenseStatus::from_str("active"), Some(LicenseStatus::Active));
        assert_eq!(LicenseStatus::from_str("bogus"), None);
        assert_eq!(LicenseType::from_str("lifetime"), Some(LicenseType::Lifetime));
        assert_eq!(LicenseType::Yearly.as_str(), "yearly");
    }
}
