use rusqlite::{params, Connection, ErrorCode, TransactionBehavior};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::keygen::generate_license_key;
use crate::models::{Device, License, LicenseStatus, LicenseType};
use crate::util::now;

use super::from_row::{query_all, query_one, DEVICE_COLS, LICENSE_COLS};

/// Collision-retry cap for license key generation. The keyspace is ~10^24
/// so a second collision in a row indicates a broken RNG, not bad luck.
const KEY_GENERATION_ATTEMPTS: u32 = 5;

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

// ============ Licenses ============

/// Create a license with a freshly generated key.
///
/// Key uniqueness is enforced by the UNIQUE constraint; on the (vanishingly
/// rare) collision the insert is retried with a new key.
pub fn create_license(
    conn: &Connection,
    email: &str,
    license_type: LicenseType,
    max_devices: i64,
    next_billing_date: Option<i64>,
) -> Result<License> {
    if max_devices < 1 {
        return Err(AppError::BadRequest(
            "maxDevices must be at least 1".into(),
        ));
    }
    if license_type != LicenseType::Lifetime && next_billing_date.is_none() {
        return Err(AppError::BadRequest(
            "subscription licenses require nextBillingDate".into(),
        ));
    }

    let id = gen_id();
    let now = now();

    for _ in 0..KEY_GENERATION_ATTEMPTS {
        let license_key = generate_license_key();
        let inserted = conn.execute(
            "INSERT INTO licenses (id, license_key, email, status, license_type, max_devices, cancelled, next_billing_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'active', ?4, ?5, 0, ?6, ?7, ?7)",
            params![&id, &license_key, email, license_type.as_str(), max_devices, next_billing_date, now],
        );

        match inserted {
            Ok(_) => {
                return Ok(License {
                    id,
                    license_key,
                    email: email.to_string(),
                    status: LicenseStatus::Active,
                    license_type,
                    max_devices,
                    cancelled: false,
                    cancelled_at: None,
                    next_billing_date,
                    created_at: now,
                    updated_at: now,
                });
            }
            Err(err) if is_unique_violation(&err) => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Err(AppError::Internal(
        "license key generation exhausted retries".into(),
    ))
}

pub fn get_license_by_key(conn: &Connection, license_key: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE license_key = ?1", LICENSE_COLS),
        &[&license_key],
    )
}

pub fn get_licenses_by_email(conn: &Connection, email: &str) -> Result<Vec<License>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM licenses WHERE email = ?1 ORDER BY created_at",
            LICENSE_COLS
        ),
        &[&email],
    )
}

/// Flag a license as cancelled. Access continues until next_billing_date;
/// the expiration sweep flips the status afterwards.
pub fn cancel_license(conn: &Connection, license_id: &str) -> Result<Option<License>> {
    let now = now();
    query_one(
        conn,
        &format!(
            "UPDATE licenses SET cancelled = 1, cancelled_at = ?1, updated_at = ?1
             WHERE id = ?2 AND cancelled = 0
             RETURNING {}",
            LICENSE_COLS
        ),
        &[&now, &license_id],
    )
}

/// Deactivate cancelled licenses whose paid period has ended.
/// Returns the number of licenses flipped to inactive.
pub fn sweep_expired_cancellations(conn: &Connection) -> Result<usize> {
    let now = now();
    let count = conn.execute(
        "UPDATE licenses SET status = 'inactive', updated_at = ?1
         WHERE cancelled = 1 AND status = 'active'
           AND next_billing_date IS NOT NULL AND next_billing_date <= ?1",
        params![now],
    )?;
    Ok(count)
}

// ============ Devices ============

/// Atomically activate a device against a license, enforcing max_devices.
///
/// Uses IMMEDIATE to acquire the write lock at transaction start, so two
/// concurrent activations for the last remaining slot serialize and the
/// loser sees the winner's row. Counting and inserting under the same lock
/// closes the check-then-append race.
pub fn activate_device_atomic(
    conn: &mut Connection,
    license: &License,
    device_id: &str,
    hostname: Option<&str>,
) -> Result<Device> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let existing: Option<Device> = query_one(
        &tx,
        &format!(
            "SELECT {} FROM devices WHERE license_id = ?1 AND device_id = ?2",
            DEVICE_COLS
        ),
        &[&license.id, &device_id],
    )?;
    if existing.is_some() {
        return Err(AppError::DeviceAlreadyActivated);
    }

    let active_count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM devices WHERE license_id = ?1",
        params![&license.id],
        |row| row.get(0),
    )?;
    if active_count >= license.max_devices {
        return Err(AppError::MaxDevicesReached {
            limit: license.max_devices,
        });
    }

    let id = gen_id();
    let now = now();
    tx.execute(
        "INSERT INTO devices (id, license_id, device_id, hostname, activated_at, last_used_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![&id, &license.id, device_id, hostname, now],
    )?;
    tx.commit()?;

    Ok(Device {
        id,
        license_id: license.id.clone(),
        device_id: device_id.to_string(),
        hostname: hostname.map(String::from),
        activated_at: now,
        last_used_at: now,
    })
}

/// Record a successful validation, returning the refreshed device row.
/// None means the device was never activated (or was deactivated).
pub fn touch_device_validation(
    conn: &Connection,
    license_id: &str,
    device_id: &str,
) -> Result<Option<Device>> {
    let now = now();
    query_one(
        conn,
        &format!(
            "UPDATE devices SET last_used_at = ?1
             WHERE license_id = ?2 AND device_id = ?3
             RETURNING {}",
            DEVICE_COLS
        ),
        &[&now, &license_id, &device_id],
    )
}

/// Remove a device activation. Returns false if no such device existed.
pub fn deactivate_device(conn: &Connection, license_id: &str, device_id: &str) -> Result<bool> {
    let count = conn.execute(
        "DELETE FROM devices WHERE license_id = ?1 AND device_id = ?2",
        params![license_id, device_id],
    )?;
    Ok(count > 0)
}

pub fn list_devices_for_license(conn: &Connection, license_id: &str) -> Result<Vec<Device>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM devices WHERE license_id = ?1 ORDER BY activated_at",
            DEVICE_COLS
        ),
        &[&license_id],
    )
}

pub fn count_devices_for_license(conn: &Connection, license_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM devices WHERE license_id = ?1",
        params![license_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
