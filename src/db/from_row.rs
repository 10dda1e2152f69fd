//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::{Device, License, LicenseStatus, LicenseType};

/// Parse a string column into an enum type, converting unknown values to
/// rusqlite errors instead of panicking.
fn parse_enum<T>(
    row: &Row,
    col: usize,
    col_name: &str,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(col)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
///
/// Implementing this trait allows using the `query_one` and `query_all`
/// helper functions, reducing repetitive row mapping closures.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub const LICENSE_COLS: &str = "id, license_key, email, status, license_type, max_devices, cancelled, cancelled_at, next_billing_date, created_at, updated_at";

pub const DEVICE_COLS: &str = "id, license_id, device_id, hostname, activated_at, last_used_at";

impl FromRow for License {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(License {
            id: row.get(0)?,
            license_key: row.get(1)?,
            email: row.get(2)?,
            status: parse_enum(row, 3, "status", LicenseStatus::from_str)?,
            license_type: parse_enum(row, 4, "license_type", LicenseType::from_str)?,
            max_devices: row.get(5)?,
            cancelled: row.get(6)?,
            cancelled_at: row.get(7)?,
            next_billing_date: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl FromRow for Device {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Device {
            id: row.get(0)?,
            license_id: row.get(1)?,
            device_id: row.get(2)?,
            hostname: row.get(3)?,
            activated_at: row.get(4)?,
            last_used_at: row.get(5)?,
        })
    }
}
