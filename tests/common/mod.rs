//! Test utilities and fixtures for SupaLicense integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use supalicense::db::{init_db, queries, AppState, DbPool};
pub use supalicense::email::EmailService;
pub use supalicense::handlers;
pub use supalicense::models::*;
pub use supalicense::rate_limit::{RateLimitConfig, RateLimiters};

/// Create an in-memory test database with schema initialized.
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create a pooled test database backed by a unique temp file.
///
/// A file (not `:memory:`) because every pooled connection to an in-memory
/// SQLite database gets its own empty database.
pub fn create_test_pool() -> DbPool {
    let path = std::env::temp_dir().join(format!("supalicense-test-{}.db", uuid::Uuid::new_v4()));
    let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }
    pool
}

/// Rate limit budgets high enough that functional tests never trip them.
pub fn generous_rate_limits() -> RateLimitConfig {
    RateLimitConfig {
        activation_per_minute: 10_000,
        validation_per_minute: 10_000,
        creation_per_minute: 10_000,
        recovery_per_hour: 10_000,
    }
}

pub fn create_test_app_state_with_limits(rate_limit: RateLimitConfig) -> AppState {
    AppState {
        db: create_test_pool(),
        limiters: Arc::new(RateLimiters::new(rate_limit)),
        email: EmailService::new(None, "test@supasidebar.local".to_string()),
        default_max_devices: 2,
        create_license_enabled: true,
    }
}

pub fn create_test_app_state() -> AppState {
    create_test_app_state_with_limits(generous_rate_limits())
}

/// Build the public router over the given state.
pub fn public_app(state: AppState) -> Router {
    handlers::public::router(state.create_license_enabled).with_state(state)
}

/// Create a test license directly in the database.
pub fn create_test_license(
    conn: &Connection,
    email: &str,
    license_type: LicenseType,
    max_devices: i64,
    next_billing_date: Option<i64>,
) -> License {
    queries::create_license(conn, email, license_type, max_devices, next_billing_date)
        .expect("Failed to create test license")
}

/// A lifetime license with two device slots, the common case.
pub fn create_default_license(conn: &Connection) -> License {
    create_test_license(conn, "user@example.com", LicenseType::Lifetime, 2, None)
}

/// Hardware descriptor with a given serial (other fields fixed).
pub fn hardware(serial: &str) -> HardwareInfo {
    HardwareInfo {
        serial_number: serial.to_string(),
        hardware_uuid: format!("uuid-{}", serial),
        disk_uuid: Some("disk-1".to_string()),
        model: Some("MacBookPro18,3".to_string()),
        hostname: Some("Test Mac".to_string()),
    }
}

/// JSON body for POST /v1/activate.
pub fn activate_body(license_key: &str, email: &str, serial: &str) -> serde_json::Value {
    serde_json::json!({
        "licenseKey": license_key,
        "email": email,
        "hardwareInfo": {
            "serialNumber": serial,
            "hardwareUuid": format!("uuid-{}", serial),
            "diskUuid": "disk-1",
            "model": "MacBookPro18,3",
            "hostname": "Test Mac",
        },
    })
}

/// Send a JSON request through the router, returning status and parsed body.
pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: &serde_json::Value,
) -> (axum::http::StatusCode, serde_json::Value) {
    use tower::ServiceExt;

    let response = app
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .header("x-forwarded-for", "203.0.113.9")
                .body(axum::body::Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Response should be valid JSON")
    };
    (status, json)
}

/// Send a bodyless request, with optional Authorization header.
pub async fn send_request(
    app: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
) -> (axum::http::StatusCode, serde_json::Value) {
    use tower::ServiceExt;

    let mut builder = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.9");
    if let Some(token) = bearer {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let response = app
        .clone()
        .oneshot(builder.body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Response should be valid JSON")
    };
    (status, json)
}

/// Get the current timestamp
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Get a future timestamp (days from now)
pub fn future_timestamp(days: i64) -> i64 {
    now() + (days * 86400)
}

/// Get a past timestamp (days ago)
pub fn past_timestamp(days: i64) -> i64 {
    now() - (days * 86400)
}
