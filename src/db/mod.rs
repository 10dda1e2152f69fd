mod from_row;
mod schema;

pub mod queries;

pub use from_row::{query_all, query_one, FromRow, DEVICE_COLS, LICENSE_COLS};
pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::email::EmailService;
use crate::rate_limit::RateLimiters;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// License database pool (licenses + devices)
    pub db: DbPool,
    /// Per-endpoint-class rate limiters keyed by IP and license key
    pub limiters: Arc<RateLimiters>,
    /// Outbound email (license recovery). Disabled mode logs instead.
    pub email: EmailService,
    /// Device cap applied to licenses created without an explicit limit
    pub default_max_devices: i64,
    /// Whether POST /v1/license is mounted (webhook-less dev/test setups)
    pub create_license_enabled: bool,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
    });
    Pool::builder().max_size(10).build(manager)
}
