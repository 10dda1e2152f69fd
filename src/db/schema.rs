use rusqlite::Connection;

/// Initialize the license database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Licenses (one row per sold license key)
        -- cancelled licenses keep status = 'active' until next_billing_date
        -- passes; the expiration sweep then flips them to 'inactive'
        CREATE TABLE IF NOT EXISTS licenses (
            id TEXT PRIMARY KEY,
            license_key TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('active', 'inactive')),
            license_type TEXT NOT NULL CHECK (license_type IN ('monthly', 'yearly', 'lifetime')),
            max_devices INTEGER NOT NULL CHECK (max_devices >= 1),
            cancelled INTEGER NOT NULL DEFAULT 0,
            cancelled_at INTEGER,
            next_billing_date INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_licenses_email ON licenses(email);
        CREATE INDEX IF NOT EXISTS idx_licenses_cancelled
            ON licenses(next_billing_date) WHERE cancelled = 1 AND status = 'active';

        -- Devices (activations - one row per machine per license)
        CREATE TABLE IF NOT EXISTS devices (
            id TEXT PRIMARY KEY,
            license_id TEXT NOT NULL REFERENCES licenses(id) ON DELETE CASCADE,
            device_id TEXT NOT NULL,
            hostname TEXT,
            activated_at INTEGER NOT NULL,
            last_used_at INTEGER NOT NULL,

            UNIQUE(license_id, device_id)
        );
        CREATE INDEX IF NOT EXISTS idx_devices_license ON devices(license_id);
        "#,
    )
}
