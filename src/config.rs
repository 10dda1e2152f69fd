use std::env;

use crate::rate_limit::RateLimitConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub dev_mode: bool,
    /// Device slots granted to newly created licenses.
    pub default_max_devices: i64,
    /// POST /v1/license is only mounted when this is set.
    pub create_license_enabled: bool,
    pub rate_limit: RateLimitConfig,
    /// Resend API key for recovery emails. None = email disabled, log only.
    pub resend_api_key: Option<String>,
    pub email_from: String,
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("SUPALICENSE_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let rate_limit = RateLimitConfig {
            activation_per_minute: env_u32("RATE_LIMIT_ACTIVATION_RPM", 10),
            validation_per_minute: env_u32("RATE_LIMIT_VALIDATION_RPM", 60),
            creation_per_minute: env_u32("RATE_LIMIT_CREATION_RPM", 5),
            recovery_per_hour: env_u32("RATE_LIMIT_RECOVERY_RPH", 3),
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "supalicense.db".to_string()),
            dev_mode,
            default_max_devices: env::var("DEFAULT_MAX_DEVICES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &i64| n >= 1)
                .unwrap_or(2),
            create_license_enabled: env::var("CREATE_LICENSE_ENABLED")
                .map(|v| v == "1" || v == "true")
                .unwrap_or(false),
            rate_limit,
            resend_api_key: env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty()),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "licenses@supasidebar.com".to_string()),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
