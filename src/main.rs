use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use supalicense::config::Config;
use supalicense::db::{create_pool, init_db, queries, AppState};
use supalicense::email::EmailService;
use supalicense::handlers;
use supalicense::models::LicenseType;
use supalicense::rate_limit::RateLimiters;
use supalicense::util::now;

#[derive(Parser, Debug)]
#[command(name = "supalicense")]
#[command(about = "License server for SupaSidebar")]
struct Cli {
    /// Seed the database with dev licenses (dev mode only)
    #[arg(long)]
    seed: bool,
}

/// Seeds the database with a monthly and a lifetime license for testing.
/// Only runs in dev mode and when the database is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing = queries::get_licenses_by_email(&conn, "dev@supasidebar.local")
        .expect("Failed to check for seed data");
    if !existing.is_empty() {
        tracing::info!("Database already has dev licenses, skipping seed");
        return;
    }

    let monthly = queries::create_license(
        &conn,
        "dev@supasidebar.local",
        LicenseType::Monthly,
        state.default_max_devices,
        Some(now() + 30 * 86400),
    )
    .expect("Failed to create dev monthly license");

    let lifetime = queries::create_license(
        &conn,
        "dev@supasidebar.local",
        LicenseType::Lifetime,
        state.default_max_devices,
        None,
    )
    .expect("Failed to create dev lifetime license");

    tracing::info!("============================================");
    tracing::info!("SEEDED DEV LICENSES (dev@supasidebar.local)");
    tracing::info!("Monthly:  {}", monthly.license_key);
    tracing::info!("Lifetime: {}", lifetime.license_key);
    tracing::info!("============================================");
}

/// Spawns a background task that deactivates cancelled licenses whose paid
/// period has ended. Runs hourly; the HTTP path also rejects them via
/// `License::is_usable`, so this only keeps stored state honest.
fn spawn_expiration_sweep(state: AppState) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(60 * 60);

        loop {
            tokio::time::sleep(interval).await;

            match state.db.get() {
                Ok(conn) => match queries::sweep_expired_cancellations(&conn) {
                    Ok(count) if count > 0 => {
                        tracing::info!("Deactivated {} expired cancelled licenses", count);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Expiration sweep failed: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to get db connection for expiration sweep: {}", e);
                }
            }
        }
    });

    tracing::info!("Expiration sweep task started (runs hourly)");
}

/// Spawns a background task that drops aged-out rate limiter keys so the
/// in-memory hit maps do not grow without bound.
fn spawn_limiter_cleanup(limiters: Arc<RateLimiters>) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(5 * 60);

        loop {
            tokio::time::sleep(interval).await;
            limiters.cleanup();
        }
    });

    tracing::info!("Rate limiter cleanup task started (runs every 5 minutes)");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "supalicense=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let limiters = Arc::new(RateLimiters::new(config.rate_limit));

    let state = AppState {
        db: db_pool,
        limiters: limiters.clone(),
        email: EmailService::new(config.resend_api_key.clone(), config.email_from.clone()),
        default_max_devices: config.default_max_devices,
        create_license_enabled: config.create_license_enabled,
    };

    // Catch anything that expired while the server was down.
    {
        let conn = state.db.get().expect("Failed to get connection for startup sweep");
        match queries::sweep_expired_cancellations(&conn) {
            Ok(count) if count > 0 => {
                tracing::info!("Deactivated {} expired cancelled licenses at startup", count);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Startup expiration sweep failed: {}", e),
        }
    }

    if cli.seed {
        if config.dev_mode {
            seed_dev_data(&state);
        } else {
            tracing::warn!("--seed ignored outside dev mode");
        }
    }

    spawn_expiration_sweep(state.clone());
    spawn_limiter_cleanup(limiters);

    if config.create_license_enabled {
        tracing::info!("Direct license creation enabled: POST /v1/license");
    }

    let app = handlers::public::router(config.create_license_enabled)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("SupaLicense server listening on {}", addr);

    // Use into_make_service_with_connect_info to enable IP-based rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
