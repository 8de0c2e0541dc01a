use chrono::Utc;
use dotenvy::dotenv;
use std::{sync::Arc, time::Duration};
use surfbook::{
    api::{self, AppState},
    config::{catalog, database, settings},
    core::{availability::BookingPolicy, reservation},
    errors::Result,
    notify::LogNotifier,
};
use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How often lapsed PENDING holds are swept.
const HOLD_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and create tables
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed schools and classes from config
    let report = catalog::seed_catalog(
        &db,
        &config.schools,
        config.server.seed_weeks,
        Utc::now().date_naive(),
    )
    .await
    .inspect_err(|e| error!("Failed to seed catalog: {}", e))?;
    info!(
        schools = report.schools,
        classes = report.classes,
        sessions = report.sessions,
        "Catalog seeded"
    );

    // 6. Sweep lapsed holds in the background
    let sweeper = tokio::spawn(sweep_holds(db.clone(), config.booking));

    // 7. Serve
    let state = AppState {
        db: db.clone(),
        policy: config.booking,
        retry: config.retry,
        notifier: Arc::new(LogNotifier),
    };
    let listener = tokio::net::TcpListener::bind(config.server.bind_address.as_str()).await?;
    info!(address = %config.server.bind_address, "Listening");
    axum::serve(listener, api::build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    db.close().await?;
    info!("Shut down cleanly");
    Ok(())
}

async fn sweep_holds(db: DatabaseConnection, policy: BookingPolicy) {
    if policy.pending_hold_minutes <= 0 {
        return;
    }
    let mut interval = tokio::time::interval(HOLD_SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        match reservation::expire_stale_holds(&db, &policy, Utc::now()).await {
            Ok(0) => {}
            Ok(expired) => info!(expired, "Expired stale holds"),
            Err(e) => warn!("Hold sweep failed: {}", e),
        }
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down gracefully..."),
        () = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}
