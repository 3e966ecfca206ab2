use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use isp_api::config::ServerConfig;
use isp_api::router::build_app_router;
use isp_api::state::PgAppState;
use isp_db::PgRecordStore;
use isp_events::EventBus;
use isp_hierarchy::{HierarchyConfig, HierarchyService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "isp_api=debug,isp_hierarchy=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let hierarchy_config = HierarchyConfig::from_env()?;
    tracing::info!(
        store_timeout = ?hierarchy_config.store_timeout,
        cascade_mode = ?hierarchy_config.cascade_mode,
        "Loaded hierarchy configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = isp_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    isp_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    isp_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Hierarchy ---
    let store = Arc::new(PgRecordStore::new(pool));
    let hierarchy = Arc::new(
        HierarchyService::new(store, hierarchy_config).with_events(Arc::clone(&event_bus)),
    );
    if let Some(snapshot) = hierarchy.rebuild().await {
        tracing::info!(
            items = snapshot.index().len(),
            warnings = snapshot.warnings.len(),
            "Initial location hierarchy loaded"
        );
    }
    let listener_handle = hierarchy.spawn_event_listener(&event_bus);

    // --- App state ---
    let state = PgAppState::new(Arc::new(config.clone()), Arc::clone(&hierarchy));
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // The service publishes on the bus it listens to, so the channel never
    // closes on its own while the listener is alive.
    listener_handle.abort();
    tracing::info!("Event listener stopped");

    tracing::info!("Graceful shutdown complete");

    Ok(())
}

/// Wait for SIGINT or SIGTERM to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
