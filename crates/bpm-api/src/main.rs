use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use bpm_api::logging::{init_tracing, LogConfig};
use bpm_api::{build_router, AdminService, AppState, JwtVerifier, ServerConfig};
use bpm_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let log_config = LogConfig::from_env();
    let _file_guard = init_tracing(&log_config);
    info!(
        log_format = ?log_config.format,
        log_file = log_config.file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = ServerConfig::from_env().context("invalid configuration")?;
    info!(config = ?config, "Configuration loaded");

    let db = Database::connect_with(&config.database_url, config.pool_settings())
        .await
        .context("failed to connect to database")?;
    db.pool_stats().log();

    if config.run_migrations {
        db.migrate().await.context("failed to run migrations")?;
        info!(subsystem = "db", component = "migrations", "Migrations applied");
    }

    let verifier = JwtVerifier::new(config.jwt_secret.as_bytes());
    let state = AppState::new(AdminService::new(db.clone()), Arc::new(verifier));
    let app = build_router(state, &config.allowed_origins);

    let addr = config.socket_addr()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, closing database pool");
    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
