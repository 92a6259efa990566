use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use rabbit_admin_api::app::{router, AppState};
use rabbit_admin_api::auth::{generate_jwt, Claims};
use rabbit_admin_api::config::{self, AppConfig};
use rabbit_admin_api::database::models::User;
use rabbit_admin_api::database::MemoryStore;
use rabbit_admin_api::is_development;
use rabbit_admin_api::types::Role;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SECURITY_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config: AppConfig = config::config().clone();
    tracing::info!("Starting RabbitMQ Admin API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("SECURITY_JWT_SECRET must be set outside development");
    }

    let state = match config.database.url {
        Some(_) => AppState::postgres(config.clone()).await?,
        None => {
            if !is_development!() {
                anyhow::bail!("DATABASE_URL must be set outside development");
            }
            tracing::warn!("DATABASE_URL not set; using the in-memory store");
            seeded_memory_state(config.clone()).await?
        }
    };

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.api.port));
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("RabbitMQ Admin API listening on http://{}", bind_addr);

    axum::serve(
        listener,
        router(state.clone()).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    state.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

/// Development convenience: one administrator and a token to use with it
async fn seeded_memory_state(config: AppConfig) -> anyhow::Result<AppState> {
    let store = Arc::new(MemoryStore::new());
    let admin = User::new("admin", Role::Administrator);
    store.insert_user(admin.clone()).await;

    let claims = Claims::for_principal(&admin.principal(), config.security.jwt_expiry_hours);
    let token = generate_jwt(&claims, &config.security.jwt_secret)?;
    tracing::info!("Seeded development administrator '{}' ({})", admin.username, admin.id);
    tracing::info!("Development token: {}", token);

    Ok(AppState::in_memory(config, store))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
