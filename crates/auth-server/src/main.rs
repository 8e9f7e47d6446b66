//! zkauth Auth Server
//!
//! REST API for zero-knowledge sign-in

use anyhow::{Context, Result};
use auth_server::{
    create_router, AppState, Config, MemoryStore, RedisStore, RequestIssuer, RequestTemplate,
    SessionStore, StoreKind,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zkauth_common::SessionId;
use zkauth_verifier::{
    EthStateResolver, FsKeyLoader, GatewaySchemaLoader, Groth16Verifier, Verifier,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,auth_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting zkauth Auth Server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Configuration loaded - listening on {}", config.api_address());
    info!("Callback URI: {}", config.callback_uri());
    info!("Verification keys: {}", config.keys_dir.display());

    // Initialize session storage
    let store: Arc<dyn SessionStore> = match config.session_store {
        StoreKind::Memory => {
            let store = Arc::new(MemoryStore::new());
            spawn_sweeper(store.clone(), Duration::from_secs(config.session_sweep_secs));
            store
        }
        StoreKind::Redis => Arc::new(
            RedisStore::new(&config.redis_url)
                .await
                .context("Failed to initialize Redis session store")?,
        ),
    };
    info!("Session store: {:?}", config.session_store);

    // Build the verifier once, shared by all callbacks
    let resolver = EthStateResolver::new(config.rpc_url.clone(), &config.state_contract)
        .context("Invalid state contract")?;
    let verifier = Verifier::new(
        Arc::new(FsKeyLoader::new(config.keys_dir.clone())),
        Arc::new(GatewaySchemaLoader::new(config.schema_gateway.clone())),
        Arc::new(resolver),
        Arc::new(Groth16Verifier),
    );
    info!("State contract {} via {}", config.state_contract, config.rpc_url);

    let issuer = RequestIssuer::new(
        RequestTemplate::default(),
        config.verifier_audience.clone(),
        config.callback_uri(),
        store.clone(),
    )
    .with_fixed_session(config.session_id.clone().map(SessionId::new))
    .with_ttl(config.session_ttl());
    if let Some(id) = &config.session_id {
        warn!("Every sign-in reuses session id {}", id);
    }

    // Create application state
    let state = AppState {
        issuer,
        store,
        verifier: Arc::new(verifier),
        verify_timeout: config.verify_timeout(),
    };

    // Create router
    let app = create_router(state);

    // Bind and serve
    let listener = TcpListener::bind(&config.api_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.api_address()))?;

    info!("Auth Server running on http://{}", config.api_address());
    info!("API endpoints:");
    info!("  GET /api/sign-in - Issue authorization request");
    info!("  POST /api/callback?sessionId={{id}} - Verify proof token");
    info!("  GET /api/status?sessionId={{id}} - Session state");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Auth Server stopped");
    Ok(())
}

/// Periodically drop expired in-memory sessions
fn spawn_sweeper(store: Arc<MemoryStore>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(n) => debug!("Purged {} expired sessions", n),
                Err(e) => warn!("Session sweep failed: {}", e),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
