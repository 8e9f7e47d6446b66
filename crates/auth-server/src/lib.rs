//! zkauth Auth Server
//!
//! Issues iden3 authorization requests and verifies the zero-knowledge proof
//! tokens posted back for them.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /api/sign-in` - Issue an authorization request for a new session
//! - `POST /api/callback?sessionId=<id>` - Verify a proof token for a session
//! - `GET /api/status?sessionId=<id>` - Session state for polling clients

pub mod config;
pub mod handlers;
pub mod issuer;
pub mod redis_store;
pub mod storage;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::{Config, StoreKind};
pub use handlers::AppState;
pub use issuer::{RequestIssuer, RequestTemplate};
pub use redis_store::RedisStore;
pub use storage::{MemoryStore, SessionStore};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/sign-in", get(handlers::sign_in_handler))
        .route(config::CALLBACK_PATH, post(handlers::callback_handler))
        .route("/api/status", get(handlers::status_handler))
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
