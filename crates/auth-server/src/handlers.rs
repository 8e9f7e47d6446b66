//! API request handlers for the auth server

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use zkauth_common::{AuthorizationRequest, Error, SessionId, SessionState};
use zkauth_verifier::ProofVerifier;

use crate::issuer::RequestIssuer;
use crate::storage::SessionStore;

/// Shared application state
pub struct AppState {
    pub issuer: RequestIssuer,
    pub store: Arc<dyn SessionStore>,
    pub verifier: Arc<dyn ProofVerifier>,
    pub verify_timeout: Duration,
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Error::SessionAlreadyConsumed(_) => StatusCode::CONFLICT,
            Error::MissingParameter(_) => StatusCode::BAD_REQUEST,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

/// `?sessionId=` query parameter
#[derive(Debug, Deserialize)]
pub struct SessionParams {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

impl SessionParams {
    fn require(self) -> Result<SessionId, ApiError> {
        match self.session_id {
            Some(id) if !id.is_empty() => Ok(SessionId::new(id)),
            _ => Err(Error::MissingParameter("sessionId".to_string()).into()),
        }
    }
}

/// Session status response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub session_id: SessionId,
    pub state: SessionState,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "auth-server"
    }))
}

/// Issue an authorization request bound to a new session
pub async fn sign_in_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AuthorizationRequest>, ApiError> {
    let (session, request) = state.issuer.issue().await.map_err(|e| {
        error!("Failed to store session: {}", e);
        ApiError::from(e)
    })?;

    info!("Sign-in started for session {}", session);
    Ok(Json(request))
}

/// Verify the proof token posted for a session
pub async fn callback_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SessionParams>,
    token: String,
) -> Result<String, ApiError> {
    let session = params.require()?;
    if token.trim().is_empty() {
        return Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            message: "Empty proof token".to_string(),
        });
    }

    info!("Callback received for session {}", session);
    let record = state.store.consume(&session).await.map_err(|e| {
        warn!("Rejected callback for session {}: {}", session, e);
        ApiError::from(e)
    })?;
    let request_id = record.request.id.clone();

    let outcome = tokio::time::timeout(
        state.verify_timeout,
        state.verifier.full_verify(&token, &record.request),
    )
    .await
    .unwrap_or_else(|_| Err(Error::Timeout(state.verify_timeout)));

    match outcome {
        Ok(response) => {
            info!("Session {} authenticated as {}", session, response.from);
            record_outcome(
                &state,
                &session,
                &request_id,
                SessionState::Verified {
                    subject: response.from.clone(),
                },
            )
            .await;

            Ok(format!(
                "user with ID: {} successfully authenticated",
                response.from
            ))
        }
        Err(e) => {
            error!("Verification failed for session {}: {}", session, e);
            record_outcome(
                &state,
                &session,
                &request_id,
                SessionState::Failed {
                    reason: e.to_string(),
                },
            )
            .await;

            Err(e.into())
        }
    }
}

async fn record_outcome(state: &AppState, session: &SessionId, request_id: &str, outcome: SessionState) {
    if let Err(e) = state.store.complete(session, request_id, outcome).await {
        warn!("Failed to record outcome for session {}: {}", session, e);
    }
}

/// Current state of a session
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SessionParams>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let session = params.require()?;

    let record = state
        .store
        .get(&session)
        .await?
        .ok_or_else(|| Error::SessionNotFound(session.to_string()))?;

    Ok(Json(SessionStatusResponse {
        session_id: record.session_id,
        state: record.state,
        issued_at: record.issued_at,
        expires_at: record.expires_at,
    }))
}
