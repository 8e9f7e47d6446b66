//! Session records linking an issued request to its callback

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::AuthorizationRequest;

/// Correlation identifier between a sign-in and its callback
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random session identifier
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SessionState {
    /// Request stored, awaiting callback
    Issued,
    /// Claimed by a callback, verification in progress
    Pending,
    /// Proof accepted
    Verified { subject: String },
    /// Proof rejected
    Failed { reason: String },
}

impl SessionState {
    /// `Verified` and `Failed` never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Verified { .. } | SessionState::Failed { .. })
    }
}

/// Stored session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,

    pub request: AuthorizationRequest,

    pub state: SessionState,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Create a freshly issued record living for `ttl`
    ///
    /// A `ttl` past the representable range never expires.
    pub fn issued(session_id: SessionId, request: AuthorizationRequest, ttl: Duration) -> Self {
        let issued_at = Utc::now();
        Self {
            session_id,
            request,
            state: SessionState::Issued,
            issued_at,
            expires_at: issued_at
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Seconds left before expiry, at least one
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(1) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ttl: Duration) -> SessionRecord {
        let request = AuthorizationRequest::with_message("r", "m", "aud", "https://cb");
        SessionRecord::issued(SessionId::new("1"), request, ttl)
    }

    #[test]
    fn test_issued_record() {
        let record = record(Duration::seconds(300));
        assert_eq!(record.state, SessionState::Issued);
        assert!(!record.is_expired(Utc::now()));
        assert!(record.remaining_secs(Utc::now()) <= 300);
    }

    #[test]
    fn test_expiry() {
        let record = record(Duration::seconds(10));
        assert!(record.is_expired(Utc::now() + Duration::seconds(11)));
        assert_eq!(record.remaining_secs(Utc::now() + Duration::seconds(60)), 1);
    }

    #[test]
    fn test_oversized_ttl_saturates() {
        let record = record(Duration::MAX);
        assert_eq!(record.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(!record.is_expired(Utc::now()));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SessionState::Issued.is_terminal());
        assert!(!SessionState::Pending.is_terminal());
        assert!(SessionState::Verified { subject: "id".into() }.is_terminal());
        assert!(SessionState::Failed { reason: "bad".into() }.is_terminal());
    }

    #[test]
    fn test_state_serialization() {
        let value = serde_json::to_value(SessionState::Verified { subject: "abc".into() }).unwrap();
        assert_eq!(value, serde_json::json!({"status": "verified", "subject": "abc"}));
    }

    #[test]
    fn test_session_id_display() {
        assert_eq!(SessionId::new("42").to_string(), "42");
        assert_ne!(SessionId::random(), SessionId::random());
    }
}
