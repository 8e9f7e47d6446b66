//! Authorization request issuance

use chrono::Duration;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use zkauth_common::{
    AuthorizationRequest, Operator, ProofRequirement, Query, Result, Rules, SchemaRef, SessionId,
    SessionRecord,
};
use zkauth_verifier::circuits::CREDENTIAL_ATOMIC_QUERY_SIG;

use crate::storage::SessionStore;

/// What every issued request asks the prover for
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub reason: String,
    pub message: String,
    pub requirement: ProofRequirement,
}

impl Default for RequestTemplate {
    /// Country code credential issued by any issuer, with `CountryCode == 84`
    fn default() -> Self {
        Self {
            reason: "test flow".to_string(),
            message: "message to sign".to_string(),
            requirement: ProofRequirement {
                id: 1,
                circuit_id: CREDENTIAL_ATOMIC_QUERY_SIG.to_string(),
                rules: Rules {
                    query: Query {
                        allowed_issuers: vec!["*".to_string()],
                        schema: SchemaRef {
                            credential_type: "CountryCodeVerifier1".to_string(),
                            url: "https://s3.eu-west-1.amazonaws.com/polygonid-schemas/75f22464-3c3f-4f2a-9691-10cb27d83e84.json-ld".to_string(),
                        },
                        req: BTreeMap::from([(
                            "CountryCode".to_string(),
                            BTreeMap::from([(Operator::Eq, json!(84))]),
                        )]),
                    },
                },
            },
        }
    }
}

/// Builds and stores authorization requests
pub struct RequestIssuer {
    template: RequestTemplate,
    audience: String,
    callback_uri: String,
    fixed_session: Option<SessionId>,
    ttl: Duration,
    store: Arc<dyn SessionStore>,
}

impl RequestIssuer {
    pub fn new(
        template: RequestTemplate,
        audience: impl Into<String>,
        callback_uri: impl Into<String>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            template,
            audience: audience.into(),
            callback_uri: callback_uri.into(),
            fixed_session: None,
            ttl: Duration::minutes(5),
            store,
        }
    }

    /// Reuse one session id for every request
    pub fn with_fixed_session(mut self, id: Option<SessionId>) -> Self {
        self.fixed_session = id;
        self
    }

    /// Session lifetime, clamped to the largest representable duration
    pub fn with_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.ttl = Duration::from_std(ttl).unwrap_or(Duration::MAX);
        self
    }

    fn next_session(&self) -> SessionId {
        self.fixed_session.clone().unwrap_or_else(SessionId::random)
    }

    /// Build a request for `session`
    pub fn build(&self, session: &SessionId) -> AuthorizationRequest {
        let callback_url = format!("{}?sessionId={}", self.callback_uri, session);

        let mut request = AuthorizationRequest::with_message(
            self.template.reason.clone(),
            self.template.message.clone(),
            self.audience.clone(),
            callback_url,
        );
        request.push_requirement(self.template.requirement.clone());
        request
    }

    /// Issue a request under a new session and store it
    pub async fn issue(&self) -> Result<(SessionId, AuthorizationRequest)> {
        let session = self.next_session();
        let request = self.build(&session);

        self.store
            .put(SessionRecord::issued(session.clone(), request.clone(), self.ttl))
            .await?;

        info!("Issued request {} for session {}", request.id, session);
        Ok((session, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use zkauth_common::SessionState;

    fn issuer(store: Arc<MemoryStore>) -> RequestIssuer {
        RequestIssuer::new(
            RequestTemplate::default(),
            "verifier",
            "http://localhost:8001/api/callback",
            store,
        )
    }

    #[test]
    fn test_default_template() {
        let template = RequestTemplate::default();
        assert_eq!(template.requirement.circuit_id, "credentialAtomicQuerySig");
        assert!(template.requirement.rules.query.accepts_any_issuer());
        assert_eq!(
            template.requirement.rules.query.req["CountryCode"][&Operator::Eq],
            json!(84)
        );
    }

    #[test]
    fn test_build_binds_session() {
        let issuer = issuer(Arc::new(MemoryStore::new()));
        let request = issuer.build(&SessionId::new("abc"));

        assert_eq!(
            request.body.callback_url,
            "http://localhost:8001/api/callback?sessionId=abc"
        );
        assert_eq!(request.from, "verifier");
        assert_eq!(request.body.scope.len(), 1);
        assert_eq!(request.body.message.as_deref(), Some("message to sign"));
    }

    #[tokio::test]
    async fn test_issue_stores_request() {
        let store = Arc::new(MemoryStore::new());
        let issuer = issuer(store.clone());

        let (session, request) = issuer.issue().await.unwrap();
        let record = store.get(&session).await.unwrap().unwrap();

        assert_eq!(record.request, request);
        assert_eq!(record.state, SessionState::Issued);
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_expire_sessions() {
        let store = Arc::new(MemoryStore::new());
        let issuer = issuer(store.clone()).with_ttl(std::time::Duration::from_secs(u64::MAX));

        let (session, _) = issuer.issue().await.unwrap();
        assert!(store.get(&session).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_random_sessions_differ() {
        let issuer = issuer(Arc::new(MemoryStore::new()));

        let (first, _) = issuer.issue().await.unwrap();
        let (second, _) = issuer.issue().await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_fixed_session_overwrites() {
        let store = Arc::new(MemoryStore::new());
        let issuer = issuer(store.clone()).with_fixed_session(Some(SessionId::new("1")));

        let (_, first) = issuer.issue().await.unwrap();
        let (session, second) = issuer.issue().await.unwrap();

        assert_eq!(session, SessionId::new("1"));
        assert_ne!(first.id, second.id);
        assert_eq!(store.get(&session).await.unwrap().unwrap().request, second);
        assert_eq!(store.len().await, 1);
    }
}
