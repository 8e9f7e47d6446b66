//! Full authorization response verification

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use zkauth_common::{
    AuthorizationRequest, AuthorizationResponse, Error, ProofRequirement, Result, ZkProof,
    AUTHORIZATION_RESPONSE_TYPE,
};

use crate::circuits::{AtomicQuerySigPubSignals, AuthPubSignals, AUTH, CREDENTIAL_ATOMIC_QUERY_SIG};
use crate::groth16::ZkpVerifier;
use crate::identity::Id;
use crate::jwz::{Token, ALG_GROTH16};
use crate::keys::KeyLoader;
use crate::query::verify_sig_query;
use crate::resolver::{ResolvedState, StateResolver};
use crate::schema::SchemaLoader;

/// How long a replaced issuer non-revocation state is still accepted
pub const NON_REV_STATE_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Checks a proof token against the request it answers
#[async_trait]
pub trait ProofVerifier: Send + Sync {
    /// Verify `token` and return the authorization response it carries
    async fn full_verify(
        &self,
        token: &str,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationResponse>;
}

/// iden3 authorization verifier
pub struct Verifier {
    keys: Arc<dyn KeyLoader>,
    schemas: Arc<dyn SchemaLoader>,
    states: Arc<dyn StateResolver>,
    zkp: Arc<dyn ZkpVerifier>,
    non_rev_state_max_age: Duration,
}

impl Verifier {
    pub fn new(
        keys: Arc<dyn KeyLoader>,
        schemas: Arc<dyn SchemaLoader>,
        states: Arc<dyn StateResolver>,
        zkp: Arc<dyn ZkpVerifier>,
    ) -> Self {
        Self {
            keys,
            schemas,
            states,
            zkp,
            non_rev_state_max_age: NON_REV_STATE_MAX_AGE,
        }
    }

    pub fn with_non_rev_state_max_age(mut self, max_age: Duration) -> Self {
        self.non_rev_state_max_age = max_age;
        self
    }

    async fn verify_proof(&self, circuit_id: &str, proof: &ZkProof) -> Result<()> {
        let key = self.keys.load(circuit_id).await?;
        self.zkp.verify(proof, &key)
    }

    /// Verify the token's own auth proof and return its signals
    async fn verify_auth(&self, token: &Token) -> Result<AuthPubSignals> {
        if token.header.alg != ALG_GROTH16 {
            return Err(Error::InvalidToken(format!(
                "unsupported algorithm: {}",
                token.header.alg
            )));
        }
        if token.header.circuit_id != AUTH {
            return Err(Error::CircuitMismatch {
                expected: AUTH.to_string(),
                actual: token.header.circuit_id.clone(),
            });
        }

        self.verify_proof(AUTH, &token.zk_proof).await?;

        let signals = AuthPubSignals::parse(&token.zk_proof.pub_signals)?;
        if signals.challenge != token.challenge() {
            return Err(Error::InvalidProof(
                "auth proof does not commit to the token message".to_string(),
            ));
        }

        self.states.resolve(&signals.user_id, signals.user_state).await?;

        Ok(signals)
    }

    async fn verify_requirement(
        &self,
        requirement: &ProofRequirement,
        response: &AuthorizationResponse,
        user: &Id,
    ) -> Result<()> {
        let proof = response
            .proof_for(requirement.id)
            .ok_or(Error::MissingProof(requirement.id))?;

        if proof.circuit_id != requirement.circuit_id {
            return Err(Error::CircuitMismatch {
                expected: requirement.circuit_id.clone(),
                actual: proof.circuit_id.clone(),
            });
        }

        // Only sig queries carry a query the verifier knows how to check
        if proof.circuit_id != CREDENTIAL_ATOMIC_QUERY_SIG {
            return Err(Error::InvalidProof(format!(
                "unsupported circuit: {}",
                proof.circuit_id
            )));
        }

        self.verify_proof(&proof.circuit_id, &proof.zk_proof).await?;

        let signals = AtomicQuerySigPubSignals::parse(&proof.zk_proof.pub_signals)?;
        verify_sig_query(&requirement.rules.query, &signals, self.schemas.as_ref()).await?;

        self.states
            .resolve(&signals.issuer_id, signals.issuer_auth_state)
            .await?;
        let non_rev = self
            .states
            .resolve(&signals.issuer_id, signals.issuer_claim_non_rev_state)
            .await?;
        self.check_non_rev_state(&non_rev, unix_now())?;

        if signals.user_id != *user {
            return Err(Error::InvalidProof(format!(
                "proof {} was generated for {}, not {}",
                requirement.id, signals.user_id, user
            )));
        }

        debug!("Requirement {} satisfied by {}", requirement.id, user);
        Ok(())
    }

    fn check_non_rev_state(&self, resolved: &ResolvedState, now: u64) -> Result<()> {
        if resolved.latest {
            return Ok(());
        }

        let age = now.saturating_sub(resolved.transition_timestamp);
        if age > self.non_rev_state_max_age.as_secs() {
            return Err(Error::StateResolution(format!(
                "issuer non-revocation state {} was replaced {}s ago",
                resolved.state, age
            )));
        }
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Check the response envelope against the request
fn check_message(
    response: &AuthorizationResponse,
    request: &AuthorizationRequest,
    user: &Id,
) -> Result<()> {
    if response.message_type != AUTHORIZATION_RESPONSE_TYPE {
        return Err(Error::MessageMismatch(format!(
            "unexpected message type: {}",
            response.message_type
        )));
    }
    if response.thid != request.thid {
        return Err(Error::MessageMismatch(format!(
            "response thread {} does not answer request {}",
            response.thid, request.thid
        )));
    }
    if response.body.message != request.body.message {
        return Err(Error::MessageMismatch(
            "signed message differs from the requested one".to_string(),
        ));
    }
    if response.from != user.to_base58() {
        return Err(Error::MessageMismatch(format!(
            "sender {} is not the proving identity {}",
            response.from, user
        )));
    }
    Ok(())
}

#[async_trait]
impl ProofVerifier for Verifier {
    async fn full_verify(
        &self,
        token: &str,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationResponse> {
        let token = Token::parse(token)?;
        let auth = self.verify_auth(&token).await?;

        let response = token.message()?;
        check_message(&response, request, &auth.user_id)?;

        for requirement in &request.body.scope {
            if let Err(e) = self.verify_requirement(requirement, &response, &auth.user_id).await {
                warn!("Requirement {} rejected: {}", requirement.id, e);
                return Err(e);
            }
        }

        info!(
            "Verified {} proof(s) from {}",
            request.body.scope.len(),
            auth.user_id
        );
        Ok(response)
    }
}
