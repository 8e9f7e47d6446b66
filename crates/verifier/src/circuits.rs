//! Public signal layouts of the supported circuits

use alloy_primitives::U256;
use zkauth_common::{Error, Result};

use crate::identity::Id;

/// Authentication circuit proving control of an identity
pub const AUTH: &str = "auth";

/// Atomic credential query over a signature-issued claim
pub const CREDENTIAL_ATOMIC_QUERY_SIG: &str = "credentialAtomicQuerySig";

/// Number of value slots a query circuit compares against
pub const VALUE_ARRAY_SIZE: usize = 64;

/// Parse decimal field elements
pub fn parse_signals(signals: &[String]) -> Result<Vec<U256>> {
    signals
        .iter()
        .map(|s| {
            U256::from_str_radix(s, 10)
                .map_err(|e| Error::InvalidProof(format!("invalid public signal {}: {}", s, e)))
        })
        .collect()
}

fn expect_len(circuit: &str, signals: &[U256], expected: usize) -> Result<()> {
    if signals.len() != expected {
        return Err(Error::InvalidProof(format!(
            "{} expects {} public signals, got {}",
            circuit,
            expected,
            signals.len()
        )));
    }
    Ok(())
}

fn to_u64(circuit: &str, name: &str, value: U256) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| Error::InvalidProof(format!("{} signal {} out of range: {}", circuit, name, value)))
}

/// `auth` outputs: `[challenge, userState, userID]`
#[derive(Debug, Clone, PartialEq)]
pub struct AuthPubSignals {
    pub challenge: U256,
    pub user_state: U256,
    pub user_id: Id,
}

impl AuthPubSignals {
    pub fn parse(signals: &[String]) -> Result<Self> {
        let signals = parse_signals(signals)?;
        expect_len(AUTH, &signals, 3)?;

        Ok(Self {
            challenge: signals[0],
            user_state: signals[1],
            user_id: Id::from_int(signals[2])?,
        })
    }
}

/// `credentialAtomicQuerySig` outputs:
/// `[issuerAuthState, userID, userState, challenge, issuerID,
/// issuerClaimNonRevState, timestamp, claimSchema, slotIndex, operator,
/// value[64]]`
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicQuerySigPubSignals {
    pub issuer_auth_state: U256,
    pub user_id: Id,
    pub user_state: U256,
    pub challenge: U256,
    pub issuer_id: Id,
    pub issuer_claim_non_rev_state: U256,
    pub timestamp: u64,
    pub claim_schema: U256,
    pub slot_index: u64,
    pub operator: u64,
    pub values: Vec<U256>,
}

impl AtomicQuerySigPubSignals {
    pub const LEN: usize = 10 + VALUE_ARRAY_SIZE;

    pub fn parse(signals: &[String]) -> Result<Self> {
        let circuit = CREDENTIAL_ATOMIC_QUERY_SIG;
        let signals = parse_signals(signals)?;
        expect_len(circuit, &signals, Self::LEN)?;

        Ok(Self {
            issuer_auth_state: signals[0],
            user_id: Id::from_int(signals[1])?,
            user_state: signals[2],
            challenge: signals[3],
            issuer_id: Id::from_int(signals[4])?,
            issuer_claim_non_rev_state: signals[5],
            timestamp: to_u64(circuit, "timestamp", signals[6])?,
            claim_schema: signals[7],
            slot_index: to_u64(circuit, "slotIndex", signals[8])?,
            operator: to_u64(circuit, "operator", signals[9])?,
            values: signals[10..].to_vec(),
        })
    }
}
