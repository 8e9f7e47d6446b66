//! JSON Web Zero-knowledge (JWZ) tokens
//!
//! Compact form: `base64url(header).base64url(payload).base64url(zkproof)`.
//! The proof's challenge signal binds it to the SHA-256 of the first two
//! segments, reduced into the BN254 scalar field.

use alloy_primitives::{uint, U256};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zkauth_common::{AuthorizationResponse, Error, Result, ZkProof, MEDIA_TYPE_ZKP};

/// Order of the BN254 scalar field
pub const BN254_SCALAR_MODULUS: U256 =
    uint!(21888242871839275222246405745257275088548364400416034343698204186575808495617_U256);

/// Only supported proving algorithm
pub const ALG_GROTH16: &str = "groth16";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,

    #[serde(rename = "circuitId")]
    pub circuit_id: String,

    #[serde(default)]
    pub crit: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

impl Header {
    pub fn groth16(circuit_id: impl Into<String>) -> Self {
        Self {
            alg: ALG_GROTH16.to_string(),
            circuit_id: circuit_id.into(),
            crit: vec!["circuitId".to_string()],
            typ: Some(MEDIA_TYPE_ZKP.to_string()),
        }
    }
}

/// Parsed JWZ token
#[derive(Debug, Clone)]
pub struct Token {
    pub header: Header,
    pub zk_proof: ZkProof,
    header_b64: String,
    payload_b64: String,
    payload: Vec<u8>,
}

fn decode_segment(name: &str, segment: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| Error::InvalidToken(format!("{} is not base64url: {}", name, e)))
}

impl Token {
    /// Parse the compact serialization
    pub fn parse(token: &str) -> Result<Self> {
        let segments: Vec<&str> = token.trim().split('.').collect();
        if segments.len() != 3 {
            return Err(Error::InvalidToken(format!(
                "expected 3 segments, got {}",
                segments.len()
            )));
        }

        let header: Header = serde_json::from_slice(&decode_segment("header", segments[0])?)
            .map_err(|e| Error::InvalidToken(format!("malformed header: {}", e)))?;
        let payload = decode_segment("payload", segments[1])?;
        let zk_proof: ZkProof = serde_json::from_slice(&decode_segment("proof", segments[2])?)
            .map_err(|e| Error::InvalidToken(format!("malformed proof: {}", e)))?;

        if !header.crit.iter().all(|name| name == "circuitId") {
            return Err(Error::InvalidToken(format!(
                "unsupported critical headers: {:?}",
                header.crit
            )));
        }

        Ok(Self {
            header,
            zk_proof,
            header_b64: segments[0].to_string(),
            payload_b64: segments[1].to_string(),
            payload,
        })
    }

    /// Compose a token from its parts
    pub fn compose(header: &Header, payload: &[u8], zk_proof: &ZkProof) -> Result<String> {
        Ok(format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(header)?),
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(zk_proof)?)
        ))
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decode the payload as an authorization response
    pub fn message(&self) -> Result<AuthorizationResponse> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| Error::InvalidToken(format!("payload is not an authorization response: {}", e)))
    }

    /// SHA-256 over the signed part of the token
    pub fn message_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.header_b64.as_bytes());
        hasher.update(b".");
        hasher.update(self.payload_b64.as_bytes());
        hasher.finalize().into()
    }

    /// Challenge the proof has to commit to
    pub fn challenge(&self) -> U256 {
        challenge_for(self.message_hash())
    }
}

/// Reduce a message hash into the scalar field
pub fn challenge_for(hash: [u8; 32]) -> U256 {
    U256::from_be_bytes(hash) % BN254_SCALAR_MODULUS
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use zkauth_common::response::ProofData;

    pub fn dummy_proof(pub_signals: Vec<String>) -> ZkProof {
        ZkProof {
            proof: ProofData {
                pi_a: vec!["1".into(), "2".into(), "1".into()],
                pi_b: vec![
                    vec!["1".into(), "0".into()],
                    vec!["1".into(), "0".into()],
                    vec!["1".into(), "0".into()],
                ],
                pi_c: vec!["1".into(), "2".into(), "1".into()],
                protocol: "groth16".into(),
            },
            pub_signals,
        }
    }

    fn payload() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "1",
            "type": "https://iden3-communication.io/authorization/1.0/response",
            "thid": "thread",
            "from": "113TCVw5KMeMp99Qdvub9Mssfz7krL9jWNvbdB7Fd2",
            "body": {"message": "message to sign", "scope": []}
        }))
        .unwrap()
    }

    #[test]
    fn test_compose_and_parse() {
        let header = Header::groth16("auth");
        let proof = dummy_proof(vec!["1".into()]);
        let token = Token::compose(&header, &payload(), &proof).unwrap();

        let parsed = Token::parse(&token).unwrap();
        assert_eq!(parsed.header, header);
        assert_eq!(parsed.zk_proof, proof);
        assert_eq!(parsed.message().unwrap().thid, "thread");
    }

    #[test]
    fn test_parse_rejects_bad_segments() {
        assert!(matches!(Token::parse("a.b"), Err(Error::InvalidToken(_))));
        assert!(matches!(Token::parse("!!.b.c"), Err(Error::InvalidToken(_))));
    }

    #[test]
    fn test_parse_rejects_unknown_critical_header() {
        let mut header = Header::groth16("auth");
        header.crit.push("exp".into());
        let token = Token::compose(&header, &payload(), &dummy_proof(vec![])).unwrap();

        assert!(Token::parse(&token).is_err());
    }

    #[test]
    fn test_challenge_is_bound_to_payload() {
        let header = Header::groth16("auth");
        let proof = dummy_proof(vec![]);
        let a = Token::parse(&Token::compose(&header, &payload(), &proof).unwrap()).unwrap();
        let b = Token::parse(&Token::compose(&header, b"{}", &proof).unwrap()).unwrap();

        assert_ne!(a.challenge(), b.challenge());
        assert!(a.challenge() < BN254_SCALAR_MODULUS);
    }

    #[test]
    fn test_challenge_reduction() {
        assert_eq!(
            challenge_for([0xff; 32]),
            U256::MAX % BN254_SCALAR_MODULUS
        );
        assert_eq!(challenge_for([0; 32]), U256::ZERO);
    }
}
