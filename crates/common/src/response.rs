//! Authorization response messages returned by the prover

use serde::{Deserialize, Serialize};

/// Authorization response (iden3comm `authorization/1.0/response`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    #[serde(rename = "type")]
    pub message_type: String,

    /// Thread of the request being answered
    pub thid: String,

    /// Identity of the prover
    pub from: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    pub body: AuthorizationResponseBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResponseBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default)]
    pub scope: Vec<ProofResponse>,
}

/// Proof answering one `ProofRequirement`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofResponse {
    pub id: u32,

    pub circuit_id: String,

    #[serde(flatten)]
    pub zk_proof: ZkProof,
}

impl AuthorizationResponse {
    /// Find the proof answering the requirement with the given id
    pub fn proof_for(&self, requirement_id: u32) -> Option<&ProofResponse> {
        self.body.scope.iter().find(|proof| proof.id == requirement_id)
    }
}

/// Groth16 proof with its public signals, as produced by snarkjs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZkProof {
    pub proof: ProofData,

    /// Public signals as decimal field elements
    pub pub_signals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofData {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "groth16".to_string()
}
