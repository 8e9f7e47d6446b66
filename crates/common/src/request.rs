//! Authorization request messages sent to the prover

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{AUTHORIZATION_REQUEST_TYPE, MEDIA_TYPE_PLAIN};

/// Authorization request (iden3comm `authorization/1.0/request`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Message identifier
    pub id: String,

    /// Thread identifier, echoed back by the response
    pub thid: String,

    /// Verifier identifier (audience)
    pub from: String,

    /// Media type
    pub typ: String,

    /// Protocol message type
    #[serde(rename = "type")]
    pub message_type: String,

    pub body: AuthorizationRequestBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequestBody {
    /// Where the prover posts the proof token
    #[serde(rename = "callbackUrl")]
    pub callback_url: String,

    /// Human-readable reason shown to the user
    pub reason: String,

    /// Message the prover signs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Proof requirements
    #[serde(default)]
    pub scope: Vec<ProofRequirement>,
}

/// A single proof the prover has to supply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofRequirement {
    /// Requirement identifier, matched against `ProofResponse::id`
    pub id: u32,

    /// Circuit that verifies the proof
    pub circuit_id: String,

    pub rules: Rules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rules {
    pub query: Query,
}

/// Declarative credential query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Accepted issuer identifiers; `*` accepts any issuer
    #[serde(rename = "allowedIssuers")]
    pub allowed_issuers: Vec<String>,

    pub schema: SchemaRef,

    /// Field predicates, e.g. `{"CountryCode": {"$eq": 84}}`
    #[serde(default)]
    pub req: BTreeMap<String, BTreeMap<Operator, Value>>,
}

impl Query {
    /// Whether any issuer is accepted
    pub fn accepts_any_issuer(&self) -> bool {
        self.allowed_issuers.iter().any(|issuer| issuer == "*")
    }
}

/// Credential schema reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRef {
    /// Credential type inside the schema document
    #[serde(rename = "type")]
    pub credential_type: String,

    /// Location of the schema document
    pub url: String,
}

/// Query operators with their circuit encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "$noop")]
    Noop,
    #[serde(rename = "$eq")]
    Eq,
    #[serde(rename = "$lt")]
    Lt,
    #[serde(rename = "$gt")]
    Gt,
    #[serde(rename = "$in")]
    In,
    #[serde(rename = "$nin")]
    Nin,
}

impl Operator {
    /// Numeric code the circuits use for this operator
    pub fn code(&self) -> u64 {
        match self {
            Operator::Noop => 0,
            Operator::Eq => 1,
            Operator::Lt => 2,
            Operator::Gt => 3,
            Operator::In => 4,
            Operator::Nin => 5,
        }
    }
}

impl AuthorizationRequest {
    /// Create a request carrying a message to sign and an empty scope
    pub fn with_message(
        reason: impl Into<String>,
        message: impl Into<String>,
        audience: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        let id = Uuid::new_v4().to_string();

        Self {
            thid: id.clone(),
            id,
            from: audience.into(),
            typ: MEDIA_TYPE_PLAIN.to_string(),
            message_type: AUTHORIZATION_REQUEST_TYPE.to_string(),
            body: AuthorizationRequestBody {
                callback_url: callback_url.into(),
                reason: reason.into(),
                message: Some(message.into()),
                scope: Vec::new(),
            },
        }
    }

    /// Append a proof requirement to the scope
    pub fn push_requirement(&mut self, requirement: ProofRequirement) {
        self.body.scope.push(requirement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn country_code_requirement() -> ProofRequirement {
        let mut req = BTreeMap::new();
        req.insert(
            "CountryCode".to_string(),
            BTreeMap::from([(Operator::Eq, json!(84))]),
        );

        ProofRequirement {
            id: 1,
            circuit_id: "credentialAtomicQuerySig".to_string(),
            rules: Rules {
                query: Query {
                    allowed_issuers: vec!["*".to_string()],
                    schema: SchemaRef {
                        credential_type: "CountryCodeVerifier1".to_string(),
                        url: "https://example.com/schema.json-ld".to_string(),
                    },
                    req,
                },
            },
        }
    }

    #[test]
    fn test_with_message() {
        let request = AuthorizationRequest::with_message(
            "test flow",
            "message to sign",
            "verifier-id",
            "https://host/api/callback?sessionId=1",
        );

        assert_eq!(request.id, request.thid);
        assert_eq!(request.from, "verifier-id");
        assert_eq!(request.message_type, AUTHORIZATION_REQUEST_TYPE);
        assert_eq!(request.body.message.as_deref(), Some("message to sign"));
        assert!(request.body.scope.is_empty());
    }

    #[test]
    fn test_wire_format() {
        let mut request = AuthorizationRequest::with_message("r", "m", "aud", "https://cb");
        request.push_requirement(country_code_requirement());

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], AUTHORIZATION_REQUEST_TYPE);
        assert_eq!(value["body"]["callbackUrl"], "https://cb");

        let scope = &value["body"]["scope"][0];
        assert_eq!(scope["circuit_id"], "credentialAtomicQuerySig");
        assert_eq!(scope["rules"]["query"]["allowedIssuers"], json!(["*"]));
        assert_eq!(scope["rules"]["query"]["schema"]["type"], "CountryCodeVerifier1");
        assert_eq!(scope["rules"]["query"]["req"]["CountryCode"]["$eq"], 84);
    }

    #[test]
    fn test_operator_codes() {
        assert_eq!(Operator::Noop.code(), 0);
        assert_eq!(Operator::Eq.code(), 1);
        assert_eq!(Operator::Nin.code(), 5);
    }

    #[test]
    fn test_accepts_any_issuer() {
        let mut query = country_code_requirement().rules.query;
        assert!(query.accepts_any_issuer());

        query.allowed_issuers = vec!["113TCVw5KMeMp99Qdvub9Mssfz7krL9jWNvbdB7Fd2".to_string()];
        assert!(!query.accepts_any_issuer());
    }
}
