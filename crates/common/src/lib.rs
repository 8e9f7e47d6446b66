pub mod error;
pub mod request;
pub mod response;
pub mod session;

pub use error::{Error, Result};
pub use request::{
    AuthorizationRequest, AuthorizationRequestBody, Operator, ProofRequirement, Query, Rules,
    SchemaRef,
};
pub use response::{AuthorizationResponse, AuthorizationResponseBody, ProofResponse, ZkProof};
pub use session::{SessionId, SessionRecord, SessionState};

/// iden3comm media type for unencrypted, unsigned messages
pub const MEDIA_TYPE_PLAIN: &str = "application/iden3comm-plain-json";

/// iden3comm media type for zero-knowledge (JWZ) messages
pub const MEDIA_TYPE_ZKP: &str = "application/iden3-zkp-json";

/// Protocol message type of an authorization request
pub const AUTHORIZATION_REQUEST_TYPE: &str =
    "https://iden3-communication.io/authorization/1.0/request";

/// Protocol message type of an authorization response
pub const AUTHORIZATION_RESPONSE_TYPE: &str =
    "https://iden3-communication.io/authorization/1.0/response";
