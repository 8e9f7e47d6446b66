use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already consumed: {0}")]
    SessionAlreadyConsumed(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    #[error("Message mismatch: {0}")]
    MessageMismatch(String),

    #[error("No proof in response for requirement {0}")]
    MissingProof(u32),

    #[error("Circuit mismatch: requested {expected}, got {actual}")]
    CircuitMismatch { expected: String, actual: String },

    #[error("Query not satisfied: {0}")]
    QueryMismatch(String),

    #[error("State resolution failed: {0}")]
    StateResolution(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Verification key not found for circuit: {0}")]
    KeyNotFound(String),

    #[error("Verification timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether the error was raised while checking a proof token against its
    /// request, as opposed to a session or infrastructure failure
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Error::InvalidToken(_)
                | Error::InvalidProof(_)
                | Error::MessageMismatch(_)
                | Error::MissingProof(_)
                | Error::CircuitMismatch { .. }
                | Error::QueryMismatch(_)
                | Error::StateResolution(_)
                | Error::Schema(_)
                | Error::KeyNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_failure_classification() {
        assert!(Error::InvalidProof("bad".into()).is_verification_failure());
        assert!(Error::MissingProof(1).is_verification_failure());
        assert!(!Error::SessionNotFound("1".into()).is_verification_failure());
        assert!(!Error::Redis("down".into()).is_verification_failure());
    }

    #[test]
    fn test_circuit_mismatch_message() {
        let err = Error::CircuitMismatch {
            expected: "credentialAtomicQuerySig".into(),
            actual: "credentialAtomicQueryMTP".into(),
        };
        assert_eq!(
            err.to_string(),
            "Circuit mismatch: requested credentialAtomicQuerySig, got credentialAtomicQueryMTP"
        );
    }

    #[test]
    fn test_timeout_message_keeps_sub_second_precision() {
        let err = Error::Timeout(std::time::Duration::from_millis(20));
        assert_eq!(err.to_string(), "Verification timed out after 20ms");
    }
}
