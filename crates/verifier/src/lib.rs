//! zkauth verifier
//!
//! Checks iden3 JWZ authorization responses: the token's auth proof, the
//! response envelope, and every credential query proof the request asked for.
//! Keys, schemas and identity states come from pluggable loaders.

pub mod circuits;
pub mod groth16;
pub mod identity;
pub mod jwz;
pub mod keys;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod verifier;

pub use groth16::{Groth16Verifier, ZkpVerifier};
pub use identity::Id;
pub use jwz::{Header, Token};
pub use keys::{FsKeyLoader, KeyLoader};
pub use resolver::{EthStateResolver, ResolvedState, StateResolver};
pub use schema::{GatewaySchemaLoader, SchemaLoader};
pub use verifier::{ProofVerifier, Verifier};
