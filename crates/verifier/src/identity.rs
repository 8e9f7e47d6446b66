//! iden3 identifiers
//!
//! An identifier is 31 bytes: a 2-byte type, 27 bytes of genesis state and a
//! 2-byte checksum. Circuits carry it as a field element holding those bytes
//! in little-endian order; its string form is base58.

use alloy_primitives::U256;
use zkauth_common::{Error, Result};

const ID_LEN: usize = 31;
const GENESIS_LEN: usize = 27;

/// Identity identifier as carried by circuit public signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id([u8; ID_LEN]);

impl Id {
    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Interpret a field element as an identifier
    pub fn from_int(value: U256) -> Result<Self> {
        let le: [u8; 32] = value.to_le_bytes();
        if le[ID_LEN] != 0 {
            return Err(Error::InvalidProof(format!(
                "value {} does not fit an identifier",
                value
            )));
        }

        let mut bytes = [0u8; ID_LEN];
        bytes.copy_from_slice(&le[..ID_LEN]);
        Ok(Self(bytes))
    }

    /// Parse the base58 string form
    pub fn from_base58(s: &str) -> Result<Self> {
        let decoded = bs58::decode(s)
            .into_vec()
            .map_err(|e| Error::InvalidToken(format!("invalid identifier {}: {}", s, e)))?;

        let bytes: [u8; ID_LEN] = decoded.try_into().map_err(|v: Vec<u8>| {
            Error::InvalidToken(format!("identifier {} has {} bytes, expected {}", s, v.len(), ID_LEN))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn to_int(&self) -> U256 {
        U256::from_le_slice(&self.0)
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Identifier type prefix
    pub fn id_type(&self) -> [u8; 2] {
        [self.0[0], self.0[1]]
    }

    /// Build an identifier from its type and genesis bytes, computing the checksum
    pub fn new(id_type: [u8; 2], genesis: [u8; GENESIS_LEN]) -> Self {
        let mut bytes = [0u8; ID_LEN];
        bytes[..2].copy_from_slice(&id_type);
        bytes[2..2 + GENESIS_LEN].copy_from_slice(&genesis);

        let checksum = checksum(&bytes[..2 + GENESIS_LEN]);
        bytes[2 + GENESIS_LEN..].copy_from_slice(&checksum);
        Self(bytes)
    }

    /// Identifier an identity of `id_type` would have with `state` as its genesis state
    pub fn genesis_from_state(id_type: [u8; 2], state: U256) -> Self {
        let state_bytes: [u8; 32] = state.to_le_bytes();
        let mut genesis = [0u8; GENESIS_LEN];
        genesis.copy_from_slice(&state_bytes[32 - GENESIS_LEN..]);
        Self::new(id_type, genesis)
    }

    /// Whether `state` is the genesis state of this identifier
    pub fn is_genesis_state(&self, state: U256) -> bool {
        Self::genesis_from_state(self.id_type(), state) == *self
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

/// Big-endian byte sum over type and genesis
fn checksum(bytes: &[u8]) -> [u8; 2] {
    let sum = bytes.iter().fold(0u16, |acc, b| acc.wrapping_add(*b as u16));
    [(sum >> 8) as u8, (sum & 0xff) as u8]
}
