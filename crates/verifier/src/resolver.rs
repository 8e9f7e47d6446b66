//! On-chain identity state resolution

use alloy_primitives::{keccak256, Address, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use zkauth_common::{Error, Result};

use crate::identity::Id;

/// Outcome of resolving an identity state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedState {
    pub state: U256,
    /// State is the one currently published for the identity
    pub latest: bool,
    /// Identity never published a state and this is its genesis state
    pub genesis: bool,
    /// When the state was replaced, zero for latest states
    pub transition_timestamp: u64,
}

/// Source of published identity states
#[async_trait]
pub trait StateResolver: Send + Sync {
    /// Check that `state` is or was a valid state of `id`
    async fn resolve(&self, id: &Id, state: U256) -> Result<ResolvedState>;
}

/// Reads the identity state contract through JSON-RPC `eth_call`
pub struct EthStateResolver {
    rpc_url: String,
    contract: Address,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
}

/// Four-byte function selector
fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// ABI-encode a call taking only `uint256` arguments
pub fn encode_call(signature: &str, args: &[U256]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    for arg in args {
        data.extend_from_slice(&arg.to_be_bytes::<32>());
    }
    data
}

/// Split ABI return data into 32-byte words
pub fn decode_words(data: &[u8]) -> Result<Vec<U256>> {
    if data.len() % 32 != 0 {
        return Err(Error::StateResolution(format!(
            "return data length {} is not a multiple of 32",
            data.len()
        )));
    }
    Ok(data.chunks(32).map(U256::from_be_slice).collect())
}

impl EthStateResolver {
    pub fn new(rpc_url: impl Into<String>, contract: &str) -> Result<Self> {
        let contract: Address = contract
            .parse()
            .map_err(|e| Error::StateResolution(format!("invalid contract address {}: {}", contract, e)))?;

        Ok(Self {
            rpc_url: rpc_url.into(),
            contract,
            client: reqwest::Client::new(),
        })
    }

    async fn eth_call(&self, data: Vec<u8>) -> Result<Vec<U256>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                { "to": self.contract.to_string(), "data": format!("0x{}", hex::encode(data)) },
                "latest"
            ]
        });

        let response: RpcResponse = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if let Some(error) = response.error {
            return Err(Error::StateResolution(error.message));
        }

        let result = response
            .result
            .ok_or_else(|| Error::StateResolution("empty eth_call result".to_string()))?;
        let bytes = hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| Error::StateResolution(format!("invalid eth_call result: {}", e)))?;

        decode_words(&bytes)
    }

    async fn latest_state(&self, id: &Id) -> Result<U256> {
        let words = self.eth_call(encode_call("getState(uint256)", &[id.to_int()])).await?;
        words
            .first()
            .copied()
            .ok_or_else(|| Error::StateResolution("getState returned no data".to_string()))
    }

    /// `(replacedAtTimestamp, createdAtTimestamp, replacedAtBlock, createdAtBlock, id, replacedBy)`
    async fn transition_info(&self, state: U256) -> Result<Vec<U256>> {
        let words = self
            .eth_call(encode_call("getTransitionInfo(uint256)", &[state]))
            .await?;
        if words.len() < 6 {
            return Err(Error::StateResolution(format!(
                "getTransitionInfo returned {} words",
                words.len()
            )));
        }
        Ok(words)
    }
}

#[async_trait]
impl StateResolver for EthStateResolver {
    async fn resolve(&self, id: &Id, state: U256) -> Result<ResolvedState> {
        debug!("Resolving state {} for identity {}", state, id);

        let published = self.latest_state(id).await?;
        resolve_with(id, state, published, || self.transition_info(state)).await
    }
}

/// Resolution rules given the currently published state
async fn resolve_with<F, Fut>(
    id: &Id,
    state: U256,
    published: U256,
    transition_info: F,
) -> Result<ResolvedState>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<Vec<U256>>>,
{
    if published.is_zero() {
        if !id.is_genesis_state(state) {
            return Err(Error::StateResolution(format!(
                "state {} is not genesis and not published for {}",
                state, id
            )));
        }
        return Ok(ResolvedState {
            state,
            latest: true,
            genesis: true,
            transition_timestamp: 0,
        });
    }

    if published == state {
        return Ok(ResolvedState {
            state,
            latest: true,
            genesis: false,
            transition_timestamp: 0,
        });
    }

    let info = transition_info().await?;
    if info[4].is_zero() || info[4] != id.to_int() {
        return Err(Error::StateResolution(format!(
            "transition info for state {} has invalid id",
            state
        )));
    }
    if info[0].is_zero() {
        return Err(Error::StateResolution(format!(
            "no transition recorded for non-latest state {}",
            state
        )));
    }

    Ok(ResolvedState {
        state,
        latest: false,
        genesis: false,
        transition_timestamp: u64::try_from(info[0]).map_err(|_| {
            Error::StateResolution(format!("transition timestamp out of range: {}", info[0]))
        })?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_id() -> Id {
        Id::from_base58("113TCVw5KMeMp99Qdvub9Mssfz7krL9jWNvbdB7Fd2").unwrap()
    }

    #[test]
    fn test_encode_call() {
        let data = encode_call("getState(uint256)", &[U256::from(1u64)]);
        assert_eq!(data.len(), 36);
        assert_eq!(data[..4], selector("getState(uint256)"));
        assert_eq!(data[35], 1);
        assert!(data[4..35].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_decode_words() {
        let mut data = vec![0u8; 64];
        data[31] = 7;
        data[63] = 9;
        assert_eq!(decode_words(&data).unwrap(), vec![U256::from(7u64), U256::from(9u64)]);
        assert!(decode_words(&[0u8; 33]).is_err());
    }

    #[test]
    fn test_invalid_contract_address() {
        assert!(EthStateResolver::new("http://localhost:8545", "0x1234").is_err());
        assert!(EthStateResolver::new(
            "http://localhost:8545",
            "0x46Fd04eEa588a3EA7e9F055dd691C688c4148ab3"
        )
        .is_ok());
    }

    #[tokio::test]
    async fn test_latest_state() {
        let state = U256::from(5u64);
        let resolved = resolve_with(&test_id(), state, state, || async {
            Err(Error::StateResolution("not called".into()))
        })
        .await
        .unwrap();

        assert!(resolved.latest);
        assert!(!resolved.genesis);
    }

    #[tokio::test]
    async fn test_genesis_state() {
        let id = Id::genesis_from_state([0, 0], U256::from(12345u64) << 220usize);
        let state = U256::from(12345u64) << 220usize;

        let resolved = resolve_with(&id, state, U256::ZERO, || async { Ok(vec![]) })
            .await
            .unwrap();
        assert!(resolved.genesis);

        let err = resolve_with(&id, U256::from(1u64), U256::ZERO, || async { Ok(vec![]) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StateResolution(_)));
    }

    #[tokio::test]
    async fn test_replaced_state() {
        let id = test_id();
        let id_int = id.to_int();

        let resolved = resolve_with(&id, U256::from(1u64), U256::from(2u64), || async move {
            Ok(vec![
                U256::from(1_660_000_000u64),
                U256::from(1_650_000_000u64),
                U256::from(100u64),
                U256::from(90u64),
                id_int,
                U256::from(2u64),
            ])
        })
        .await
        .unwrap();

        assert!(!resolved.latest);
        assert_eq!(resolved.transition_timestamp, 1_660_000_000);
    }

    #[tokio::test]
    async fn test_replaced_state_with_foreign_id() {
        let err = resolve_with(&test_id(), U256::from(1u64), U256::from(2u64), || async {
            Ok(vec![U256::from(1u64), U256::ZERO, U256::ZERO, U256::ZERO, U256::from(77u64), U256::ZERO])
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("invalid id"));
    }
}
