//! Credential schema loading and schema-derived query parameters

use alloy_primitives::{keccak256, U256};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use zkauth_common::{Error, Result};

/// Source of credential schema documents
#[async_trait]
pub trait SchemaLoader: Send + Sync {
    /// Raw schema document located at `url`
    async fn load(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches schemas over HTTP, resolving `ipfs://` through a gateway host
pub struct GatewaySchemaLoader {
    gateway: String,
    client: reqwest::Client,
}

impl GatewaySchemaLoader {
    pub fn new(gateway: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            client: reqwest::Client::new(),
        }
    }

    /// HTTP location of a schema URL
    pub fn resolve_url(&self, url: &str) -> Result<String> {
        if let Some(cid) = url.strip_prefix("ipfs://") {
            return Ok(format!("https://{}/ipfs/{}", self.gateway, cid));
        }
        if url.starts_with("https://") || url.starts_with("http://") {
            return Ok(url.to_string());
        }
        Err(Error::Schema(format!("unsupported schema url: {}", url)))
    }
}

#[async_trait]
impl SchemaLoader for GatewaySchemaLoader {
    async fn load(&self, url: &str) -> Result<Vec<u8>> {
        let location = self.resolve_url(url)?;
        debug!("Fetching schema from {}", location);

        let response = self
            .client
            .get(&location)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Schema(format!(
                "failed to fetch schema {}: {}",
                location,
                response.status()
            )));
        }

        let bytes = response.bytes().await.map_err(|e| Error::Http(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Claim schema hash: last 16 bytes of `keccak256(schema || type)`, read little-endian
pub fn schema_hash(schema: &[u8], credential_type: &str) -> U256 {
    let hash = keccak256([schema, credential_type.as_bytes()].concat());
    U256::from_le_slice(&hash[16..])
}

/// Claim slot a field of `credential_type` is serialized into
pub fn field_slot_index(schema: &[u8], credential_type: &str, field: &str) -> Result<u64> {
    let document: Value = serde_json::from_slice(schema)
        .map_err(|e| Error::Schema(format!("schema is not JSON-LD: {}", e)))?;

    let contexts = match &document["@context"] {
        Value::Array(items) => items.clone(),
        Value::Object(_) => vec![document["@context"].clone()],
        _ => return Err(Error::Schema("schema has no @context".to_string())),
    };

    let serialization = contexts
        .iter()
        .find_map(|ctx| ctx[credential_type]["@context"][field]["@type"].as_str())
        .ok_or_else(|| {
            Error::Schema(format!("field {} not found in type {}", field, credential_type))
        })?;

    match serialization.rsplit(':').next() {
        Some("IndexDataSlotA") => Ok(2),
        Some("IndexDataSlotB") => Ok(3),
        Some("ValueDataSlotA") => Ok(6),
        Some("ValueDataSlotB") => Ok(7),
        _ => Err(Error::Schema(format!(
            "field {} has no claim slot serialization: {}",
            field, serialization
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub fn country_code_schema() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "@context": [{
                "@version": 1.1,
                "@protected": true,
                "id": "@id",
                "type": "@type",
                "CountryCodeVerifier1": {
                    "@id": "https://example.com/CountryCodeVerifier1",
                    "@context": {
                        "@version": 1.1,
                        "@protected": true,
                        "serialization": "https://github.com/iden3/claim-schema-vocab/blob/main/credentials/serialization.md#",
                        "CountryCode": {
                            "@id": "iden3-vocab:CountryCode",
                            "@type": "serialization:IndexDataSlotA"
                        },
                        "Expiry": {
                            "@id": "iden3-vocab:Expiry",
                            "@type": "xsd:integer"
                        }
                    }
                }
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_resolve_url() {
        let loader = GatewaySchemaLoader::new("ipfs.io");
        assert_eq!(
            loader.resolve_url("ipfs://QmYjs").unwrap(),
            "https://ipfs.io/ipfs/QmYjs"
        );
        assert_eq!(
            loader.resolve_url("https://s3.example.com/schema.json-ld").unwrap(),
            "https://s3.example.com/schema.json-ld"
        );
        assert!(loader.resolve_url("ftp://nope").is_err());
    }

    #[test]
    fn test_field_slot_index() {
        let schema = country_code_schema();
        assert_eq!(field_slot_index(&schema, "CountryCodeVerifier1", "CountryCode").unwrap(), 2);
    }

    #[test]
    fn test_field_slot_index_errors() {
        let schema = country_code_schema();
        assert!(field_slot_index(&schema, "CountryCodeVerifier1", "Missing").is_err());
        assert!(field_slot_index(&schema, "OtherType", "CountryCode").is_err());
        assert!(field_slot_index(&schema, "CountryCodeVerifier1", "Expiry").is_err());
        assert!(field_slot_index(b"not json", "CountryCodeVerifier1", "CountryCode").is_err());
    }

    #[test]
    fn test_schema_hash_depends_on_type() {
        let schema = country_code_schema();
        let a = schema_hash(&schema, "CountryCodeVerifier1");
        let b = schema_hash(&schema, "CountryCodeVerifier2");

        assert_ne!(a, b);
        assert!(a < U256::from(1u64) << 128usize);
    }
}
