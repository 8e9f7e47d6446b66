//! Credential query checks against query circuit outputs

use alloy_primitives::U256;
use serde_json::Value;
use zkauth_common::{Error, Operator, Query, Result};

use crate::circuits::{AtomicQuerySigPubSignals, VALUE_ARRAY_SIZE};
use crate::schema::{field_slot_index, schema_hash, SchemaLoader};

fn mismatch(message: impl Into<String>) -> Error {
    Error::QueryMismatch(message.into())
}

/// Convert a predicate operand into a field element
fn operand(value: &Value) -> Result<U256> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| mismatch(format!("operand {} is not a non-negative integer", n))),
        Value::String(s) => U256::from_str_radix(s, 10)
            .map_err(|_| mismatch(format!("operand {} is not a decimal integer", s))),
        Value::Bool(b) => Ok(U256::from(*b as u64)),
        other => Err(mismatch(format!("unsupported operand: {}", other))),
    }
}

/// Value slots the circuit must have compared against
pub fn expected_values(operator: Operator, value: &Value) -> Result<Vec<U256>> {
    let mut values = match (operator, value) {
        (Operator::In | Operator::Nin, Value::Array(items)) => {
            items.iter().map(operand).collect::<Result<Vec<_>>>()?
        }
        (Operator::In | Operator::Nin, other) => {
            return Err(mismatch(format!("{:?} expects an array, got {}", operator, other)))
        }
        (_, value) => vec![operand(value)?],
    };

    if values.len() > VALUE_ARRAY_SIZE {
        return Err(mismatch(format!(
            "at most {} operands supported, got {}",
            VALUE_ARRAY_SIZE,
            values.len()
        )));
    }
    values.resize(VALUE_ARRAY_SIZE, U256::ZERO);
    Ok(values)
}

/// Check that a sig query proof answers `query`
pub async fn verify_sig_query(
    query: &Query,
    signals: &AtomicQuerySigPubSignals,
    schemas: &dyn SchemaLoader,
) -> Result<()> {
    let issuer = signals.issuer_id.to_base58();
    if !query.accepts_any_issuer() && !query.allowed_issuers.contains(&issuer) {
        return Err(mismatch(format!("issuer {} is not allowed", issuer)));
    }

    let schema = schemas.load(&query.schema.url).await?;
    if schema_hash(&schema, &query.schema.credential_type) != signals.claim_schema {
        return Err(mismatch(format!(
            "proof was made for a schema other than {}",
            query.schema.credential_type
        )));
    }

    let (field, predicate) = match query.req.len() {
        0 => {
            if signals.operator != Operator::Noop.code() {
                return Err(mismatch("query has no predicate but proof applies one"));
            }
            return Ok(());
        }
        1 => query.req.iter().next().ok_or_else(|| mismatch("empty predicate"))?,
        n => return Err(mismatch(format!("only one field predicate supported, got {}", n))),
    };

    let (operator, value) = match predicate.len() {
        1 => predicate.iter().next().ok_or_else(|| mismatch("empty predicate"))?,
        n => {
            return Err(mismatch(format!(
                "field {} must have exactly one operator, got {}",
                field, n
            )))
        }
    };

    let slot = field_slot_index(&schema, &query.schema.credential_type, field)?;
    if slot != signals.slot_index {
        return Err(mismatch(format!(
            "field {} is in slot {}, proof used slot {}",
            field, slot, signals.slot_index
        )));
    }

    if operator.code() != signals.operator {
        return Err(mismatch(format!(
            "operator {:?} requested, proof used {}",
            operator, signals.operator
        )));
    }

    if expected_values(*operator, value)? != signals.values {
        return Err(mismatch(format!("values for {} do not match the request", field)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuits::tests::sig_signals;
    use crate::schema::tests::country_code_schema;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use zkauth_common::SchemaRef;

    struct StaticSchema(Vec<u8>);

    #[async_trait]
    impl SchemaLoader for StaticSchema {
        async fn load(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    fn query(value: Value) -> Query {
        Query {
            allowed_issuers: vec!["*".to_string()],
            schema: SchemaRef {
                credential_type: "CountryCodeVerifier1".to_string(),
                url: "https://example.com/schema.json-ld".to_string(),
            },
            req: BTreeMap::from([(
                "CountryCode".to_string(),
                BTreeMap::from([(Operator::Eq, value)]),
            )]),
        }
    }

    fn signals() -> AtomicQuerySigPubSignals {
        let hash = schema_hash(&country_code_schema(), "CountryCodeVerifier1");
        AtomicQuerySigPubSignals::parse(&sig_signals(hash)).unwrap()
    }

    #[test]
    fn test_expected_values() {
        let values = expected_values(Operator::Eq, &json!(84)).unwrap();
        assert_eq!(values.len(), VALUE_ARRAY_SIZE);
        assert_eq!(values[0], U256::from(84u64));

        let values = expected_values(Operator::In, &json!([1, "2", 3])).unwrap();
        assert_eq!(&values[..3], &[U256::from(1u64), U256::from(2u64), U256::from(3u64)]);

        assert!(expected_values(Operator::In, &json!(1)).is_err());
        assert!(expected_values(Operator::Eq, &json!(-1)).is_err());
        assert!(expected_values(Operator::Nin, &json!(vec![0; 65])).is_err());
    }

    #[tokio::test]
    async fn test_matching_query() {
        let schemas = StaticSchema(country_code_schema());
        verify_sig_query(&query(json!(84)), &signals(), &schemas).await.unwrap();
    }

    #[tokio::test]
    async fn test_value_mismatch() {
        let schemas = StaticSchema(country_code_schema());
        let err = verify_sig_query(&query(json!(90)), &signals(), &schemas).await.unwrap_err();
        assert!(matches!(err, Error::QueryMismatch(_)));
    }

    #[tokio::test]
    async fn test_issuer_not_allowed() {
        let schemas = StaticSchema(country_code_schema());
        let mut q = query(json!(84));
        q.allowed_issuers = vec!["1125GJqgw6YEsKFwj63GY87MMxPL9kwDKxPUiwMLNZ".to_string()];

        let err = verify_sig_query(&q, &signals(), &schemas).await.unwrap_err();
        assert!(err.to_string().contains("is not allowed"));
    }

    #[tokio::test]
    async fn test_allowed_issuer_by_identifier() {
        let schemas = StaticSchema(country_code_schema());
        let mut q = query(json!(84));
        q.allowed_issuers = vec![crate::circuits::tests::USER_ID.to_string()];

        verify_sig_query(&q, &signals(), &schemas).await.unwrap();
    }

    #[tokio::test]
    async fn test_schema_mismatch() {
        let schemas = StaticSchema(country_code_schema());
        let mut q = query(json!(84));
        q.schema.credential_type = "OtherType".to_string();

        let err = verify_sig_query(&q, &signals(), &schemas).await.unwrap_err();
        assert!(err.to_string().contains("schema other than OtherType"));
    }

    #[tokio::test]
    async fn test_operator_mismatch() {
        let schemas = StaticSchema(country_code_schema());
        let mut q = query(json!(84));
        q.req = BTreeMap::from([(
            "CountryCode".to_string(),
            BTreeMap::from([(Operator::Lt, json!(84))]),
        )]);

        let err = verify_sig_query(&q, &signals(), &schemas).await.unwrap_err();
        assert!(err.to_string().contains("operator"));
    }
}
