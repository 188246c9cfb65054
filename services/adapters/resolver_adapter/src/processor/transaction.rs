//! Transaction resolution over JSON-RPC `getTransaction`

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use types::{ProcessingKey, TransactionRecord};
use url::Url;

use super::{require_key, IdentifierProcessor, RecordResolver, Resolution};
use crate::error::FetchError;
use crate::fetcher::RequestSpec;

/// JSON-RPC method used for lookups
pub const GET_TRANSACTION: &str = "getTransaction";

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<TransactionResult>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct TransactionResult {
    #[serde(default)]
    transaction: Option<TransactionBody>,
}

#[derive(Debug, Deserialize)]
struct TransactionBody {
    #[serde(default)]
    signatures: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Builds `getTransaction` calls and reads their results
#[derive(Debug, Clone)]
pub struct TransactionResolver {
    rpc_url: Url,
}

impl TransactionResolver {
    pub fn new(rpc_url: Url) -> Self {
        Self { rpc_url }
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    /// JSON-RPC request body for `signature`
    pub fn request_body(signature: &str) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": GET_TRANSACTION,
            "params": [
                signature,
                { "encoding": "jsonParsed", "maxSupportedTransactionVersion": 0 }
            ]
        })
    }
}

impl RecordResolver for TransactionResolver {
    type Record = TransactionRecord;

    const KIND: &'static str = "transaction";

    fn build_request(&self, key: &ProcessingKey) -> Result<RequestSpec, FetchError> {
        require_key(key)?;
        Ok(RequestSpec::post_json(
            self.rpc_url.clone(),
            Self::request_body(key.as_str()),
        ))
    }

    fn normalize(
        &self,
        key: &ProcessingKey,
        payload: Value,
    ) -> Result<Option<TransactionRecord>, FetchError> {
        let response: RpcResponse = serde_json::from_value(payload)?;

        if let Some(error) = response.error {
            return Err(FetchError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let Some(result) = response.result else {
            return Ok(None);
        };

        // The node echoes the signatures it indexed; fall back to the one we asked for
        let signature = result
            .transaction
            .and_then(|tx| tx.signatures.into_iter().next())
            .unwrap_or_else(|| key.as_str().to_string());

        Ok(Some(TransactionRecord::new(signature, Utc::now())))
    }
}

impl IdentifierProcessor<TransactionResolver> {
    /// Resolve a transaction signature
    pub async fn resolve_transaction(&self, signature: &str) -> Resolution<TransactionRecord> {
        self.resolve(&ProcessingKey::from(signature)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> TransactionResolver {
        TransactionResolver::new(Url::parse("http://localhost:8899").unwrap())
    }

    #[test]
    fn test_request_body_shape() {
        let spec = resolver().build_request(&ProcessingKey::from("sig123")).unwrap();
        let body = spec.body().unwrap();

        assert_eq!(spec.method(), &reqwest::Method::POST);
        assert_eq!(body["method"], "getTransaction");
        assert_eq!(body["params"][0], "sig123");
        assert_eq!(body["params"][1]["encoding"], "jsonParsed");
        assert_eq!(body["params"][1]["maxSupportedTransactionVersion"], 0);
    }

    #[test]
    fn test_empty_signature_rejected() {
        let err = resolver().build_request(&ProcessingKey::from("")).unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest(_)));
    }

    #[test]
    fn test_normalize_extracts_first_signature() {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "slot": 250_000_000u64,
                "transaction": { "signatures": ["first", "second"] }
            }
        });
        let record = resolver()
            .normalize(&ProcessingKey::from("requested"), payload)
            .unwrap()
            .unwrap();
        assert_eq!(record.signature, "first");
    }

    #[test]
    fn test_normalize_null_result_is_none() {
        let payload = json!({ "jsonrpc": "2.0", "id": 1, "result": null });
        let record = resolver()
            .normalize(&ProcessingKey::from("sig123"), payload)
            .unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn test_normalize_missing_signatures_defaults_to_key() {
        let payload = json!({ "result": { "meta": {} } });
        let record = resolver()
            .normalize(&ProcessingKey::from("sig123"), payload)
            .unwrap()
            .unwrap();
        assert_eq!(record.signature, "sig123");
    }

    #[test]
    fn test_normalize_rpc_error_is_fatal() {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32602, "message": "Invalid param: WrongSize" }
        });
        let err = resolver()
            .normalize(&ProcessingKey::from("bad"), payload)
            .unwrap_err();
        assert!(matches!(err, FetchError::Rpc { code: -32602, .. }));
    }

    #[test]
    fn test_normalize_unexpected_shape_is_malformed() {
        let err = resolver()
            .normalize(&ProcessingKey::from("sig"), json!(["not", "an", "object"]))
            .unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }
}
