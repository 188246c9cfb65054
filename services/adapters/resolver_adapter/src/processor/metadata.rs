//! Token metadata resolution over `GET {base}/tokens/{address}`

use serde_json::{Map, Value};
use types::{ProcessingKey, TokenMetadata};
use url::Url;

use super::{require_key, IdentifierProcessor, RecordResolver, Resolution};
use crate::error::FetchError;
use crate::fetcher::RequestSpec;

/// Builds metadata lookups and applies display defaults
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    base_url: Url,
    placeholder_image: String,
}

impl MetadataResolver {
    pub fn new(base_url: Url, placeholder_image: impl Into<String>) -> Self {
        Self {
            base_url,
            placeholder_image: placeholder_image.into(),
        }
    }

    pub fn placeholder_image(&self) -> &str {
        &self.placeholder_image
    }

    /// `{base}/tokens/{address}`, with the address encoded as one path segment
    pub fn token_url(&self, address: &str) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                FetchError::InvalidRequest(format!("{} cannot be a base URL", self.base_url))
            })?
            .pop_if_empty()
            .push("tokens")
            .push(address);
        Ok(url)
    }
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields.get(name).and_then(Value::as_str).map(str::to_string)
}

impl RecordResolver for MetadataResolver {
    type Record = TokenMetadata;

    const KIND: &'static str = "token metadata";

    fn build_request(&self, key: &ProcessingKey) -> Result<RequestSpec, FetchError> {
        require_key(key)?;
        Ok(RequestSpec::get(self.token_url(key.as_str())?).with_header("Accept", "application/json"))
    }

    fn normalize(
        &self,
        _key: &ProcessingKey,
        payload: Value,
    ) -> Result<Option<TokenMetadata>, FetchError> {
        match payload {
            Value::Null => Ok(None),
            Value::Object(fields) => Ok(Some(TokenMetadata::from_parts(
                string_field(&fields, "name"),
                string_field(&fields, "description"),
                string_field(&fields, "image_uri"),
                &self.placeholder_image,
            ))),
            other => Err(FetchError::MalformedResponse(format!(
                "expected token object, got {}",
                other
            ))),
        }
    }
}

impl IdentifierProcessor<MetadataResolver> {
    /// Resolve display metadata for a token address
    pub async fn resolve_metadata(&self, address: &str) -> Resolution<TokenMetadata> {
        self.resolve(&ProcessingKey::from(address)).await
    }
}
