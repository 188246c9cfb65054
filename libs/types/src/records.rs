//! Canonical records
//!
//! The shapes returned to callers after a resolution completes. A record is
//! built in one step from an upstream payload; fields the upstream left out are
//! filled with the documented defaults below, never with `None`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A transaction that the RPC node confirmed it knows about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// First signature listed on the transaction
    pub signature: String,

    /// When this service resolved the transaction (not the block time)
    pub resolved_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(signature: impl Into<String>, resolved_at: DateTime<Utc>) -> Self {
        Self {
            signature: signature.into(),
            resolved_at,
        }
    }

    /// Resolution time as milliseconds since the Unix epoch
    pub fn timestamp_millis(&self) -> i64 {
        self.resolved_at.timestamp_millis()
    }
}

/// Display metadata for a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub description: String,
    pub image_uri: String,
}

impl TokenMetadata {
    /// Name used when the metadata service has none
    pub const UNKNOWN_NAME: &'static str = "Unknown Token";

    /// Description used when the metadata service has none
    pub const NO_DESCRIPTION: &'static str = "No description available";

    /// Default placeholder image reference
    pub const DEFAULT_IMAGE_URI: &'static str = "default_image_url";

    /// Build metadata from optional upstream fields.
    ///
    /// Missing and empty values fall back to [`Self::UNKNOWN_NAME`],
    /// [`Self::NO_DESCRIPTION`] and `placeholder_image` respectively.
    pub fn from_parts(
        name: Option<String>,
        description: Option<String>,
        image_uri: Option<String>,
        placeholder_image: &str,
    ) -> Self {
        Self {
            name: non_empty(name).unwrap_or_else(|| Self::UNKNOWN_NAME.to_string()),
            description: non_empty(description)
                .unwrap_or_else(|| Self::NO_DESCRIPTION.to_string()),
            image_uri: non_empty(image_uri).unwrap_or_else(|| placeholder_image.to_string()),
        }
    }

    /// Metadata for a token the service knows nothing about
    pub fn unknown(placeholder_image: &str) -> Self {
        Self::from_parts(None, None, None, placeholder_image)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
