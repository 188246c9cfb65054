//! Processing keys
//!
//! A [`ProcessingKey`] is the unit the admission queue reasons about: two
//! requests with equal keys can never be in flight at the same time. The key is
//! opaque; signatures and addresses are carried verbatim.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Opaque identifier for one resolution (transaction signature or token address)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessingKey(String);

impl ProcessingKey {
    /// Wrap an identifier
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap into the raw identifier
    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ProcessingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProcessingKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for ProcessingKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl AsRef<str> for ProcessingKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ProcessingKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
