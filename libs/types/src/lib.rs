//! # Resolver Types
//!
//! Shared data model for the identifier resolution services.
//!
//! ## Contents
//!
//! - **Identifiers**: [`ProcessingKey`], the opaque unit of admission (a
//!   transaction signature or a token address)
//! - **Records**: the canonical shapes handed back to callers, independent of
//!   whatever the upstream service returned ([`TransactionRecord`], [`TokenMetadata`])
//! - **Status**: [`QueueStatus`] snapshots of the admission queue
//!
//! ## Usage
//!
//! ```rust
//! use types::{ProcessingKey, TokenMetadata};
//!
//! let key = ProcessingKey::from("So11111111111111111111111111111111111111112");
//! assert_eq!(key.as_str(), "So11111111111111111111111111111111111111112");
//!
//! let metadata = TokenMetadata::from_parts(None, Some("Wrapped SOL".into()), None, "default_image_url");
//! assert_eq!(metadata.name, TokenMetadata::UNKNOWN_NAME);
//! ```

pub mod identifiers;
pub mod records;
pub mod status;

pub use identifiers::ProcessingKey;
pub use records::{TokenMetadata, TransactionRecord};
pub use status::QueueStatus;
