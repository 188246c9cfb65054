//! Service configuration defaults
//!
//! Default values and environment variable names shared by the resolver
//! services, kept here so every binary and test agrees on them.

/// Upstream endpoint defaults
pub mod endpoints {
    /// Public Solana mainnet RPC
    pub const RPC_URL: &str = "https://api.mainnet-beta.solana.com";

    /// Local token metadata API
    pub const METADATA_API_URL: &str = "http://localhost:8080";

    /// Pre-prefix variable naming the RPC endpoint
    pub const LEGACY_RPC_URL_VAR: &str = "RPC_URL";

    /// Pre-prefix variable naming the metadata API base URL
    pub const LEGACY_METADATA_URL_VAR: &str = "TOKEN_API_URL";
}

/// Admission queue defaults
pub mod admission {
    /// Maximum identifiers resolved at the same time
    pub const MAX_CONCURRENT_PROCESSING: usize = 3;

    /// Time an admitted identifier may hold its slot (milliseconds)
    pub const PROCESSING_TTL_MS: u64 = 30_000;

    /// Background eviction sweep interval (milliseconds)
    pub const SWEEP_INTERVAL_MS: u64 = 1_000;
}

/// Retry and transport defaults
pub mod retry {
    /// Attempts per request, including the first
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Backoff base (milliseconds)
    pub const BASE_DELAY_MS: u64 = 1_000;

    /// Upper bound on a single backoff suspension (milliseconds)
    pub const MAX_DELAY_MS: u64 = 60_000;

    /// Per-attempt HTTP timeout (milliseconds)
    pub const REQUEST_TIMEOUT_MS: u64 = 10_000;
}

/// Record normalization defaults
pub mod records {
    /// Image reference used when a token has none
    pub const PLACEHOLDER_IMAGE_URI: &str = "default_image_url";
}

/// Prefix for environment overrides (`RESOLVER_MAX_CONCURRENT_PROCESSING`, ...)
pub const ENV_PREFIX: &str = "RESOLVER";
