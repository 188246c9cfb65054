//! # Resolver Configuration
//!
//! Centralized configuration for the identifier resolver services.
//!
//! ## Features
//!
//! - **Defaults**: documented constants for every tunable ([`service`])
//! - **Layered loading**: built-in defaults, then an optional TOML file, then
//!   `RESOLVER_*` environment variables ([`ResolverConfig::load`])
//! - **Legacy variables**: `RPC_URL` and `TOKEN_API_URL` are honored as defaults
//!
//! ## Usage
//!
//! ```rust,no_run
//! use config::ResolverConfig;
//!
//! let config = ResolverConfig::from_env()?;
//! println!("capacity {}", config.max_concurrent_processing);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod resolver_config;
pub mod service;

// Re-export commonly used types
pub use resolver_config::ResolverConfig;
