//! Resolver Configuration Module
//!
//! Loads [`ResolverConfig`] from built-in defaults, an optional TOML file and
//! `RESOLVER_*` environment variables, in increasing order of precedence.

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::service::{admission, endpoints, records, retry, ENV_PREFIX};

/// Settings for the resolver adapter and its binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// JSON-RPC endpoint used for `getTransaction`
    pub rpc_url: String,

    /// Base URL of the token metadata REST API
    pub metadata_api_url: String,

    /// Global cap on identifiers resolved at once
    pub max_concurrent_processing: usize,

    /// How long an admitted identifier may hold its slot (milliseconds)
    pub processing_ttl_ms: u64,

    /// Attempts per upstream request, including the first
    pub retry_max_attempts: u32,

    /// Backoff base (milliseconds)
    pub retry_base_delay_ms: u64,

    /// Cap on any single backoff suspension (milliseconds)
    pub retry_max_delay_ms: u64,

    /// Randomize backoff delays
    pub retry_jitter: bool,

    /// Per-attempt HTTP timeout (milliseconds)
    pub request_timeout_ms: u64,

    /// Client-side request ceiling per second; unset means unlimited
    #[serde(default)]
    pub rate_limit_per_sec: Option<u32>,

    /// Interval of the background eviction sweep (milliseconds)
    pub sweep_interval_ms: u64,

    /// Image reference for tokens without one
    pub placeholder_image_uri: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            rpc_url: endpoints::RPC_URL.to_string(),
            metadata_api_url: endpoints::METADATA_API_URL.to_string(),
            max_concurrent_processing: admission::MAX_CONCURRENT_PROCESSING,
            processing_ttl_ms: admission::PROCESSING_TTL_MS,
            retry_max_attempts: retry::MAX_ATTEMPTS,
            retry_base_delay_ms: retry::BASE_DELAY_MS,
            retry_max_delay_ms: retry::MAX_DELAY_MS,
            retry_jitter: false,
            request_timeout_ms: retry::REQUEST_TIMEOUT_MS,
            rate_limit_per_sec: None,
            sweep_interval_ms: admission::SWEEP_INTERVAL_MS,
            placeholder_image_uri: records::PLACEHOLDER_IMAGE_URI.to_string(),
        }
    }
}

impl ResolverConfig {
    /// Load from the process environment only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load with an optional TOML file layered under the environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with_vars(file, None)
    }

    /// Load using `vars` in place of the process environment.
    ///
    /// Lets callers (and tests) resolve configuration without touching global
    /// process state.
    pub fn load_with_vars(
        file: Option<&Path>,
        vars: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let legacy = |name: &str| match &vars {
            Some(map) => map.get(name).cloned(),
            None => std::env::var(name).ok(),
        };

        let defaults = Self::default();
        let rpc_url = legacy(endpoints::LEGACY_RPC_URL_VAR).unwrap_or(defaults.rpc_url);
        let metadata_api_url =
            legacy(endpoints::LEGACY_METADATA_URL_VAR).unwrap_or(defaults.metadata_api_url);

        let mut builder = Config::builder()
            .set_default("rpc_url", rpc_url)?
            .set_default("metadata_api_url", metadata_api_url)?
            .set_default(
                "max_concurrent_processing",
                defaults.max_concurrent_processing as i64,
            )?
            .set_default("processing_ttl_ms", defaults.processing_ttl_ms as i64)?
            .set_default("retry_max_attempts", defaults.retry_max_attempts as i64)?
            .set_default("retry_base_delay_ms", defaults.retry_base_delay_ms as i64)?
            .set_default("retry_max_delay_ms", defaults.retry_max_delay_ms as i64)?
            .set_default("retry_jitter", defaults.retry_jitter)?
            .set_default("request_timeout_ms", defaults.request_timeout_ms as i64)?
            .set_default("sweep_interval_ms", defaults.sweep_interval_ms as i64)?
            .set_default("placeholder_image_uri", defaults.placeholder_image_uri)?;

        if let Some(path) = file {
            info!("Loading resolver config file: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        // Override with environment variables (RESOLVER_ prefix)
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(vars),
        );

        let config: Self = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        debug!("Resolver configuration: {:?}", config);
        Ok(config)
    }

    /// Reject settings the resolver cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_processing == 0 {
            bail!("max_concurrent_processing must be at least 1");
        }
        if self.processing_ttl_ms == 0 {
            bail!("processing_ttl_ms must be greater than zero");
        }
        if self.retry_max_attempts == 0 {
            bail!("retry_max_attempts must be at least 1");
        }
        if self.retry_base_delay_ms == 0 {
            bail!("retry_base_delay_ms must be greater than zero");
        }
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            bail!(
                "retry_max_delay_ms ({}) is below retry_base_delay_ms ({})",
                self.retry_max_delay_ms,
                self.retry_base_delay_ms
            );
        }
        if self.request_timeout_ms == 0 {
            bail!("request_timeout_ms must be greater than zero");
        }
        if self.sweep_interval_ms == 0 {
            bail!("sweep_interval_ms must be greater than zero");
        }
        if self.rate_limit_per_sec == Some(0) {
            bail!("rate_limit_per_sec must be at least 1 when set");
        }
        Ok(())
    }

    pub fn processing_ttl(&self) -> Duration {
        Duration::from_millis(self.processing_ttl_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = ResolverConfig::load_with_vars(None, Some(HashMap::new())).unwrap();

        assert_eq!(config, ResolverConfig::default());
        assert_eq!(config.max_concurrent_processing, 3);
        assert_eq!(config.processing_ttl(), Duration::from_secs(30));
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.retry_base_delay(), Duration::from_millis(1000));
        assert_eq!(config.rate_limit_per_sec, None);
    }

    #[test]
    fn test_environment_override() {
        let env = vars(&[
            ("RESOLVER_MAX_CONCURRENT_PROCESSING", "8"),
            ("RESOLVER_PROCESSING_TTL_MS", "5000"),
            ("RESOLVER_RETRY_JITTER", "true"),
            ("RESOLVER_RATE_LIMIT_PER_SEC", "20"),
        ]);
        let config = ResolverConfig::load_with_vars(None, Some(env)).unwrap();

        assert_eq!(config.max_concurrent_processing, 8);
        assert_eq!(config.processing_ttl_ms, 5000);
        assert!(config.retry_jitter);
        assert_eq!(config.rate_limit_per_sec, Some(20));
    }

    #[test]
    fn test_legacy_endpoint_variables() {
        let env = vars(&[
            ("RPC_URL", "http://rpc.internal:8899"),
            ("TOKEN_API_URL", "http://tokens.internal"),
        ]);
        let config = ResolverConfig::load_with_vars(None, Some(env)).unwrap();
        assert_eq!(config.rpc_url, "http://rpc.internal:8899");
        assert_eq!(config.metadata_api_url, "http://tokens.internal");

        // Prefixed variables win over the legacy names
        let env = vars(&[
            ("RPC_URL", "http://rpc.internal:8899"),
            ("RESOLVER_RPC_URL", "http://rpc.override:8899"),
        ]);
        let config = ResolverConfig::load_with_vars(None, Some(env)).unwrap();
        assert_eq!(config.rpc_url, "http://rpc.override:8899");
    }

    #[test]
    fn test_file_layered_under_environment() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("resolver.toml");

        let config_content = r#"
rpc_url = "http://file-rpc:8899"
max_concurrent_processing = 5
retry_base_delay_ms = 250
"#;
        fs::write(&config_path, config_content).unwrap();

        let env = vars(&[("RESOLVER_MAX_CONCURRENT_PROCESSING", "7")]);
        let config = ResolverConfig::load_with_vars(Some(&config_path), Some(env)).unwrap();

        assert_eq!(config.rpc_url, "http://file-rpc:8899");
        assert_eq!(config.retry_base_delay_ms, 250);
        assert_eq!(config.max_concurrent_processing, 7);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let env = vars(&[("RESOLVER_MAX_CONCURRENT_PROCESSING", "0")]);
        assert!(ResolverConfig::load_with_vars(None, Some(env)).is_err());

        let config = ResolverConfig {
            retry_max_delay_ms: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ResolverConfig {
            request_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let env = vars(&[("RESOLVER_REQUEST_TIMEOUT_MS", "0")]);
        assert!(ResolverConfig::load_with_vars(None, Some(env)).is_err());

        let config = ResolverConfig {
            rate_limit_per_sec: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
