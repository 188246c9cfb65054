//! Resolver Adapter Implementation
//!
//! Facade over one admission queue, one retrying fetcher and the two
//! processors. This is the surface UI and API collaborators call; they never
//! talk to the upstream services directly.

use config::ResolverConfig;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;
use types::{ProcessingKey, QueueStatus, TokenMetadata, TransactionRecord};
use url::Url;

use crate::admission::AdmissionQueue;
use crate::clock::{Clock, SystemClock};
use crate::error::{ResolverError, Result};
use crate::fetcher::{RetryPolicy, RetryingFetcher};
use crate::metrics::{MetricsSnapshot, ResolverMetrics};
use crate::processor::{
    MetadataProcessor, MetadataResolver, Resolution, TransactionProcessor, TransactionResolver,
};
use crate::rate_limit::RateLimiter;

/// Resolver Adapter
///
/// Owns the admission queue shared by transaction and metadata resolution, so
/// the concurrency ceiling applies across both.
pub struct ResolverAdapter {
    /// Configuration
    config: ResolverConfig,

    /// Keys currently being processed
    queue: Arc<AdmissionQueue>,

    /// `getTransaction` resolution
    transactions: TransactionProcessor,

    /// Token metadata resolution
    metadata: MetadataProcessor,

    /// Metrics
    metrics: Arc<ResolverMetrics>,
}

impl ResolverAdapter {
    /// Create a new adapter on the wall clock.
    ///
    /// No background task is started. Expired admissions are still evicted on
    /// the next queue call, but a stalled resolution is only cancelled without
    /// other traffic once [`spawn_sweeper`](Self::spawn_sweeper) is running.
    pub fn new(config: ResolverConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a new adapter driven by `clock`
    pub fn with_clock(config: ResolverConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ResolverError::Config(e.to_string()))?;

        let rpc_url = parse_endpoint(&config.rpc_url)?;
        let metadata_url = parse_endpoint(&config.metadata_api_url)?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let fetcher = Arc::new(
            RetryingFetcher::new(client, Arc::clone(&clock))
                .with_rate_limiter(RateLimiter::from_config(config.rate_limit_per_sec)),
        );

        let queue = Arc::new(AdmissionQueue::new(
            config.max_concurrent_processing,
            config.processing_ttl(),
            clock,
        ));

        let policy = RetryPolicy::new(config.retry_max_attempts, config.retry_base_delay())
            .with_max_delay(config.retry_max_delay())
            .with_jitter(config.retry_jitter);
        let metrics = Arc::new(ResolverMetrics::new());

        let transactions = TransactionProcessor::new(
            TransactionResolver::new(rpc_url),
            Arc::clone(&queue),
            Arc::clone(&fetcher),
            policy,
            Arc::clone(&metrics),
        );
        let metadata = MetadataProcessor::new(
            MetadataResolver::new(metadata_url, config.placeholder_image_uri.clone()),
            Arc::clone(&queue),
            fetcher,
            policy,
            Arc::clone(&metrics),
        );

        info!(
            "Resolver adapter initialized: capacity {}, ttl {:?}, {} attempts from {:?}",
            config.max_concurrent_processing,
            config.processing_ttl(),
            config.retry_max_attempts,
            config.retry_base_delay()
        );

        Ok(Self {
            config,
            queue,
            transactions,
            metadata,
            metrics,
        })
    }

    /// Resolve a transaction signature
    pub async fn resolve_transaction(&self, signature: &str) -> Resolution<TransactionRecord> {
        self.transactions.resolve_transaction(signature).await
    }

    /// Resolve display metadata for a token address
    pub async fn resolve_metadata(&self, address: &str) -> Resolution<TokenMetadata> {
        self.metadata.resolve_metadata(address).await
    }

    /// Current queue occupancy
    pub fn get_queue_status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// Reserve a slot for `key` without resolving anything
    pub fn admit(&self, key: &str) -> bool {
        self.queue.try_admit(&ProcessingKey::from(key))
    }

    /// Free the slot held by `key`
    pub fn release(&self, key: &str) -> bool {
        self.queue.release(&ProcessingKey::from(key))
    }

    /// Get current metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            evicted: self.queue.evicted_total(),
            ..self.metrics.snapshot()
        }
    }

    /// Start the background eviction sweep at the configured interval.
    ///
    /// Must be called from within a tokio runtime; the task stops once the
    /// adapter is dropped.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        self.queue.spawn_sweeper(self.config.sweep_interval())
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<AdmissionQueue> {
        &self.queue
    }
}

fn parse_endpoint(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|source| ResolverError::InvalidEndpoint {
        url: url.to_string(),
        source,
    })
}
