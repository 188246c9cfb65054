//! Per-identifier processors
//!
//! An [`IdentifierProcessor`] ties the pieces together for one kind of record:
//!
//! 1. ask the [`AdmissionQueue`] for a slot for the key
//! 2. build the upstream request ([`RecordResolver::build_request`])
//! 3. run it through the [`RetryingFetcher`], cancelled if the slot is evicted
//! 4. normalize the payload ([`RecordResolver::normalize`])
//! 5. release the slot
//!
//! Failures never escape: they are logged with their classification and the
//! caller sees [`Resolution::Unavailable`]. A refused admission is reported as
//! [`Resolution::Rejected`] so callers can tell "busy" from "nothing there".

pub mod metadata;
pub mod transaction;

use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use types::ProcessingKey;

use crate::admission::{AdmissionQueue, AdmissionRejection};
use crate::error::FetchError;
use crate::fetcher::{RequestOutcome, RequestSpec, RetryPolicy, RetryingFetcher};
use crate::metrics::ResolverMetrics;

pub use metadata::MetadataResolver;
pub use transaction::TransactionResolver;

/// Processor resolving transaction signatures
pub type TransactionProcessor = IdentifierProcessor<TransactionResolver>;

/// Processor resolving token metadata by address
pub type MetadataProcessor = IdentifierProcessor<MetadataResolver>;

/// Result of one resolution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// Upstream answered and the record was built
    Resolved(T),
    /// Upstream has nothing for the key, or the call failed
    Unavailable,
    /// The key was not admitted; nothing was sent upstream
    Rejected(AdmissionRejection),
}

impl<T> Resolution<T> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Resolution::Rejected(_))
    }

    /// The record, if one was resolved
    pub fn into_option(self) -> Option<T> {
        match self {
            Resolution::Resolved(record) => Some(record),
            Resolution::Unavailable | Resolution::Rejected(_) => None,
        }
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Resolution::Resolved(record) => Some(record),
            Resolution::Unavailable | Resolution::Rejected(_) => None,
        }
    }
}

/// Upstream shape for one kind of record
pub trait RecordResolver: Send + Sync {
    /// Canonical record produced
    type Record: Send;

    /// Label used in logs
    const KIND: &'static str;

    /// Request that fetches the record for `key`
    fn build_request(&self, key: &ProcessingKey) -> Result<RequestSpec, FetchError>;

    /// Turn a successful payload into a record; `Ok(None)` when upstream has none
    fn normalize(
        &self,
        key: &ProcessingKey,
        payload: Value,
    ) -> Result<Option<Self::Record>, FetchError>;
}

/// Admission, fetch and normalization for one [`RecordResolver`]
pub struct IdentifierProcessor<R> {
    resolver: R,
    queue: Arc<AdmissionQueue>,
    fetcher: Arc<RetryingFetcher>,
    policy: RetryPolicy,
    metrics: Arc<ResolverMetrics>,
}

impl<R: RecordResolver> IdentifierProcessor<R> {
    pub fn new(
        resolver: R,
        queue: Arc<AdmissionQueue>,
        fetcher: Arc<RetryingFetcher>,
        policy: RetryPolicy,
        metrics: Arc<ResolverMetrics>,
    ) -> Self {
        Self {
            resolver,
            queue,
            fetcher,
            policy,
            metrics,
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Resolve `key`, holding an admission slot for the duration
    pub async fn resolve(&self, key: &ProcessingKey) -> Resolution<R::Record> {
        let permit = match self.queue.try_acquire(key) {
            Ok(permit) => permit,
            Err(rejection) => {
                self.metrics.record_rejected();
                info!("Not processing {} {}: {}", R::KIND, key, rejection);
                return Resolution::Rejected(rejection);
            }
        };

        info!("Processing {} {}...", R::KIND, key);
        let resolution = self.process(key, permit.cancellation()).await;
        permit.release();
        resolution
    }

    async fn process(
        &self,
        key: &ProcessingKey,
        cancel: &CancellationToken,
    ) -> Resolution<R::Record> {
        let request = match self.resolver.build_request(key) {
            Ok(request) => request,
            Err(e) => return self.fatal(key, &e, 0),
        };

        match self
            .fetcher
            .execute_cancellable(&request, &self.policy, cancel)
            .await
        {
            RequestOutcome::Success { payload, attempts } => {
                match self.resolver.normalize(key, payload) {
                    Ok(Some(record)) => {
                        self.metrics.record_resolved();
                        debug!("Resolved {} {} in {} attempt(s)", R::KIND, key, attempts);
                        Resolution::Resolved(record)
                    }
                    Ok(None) => {
                        self.metrics.record_unavailable();
                        info!("No {} found for {}", R::KIND, key);
                        Resolution::Unavailable
                    }
                    Err(e) => self.fatal(key, &e, attempts),
                }
            }
            RequestOutcome::Fatal { error, attempts } => self.fatal(key, &error, attempts),
            RequestOutcome::RetryExhausted {
                last_error,
                attempts,
            } => {
                self.metrics.record_exhausted();
                self.metrics.record_unavailable();
                warn!(
                    "Retryable error for {} {} persisted after {} attempts: {}",
                    R::KIND,
                    key,
                    attempts,
                    last_error
                );
                Resolution::Unavailable
            }
            RequestOutcome::Cancelled { attempts } => {
                self.metrics.record_cancelled();
                self.metrics.record_unavailable();
                warn!(
                    "Abandoned {} {} after {} attempt(s): admission expired or released",
                    R::KIND,
                    key,
                    attempts
                );
                Resolution::Unavailable
            }
        }
    }

    fn fatal(&self, key: &ProcessingKey, error: &FetchError, attempts: u32) -> Resolution<R::Record> {
        self.metrics.record_fatal();
        self.metrics.record_unavailable();
        error!(
            "Fatal error processing {} {} ({} attempt(s)): {}",
            R::KIND,
            key,
            attempts,
            error
        );
        Resolution::Unavailable
    }
}

fn require_key(key: &ProcessingKey) -> Result<(), FetchError> {
    if key.is_empty() {
        return Err(FetchError::InvalidRequest("empty identifier".to_string()));
    }
    Ok(())
}
