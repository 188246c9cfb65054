//! Resolver Adapter
//!
//! Resolves transaction signatures and token addresses into canonical records
//! by calling unreliable upstream services. This adapter is the only component
//! that talks to those services.
//!
//! Features:
//! - At most one in-flight resolution per identifier, and a global ceiling on
//!   in-flight resolutions ([`AdmissionQueue`])
//! - Admission slots expire after a time-to-live and cancel the work still
//!   holding them
//! - Bounded retries with exponential backoff, `Retry-After` awareness and an
//!   optional client-side rate limit ([`RetryingFetcher`])
//! - Fail-soft processors: callers get a record, [`Resolution::Unavailable`] or
//!   [`Resolution::Rejected`], never a raw upstream error

pub mod adapter;
pub mod admission;
pub mod clock;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod processor;
pub mod rate_limit;

pub use adapter::ResolverAdapter;
pub use admission::{AdmissionPermit, AdmissionQueue, AdmissionRejection, QueueEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ResolverConfig;
pub use error::{FailureClass, FetchError, ResolverError, Result};
pub use fetcher::{RequestOutcome, RequestSpec, RetryPolicy, RetryingFetcher};
pub use metrics::{MetricsSnapshot, ResolverMetrics};
pub use processor::{
    IdentifierProcessor, MetadataProcessor, MetadataResolver, RecordResolver, Resolution,
    TransactionProcessor, TransactionResolver,
};
pub use rate_limit::RateLimiter;
pub use types::{ProcessingKey, QueueStatus, TokenMetadata, TransactionRecord};
