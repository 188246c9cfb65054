//! Client-side rate limiting for upstream requests

use governor::{DefaultDirectRateLimiter, Quota};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Optional requests-per-second ceiling shared by every attempt of a fetcher
#[derive(Clone, Default)]
pub struct RateLimiter {
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    requests_per_second: Option<u32>,
}

impl RateLimiter {
    /// No limit; every request is allowed immediately
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Allow at most `requests_per_second` requests per second
    pub fn per_second(requests_per_second: u32) -> Self {
        match NonZeroU32::try_from(requests_per_second) {
            Ok(rate) => Self {
                limiter: Some(Arc::new(DefaultDirectRateLimiter::direct(
                    Quota::per_second(rate),
                ))),
                requests_per_second: Some(requests_per_second),
            },
            Err(_) => {
                tracing::warn!(
                    "Invalid rate limit {}, upstream requests will not be limited",
                    requests_per_second
                );
                Self::unlimited()
            }
        }
    }

    /// Build from an optional configured limit
    pub fn from_config(requests_per_second: Option<u32>) -> Self {
        requests_per_second
            .map(Self::per_second)
            .unwrap_or_else(Self::unlimited)
    }

    /// Check if request is allowed (non-blocking)
    pub fn check(&self) -> bool {
        self.limiter
            .as_ref()
            .map(|limiter| limiter.check().is_ok())
            .unwrap_or(true) // Allow if no limiter configured
    }

    /// Wait until request is allowed
    pub async fn wait(&self) {
        if self.check() {
            return;
        }
        if let Some(limiter) = &self.limiter {
            tracing::debug!(
                "Upstream rate limit of {:?}/s reached, waiting for quota",
                self.requests_per_second
            );
            limiter.until_ready().await;
        }
    }

    /// Configured ceiling, if any
    pub fn limit(&self) -> Option<u32> {
        self.requests_per_second
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("requests_per_second", &self.requests_per_second)
            .finish()
    }
}
