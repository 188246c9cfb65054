//! Retrying HTTP executor
//!
//! [`RetryingFetcher`] runs one upstream request with a bounded number of
//! attempts. Every failed attempt is classified (see [`FetchError::class`]):
//! transient failures are retried after an exponential backoff, fatal ones end
//! the call immediately. The caller always gets a [`RequestOutcome`] back; no
//! error is dropped on the floor.
//!
//! Backoff for attempt `n` (0-indexed) is `base_delay * 2^n`, capped at
//! `max_delay`. A `Retry-After` hint on a 429 replaces the computed delay. No
//! suspension follows the final attempt.

use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::clock::Clock;
use crate::error::{FailureClass, FetchError};
use crate::rate_limit::RateLimiter;

/// One immutable upstream request
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

impl RequestSpec {
    /// `GET url`
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// `POST url` with a JSON body
    pub fn post_json(url: Url, body: Value) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: Vec::new(),
            body: Some(body),
        }
    }

    /// Add a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

/// Attempt budget and backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first; values below 1 are treated as 1
    pub max_attempts: u32,

    /// Delay after the first failed attempt
    pub base_delay: Duration,

    /// Cap on any single suspension
    pub max_delay: Duration,

    /// Randomize each computed delay within `[delay/2, delay]`
    pub jitter: bool,
}

impl RetryPolicy {
    /// Deterministic policy with a 60s delay cap
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: Duration::from_secs(60),
            jitter: false,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Computed backoff after failed attempt `attempt` (0-indexed), before jitter
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Suspension to apply after `error` ended attempt `attempt`
    pub fn delay_for(&self, attempt: u32, error: &FetchError) -> Duration {
        if let FetchError::RateLimited {
            retry_after: Some(hint),
        } = error
        {
            return (*hint).min(self.max_delay);
        }

        let delay = self.backoff_delay(attempt);
        if self.jitter {
            apply_jitter(delay)
        } else {
            delay
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let millis = delay.as_millis() as u64;
    let half = millis / 2;
    let extra = rand::thread_rng().gen_range(0..=millis - half);
    Duration::from_millis(half + extra)
}

/// Final result of [`RetryingFetcher::execute`]
#[derive(Debug)]
pub enum RequestOutcome {
    /// 2xx with a JSON body
    Success {
        /// Parsed body
        payload: Value,
        /// Attempts made
        attempts: u32,
    },

    /// A failure retrying cannot fix
    Fatal {
        /// The failure
        error: FetchError,
        /// Attempts made
        attempts: u32,
    },

    /// Transient failures outlasted the attempt budget
    RetryExhausted {
        /// Failure of the final attempt
        last_error: FetchError,
        /// Attempts made
        attempts: u32,
    },

    /// The cancellation token fired before a definite outcome
    Cancelled {
        /// Attempts started
        attempts: u32,
    },
}

impl RequestOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            RequestOutcome::Success { attempts, .. }
            | RequestOutcome::Fatal { attempts, .. }
            | RequestOutcome::RetryExhausted { attempts, .. }
            | RequestOutcome::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Success { .. })
    }

    /// Short classification for logs
    pub fn label(&self) -> &'static str {
        match self {
            RequestOutcome::Success { .. } => "success",
            RequestOutcome::Fatal { .. } => "fatal",
            RequestOutcome::RetryExhausted { .. } => "retry_exhausted",
            RequestOutcome::Cancelled { .. } => "cancelled",
        }
    }
}

/// Executes requests with retries, backoff and an optional rate limit
pub struct RetryingFetcher {
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
    rate_limiter: RateLimiter,
}

impl RetryingFetcher {
    pub fn new(client: reqwest::Client, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            clock,
            rate_limiter: RateLimiter::unlimited(),
        }
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Run `spec` until success, a fatal failure, or the budget runs out
    pub async fn execute(&self, spec: &RequestSpec, policy: &RetryPolicy) -> RequestOutcome {
        self.run(spec, policy, None).await
    }

    /// Like [`execute`](Self::execute), but abandons the in-flight attempt or
    /// backoff as soon as `cancel` fires
    pub async fn execute_cancellable(
        &self,
        spec: &RequestSpec,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> RequestOutcome {
        self.run(spec, policy, Some(cancel)).await
    }

    async fn run(
        &self,
        spec: &RequestSpec,
        policy: &RetryPolicy,
        cancel: Option<&CancellationToken>,
    ) -> RequestOutcome {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let result = match until_cancelled(cancel, self.attempt(spec)).await {
                Some(result) => result,
                None => return RequestOutcome::Cancelled { attempts: attempt },
            };
            let attempts = attempt + 1;

            let error = match result {
                Ok(payload) => {
                    debug!("{} {} succeeded after {} attempt(s)", spec.method, spec.url, attempts);
                    return RequestOutcome::Success { payload, attempts };
                }
                Err(error) => error,
            };

            if error.class() == FailureClass::Fatal {
                debug!("{} {} failed fatally: {}", spec.method, spec.url, error);
                return RequestOutcome::Fatal { error, attempts };
            }

            if attempts >= max_attempts {
                warn!(
                    "Attempt {}/{} failed for {}: {}. Giving up",
                    attempts, max_attempts, spec.url, error
                );
                return RequestOutcome::RetryExhausted {
                    last_error: error,
                    attempts,
                };
            }

            let delay = policy.delay_for(attempt, &error);
            warn!(
                "Attempt {}/{} failed for {}: {}. Retrying in {}ms...",
                attempts,
                max_attempts,
                spec.url,
                error,
                delay.as_millis()
            );

            if until_cancelled(cancel, self.clock.sleep(delay)).await.is_none() {
                return RequestOutcome::Cancelled { attempts };
            }
            attempt = attempts;
        }
    }

    async fn attempt(&self, spec: &RequestSpec) -> Result<Value, FetchError> {
        self.rate_limiter.wait().await;

        let mut request = self.client.request(spec.method.clone(), spec.url.clone());
        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &spec.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                retry_after: parse_retry_after(response.headers()),
            });
        }
        if status.is_server_error() {
            return Err(FetchError::ServerError {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Rejected {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// `Retry-After` in delta-seconds form; HTTP-date hints are ignored
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

async fn until_cancelled<F: Future>(
    cancel: Option<&CancellationToken>,
    future: F,
) -> Option<F::Output> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => None,
            output = future => Some(output),
        },
        None => Some(future.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_backoff_doubles_from_base() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1000));
        let delays: Vec<u128> = (0..4).map(|n| policy.backoff_delay(n).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000]);
    }

    #[test]
    fn test_backoff_respects_cap() {
        let policy = RetryPolicy::new(40, Duration::from_millis(1000))
            .with_max_delay(Duration::from_secs(5));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(5));
        assert_eq!(policy.backoff_delay(39), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_after_hint_overrides_backoff() {
        let policy = RetryPolicy::default();
        let hinted = FetchError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        let unhinted = FetchError::RateLimited { retry_after: None };

        assert_eq!(policy.delay_for(2, &hinted), Duration::from_secs(7));
        assert_eq!(policy.delay_for(1, &unhinted), Duration::from_millis(2000));
    }

    #[test]
    fn test_jitter_stays_within_half_to_full_delay() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000)).with_jitter(true);
        let error = FetchError::ServerError { status: 502 };
        for _ in 0..200 {
            let delay = policy.delay_for(1, &error);
            assert!(delay >= Duration::from_millis(1000), "{:?}", delay);
            assert!(delay <= Duration::from_millis(2000), "{:?}", delay);
        }
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }
}
