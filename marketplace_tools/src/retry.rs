use std::time::Duration;

use log::*;
use rand::Rng;
use reqwest::{header::RETRY_AFTER, RequestBuilder, Response, StatusCode};

use crate::error::MarketplaceApiError;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 500;
const JITTER_MS: u64 = 250;

/// Bounded exponential backoff for transient upstream failures. Rate limits (429) and gateway
/// hiccups (503/504) are retried, as are transport-level timeouts and connection resets. Anything
/// else propagates immediately so that real errors are not masked by retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS) }
    }
}

pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 503 | 504)
}

/// Parses a `Retry-After` header value in its delay-seconds form. HTTP-date values are ignored;
/// the backoff schedule covers that case.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn retry_after_hint(response: &Response) -> Option<Duration> {
    parse_retry_after(response.headers().get(RETRY_AFTER)?.to_str().ok()?)
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based): base · 2^(attempt-1) plus jitter so
    /// a fleet of clients does not re-hit a rate limit in lockstep.
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt.saturating_sub(1)).min(6);
        let jitter = rand::thread_rng().gen_range(0..JITTER_MS);
        self.base_delay * factor + Duration::from_millis(jitter)
    }

    /// Sends the request produced by `build`, retrying transient failures with backoff and
    /// honouring a `Retry-After` hint when the upstream provides one.
    pub(crate) async fn send<F>(&self, build: F) -> Result<Response, MarketplaceApiError>
    where F: Fn() -> RequestBuilder {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match build().send().await {
                Ok(response) if is_transient_status(response.status()) => {
                    let status = response.status();
                    if attempt >= self.max_attempts {
                        return Err(MarketplaceApiError::Transient {
                            status: Some(status.as_u16()),
                            message: format!("still {status} after {attempt} attempts"),
                        });
                    }
                    let delay = retry_after_hint(&response).unwrap_or_else(|| self.backoff(attempt));
                    warn!(
                        "🛒️ Upstream replied {status}. Retrying in {delay:?} (attempt {attempt}/{})",
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                },
                Ok(response) => return Ok(response),
                Err(e) if e.is_timeout() || e.is_connect() => {
                    if attempt >= self.max_attempts {
                        return Err(MarketplaceApiError::Transient { status: None, message: e.to_string() });
                    }
                    let delay = self.backoff(attempt);
                    warn!("🛒️ Transport failure ({e}). Retrying in {delay:?} (attempt {attempt}/{})", self.max_attempts);
                    tokio::time::sleep(delay).await;
                },
                Err(e) => return Err(MarketplaceApiError::RequestError(e.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn transient_statuses() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
        assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn retry_after_parses_delay_seconds_only() {
        assert_eq!(parse_retry_after("12"), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after(" 3 "), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
    }

    #[test]
    fn backoff_grows_and_stays_bounded() {
        let policy = RetryPolicy::default();
        for attempt in 1..=5 {
            let base = policy.base_delay * (1 << (attempt - 1));
            let d = policy.backoff(attempt);
            assert!(d >= base, "attempt {attempt}: {d:?} < {base:?}");
            assert!(d < base + Duration::from_millis(JITTER_MS), "attempt {attempt}: {d:?} too large");
        }
        // the exponent is capped so a misconfigured attempt counter cannot overflow the shift
        assert!(policy.backoff(40) < Duration::from_secs(60));
    }
}
