//! Per-source throttling with adaptive governor instances.
//!
//! Each lookup holds a semaphore permit for its source (bounding in-flight
//! requests) and waits for the governor (spacing request starts at the
//! configured rate). On 429 the governor is swapped to a slower rate; after
//! a quiet minute the original rate is restored.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use thiserror::Error;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::LookupOutcome;
use crate::sources::{SourceAdapter, SourceQueryResult};

/// Type alias for governor's direct rate limiter.
type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Error type for source lookups, distinguishing rate limiting from
/// other failures. Always recovered before leaving the pipeline.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Server returned 429 Too Many Requests.
    #[error("rate limited (429)")]
    RateLimited { retry_after: Option<Duration> },
    /// Transport error, bad HTTP status, or malformed response body.
    #[error("{0}")]
    Other(String),
}

/// Throttle for one source: an in-flight cap plus an adaptive request
/// governor swapped via ArcSwap.
///
/// When a 429 is received, the governor is atomically replaced with one
/// at half the rate (period doubled, capped at 16x). After 60s with no
/// further 429s, the original rate is restored.
pub struct SourceLimiter {
    semaphore: Semaphore,
    limiter: ArcSwap<DirectLimiter>,
    /// Base period between allowed request starts.
    base_period: Duration,
    /// Current slowdown factor (1 = normal, 2 = half rate, etc.).
    current_factor: AtomicU32,
    /// Timestamp of the last 429 response.
    last_429: std::sync::Mutex<Option<Instant>>,
}

impl SourceLimiter {
    /// Create a limiter with `max_in_flight` concurrent requests and the
    /// given period between request starts.
    pub fn new(max_in_flight: usize, period: Duration) -> Self {
        let quota = Quota::with_period(period).expect("period must be > 0");
        let limiter = Arc::new(DirectLimiter::direct(quota));
        Self {
            semaphore: Semaphore::new(max_in_flight.max(1)),
            limiter: ArcSwap::from(limiter),
            base_period: period,
            current_factor: AtomicU32::new(1),
            last_429: std::sync::Mutex::new(None),
        }
    }

    /// Create a limiter allowing `n` request starts per second.
    pub fn per_second(max_in_flight: usize, n: u32) -> Self {
        let ms = 1000 / n.max(1) as u64;
        Self::new(max_in_flight, Duration::from_millis(ms))
    }

    /// Wait until this source may issue a request.
    ///
    /// Blocks until an in-flight slot is free, then until the governor
    /// allows the next request start. The returned permit must be held
    /// for the duration of the request.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.try_decay();
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("limiter semaphore is never closed");
        let limiter = self.limiter.load();
        limiter.until_ready().await;
        permit
    }

    /// Called when a 429 is received. Doubles the slowdown factor and
    /// swaps the governor.
    pub fn on_rate_limited(&self) {
        if let Ok(mut last) = self.last_429.lock() {
            *last = Some(Instant::now());
        }

        // Double factor, cap at 16x slowdown
        let _ = self
            .current_factor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| {
                Some((f * 2).min(16))
            });

        let factor = self.current_factor.load(Ordering::SeqCst);
        if let Some(scaled) = self.base_period.checked_mul(factor)
            && let Some(quota) = Quota::with_period(scaled)
        {
            let new_limiter = Arc::new(DirectLimiter::direct(quota));
            self.limiter.store(new_limiter);
        }
    }

    /// If 60s have passed since the last 429, restore the original rate.
    fn try_decay(&self) {
        let should_restore = self
            .last_429
            .lock()
            .ok()
            .and_then(|last| last.map(|t| t.elapsed().as_secs() >= 60))
            .unwrap_or(false);

        if should_restore && self.current_factor.load(Ordering::SeqCst) > 1 {
            self.current_factor.store(1, Ordering::SeqCst);
            let quota = Quota::with_period(self.base_period).expect("base period valid");
            let limiter = Arc::new(DirectLimiter::direct(quota));
            self.limiter.store(limiter);
        }
    }
}

/// Maximum in-flight requests per source.
const MAX_IN_FLIGHT: usize = 4;

/// Collection of per-source limiters, keyed by adapter name.
pub struct SourceLimiters {
    limiters: HashMap<&'static str, SourceLimiter>,
}

impl Default for SourceLimiters {
    fn default() -> Self {
        Self::new(false)
    }
}

impl SourceLimiters {
    /// Build limiters for the known registries. CrossRef grants a higher
    /// rate to requests identifying themselves with a mailto.
    pub fn new(has_crossref_mailto: bool) -> Self {
        let mut limiters = HashMap::new();

        // CrossRef: 1/s anonymous, 3/s in the polite pool
        let crossref_rate = if has_crossref_mailto { 3 } else { 1 };
        limiters.insert(
            "CrossRef",
            SourceLimiter::per_second(MAX_IN_FLIGHT, crossref_rate),
        );

        // PubMed E-utilities: 3/s without an API key
        limiters.insert("PubMed", SourceLimiter::per_second(MAX_IN_FLIGHT, 3));

        // arXiv API: 3/s is the documented limit
        limiters.insert("arXiv", SourceLimiter::per_second(MAX_IN_FLIGHT, 3));

        Self { limiters }
    }

    /// Get the limiter for a given source, if one exists.
    pub fn get(&self, source_name: &str) -> Option<&SourceLimiter> {
        self.limiters.get(source_name)
    }
}

/// Check if an HTTP response is a 429 and extract Retry-After if present.
///
/// Returns `Err(SourceError::RateLimited { .. })` if 429, `Ok(())` otherwise.
pub fn check_rate_limit_response(resp: &reqwest::Response) -> Result<(), SourceError> {
    if resp.status().as_u16() == 429 {
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        Err(SourceError::RateLimited { retry_after })
    } else {
        Ok(())
    }
}

/// Parse a Retry-After header value (seconds or HTTP-date).
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    // Try parsing as integer seconds first
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    // HTTP-date form gets a conservative fallback
    if value.contains(',') || value.contains("GMT") {
        return Some(Duration::from_secs(5));
    }
    None
}

/// Run one source lookup under its limiter, with a single bounded retry.
///
/// A clean "no match" answer returns immediately. A failed call gets one
/// retry: 429s honor Retry-After (capped at the call timeout) and slow
/// the governor first, anything else waits a jittered backoff. A second
/// failure is downgraded to an unmatched [`LookupOutcome`] whose note
/// carries the error, so callers never see an exception.
pub async fn lookup_with_retry(
    source: &dyn SourceAdapter,
    citation: &str,
    doi: Option<&str>,
    client: &reqwest::Client,
    timeout: Duration,
    backoff: Duration,
    limiters: &SourceLimiters,
) -> LookupOutcome {
    let limiter = limiters.get(source.name());

    let err = match run_limited(source, citation, doi, client, timeout, limiter).await {
        Ok(result) => return outcome_from_result(source.name(), result),
        Err(e) => e,
    };

    let wait = match &err {
        SourceError::RateLimited { retry_after } => {
            if let Some(lim) = limiter {
                lim.on_rate_limited();
            }
            retry_after.unwrap_or(backoff).min(timeout)
        }
        SourceError::Other(_) => jittered(backoff),
    };
    tracing::debug!(
        source = source.name(),
        error = %err,
        wait_ms = wait.as_millis() as u64,
        "lookup failed, retrying once"
    );
    tokio::time::sleep(wait).await;

    match run_limited(source, citation, doi, client, timeout, limiter).await {
        Ok(result) => outcome_from_result(source.name(), result),
        Err(e) => {
            tracing::debug!(source = source.name(), error = %e, "retry failed, giving up");
            LookupOutcome {
                source: source.name().to_string(),
                matched: false,
                note: format!("lookup failed: {}", e),
            }
        }
    }
}

async fn run_limited(
    source: &dyn SourceAdapter,
    citation: &str,
    doi: Option<&str>,
    client: &reqwest::Client,
    timeout: Duration,
    limiter: Option<&SourceLimiter>,
) -> Result<SourceQueryResult, SourceError> {
    let _permit = match limiter {
        Some(lim) => Some(lim.acquire().await),
        None => None,
    };
    source.lookup(citation, doi, client, timeout).await
}

fn outcome_from_result(name: &str, result: SourceQueryResult) -> LookupOutcome {
    match result {
        Some(detail) => LookupOutcome {
            source: name.to_string(),
            matched: true,
            note: detail,
        },
        None => LookupOutcome {
            source: name.to_string(),
            matched: false,
            note: "no match".to_string(),
        },
    }
}

fn jittered(base: Duration) -> Duration {
    base.mul_f64(1.0 + fastrand::f64() * 0.5)
}
