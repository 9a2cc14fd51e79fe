//! Mock source adapter for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{SourceAdapter, SourceQueryResult};
use crate::rate_limit::SourceError;

/// A configurable mock response for [`MockSource`].
#[derive(Clone, Debug)]
#[allow(dead_code)]
pub enum MockResponse {
    /// Simulate a match with the given detail string.
    Found(String),
    /// Simulate "no candidate in this registry".
    NotFound,
    /// Simulate a 429 rate-limit response.
    RateLimited { retry_after: Option<Duration> },
    /// Simulate a transport or parse error.
    Error(String),
}

/// A hand-rolled mock implementing [`SourceAdapter`] for tests.
///
/// Supports:
/// - A fixed response (used for every call), **or**
/// - A sequence of responses (one per call, repeating the last if exhausted).
/// - Optional per-call latency.
/// - An identifier-keyed mode mirroring CrossRef.
/// - Call counting via [`call_count()`](MockSource::call_count).
pub struct MockSource {
    name: &'static str,
    /// If non-empty, each call pops the next response.
    responses: Mutex<Vec<MockResponse>>,
    /// Fallback when the sequence is empty (or single-response mode).
    fallback: MockResponse,
    requires_doi: bool,
    delay: Option<Duration>,
    call_count: AtomicUsize,
}

impl MockSource {
    /// Create a mock that always returns `response`.
    pub fn new(name: &'static str, response: MockResponse) -> Self {
        Self {
            name,
            responses: Mutex::new(Vec::new()),
            fallback: response,
            requires_doi: false,
            delay: None,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Create a mock that returns responses in order, repeating the last one.
    #[allow(dead_code)]
    pub fn with_sequence(name: &'static str, mut responses: Vec<MockResponse>) -> Self {
        assert!(
            !responses.is_empty(),
            "sequence must have at least one response"
        );
        // Reverse so we can pop() from the front cheaply.
        responses.reverse();
        let fallback = responses.first().cloned().unwrap();
        Self {
            name,
            responses: Mutex::new(responses),
            fallback,
            requires_doi: false,
            delay: None,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Make this mock identifier-keyed, like the CrossRef adapter.
    #[allow(dead_code)]
    pub fn requiring_doi(mut self) -> Self {
        self.requires_doi = true;
        self
    }

    /// Set simulated network latency per call.
    #[allow(dead_code)]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `lookup()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> MockResponse {
        let mut seq = self.responses.lock().unwrap();
        if let Some(resp) = seq.pop() {
            resp
        } else {
            self.fallback.clone()
        }
    }
}

impl SourceAdapter for MockSource {
    fn name(&self) -> &str {
        self.name
    }

    fn requires_doi(&self) -> bool {
        self.requires_doi
    }

    fn lookup<'a>(
        &'a self,
        _citation: &'a str,
        _doi: Option<&'a str>,
        _client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<SourceQueryResult, SourceError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let response = self.next_response();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }

            match response {
                MockResponse::Found(detail) => Ok(Some(detail)),
                MockResponse::NotFound => Ok(None),
                MockResponse::RateLimited { retry_after } => {
                    Err(SourceError::RateLimited { retry_after })
                }
                MockResponse::Error(msg) => Err(SourceError::Other(msg)),
            }
        })
    }
}
