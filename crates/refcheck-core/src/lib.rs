use std::sync::Arc;

use serde::Serialize;

pub mod batch;
pub mod identifier;
pub mod orchestrator;
pub mod pool;
pub mod rate_limit;
pub mod sources;

// Re-export for convenience
pub use batch::{verify_references, verify_references_with_sources};
pub use identifier::extract_doi;
pub use orchestrator::notes;
pub use rate_limit::{SourceError, SourceLimiters};

/// Outcome of querying a single source for a single citation.
///
/// Never an error for the caller: transport and parse failures are
/// downgraded to `matched = false` with the reason in `note`, so a
/// "not found" answer stays distinguishable from a lookup that broke.
#[derive(Debug, Clone, Serialize)]
pub struct LookupOutcome {
    pub source: String,
    pub matched: bool,
    pub note: String,
}

/// Final result for one citation. Created once per pipeline run and
/// never updated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationRecord {
    /// The citation text exactly as submitted (post trim).
    pub citation: String,
    /// DOI extracted from the citation text, if any.
    pub doi: Option<String>,
    /// True only if some source in the chain reported a match.
    pub verified: bool,
    /// Human-readable justification reflecting the last decisive step.
    pub notes: String,
    /// Per-source outcomes in the order the tiers ran.
    pub outcomes: Vec<LookupOutcome>,
}

impl VerificationRecord {
    /// Whether this record was finalized by a batch deadline or
    /// cancellation rather than a real lookup result.
    pub fn is_cut_short(&self) -> bool {
        self.notes == notes::CUT_SHORT
    }
}

/// Ordered per-citation results for one batch run. Record order is
/// input order, regardless of completion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    pub records: Vec<VerificationRecord>,
}

impl VerificationReport {
    /// Citation texts that verified, in input order.
    pub fn verified(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.verified)
            .map(|r| r.citation.as_str())
            .collect()
    }

    /// Citation texts that did not verify, in input order.
    pub fn unverified(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| !r.verified)
            .map(|r| r.citation.as_str())
            .collect()
    }

    pub fn stats(&self) -> ReportStats {
        let mut stats = ReportStats {
            total: self.records.len(),
            ..ReportStats::default()
        };
        for record in &self.records {
            if record.verified {
                stats.verified += 1;
            } else {
                stats.unverified += 1;
            }
            if record.is_cut_short() {
                stats.cut_short += 1;
            }
        }
        stats
    }
}

/// Summary counts for a complete batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    pub total: usize,
    pub verified: usize,
    pub unverified: usize,
    /// Unverified records finalized by the batch deadline, not by lookups.
    pub cut_short: usize,
}

/// Progress events emitted during a batch run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Checking {
        index: usize,
        total: usize,
        citation: String,
    },
    SourceComplete {
        index: usize,
        outcome: LookupOutcome,
    },
    Result {
        index: usize,
        total: usize,
        record: Box<VerificationRecord>,
    },
}

/// Configuration for the verification pipeline.
#[derive(Clone)]
pub struct Config {
    /// How many citations are verified concurrently.
    pub num_workers: usize,
    /// Per-request timeout for each source call, in seconds.
    pub source_timeout_secs: u64,
    /// Base backoff before the single retry of a failed source call.
    pub retry_backoff_ms: u64,
    /// Overall deadline for a whole batch; unresolved citations are
    /// finalized as cut short when it expires.
    pub batch_deadline_secs: Option<u64>,
    /// Source names to leave out of the fallback chain.
    pub disabled_sources: Vec<String>,
    /// Contact email sent to CrossRef for the polite pool.
    pub crossref_mailto: Option<String>,
    pub limiters: Arc<SourceLimiters>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("num_workers", &self.num_workers)
            .field("source_timeout_secs", &self.source_timeout_secs)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("batch_deadline_secs", &self.batch_deadline_secs)
            .field("disabled_sources", &self.disabled_sources)
            .field(
                "crossref_mailto",
                &self.crossref_mailto.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_workers: 4,
            source_timeout_secs: 5,
            retry_backoff_ms: 500,
            batch_deadline_secs: None,
            disabled_sources: vec![],
            crossref_mailto: None,
            limiters: Arc::new(SourceLimiters::default()),
        }
    }
}

/// Split a newline-delimited citation block into trimmed, non-empty lines.
pub fn split_citation_block(block: &str) -> Vec<String> {
    block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod split_tests {
    use super::*;

    #[test]
    fn drops_blank_lines() {
        let block = "First citation\n\n   \nSecond citation\n";
        assert_eq!(
            split_citation_block(block),
            vec!["First citation", "Second citation"]
        );
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(split_citation_block("  padded  "), vec!["padded"]);
    }

    #[test]
    fn empty_block_yields_nothing() {
        assert!(split_citation_block("").is_empty());
        assert!(split_citation_block("\n\n").is_empty());
    }
}
