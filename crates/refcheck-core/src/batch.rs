//! Batch coordinator: fans a citation list out to the worker pool and
//! reassembles the per-citation records into a report in input order.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::orchestrator;
use crate::pool::{CitationJob, VerificationPool};
use crate::sources::{SourceAdapter, build_source_list};
use crate::{Config, ProgressEvent, VerificationRecord, VerificationReport};

/// Verify a list of citations against the default source chain.
///
/// Blank entries are trimmed away before processing. Citations are
/// verified concurrently (up to `config.num_workers` at a time), but the
/// report preserves input order regardless of completion order, with
/// exactly one record per non-blank input. Progress events are emitted
/// via the callback; the operation can be stopped early through the
/// CancellationToken or `config.batch_deadline_secs`.
pub async fn verify_references(
    citations: Vec<String>,
    config: Config,
    progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
    cancel: CancellationToken,
) -> VerificationReport {
    let sources = Arc::new(build_source_list(&config));
    verify_references_with_sources(citations, sources, config, progress, cancel).await
}

/// Same as [`verify_references`], but over an explicit source chain.
pub async fn verify_references_with_sources(
    citations: Vec<String>,
    sources: Arc<Vec<Arc<dyn SourceAdapter>>>,
    config: Config,
    progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
    cancel: CancellationToken,
) -> VerificationReport {
    let citations: Vec<String> = citations
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    let total = citations.len();
    if total == 0 {
        return VerificationReport::default();
    }

    let num_workers = config.num_workers.max(1);
    let deadline = config.batch_deadline_secs.map(Duration::from_secs);
    let config = Arc::new(config);
    let progress: Arc<dyn Fn(ProgressEvent) + Send + Sync> = Arc::new(progress);

    // Deadline watchdog: cancels in-flight work when the deadline expires.
    // Unresolved citations are finalized as cut short, which stays
    // distinguishable from a genuine "not found".
    let watchdog = deadline.map(|d| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(d).await;
            tracing::warn!(
                deadline_secs = d.as_secs(),
                "batch deadline exceeded, cancelling in-flight lookups"
            );
            cancel.cancel();
        })
    });

    let pool = VerificationPool::with_sources(config, cancel.clone(), num_workers, sources);

    let mut receivers = Vec::with_capacity(total);
    for (i, citation) in citations.iter().enumerate() {
        let (result_tx, result_rx) = tokio::sync::oneshot::channel();
        let job = CitationJob {
            citation: citation.clone(),
            result_tx,
            index: i,
            total,
            progress: progress.clone(),
        };
        pool.submit(job).await;
        receivers.push((i, result_rx));
    }

    // Reassemble into input order. A dropped sender means the job never
    // ran; the citation still gets a record rather than being dropped.
    let mut records: Vec<Option<VerificationRecord>> = vec![None; total];
    for (i, rx) in receivers {
        records[i] = Some(match rx.await {
            Ok(record) => record,
            Err(_) => orchestrator::cut_short(&citations[i]),
        });
    }

    pool.shutdown().await;
    if let Some(w) = watchdog {
        w.abort();
    }

    VerificationReport {
        records: records.into_iter().flatten().collect(),
    }
}
