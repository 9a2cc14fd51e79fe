//! Worker pool for citation verification.
//!
//! A fixed number of worker tasks pull jobs from a shared channel and run
//! each citation's fallback chain to completion. Per-source throttling
//! lives in the limiters, so workers need no coordination beyond the
//! channel and the cancellation token.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::{self, verify_reference};
use crate::sources::{SourceAdapter, build_source_list};
use crate::{Config, LookupOutcome, ProgressEvent, VerificationRecord};

/// A single-citation job submitted to the pool.
pub struct CitationJob {
    pub citation: String,
    pub result_tx: oneshot::Sender<VerificationRecord>,
    /// Position in the original input, used to reassemble order.
    pub index: usize,
    pub total: usize,
    /// Progress callback for this job.
    pub progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
}

/// A pool of worker tasks that process citation verification jobs.
///
/// Submit jobs via [`submit()`](VerificationPool::submit), receive results
/// via the oneshot receiver paired with each job.
pub struct VerificationPool {
    job_tx: async_channel::Sender<CitationJob>,
    pool_handle: JoinHandle<()>,
}

impl VerificationPool {
    /// Create a pool with `num_workers` workers over the default source
    /// chain built from `config`.
    pub fn new(config: Arc<Config>, cancel: CancellationToken, num_workers: usize) -> Self {
        let sources = Arc::new(build_source_list(&config));
        Self::with_sources(config, cancel, num_workers, sources)
    }

    /// Create a pool over an explicit source chain. This is the seam for
    /// callers that extend the chain with their own adapters.
    pub fn with_sources(
        config: Arc<Config>,
        cancel: CancellationToken,
        num_workers: usize,
        sources: Arc<Vec<Arc<dyn SourceAdapter>>>,
    ) -> Self {
        let (job_tx, job_rx) = async_channel::unbounded::<CitationJob>();
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let pool_handle = tokio::spawn(async move {
            let mut handles = Vec::with_capacity(num_workers.max(1));

            for _ in 0..num_workers.max(1) {
                handles.push(tokio::spawn(worker_loop(
                    job_rx.clone(),
                    sources.clone(),
                    config.clone(),
                    client.clone(),
                    cancel.clone(),
                )));
            }

            // Drop our clone so workers are the last holders
            drop(job_rx);

            for h in handles {
                let _ = h.await;
            }
        });

        Self {
            job_tx,
            pool_handle,
        }
    }

    /// Submit a job to the pool.
    pub async fn submit(&self, job: CitationJob) {
        let _ = self.job_tx.send(job).await;
    }

    /// Close the pool and wait for all workers to finish.
    pub async fn shutdown(self) {
        self.job_tx.close();
        let _ = self.pool_handle.await;
    }
}

/// Worker loop: pick a job, run the fallback chain, report the record.
///
/// After cancellation, remaining jobs are still drained so that every
/// citation gets a (cut short) record rather than being dropped.
async fn worker_loop(
    job_rx: async_channel::Receiver<CitationJob>,
    sources: Arc<Vec<Arc<dyn SourceAdapter>>>,
    config: Arc<Config>,
    client: reqwest::Client,
    cancel: CancellationToken,
) {
    while let Ok(job) = job_rx.recv().await {
        let CitationJob {
            citation,
            result_tx,
            index,
            total,
            progress,
        } = job;

        if cancel.is_cancelled() {
            tracing::debug!(index, "finalizing without lookups: cancelled");
            let _ = result_tx.send(orchestrator::cut_short(&citation));
            continue;
        }

        progress(ProgressEvent::Checking {
            index,
            total,
            citation: citation.clone(),
        });

        let source_cb = {
            let progress = progress.clone();
            move |outcome: &LookupOutcome| {
                progress(ProgressEvent::SourceComplete {
                    index,
                    outcome: outcome.clone(),
                });
            }
        };

        let record = verify_reference(
            &citation,
            &sources,
            &config,
            &client,
            &cancel,
            Some(&source_cb),
        )
        .await;

        tracing::info!(
            index,
            verified = record.verified,
            notes = %record.notes,
            "citation resolved"
        );

        progress(ProgressEvent::Result {
            index,
            total,
            record: Box::new(record.clone()),
        });
        let _ = result_tx.send(record);
    }
}
