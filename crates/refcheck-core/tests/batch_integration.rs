//! Integration tests for the batch coordinator and worker pool.
//!
//! These tests inject mock source chains so that no HTTP requests are
//! made; timer-dependent paths run under paused tokio time.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use refcheck_core::sources::SourceAdapter;
use refcheck_core::sources::mock::{MockResponse, MockSource};
use refcheck_core::{
    Config, ProgressEvent, notes, split_citation_block, verify_references_with_sources,
};
use tokio_util::sync::CancellationToken;

fn chain(sources: Vec<MockSource>) -> Arc<Vec<Arc<dyn SourceAdapter>>> {
    Arc::new(
        sources
            .into_iter()
            .map(|s| Arc::new(s) as Arc<dyn SourceAdapter>)
            .collect(),
    )
}

fn citations(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("Citation number {i}")).collect()
}

#[tokio::test]
async fn records_preserve_input_order() {
    let sources = chain(vec![MockSource::new(
        "PubMed",
        MockResponse::Found("hit".into()),
    )]);
    let config = Config {
        num_workers: 3,
        ..Config::default()
    };

    let report = verify_references_with_sources(
        citations(5),
        sources,
        config,
        |_| {},
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.records.len(), 5);
    for (i, record) in report.records.iter().enumerate() {
        assert_eq!(record.citation, format!("Citation number {i}"));
        assert!(record.verified);
    }
}

#[tokio::test]
async fn blank_entries_are_dropped_before_processing() {
    let sources = chain(vec![
        MockSource::new("PubMed", MockResponse::NotFound),
        MockSource::new("arXiv", MockResponse::NotFound),
    ]);

    let input = vec![
        "".to_string(),
        "  ".to_string(),
        "Random unpublished note".to_string(),
    ];
    let report = verify_references_with_sources(
        input,
        sources,
        Config::default(),
        |_| {},
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.records.len(), 1, "blank lines must be filtered");
    let record = &report.records[0];
    assert_eq!(record.citation, "Random unpublished note");
    assert!(!record.verified);
    assert_eq!(record.notes, notes::NO_MATCH);
}

#[tokio::test]
async fn doi_backed_citation_verifies_via_crossref() {
    let sources = chain(vec![
        MockSource::new(
            "CrossRef",
            MockResponse::Found("https://doi.org/10.1038/s41586-020-12345-6".into()),
        )
        .requiring_doi(),
        MockSource::new("PubMed", MockResponse::NotFound),
    ]);

    let input =
        vec!["Smith, J. (2020). Climate models. Nature. 10.1038/s41586-020-12345-6".to_string()];
    let report = verify_references_with_sources(
        input,
        sources,
        Config::default(),
        |_| {},
        CancellationToken::new(),
    )
    .await;

    let record = &report.records[0];
    assert!(record.verified);
    assert_eq!(record.doi.as_deref(), Some("10.1038/s41586-020-12345-6"));
    assert_eq!(record.notes, notes::VERIFIED_CROSSREF);
}

#[tokio::test(start_paused = true)]
async fn unreachable_source_degrades_to_remaining_tiers() {
    // One registry down for the whole run: every citation still resolves
    // through the next tier, nothing raises, nothing is dropped.
    let sources = chain(vec![
        MockSource::new("Alpha", MockResponse::Error("connection refused".into())),
        MockSource::new("Beta", MockResponse::Found("record".into())),
    ]);
    let config = Config {
        num_workers: 8,
        ..Config::default()
    };

    let report = verify_references_with_sources(
        citations(50),
        sources,
        config,
        |_| {},
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.records.len(), 50);
    assert!(report.records.iter().all(|r| r.verified));
}

#[tokio::test]
async fn pre_cancelled_batch_finalizes_every_citation() {
    let sources = chain(vec![MockSource::new(
        "PubMed",
        MockResponse::Found("unused".into()),
    )]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report =
        verify_references_with_sources(citations(4), sources, Config::default(), |_| {}, cancel)
            .await;

    assert_eq!(report.records.len(), 4, "no citation may be dropped");
    for record in &report.records {
        assert!(!record.verified);
        assert_eq!(record.notes, notes::CUT_SHORT);
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_cuts_short_a_slow_batch() {
    let sources = chain(vec![
        MockSource::new("Slow", MockResponse::Found("never delivered".into()))
            .with_delay(Duration::from_secs(120)),
    ]);
    let config = Config {
        num_workers: 2,
        batch_deadline_secs: Some(1),
        ..Config::default()
    };

    let report = verify_references_with_sources(
        citations(3),
        sources,
        config,
        |_| {},
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.records.len(), 3);
    for record in &report.records {
        assert!(!record.verified);
        assert_eq!(record.notes, notes::CUT_SHORT);
        // Cut short must stay distinguishable from a genuine miss
        assert_ne!(record.notes, notes::NO_MATCH);
    }
    assert_eq!(report.stats().cut_short, 3);
}

#[tokio::test]
async fn empty_input_yields_empty_report() {
    let sources = chain(vec![MockSource::new("PubMed", MockResponse::NotFound)]);
    let report = verify_references_with_sources(
        vec![],
        sources,
        Config::default(),
        |_| {},
        CancellationToken::new(),
    )
    .await;
    assert!(report.records.is_empty());
    assert_eq!(report.stats().total, 0);
}

#[tokio::test]
async fn report_partitions_verified_from_unverified() {
    // Single worker so the response sequence lines up with input order.
    let sources = chain(vec![MockSource::with_sequence(
        "Beta",
        vec![
            MockResponse::Found("first".into()),
            MockResponse::NotFound,
            MockResponse::Found("third".into()),
        ],
    )]);
    let config = Config {
        num_workers: 1,
        ..Config::default()
    };

    let report = verify_references_with_sources(
        citations(3),
        sources,
        config,
        |_| {},
        CancellationToken::new(),
    )
    .await;

    assert_eq!(
        report.verified(),
        vec!["Citation number 0", "Citation number 2"]
    );
    assert_eq!(report.unverified(), vec!["Citation number 1"]);

    let stats = report.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.verified, 2);
    assert_eq!(stats.unverified, 1);
    assert_eq!(stats.cut_short, 0);
}

#[tokio::test]
async fn progress_events_emitted() {
    let sources = chain(vec![MockSource::new(
        "PubMed",
        MockResponse::Found("hit".into()),
    )]);

    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    let progress = move |event: ProgressEvent| {
        let tag = match &event {
            ProgressEvent::Checking { .. } => "checking",
            ProgressEvent::SourceComplete { .. } => "source_complete",
            ProgressEvent::Result { .. } => "result",
        };
        events_clone.lock().unwrap().push(tag.to_string());
    };

    let report = verify_references_with_sources(
        citations(1),
        sources,
        Config::default(),
        progress,
        CancellationToken::new(),
    )
    .await;
    assert_eq!(report.records.len(), 1);

    let collected = events.lock().unwrap();
    assert!(
        collected.contains(&"checking".to_string()),
        "should emit Checking event, got: {collected:?}"
    );
    assert!(
        collected.contains(&"source_complete".to_string()),
        "should emit SourceComplete event, got: {collected:?}"
    );
    assert!(
        collected.contains(&"result".to_string()),
        "should emit Result event, got: {collected:?}"
    );
}

#[tokio::test]
async fn split_block_then_verify_matches_line_count() {
    let block = "First citation\n\nSecond citation\n   \nThird citation";
    let lines = split_citation_block(block);
    assert_eq!(lines.len(), 3);

    let sources = chain(vec![MockSource::new("PubMed", MockResponse::NotFound)]);
    let report = verify_references_with_sources(
        lines,
        sources,
        Config::default(),
        |_| {},
        CancellationToken::new(),
    )
    .await;
    assert_eq!(report.records.len(), 3);
}
