//! Source adapter trait and implementations for querying external registries.

pub mod arxiv;
pub mod crossref;
pub mod mock;
pub mod pubmed;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::Config;
use crate::rate_limit::SourceError;

/// Result of a registry lookup: `Some(detail)` on a match (a URL or
/// record id suitable for display), `None` when the registry answered
/// cleanly but had no candidate.
pub type SourceQueryResult = Option<String>;

/// One external registry in the fallback chain.
pub trait SourceAdapter: Send + Sync {
    /// The canonical name of this source (e.g., "CrossRef", "arXiv").
    fn name(&self) -> &str;

    /// Identifier-keyed sources are skipped for citations without a DOI
    /// rather than falling back to free-text search.
    fn requires_doi(&self) -> bool {
        false
    }

    /// Query the registry for the given citation. `doi` is the extracted
    /// identifier, when one exists.
    fn lookup<'a>(
        &'a self,
        citation: &'a str,
        doi: Option<&'a str>,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<SourceQueryResult, SourceError>> + Send + 'a>>;
}

/// User-Agent sent with every registry request.
pub(crate) const USER_AGENT: &str = concat!("refcheck/", env!("CARGO_PKG_VERSION"));

/// Build the fallback chain in priority order, honoring disabled sources.
///
/// Order is a confidence ranking: the DOI-keyed registry first, then the
/// free-text indexes.
pub fn build_source_list(config: &Config) -> Vec<Arc<dyn SourceAdapter>> {
    let enabled = |name: &str| {
        !config
            .disabled_sources
            .iter()
            .any(|d| d.eq_ignore_ascii_case(name))
    };

    let mut sources: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    if enabled("CrossRef") {
        sources.push(Arc::new(crossref::CrossRef {
            mailto: config.crossref_mailto.clone(),
        }));
    }
    if enabled("PubMed") {
        sources.push(Arc::new(pubmed::PubMed));
    }
    if enabled("arXiv") {
        sources.push(Arc::new(arxiv::Arxiv));
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_chain_in_priority_order() {
        let sources = build_source_list(&Config::default());
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["CrossRef", "PubMed", "arXiv"]);
    }

    #[test]
    fn disabled_sources_are_skipped() {
        let config = Config {
            disabled_sources: vec!["crossref".into(), "ARXIV".into()],
            ..Config::default()
        };
        let sources = build_source_list(&config);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name(), "PubMed");
    }

    #[test]
    fn only_crossref_requires_doi() {
        let sources = build_source_list(&Config::default());
        let keyed: Vec<&str> = sources
            .iter()
            .filter(|s| s.requires_doi())
            .map(|s| s.name())
            .collect();
        assert_eq!(keyed, ["CrossRef"]);
    }
}
