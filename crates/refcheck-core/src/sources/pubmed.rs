use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::{SourceAdapter, SourceQueryResult, USER_AGENT};
use crate::rate_limit::{SourceError, check_rate_limit_response};

/// Free-text search against the PubMed E-utilities esearch endpoint.
/// A single candidate ID is enough to call the citation a likely match.
pub struct PubMed;

impl SourceAdapter for PubMed {
    fn name(&self) -> &str {
        "PubMed"
    }

    fn lookup<'a>(
        &'a self,
        citation: &'a str,
        _doi: Option<&'a str>,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<SourceQueryResult, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let search_url = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";

            let resp = client
                .get(search_url)
                .query(&[
                    ("db", "pubmed"),
                    ("term", citation),
                    ("retmode", "json"),
                    ("retmax", "1"),
                ])
                .header("User-Agent", USER_AGENT)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| SourceError::Other(e.to_string()))?;

            check_rate_limit_response(&resp)?;
            if !resp.status().is_success() {
                return Err(SourceError::Other(format!("HTTP {}", resp.status())));
            }

            let data: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| SourceError::Other(format!("malformed response: {}", e)))?;

            let first_id = data["esearchresult"]["idlist"]
                .as_array()
                .and_then(|arr| arr.first())
                .and_then(|v| v.as_str());

            Ok(first_id.map(|id| format!("https://pubmed.ncbi.nlm.nih.gov/{}/", id)))
        })
    }
}
