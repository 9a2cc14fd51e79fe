use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::{SourceAdapter, SourceQueryResult, USER_AGENT};
use crate::rate_limit::{SourceError, check_rate_limit_response};

/// DOI-keyed lookup against the CrossRef works endpoint.
///
/// This source never performs a free-text search: it is skipped outright
/// for citations without an extracted DOI.
pub struct CrossRef {
    pub mailto: Option<String>,
}

impl SourceAdapter for CrossRef {
    fn name(&self) -> &str {
        "CrossRef"
    }

    fn requires_doi(&self) -> bool {
        true
    }

    fn lookup<'a>(
        &'a self,
        _citation: &'a str,
        doi: Option<&'a str>,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<SourceQueryResult, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let doi = doi.ok_or_else(|| SourceError::Other("no DOI to look up".into()))?;
            let url = format!(
                "https://api.crossref.org/works/{}",
                urlencoding::encode(doi)
            );

            let user_agent = if let Some(ref email) = self.mailto {
                format!("{} (mailto:{})", USER_AGENT, email)
            } else {
                USER_AGENT.to_string()
            };

            let resp = client
                .get(&url)
                .header("User-Agent", user_agent)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| SourceError::Other(e.to_string()))?;

            check_rate_limit_response(&resp)?;
            let status = resp.status();
            // An unregistered DOI is a clean miss, not a failure
            if status.as_u16() == 404 {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(SourceError::Other(format!("HTTP {}", status)));
            }

            let data: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| SourceError::Other(format!("malformed response: {}", e)))?;

            if data["status"].as_str() != Some("ok") {
                return Ok(None);
            }

            // The registry resolves some malformed DOIs to a different
            // record; only an exact (case-insensitive) match counts.
            let found = data["message"]["DOI"].as_str().unwrap_or("");
            if found.eq_ignore_ascii_case(doi) {
                Ok(Some(format!("https://doi.org/{}", found)))
            } else {
                Ok(None)
            }
        })
    }
}
