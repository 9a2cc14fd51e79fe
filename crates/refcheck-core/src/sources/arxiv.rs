use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::{SourceAdapter, SourceQueryResult, USER_AGENT};
use crate::rate_limit::{SourceError, check_rate_limit_response};

/// Free-text search against the arXiv export API. The response is an
/// Atom feed; any `<entry>` counts as a likely match.
pub struct Arxiv;

impl SourceAdapter for Arxiv {
    fn name(&self) -> &str {
        "arXiv"
    }

    fn lookup<'a>(
        &'a self,
        citation: &'a str,
        _doi: Option<&'a str>,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<SourceQueryResult, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!(
                "http://export.arxiv.org/api/query?search_query=all:{}&start=0&max_results=1",
                urlencoding::encode(citation)
            );

            let resp = client
                .get(&url)
                .header("User-Agent", USER_AGENT)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| SourceError::Other(e.to_string()))?;

            check_rate_limit_response(&resp)?;
            if !resp.status().is_success() {
                return Err(SourceError::Other(format!("HTTP {}", resp.status())));
            }

            let body = resp
                .text()
                .await
                .map_err(|e| SourceError::Other(e.to_string()))?;

            parse_arxiv_feed(&body)
        })
    }
}

/// Scan the Atom feed for the first `<entry>` and return its `<id>`.
fn parse_arxiv_feed(xml: &str) -> Result<SourceQueryResult, SourceError> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);

    let mut in_entry = false;
    let mut in_id = false;
    let mut entry_id = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"entry" => {
                    in_entry = true;
                    entry_id.clear();
                }
                b"id" if in_entry => {
                    in_id = true;
                    entry_id.clear();
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_id {
                    let text = e.unescape().unwrap_or_default();
                    entry_id.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"entry" => {
                    // First entry is all we asked for
                    let detail = if entry_id.trim().is_empty() {
                        "arXiv entry".to_string()
                    } else {
                        entry_id.trim().to_string()
                    };
                    return Ok(Some(detail));
                }
                b"id" => in_id = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Other(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED_WITH_ENTRY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query: search_query=all:attention</title>
  <id>http://arxiv.org/api/query-id</id>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <title>Attention Is All You Need</title>
    <author><name>Ashish Vaswani</name></author>
  </entry>
</feed>"#;

    const FEED_EMPTY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query: search_query=all:nothing</title>
  <id>http://arxiv.org/api/query-id</id>
  <opensearch:totalResults xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">0</opensearch:totalResults>
</feed>"#;

    #[test]
    fn entry_is_a_match() {
        let result = parse_arxiv_feed(FEED_WITH_ENTRY).unwrap();
        assert_eq!(result, Some("http://arxiv.org/abs/1706.03762v7".into()));
    }

    #[test]
    fn empty_feed_is_a_clean_miss() {
        let result = parse_arxiv_feed(FEED_EMPTY).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn truncated_feed_never_false_matches() {
        // A body cut off mid-entry must not count as a match, whether the
        // reader reports an error or a clean EOF.
        match parse_arxiv_feed("<feed><entry><id>http://arxiv.org/abs/1") {
            Ok(result) => assert!(result.is_none()),
            Err(_) => {}
        }
    }
}
