use once_cell::sync::Lazy;
use regex::Regex;

/// Strip sentence punctuation and unbalanced closing parentheses that
/// trail a captured DOI. DOIs may legitimately contain parentheses
/// (e.g. `10.1016/0021-9681(87)90171-8`), so only a `)` without a
/// matching `(` inside the token is removed.
fn clean_doi(doi: &str) -> String {
    let mut doi = doi.trim_end_matches(['.', ',', ';', ':']);

    loop {
        if doi.ends_with(')') && doi.matches(')').count() > doi.matches('(').count() {
            doi = &doi[..doi.len() - 1];
            doi = doi.trim_end_matches(['.', ',', ';', ':']);
        } else {
            break;
        }
    }

    doi.to_string()
}

/// Extract a DOI from free-text citation text.
///
/// Matches `10.<4-9 digit registrant>/<suffix>` case-insensitively,
/// with the suffix drawn from alphanumerics and `-._;()/:`. If the text
/// contains several DOI-shaped substrings, the first by position wins.
/// Any non-matching input yields `None`; absence is a normal state, not
/// an error.
pub fn extract_doi(text: &str) -> Option<String> {
    static DOI_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\b10\.\d{4,9}/[-._;()/:a-z0-9]+").unwrap());

    DOI_RE.find(text).map(|m| clean_doi(m.as_str()))
}
