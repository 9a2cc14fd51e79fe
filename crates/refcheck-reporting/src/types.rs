use refcheck_core::VerificationReport;
use serde::Serialize;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Markdown,
    Text,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "markdown" | "md" => Ok(Self::Markdown),
            "text" | "txt" => Ok(Self::Text),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

/// Wire shape for a single record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry<'a> {
    pub reference_text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<&'a str>,
    pub is_verified: bool,
    pub verification_notes: &'a str,
}

/// Top-level wire document: entries in input order plus the derived
/// verified/unverified partition for direct display.
#[derive(Debug, Serialize)]
pub struct ReportDocument<'a> {
    pub references: Vec<ReportEntry<'a>>,
    pub verified: Vec<&'a str>,
    pub unverified: Vec<&'a str>,
}

impl<'a> ReportDocument<'a> {
    pub fn from_report(report: &'a VerificationReport) -> Self {
        Self {
            references: report
                .records
                .iter()
                .map(|r| ReportEntry {
                    reference_text: &r.citation,
                    doi: r.doi.as_deref(),
                    is_verified: r.verified,
                    verification_notes: &r.notes,
                })
                .collect(),
            verified: report.verified(),
            unverified: report.unverified(),
        }
    }
}
