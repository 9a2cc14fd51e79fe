use std::io::Write;
use std::path::Path;

use refcheck_core::VerificationReport;

use crate::types::{ExportFormat, ReportDocument};

/// Render a report to a string in the given format.
pub fn render_report(report: &VerificationReport, format: ExportFormat) -> String {
    match format {
        ExportFormat::Json => export_json(report),
        ExportFormat::Csv => export_csv(report),
        ExportFormat::Markdown => export_markdown(report),
        ExportFormat::Text => export_text(report),
    }
}

/// Render and write a report to the given path.
pub fn export_report(
    report: &VerificationReport,
    format: ExportFormat,
    path: &Path,
) -> Result<(), String> {
    let content = render_report(report, format);
    let mut file =
        std::fs::File::create(path).map_err(|e| format!("Failed to create file: {}", e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| format!("Failed to write: {}", e))?;
    Ok(())
}

fn export_json(report: &VerificationReport) -> String {
    let doc = ReportDocument::from_report(report);
    serde_json::to_string_pretty(&doc).expect("report document serialization cannot fail")
}

fn csv_escape(field: &str) -> String {
    if field.contains(['"', ',', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn export_csv(report: &VerificationReport) -> String {
    let mut out = String::from("reference_text,doi,is_verified,verification_notes\n");
    for r in &report.records {
        out.push_str(&format!(
            "{},{},{},{}\n",
            csv_escape(&r.citation),
            csv_escape(r.doi.as_deref().unwrap_or("")),
            r.verified,
            csv_escape(&r.notes),
        ));
    }
    out
}

fn export_markdown(report: &VerificationReport) -> String {
    let stats = report.stats();
    let mut out = String::from("# Reference Verification Report\n\n");
    out.push_str(&format!(
        "{} references checked: {} verified, {} unverified",
        stats.total, stats.verified, stats.unverified
    ));
    if stats.cut_short > 0 {
        out.push_str(&format!(" ({} cut short by the deadline)", stats.cut_short));
    }
    out.push_str("\n\n");

    out.push_str("| # | Status | Reference | Notes |\n");
    out.push_str("|---|--------|-----------|-------|\n");
    for (i, r) in report.records.iter().enumerate() {
        let status = if r.verified { "verified" } else { "unverified" };
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            i + 1,
            status,
            md_escape(&r.citation),
            md_escape(&r.notes),
        ));
    }
    out
}

fn md_escape(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

fn export_text(report: &VerificationReport) -> String {
    let stats = report.stats();
    let total = stats.total;
    let mut out = String::new();
    for (i, r) in report.records.iter().enumerate() {
        let status = if r.verified { "VERIFIED" } else { "UNVERIFIED" };
        out.push_str(&format!(
            "[{}/{}] {:<10} {}\n",
            i + 1,
            total,
            status,
            r.citation
        ));
        out.push_str(&format!("        {}\n", r.notes));
        if let Some(ref doi) = r.doi {
            out.push_str(&format!("        DOI: {}\n", doi));
        }
    }
    out.push_str(&format!(
        "\nTotal: {} ({} verified, {} unverified)\n",
        stats.total, stats.verified, stats.unverified
    ));
    out
}
