use std::io::Write;

use owo_colors::OwoColorize;
use refcheck_core::{ProgressEvent, VerificationReport};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

pub fn print_header(w: &mut dyn Write, total: usize) -> std::io::Result<()> {
    writeln!(w, "Verifying {} references...", total)?;
    writeln!(w)?;
    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}

/// Print a real-time progress event.
pub fn print_progress(
    w: &mut dyn Write,
    event: &ProgressEvent,
    color: ColorMode,
) -> std::io::Result<()> {
    match event {
        ProgressEvent::Checking {
            index,
            total,
            citation,
        } => {
            writeln!(
                w,
                "[{}/{}] Checking: \"{}\"",
                index + 1,
                total,
                truncate(citation, 60)
            )?;
        }
        ProgressEvent::Result {
            index,
            total,
            record,
        } => {
            let idx = index + 1;
            if record.verified {
                if color.enabled() {
                    writeln!(
                        w,
                        "[{}/{}] -> {} ({})",
                        idx,
                        total,
                        "VERIFIED".green(),
                        record.notes
                    )?;
                } else {
                    writeln!(w, "[{}/{}] -> VERIFIED ({})", idx, total, record.notes)?;
                }
            } else if color.enabled() {
                writeln!(
                    w,
                    "[{}/{}] -> {} ({})",
                    idx,
                    total,
                    "UNVERIFIED".red(),
                    record.notes
                )?;
            } else {
                writeln!(w, "[{}/{}] -> UNVERIFIED ({})", idx, total, record.notes)?;
            }
        }
        ProgressEvent::SourceComplete { .. } => {
            // Not displayed in CLI output
        }
    }
    Ok(())
}

/// Print a detailed block for every reference that did not verify.
pub fn print_unverified_report(
    w: &mut dyn Write,
    report: &VerificationReport,
    color: ColorMode,
) -> std::io::Result<()> {
    for record in report.records.iter().filter(|r| !r.verified) {
        writeln!(w)?;
        let sep = "=".repeat(60);
        if color.enabled() {
            writeln!(w, "{}", sep.bold().red())?;
            writeln!(w, "{}", "UNVERIFIED REFERENCE".bold().red())?;
            writeln!(w, "{}", sep.bold().red())?;
        } else {
            writeln!(w, "{}", sep)?;
            writeln!(w, "UNVERIFIED REFERENCE")?;
            writeln!(w, "{}", sep)?;
        }
        writeln!(w)?;

        if color.enabled() {
            writeln!(w, "{}:", "Citation".bold())?;
            writeln!(w, "  {}", record.citation.cyan())?;
        } else {
            writeln!(w, "Citation:")?;
            writeln!(w, "  {}", record.citation)?;
        }
        writeln!(w)?;

        if color.enabled() {
            writeln!(w, "{} {}", "Status:".red(), record.notes)?;
        } else {
            writeln!(w, "Status: {}", record.notes)?;
        }

        if let Some(ref doi) = record.doi {
            writeln!(w, "DOI: {}", doi)?;
        }

        if !record.outcomes.is_empty() {
            let tried: Vec<String> = record
                .outcomes
                .iter()
                .map(|o| format!("{} ({})", o.source, o.note))
                .collect();
            let line = format!("Sources tried: {}", tried.join(", "));
            if color.enabled() {
                writeln!(w, "{}", line.dimmed())?;
            } else {
                writeln!(w, "{}", line)?;
            }
        }

        writeln!(w)?;
        let dash_sep = "-".repeat(60);
        if color.enabled() {
            writeln!(w, "{}", dash_sep.bold().red())?;
        } else {
            writeln!(w, "{}", dash_sep)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Print the final summary line(s).
pub fn print_summary(
    w: &mut dyn Write,
    report: &VerificationReport,
    color: ColorMode,
) -> std::io::Result<()> {
    let stats = report.stats();

    let line = format!(
        "Checked {} references: {} verified, {} unverified",
        stats.total, stats.verified, stats.unverified
    );
    if color.enabled() {
        if stats.unverified == 0 {
            writeln!(w, "{}", line.green())?;
        } else {
            writeln!(w, "{}", line.yellow())?;
        }
    } else {
        writeln!(w, "{}", line)?;
    }

    if stats.cut_short > 0 {
        let warn = format!(
            "{} reference(s) were cut short by the deadline and may be retried",
            stats.cut_short
        );
        if color.enabled() {
            writeln!(w, "{}", warn.yellow())?;
        } else {
            writeln!(w, "{}", warn)?;
        }
    }

    Ok(())
}
