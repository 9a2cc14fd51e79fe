//! Serialization of verification reports for downstream consumers.

pub mod export;
pub mod types;

pub use export::{export_report, render_report};
pub use types::{ExportFormat, ReportDocument, ReportEntry};
