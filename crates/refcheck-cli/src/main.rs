use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use refcheck_reporting::ExportFormat;
use tokio_util::sync::CancellationToken;

mod output;

use output::ColorMode;

/// Reference Verifier - Check citation lists against public registries
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a newline-delimited citation list (use "-" for stdin)
    Verify {
        /// Path to the citation list, one citation per line
        input: PathBuf,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Contact email sent to CrossRef for the polite pool
        #[arg(long)]
        crossref_mailto: Option<String>,

        /// Comma-separated list of sources to disable
        #[arg(long, value_delimiter = ',')]
        disable_sources: Vec<String>,

        /// Number of citations verified concurrently
        #[arg(long)]
        workers: Option<usize>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Overall deadline for the whole batch, in seconds
        #[arg(long)]
        deadline: Option<u64>,

        /// Write the report to this path
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Export format: json, csv, markdown, or text
        #[arg(long, default_value = "json")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Verify {
            input,
            no_color,
            crossref_mailto,
            disable_sources,
            workers,
            timeout,
            deadline,
            export,
            format,
        } => {
            verify(
                input,
                no_color,
                crossref_mailto,
                disable_sources,
                workers,
                timeout,
                deadline,
                export,
                format,
            )
            .await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn verify(
    input: PathBuf,
    no_color: bool,
    crossref_mailto: Option<String>,
    disable_sources: Vec<String>,
    workers: Option<usize>,
    timeout: Option<u64>,
    deadline: Option<u64>,
    export: Option<PathBuf>,
    format: String,
) -> anyhow::Result<()> {
    // Resolve configuration: CLI flags > env vars > defaults
    let crossref_mailto = crossref_mailto.or_else(|| std::env::var("CROSSREF_MAILTO").ok());
    let source_timeout_secs: u64 = timeout
        .or_else(|| {
            std::env::var("SOURCE_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(5);
    let num_workers: usize = workers
        .or_else(|| {
            std::env::var("NUM_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(4);

    let export_format: ExportFormat = format.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    // Read the citation list
    let text = if input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        if !input.exists() {
            anyhow::bail!("File not found: {}", input.display());
        }
        std::fs::read_to_string(&input)?
    };

    let citations = refcheck_core::split_citation_block(&text);

    let color = ColorMode(!no_color);
    let mut writer: Box<dyn Write> = Box::new(std::io::stdout());

    if citations.is_empty() {
        writeln!(writer, "No citations to verify.")?;
        return Ok(());
    }

    output::print_header(&mut writer, citations.len())?;

    let limiters = Arc::new(refcheck_core::SourceLimiters::new(crossref_mailto.is_some()));
    let config = refcheck_core::Config {
        num_workers,
        source_timeout_secs,
        batch_deadline_secs: deadline,
        disabled_sources: disable_sources,
        crossref_mailto,
        limiters,
        ..refcheck_core::Config::default()
    };

    // Set up progress callback
    let progress_writer: Arc<Mutex<Box<dyn Write + Send>>> =
        Arc::new(Mutex::new(Box::new(std::io::stdout())));

    let progress_color = color;
    let progress_cb = {
        let pw = Arc::clone(&progress_writer);
        move |event: refcheck_core::ProgressEvent| {
            if let Ok(mut w) = pw.lock() {
                let _ = output::print_progress(&mut *w, &event, progress_color);
                let _ = w.flush();
            }
        }
    };

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let report = refcheck_core::verify_references(citations, config, progress_cb, cancel).await;

    // Print final report
    writeln!(writer)?;
    output::print_unverified_report(&mut writer, &report, color)?;
    output::print_summary(&mut writer, &report, color)?;

    if let Some(ref export_path) = export {
        refcheck_reporting::export_report(&report, export_format, export_path)
            .map_err(|e| anyhow::anyhow!(e))?;
        writeln!(writer, "Report written to {}", export_path.display())?;
    }

    Ok(())
}
