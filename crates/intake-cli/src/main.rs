//! `intake` - run the ingestion pipeline over a discovery ledger.
//!
//! First Ctrl-C drains: in-flight documents finish and their outcomes are
//! flushed to the ledger. Second Ctrl-C force-quits.

mod backend;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use intake_core::collaborators::ParserChoice;
use intake_core::{
    CheckpointLedger, FileKind, FilterCriteria, Orchestrator, PipelineError, RunConfig, RunReport,
};

use crate::backend::LocalBackendFactory;

#[derive(Parser, Debug)]
#[command(name = "intake", version, about = "Resumable parallel document ingestion")]
struct Args {
    /// Discovery ledger (JSON); updated in place with processing outcomes
    #[arg(long, value_name = "LEDGER_JSON")]
    discovery: PathBuf,

    /// Directory documents are read from
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Directory chunk output is written to
    #[arg(long, default_value = "intake-out")]
    out: PathBuf,

    /// Worker count (capped at available cores)
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Namespace for the embedding store
    #[arg(long, default_value = "default")]
    namespace: String,

    /// Parser backend: plain-text, structured-ocr, cloud-ocr
    #[arg(long, default_value = "plain-text")]
    parser: String,

    /// Reprocess documents already marked processed
    #[arg(long)]
    no_resume: bool,

    /// Run the redaction stage
    #[arg(long)]
    redact: bool,

    /// Process at most this many documents
    #[arg(long)]
    limit: Option<usize>,

    /// Only process these file types (comma-separated, e.g. pdf,spreadsheet)
    #[arg(long, value_delimiter = ',')]
    include_types: Vec<String>,

    /// Never process these file types
    #[arg(long, value_delimiter = ',')]
    exclude_types: Vec<String>,

    /// Only documents modified at or after this RFC 3339 timestamp
    #[arg(long)]
    modified_after: Option<DateTime<Utc>>,

    /// Only documents modified at or before this RFC 3339 timestamp
    #[arg(long)]
    modified_before: Option<DateTime<Utc>>,

    /// Minimum document size in bytes
    #[arg(long)]
    min_size: Option<u64>,

    /// Maximum document size in bytes
    #[arg(long)]
    max_size: Option<u64>,

    /// Per-stage timeout in seconds (spreadsheets use a shorter budget)
    #[arg(long)]
    stage_timeout: Option<u64>,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("intake=info".parse().unwrap()),
        )
        .init();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    match rt.block_on(run(args)) {
        Ok(report) => {
            print!("{report}");
            if report.interrupted {
                std::process::exit(130);
            }
        }
        Err(e @ PipelineError::Configuration(_)) => {
            tracing::error!("{e}");
            std::process::exit(2);
        }
        Err(e) => {
            tracing::error!("Run failed: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<RunReport, PipelineError> {
    let parser: ParserChoice = args.parser.parse().map_err(PipelineError::Configuration)?;
    std::fs::create_dir_all(&args.out).map_err(|e| {
        PipelineError::Configuration(format!(
            "cannot create output directory {}: {}",
            args.out.display(),
            e
        ))
    })?;

    let mut config = RunConfig {
        workers: args.workers,
        namespace: args.namespace.clone(),
        parser,
        redact: args.redact,
        resume: !args.no_resume,
        ..RunConfig::default()
    };
    if let Some(secs) = args.stage_timeout {
        config.stage_timeout = Duration::from_secs(secs);
        config.sheet_stage_timeout = config.sheet_stage_timeout.min(config.stage_timeout);
    }

    let criteria = FilterCriteria {
        include_kinds: (!args.include_types.is_empty())
            .then(|| args.include_types.iter().map(|s| parse_kind(s)).collect()),
        exclude_kinds: args.exclude_types.iter().map(|s| parse_kind(s)).collect(),
        modified_after: args.modified_after,
        modified_before: args.modified_before,
        min_size: args.min_size,
        max_size: args.max_size,
        limit: args.limit,
        ..Default::default()
    };

    let mut ledger = CheckpointLedger::load(&args.discovery)?;
    let factory = Arc::new(LocalBackendFactory::new(args.root, args.out, parser));
    let orchestrator = Orchestrator::new(config);

    let drain = orchestrator.drain_token();
    let force = orchestrator.force_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, draining (press Ctrl-C again to force quit)");
            drain.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            force.cancel();
        }
    });

    let progress = tokio::spawn(draw_progress(orchestrator.subscribe_progress()));
    let result = orchestrator.run(&mut ledger, criteria, factory).await;
    progress.abort();
    result
}

async fn draw_progress(
    mut rx: tokio::sync::watch::Receiver<intake_core::ProgressSnapshot>,
) {
    let mut bar: Option<ProgressBar> = None;
    while rx.changed().await.is_ok() {
        let snap = rx.borrow_and_update().clone();
        let bar = bar.get_or_insert_with(|| {
            ProgressBar::new(snap.total as u64).with_style(
                ProgressStyle::with_template(
                    "{bar:40.cyan/blue} {pos}/{len} docs ({msg})",
                )
                .unwrap(),
            )
        });
        bar.set_position(snap.completed() as u64);
        let eta = match snap.eta {
            Some(eta) => format!("eta {}s", eta.as_secs()),
            None => "eta --".to_string(),
        };
        bar.set_message(format!(
            "{} failed, {:.2} docs/s, {}",
            snap.failed, snap.throughput, eta
        ));
        if snap.remaining() == 0 {
            bar.finish();
        }
    }
}

/// Accepts both kind names (`spreadsheet`) and bare extensions (`xlsx`).
fn parse_kind(s: &str) -> FileKind {
    match s.to_ascii_lowercase().as_str() {
        "pdf" => FileKind::Pdf,
        "spreadsheet" => FileKind::Spreadsheet,
        "word" => FileKind::Word,
        "presentation" => FileKind::Presentation,
        "email" => FileKind::Email,
        "text" => FileKind::Text,
        other => FileKind::from_extension(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_and_extensions_parse() {
        assert_eq!(parse_kind("spreadsheet"), FileKind::Spreadsheet);
        assert_eq!(parse_kind("xlsx"), FileKind::Spreadsheet);
        assert_eq!(parse_kind("PDF"), FileKind::Pdf);
        assert_eq!(parse_kind("zip"), FileKind::Other("zip".to_string()));
    }

    #[test]
    fn args_parse_filters() {
        let args = Args::parse_from([
            "intake",
            "--discovery",
            "ledger.json",
            "--include-types",
            "pdf,word",
            "--limit",
            "10",
            "--no-resume",
        ]);
        assert_eq!(args.include_types, vec!["pdf", "word"]);
        assert_eq!(args.limit, Some(10));
        assert!(args.no_resume);
    }
}
