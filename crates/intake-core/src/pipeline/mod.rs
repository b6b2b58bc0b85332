//! Parallel ingestion pipeline: orchestrator, worker pool, progress and
//! reporting.
//!
//! The orchestrator owns document selection, the checkpoint ledger, and
//! the two-stage interrupt; workers own per-document stage execution.
//! Everything crosses between them as messages, never shared state.

mod orchestrator;
mod progress;
mod stats;
mod types;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::Orchestrator;
pub use progress::{ProgressPublisher, ProgressSnapshot};
pub use stats::{DurationSummary, FileKindStats, ReportBuilder, RunReport, WorkerStats};
pub use types::{DocumentResult, Stage, WorkItem, WorkPayload, WorkerMessage};
pub use worker::{run_worker, SharedReceiver};
