//! Pipeline message types.

use std::time::Duration;

use crate::document::{DocumentDescriptor, FileKind};
use crate::pipeline::stats::WorkerStats;

/// One step of the per-document pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Download,
    Normalize,
    Parse,
    Redact,
    Chunk,
    Embed,
    Upsert,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Download => write!(f, "download"),
            Stage::Normalize => write!(f, "normalize"),
            Stage::Parse => write!(f, "parse"),
            Stage::Redact => write!(f, "redact"),
            Stage::Chunk => write!(f, "chunk"),
            Stage::Embed => write!(f, "embed"),
            Stage::Upsert => write!(f, "upsert"),
        }
    }
}

/// A document plus the run's effective configuration, or the poison
/// sentinel that tells a worker to stop pulling work.
#[derive(Debug, Clone)]
pub enum WorkItem {
    Document(Box<WorkPayload>),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct WorkPayload {
    pub descriptor: DocumentDescriptor,
    pub namespace: String,
    pub redact: bool,
}

/// Outcome of one document attempt, reported by a worker.
#[derive(Debug, Clone)]
pub struct DocumentResult {
    pub worker_id: usize,
    pub path: String,
    pub file_kind: FileKind,
    pub success: bool,
    pub chunks_created: usize,
    pub elapsed: Duration,
    /// Ordered: fatal stage error first, then non-fatal warnings.
    pub errors: Vec<String>,
    pub parser_used: &'static str,
}

/// Everything a worker sends back to the orchestrator. `Stats` and
/// `Fatal` are terminal: each worker emits exactly one of them.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    Result(DocumentResult),
    Fatal { worker_id: usize, message: String },
    Stats(WorkerStats),
}
