//! Intake Core - Resumable parallel document ingestion
//!
//! This crate contains the full ingestion pipeline, including:
//! - Checkpoint ledger (durable per-document processing state)
//! - Document selection and filtering
//! - Worker pool with per-stage timeouts
//! - Business-aware chunking for contracts and spreadsheets
//! - Run orchestration with two-stage interrupt and final reporting

pub mod chunker;
pub mod collaborators;
pub mod config;
pub mod document;
pub mod error;
pub mod ledger;
pub mod pipeline;

pub use chunker::BusinessChunker;
pub use config::{ChunkerConfig, RunConfig};
pub use document::{Chunk, DocumentDescriptor, FileKind, ProcessingStatus};
pub use error::{ErrorCategory, PipelineError};
pub use ledger::{CheckpointLedger, FilterCriteria, FilterOutcome};
pub use pipeline::{Orchestrator, ProgressSnapshot, RunReport};
