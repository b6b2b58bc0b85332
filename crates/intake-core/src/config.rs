//! Run and chunker configuration.
//!
//! All tuning lives in explicit values threaded through constructors so
//! multiple configurations can coexist in tests; there is no process-wide
//! mutable state.

use std::time::Duration;

use crate::collaborators::ParserChoice;

/// Configuration for one orchestrator run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Requested worker count; the orchestrator caps it at the number of
    /// available cores.
    pub workers: usize,
    /// Namespace handed to the embedding/upsert collaborator.
    pub namespace: String,
    /// Parser backend, selected once at worker initialization.
    pub parser: ParserChoice,
    /// Run the optional redaction stage.
    pub redact: bool,
    /// Skip documents whose last outcome was successful.
    pub resume: bool,
    /// Wall-clock budget per stage for ordinary documents.
    pub stage_timeout: Duration,
    /// Shorter budget for spreadsheet-like documents.
    pub sheet_stage_timeout: Duration,
    /// Flush the ledger every this many recorded outcomes.
    pub flush_interval: usize,
    /// How long to wait for a worker to drain before force-terminating it.
    pub join_timeout: Duration,
    pub chunker: ChunkerConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            namespace: "default".to_string(),
            parser: ParserChoice::PlainText,
            redact: false,
            resume: true,
            stage_timeout: Duration::from_secs(300),
            sheet_stage_timeout: Duration::from_secs(90),
            flush_interval: 25,
            join_timeout: Duration::from_secs(30),
            chunker: ChunkerConfig::pipeline_default(),
        }
    }
}

/// Size bounds for the business-aware chunker.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum characters per text chunk.
    pub max_chunk_size: usize,
    /// Trailing-sentence overlap seeded into the next chunk, in characters.
    /// Clamped to [75, 200].
    pub overlap_size: usize,
    /// Tables at or below this word count are preserved whole.
    pub excel_sheet_max_size: usize,
    /// Sentences shorter than this many words are dropped as noise.
    pub min_sentence_words: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 500,
            overlap_size: 75,
            excel_sheet_max_size: 2000,
            min_sentence_words: 4,
        }
    }
}

impl ChunkerConfig {
    /// Defaults used by the production pipeline path (larger chunks).
    pub fn pipeline_default() -> Self {
        Self {
            max_chunk_size: 1500,
            overlap_size: 200,
            ..Self::default()
        }
    }

    /// Overlap bounds are a retrieval-continuity contract, not a tunable.
    pub fn effective_overlap(&self) -> usize {
        self.overlap_size.clamp(75, 200)
    }
}
