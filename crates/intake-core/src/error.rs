//! Error taxonomy for the ingestion pipeline.
//!
//! Document-scoped errors (`StageTimeout`, `DocumentError`) never escape a
//! worker's per-document boundary; worker-scoped errors (`WorkerFatal`)
//! shrink the pool; run-scoped errors (`CorruptLedger`, `Configuration`)
//! abort before any work is scheduled.

use std::time::Duration;

use crate::pipeline::Stage;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A stage exceeded its wall-clock budget. Document-scoped.
    #[error("stage {stage} timed out after {budget:?}")]
    StageTimeout { stage: Stage, budget: Duration },

    /// A stage failed for one document. Document-scoped.
    #[error("{stage} failed: {message}")]
    DocumentError { stage: Stage, message: String },

    /// Backend construction failed; the worker exits without entering its
    /// loop and the orchestrator degrades to a smaller pool.
    #[error("worker {worker_id} failed to initialize: {message}")]
    WorkerFatal { worker_id: usize, message: String },

    /// The checkpoint ledger cannot be parsed. The run aborts rather than
    /// silently starting from empty.
    #[error("corrupt checkpoint ledger at {path}: {message}")]
    CorruptLedger { path: String, message: String },

    /// Missing credentials, unreadable discovery file, invalid options.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    pub fn document(stage: Stage, err: impl std::fmt::Display) -> Self {
        Self::DocumentError {
            stage,
            message: err.to_string(),
        }
    }

    /// True for errors that fail one document but leave the run healthy.
    pub fn is_document_scoped(&self) -> bool {
        matches!(
            self,
            Self::StageTimeout { .. } | Self::DocumentError { .. }
        )
    }
}

/// Operator-facing failure buckets, derived by pattern-matching error
/// messages. Intentionally coarse: the report needs to distinguish "one bad
/// OCR backend" from "systemic credential failure", nothing finer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorCategory {
    Timeout,
    DownloadFailed,
    NoTextExtracted,
    UnsupportedType,
    UpstreamStoreError,
    Other,
}

impl ErrorCategory {
    pub fn classify(message: &str) -> Self {
        let msg = message.to_ascii_lowercase();
        if msg.contains("timed out") || msg.contains("timeout") {
            Self::Timeout
        } else if msg.contains("download") || msg.contains("not found") {
            Self::DownloadFailed
        } else if msg.contains("no text") || msg.contains("empty document") {
            Self::NoTextExtracted
        } else if msg.contains("unsupported") || msg.contains("cannot process") {
            Self::UnsupportedType
        } else if msg.contains("upsert") || msg.contains("index") || msg.contains("quota") {
            Self::UpstreamStoreError
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::DownloadFailed => write!(f, "download-failed"),
            Self::NoTextExtracted => write!(f, "no-text-extracted"),
            Self::UnsupportedType => write!(f, "unsupported-type"),
            Self::UpstreamStoreError => write!(f, "upstream-store-error"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_buckets_known_messages() {
        assert_eq!(
            ErrorCategory::classify("stage parse timed out after 90s"),
            ErrorCategory::Timeout
        );
        assert_eq!(
            ErrorCategory::classify("download failed: blob not found"),
            ErrorCategory::DownloadFailed
        );
        assert_eq!(
            ErrorCategory::classify("parser returned no text"),
            ErrorCategory::NoTextExtracted
        );
        assert_eq!(
            ErrorCategory::classify("unsupported file format .dwg"),
            ErrorCategory::UnsupportedType
        );
        assert_eq!(
            ErrorCategory::classify("upsert rejected: quota exhausted"),
            ErrorCategory::UpstreamStoreError
        );
        assert_eq!(
            ErrorCategory::classify("something else entirely"),
            ErrorCategory::Other
        );
    }

    #[test]
    fn document_scoped_split() {
        let timeout = PipelineError::StageTimeout {
            stage: Stage::Parse,
            budget: Duration::from_secs(1),
        };
        assert!(timeout.is_document_scoped());

        let fatal = PipelineError::WorkerFatal {
            worker_id: 2,
            message: "backend down".into(),
        };
        assert!(!fatal.is_document_scoped());
    }
}
