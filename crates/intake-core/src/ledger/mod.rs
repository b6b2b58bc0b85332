//! Checkpoint ledger: durable record of every known document and its last
//! processing outcome.
//!
//! The ledger is a single JSON file keyed by document path. Loads validate
//! the whole file and fail loudly on corruption rather than silently
//! starting from empty. Outcome updates are buffered in memory and written
//! by `flush()` as an atomic whole-file rewrite (temp file + rename), so a
//! crash mid-write never leaves a truncated ledger behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{DocumentDescriptor, FileKind, ProcessingStatus};
use crate::error::PipelineError;

/// One ledger entry: discovery metadata plus the last observed outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    #[serde(flatten)]
    pub descriptor: DocumentDescriptor,
    #[serde(default)]
    pub processing_status: ProcessingStatus,
}

/// Selection criteria applied before a run.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    /// Skip documents whose last outcome was successful (resume mode).
    pub exclude_processed: bool,
    /// When set, only these kinds are selected.
    pub include_kinds: Option<Vec<FileKind>>,
    /// Always-excluded kinds.
    pub exclude_kinds: Vec<FileKind>,
    pub modified_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,
    /// Business-metadata contract-date range.
    pub contract_after: Option<DateTime<Utc>>,
    pub contract_before: Option<DateTime<Utc>>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    /// Cap on the number of selected documents, applied last.
    pub limit: Option<usize>,
}

/// Result of filtering: the selected set plus a per-criterion exclusion
/// count for operator visibility.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub selected: Vec<DocumentDescriptor>,
    pub excluded: BTreeMap<&'static str, usize>,
}

impl FilterOutcome {
    pub fn total_excluded(&self) -> usize {
        self.excluded.values().sum()
    }
}

/// Durable map from document path to its last processing outcome.
#[derive(Debug)]
pub struct CheckpointLedger {
    path: PathBuf,
    records: BTreeMap<String, LedgerRecord>,
    pending_writes: usize,
}

impl CheckpointLedger {
    /// Load and validate the ledger file.
    ///
    /// A missing file is a configuration error (the discovery file is
    /// required input); an unparseable file is `CorruptLedger`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!(
                "cannot read discovery file {}: {}",
                path.display(),
                e
            ))
        })?;

        let records: BTreeMap<String, LedgerRecord> =
            serde_json::from_str(&raw).map_err(|e| PipelineError::CorruptLedger {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        for (key, record) in &records {
            if key != &record.descriptor.path {
                return Err(PipelineError::CorruptLedger {
                    path: path.display().to_string(),
                    message: format!(
                        "entry key {:?} does not match descriptor path {:?}",
                        key, record.descriptor.path
                    ),
                });
            }
        }

        tracing::info!(
            ledger = %path.display(),
            documents = records.len(),
            "Loaded checkpoint ledger"
        );

        Ok(Self {
            path: path.to_path_buf(),
            records,
            pending_writes: 0,
        })
    }

    /// Create a new ledger at `path` from a discovery set. Used by tests
    /// and by discovery tooling; overwrites nothing until `flush()`.
    pub fn from_discovery(
        path: impl AsRef<Path>,
        descriptors: Vec<DocumentDescriptor>,
    ) -> Self {
        let records = descriptors
            .into_iter()
            .map(|d| {
                (
                    d.path.clone(),
                    LedgerRecord {
                        descriptor: d,
                        processing_status: ProcessingStatus::default(),
                    },
                )
            })
            .collect();
        Self {
            path: path.as_ref().to_path_buf(),
            records,
            pending_writes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn status(&self, path: &str) -> Option<&ProcessingStatus> {
        self.records.get(path).map(|r| &r.processing_status)
    }

    pub fn records(&self) -> impl Iterator<Item = &LedgerRecord> {
        self.records.values()
    }

    /// Apply selection criteria, counting exclusions per criterion.
    ///
    /// A document excluded by several criteria is counted once, under the
    /// first criterion that rejected it.
    pub fn filter(&self, criteria: &FilterCriteria) -> FilterOutcome {
        let mut selected = Vec::new();
        let mut excluded: BTreeMap<&'static str, usize> = BTreeMap::new();

        for record in self.records.values() {
            let d = &record.descriptor;

            if criteria.exclude_processed && record.processing_status.processed {
                *excluded.entry("already_processed").or_default() += 1;
                continue;
            }
            if let Some(include) = &criteria.include_kinds {
                if !include.contains(&d.file_kind) {
                    *excluded.entry("file_type_not_included").or_default() += 1;
                    continue;
                }
            }
            if criteria.exclude_kinds.contains(&d.file_kind) {
                *excluded.entry("file_type_excluded").or_default() += 1;
                continue;
            }
            if let Some(after) = criteria.modified_after {
                if d.modified_at < after {
                    *excluded.entry("modified_too_old").or_default() += 1;
                    continue;
                }
            }
            if let Some(before) = criteria.modified_before {
                if d.modified_at > before {
                    *excluded.entry("modified_too_new").or_default() += 1;
                    continue;
                }
            }
            if criteria.contract_after.is_some() || criteria.contract_before.is_some() {
                match d.business.contract_date {
                    Some(date) => {
                        if criteria.contract_after.is_some_and(|a| date < a)
                            || criteria.contract_before.is_some_and(|b| date > b)
                        {
                            *excluded.entry("contract_date_out_of_range").or_default() += 1;
                            continue;
                        }
                    }
                    None => {
                        *excluded.entry("contract_date_missing").or_default() += 1;
                        continue;
                    }
                }
            }
            if criteria.min_size.is_some_and(|min| d.size_bytes < min) {
                *excluded.entry("below_min_size").or_default() += 1;
                continue;
            }
            if criteria.max_size.is_some_and(|max| d.size_bytes > max) {
                *excluded.entry("above_max_size").or_default() += 1;
                continue;
            }

            selected.push(d.clone());
        }

        if let Some(limit) = criteria.limit {
            if selected.len() > limit {
                *excluded.entry("over_document_limit").or_default() +=
                    selected.len() - limit;
                selected.truncate(limit);
            }
        }

        FilterOutcome { selected, excluded }
    }

    /// Buffer an outcome update. Unknown paths are logged and dropped
    /// rather than invented, since descriptors come from discovery.
    pub fn record_outcome(&mut self, path: &str, status: ProcessingStatus) {
        match self.records.get_mut(path) {
            Some(record) => {
                record.processing_status = status;
                self.pending_writes += 1;
            }
            None => {
                tracing::warn!(path, "Outcome for unknown document, ignoring");
            }
        }
    }

    /// Number of outcomes recorded since the last flush.
    pub fn pending_writes(&self) -> usize {
        self.pending_writes
    }

    /// Write the whole ledger atomically: serialize to a temp file in the
    /// same directory, then rename over the original.
    pub fn flush(&mut self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.records)?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = dir.join(format!(
            ".{}.tmp",
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "ledger".to_string())
        ));
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            ledger = %self.path.display(),
            updates = self.pending_writes,
            "Flushed checkpoint ledger"
        );
        self.pending_writes = 0;
        Ok(())
    }
}
