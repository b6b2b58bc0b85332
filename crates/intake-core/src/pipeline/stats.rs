//! Worker statistics and the final run report.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::document::FileKind;
use crate::error::ErrorCategory;
use crate::pipeline::types::DocumentResult;

/// Cap on the per-worker error sample carried in the final report.
const ERROR_SAMPLE_CAP: usize = 10;

/// Per-worker counters, accumulated for the life of the worker and
/// emitted once before it exits.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    pub worker_id: usize,
    pub processed: usize,
    pub failed: usize,
    pub chunks_total: usize,
    pub busy_time: Duration,
    pub error_sample: Vec<String>,
}

impl WorkerStats {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            ..Default::default()
        }
    }

    pub fn record(&mut self, result: &DocumentResult) {
        if result.success {
            self.processed += 1;
        } else {
            self.failed += 1;
        }
        self.chunks_total += result.chunks_created;
        self.busy_time += result.elapsed;
        if !result.success && self.error_sample.len() < ERROR_SAMPLE_CAP {
            if let Some(first) = result.errors.first() {
                self.error_sample.push(format!("{}: {}", result.path, first));
            }
        }
    }
}

/// Per-file-kind breakdown row.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileKindStats {
    pub processed: usize,
    pub failed: usize,
    pub chunks: usize,
}

/// Processing-time percentiles over all observed document durations.
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationSummary {
    pub min: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p99: Duration,
    pub max: Duration,
}

impl DurationSummary {
    /// Nearest-rank percentiles; `durations` need not be sorted.
    pub fn from_durations(durations: &[Duration]) -> Option<Self> {
        if durations.is_empty() {
            return None;
        }
        let mut sorted = durations.to_vec();
        sorted.sort();
        let rank = |p: f64| {
            let idx = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
            sorted[idx.clamp(1, sorted.len()) - 1]
        };
        Some(Self {
            min: sorted[0],
            p50: rank(50.0),
            p90: rank(90.0),
            p99: rank(99.0),
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Aggregate outcome of one orchestrator run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub selected: usize,
    pub processed: usize,
    pub failed: usize,
    pub total_chunks: usize,
    pub elapsed: Duration,
    pub interrupted: bool,
    pub exclusions: BTreeMap<&'static str, usize>,
    pub by_kind: BTreeMap<String, FileKindStats>,
    pub error_categories: BTreeMap<ErrorCategory, usize>,
    pub durations: DurationSummary,
    pub worker_stats: Vec<WorkerStats>,
    pub worker_fatals: Vec<(usize, String)>,
}

impl RunReport {
    pub fn completed(&self) -> usize {
        self.processed + self.failed
    }
}

/// Accumulates results as they arrive; finalized into a [`RunReport`].
#[derive(Debug, Default)]
pub struct ReportBuilder {
    report: RunReport,
    durations: Vec<Duration>,
}

impl ReportBuilder {
    pub fn new(selected: usize, exclusions: BTreeMap<&'static str, usize>) -> Self {
        Self {
            report: RunReport {
                selected,
                exclusions,
                ..Default::default()
            },
            durations: Vec::new(),
        }
    }

    pub fn record(&mut self, result: &DocumentResult) {
        let kind_stats = self
            .report
            .by_kind
            .entry(kind_label(&result.file_kind))
            .or_default();
        if result.success {
            self.report.processed += 1;
            kind_stats.processed += 1;
        } else {
            self.report.failed += 1;
            kind_stats.failed += 1;
            let category = result
                .errors
                .first()
                .map(|m| ErrorCategory::classify(m))
                .unwrap_or(ErrorCategory::Other);
            *self.report.error_categories.entry(category).or_default() += 1;
        }
        self.report.total_chunks += result.chunks_created;
        kind_stats.chunks += result.chunks_created;
        self.durations.push(result.elapsed);
    }

    pub fn worker_fatal(&mut self, worker_id: usize, message: String) {
        self.report.worker_fatals.push((worker_id, message));
    }

    pub fn worker_stats(&mut self, stats: WorkerStats) {
        self.report.worker_stats.push(stats);
    }

    pub fn completed(&self) -> usize {
        self.report.processed + self.report.failed
    }

    pub fn processed(&self) -> usize {
        self.report.processed
    }

    pub fn failed(&self) -> usize {
        self.report.failed
    }

    pub fn finish(mut self, elapsed: Duration, interrupted: bool) -> RunReport {
        self.report.elapsed = elapsed;
        self.report.interrupted = interrupted;
        self.report.durations =
            DurationSummary::from_durations(&self.durations).unwrap_or_default();
        self.report
            .worker_stats
            .sort_by_key(|s| s.worker_id);
        self.report
    }
}

fn kind_label(kind: &FileKind) -> String {
    kind.to_string()
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Run summary")?;
        writeln!(
            f,
            "  documents: {} selected, {} processed, {} failed{}",
            self.selected,
            self.processed,
            self.failed,
            if self.interrupted { " (interrupted)" } else { "" }
        )?;
        writeln!(
            f,
            "  chunks:    {} in {:.1}s",
            self.total_chunks,
            self.elapsed.as_secs_f64()
        )?;

        if !self.exclusions.is_empty() {
            writeln!(f, "  excluded before run:")?;
            for (criterion, count) in &self.exclusions {
                writeln!(f, "    {:<28} {}", criterion, count)?;
            }
        }

        if !self.by_kind.is_empty() {
            writeln!(f, "  by file type:")?;
            writeln!(
                f,
                "    {:<14} {:>9} {:>7} {:>8}",
                "type", "processed", "failed", "chunks"
            )?;
            for (kind, stats) in &self.by_kind {
                writeln!(
                    f,
                    "    {:<14} {:>9} {:>7} {:>8}",
                    kind, stats.processed, stats.failed, stats.chunks
                )?;
            }
        }

        if !self.error_categories.is_empty() {
            writeln!(f, "  failures by category:")?;
            for (category, count) in &self.error_categories {
                writeln!(f, "    {:<28} {}", category.to_string(), count)?;
            }
        }

        if self.completed() > 0 {
            let d = &self.durations;
            writeln!(
                f,
                "  per-document time: min {:.2}s  p50 {:.2}s  p90 {:.2}s  p99 {:.2}s  max {:.2}s",
                d.min.as_secs_f64(),
                d.p50.as_secs_f64(),
                d.p90.as_secs_f64(),
                d.p99.as_secs_f64(),
                d.max.as_secs_f64()
            )?;
        }

        for (worker_id, message) in &self.worker_fatals {
            writeln!(f, "  worker {} fatal: {}", worker_id, message)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(success: bool, chunks: usize, ms: u64, error: &str) -> DocumentResult {
        DocumentResult {
            worker_id: 0,
            path: "a.pdf".to_string(),
            file_kind: FileKind::Pdf,
            success,
            chunks_created: chunks,
            elapsed: Duration::from_millis(ms),
            errors: if error.is_empty() {
                vec![]
            } else {
                vec![error.to_string()]
            },
            parser_used: "plain-text",
        }
    }

    #[test]
    fn percentiles_nearest_rank() {
        let durations: Vec<Duration> = (1..=100).map(Duration::from_millis).collect();
        let summary = DurationSummary::from_durations(&durations).unwrap();
        assert_eq!(summary.min, Duration::from_millis(1));
        assert_eq!(summary.p50, Duration::from_millis(50));
        assert_eq!(summary.p90, Duration::from_millis(90));
        assert_eq!(summary.p99, Duration::from_millis(99));
        assert_eq!(summary.max, Duration::from_millis(100));
    }

    #[test]
    fn percentiles_single_sample() {
        let summary = DurationSummary::from_durations(&[Duration::from_secs(2)]).unwrap();
        assert_eq!(summary.p50, Duration::from_secs(2));
        assert_eq!(summary.p99, Duration::from_secs(2));
    }

    #[test]
    fn builder_aggregates_by_kind_and_category() {
        let mut builder = ReportBuilder::new(3, BTreeMap::new());
        builder.record(&result(true, 4, 100, ""));
        builder.record(&result(false, 0, 50, "stage parse timed out after 90s"));
        builder.record(&result(false, 0, 50, "download failed: not found"));

        let report = builder.finish(Duration::from_secs(1), false);
        assert_eq!(report.processed, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.total_chunks, 4);
        assert_eq!(report.by_kind["pdf"].processed, 1);
        assert_eq!(report.by_kind["pdf"].failed, 2);
        assert_eq!(report.error_categories[&ErrorCategory::Timeout], 1);
        assert_eq!(report.error_categories[&ErrorCategory::DownloadFailed], 1);
    }

    #[test]
    fn worker_stats_error_sample_is_capped() {
        let mut stats = WorkerStats::new(1);
        for _ in 0..20 {
            stats.record(&result(false, 0, 10, "boom"));
        }
        assert_eq!(stats.failed, 20);
        assert_eq!(stats.error_sample.len(), 10);
    }

    #[test]
    fn report_renders() {
        let mut builder = ReportBuilder::new(1, BTreeMap::from([("already_processed", 2)]));
        builder.record(&result(true, 3, 120, ""));
        builder.worker_fatal(2, "backend construction failed".to_string());
        let rendered = builder.finish(Duration::from_secs(2), false).to_string();
        assert!(rendered.contains("1 processed"));
        assert!(rendered.contains("already_processed"));
        assert!(rendered.contains("worker 2 fatal"));
    }
}
