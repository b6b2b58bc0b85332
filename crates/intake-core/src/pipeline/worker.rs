//! Worker executor: pulls documents from the shared work channel and runs
//! the per-document stage pipeline under per-stage timeouts.
//!
//! Each worker builds its own collaborator clients exactly once, so
//! expensive backend initialization is amortized and no backend state is
//! shared between workers. Stage failures are document-scoped: the failed
//! document is reported and the loop moves on. A worker exits on the
//! poison item, on channel close, or when the drain token fires — always
//! finishing the document already in flight and emitting its final stats.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::chunker::BusinessChunker;
use crate::collaborators::{CollaboratorFactory, CollaboratorSet};
use crate::config::RunConfig;
use crate::error::PipelineError;
use crate::pipeline::stats::WorkerStats;
use crate::pipeline::types::{DocumentResult, Stage, WorkItem, WorkPayload, WorkerMessage};

/// Shared receiver for multiple workers pulling from one bounded channel.
/// Each item is consumed by exactly one worker.
pub struct SharedReceiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> SharedReceiver<T> {
    pub fn new(rx: mpsc::Receiver<T>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

/// Run one worker to completion.
pub async fn run_worker(
    worker_id: usize,
    factory: Arc<dyn CollaboratorFactory>,
    config: Arc<RunConfig>,
    work_rx: SharedReceiver<WorkItem>,
    result_tx: mpsc::UnboundedSender<WorkerMessage>,
    drain: CancellationToken,
) {
    let set = match factory.build(worker_id) {
        Ok(set) => set,
        Err(e) => {
            tracing::error!(worker = worker_id, error = %e, "Worker initialization failed");
            let _ = result_tx.send(WorkerMessage::Fatal {
                worker_id,
                message: e.to_string(),
            });
            return;
        }
    };

    let chunker = BusinessChunker::new(config.chunker.clone());
    let mut stats = WorkerStats::new(worker_id);
    tracing::debug!(worker = worker_id, "Worker ready");

    loop {
        let item = tokio::select! {
            biased;
            _ = drain.cancelled() => {
                tracing::debug!(worker = worker_id, "Worker draining on stop signal");
                break;
            }
            item = work_rx.recv() => item,
        };

        let payload = match item {
            Some(WorkItem::Document(payload)) => payload,
            Some(WorkItem::Shutdown) | None => {
                tracing::debug!(worker = worker_id, "Worker draining on poison item");
                break;
            }
        };

        let started = Instant::now();
        let outcome = process_document(&set, &chunker, &config, &payload).await;
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok((chunks_created, warnings)) => {
                tracing::debug!(
                    worker = worker_id,
                    path = %payload.descriptor.path,
                    chunks = chunks_created,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Document processed"
                );
                DocumentResult {
                    worker_id,
                    path: payload.descriptor.path.clone(),
                    file_kind: payload.descriptor.file_kind.clone(),
                    success: true,
                    chunks_created,
                    elapsed,
                    errors: warnings,
                    parser_used: config.parser.as_str(),
                }
            }
            Err(e) => {
                tracing::warn!(
                    worker = worker_id,
                    path = %payload.descriptor.path,
                    error = %e,
                    "Document failed"
                );
                DocumentResult {
                    worker_id,
                    path: payload.descriptor.path.clone(),
                    file_kind: payload.descriptor.file_kind.clone(),
                    success: false,
                    chunks_created: 0,
                    elapsed,
                    errors: vec![e.to_string()],
                    parser_used: config.parser.as_str(),
                }
            }
        };

        stats.record(&result);
        if result_tx.send(WorkerMessage::Result(result)).is_err() {
            // Orchestrator is gone; nothing left to report to.
            return;
        }
    }

    tracing::debug!(
        worker = worker_id,
        processed = stats.processed,
        failed = stats.failed,
        "Worker exiting"
    );
    let _ = result_tx.send(WorkerMessage::Stats(stats));
}

/// Wrap one stage in its wall-clock budget. Timeout aborts only the
/// current document; the worker stays healthy for the next one.
async fn run_stage<T, F>(stage: Stage, budget: Duration, fut: F) -> Result<T, PipelineError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(PipelineError::document(stage, e)),
        Err(_) => Err(PipelineError::StageTimeout { stage, budget }),
    }
}

/// Run the full stage pipeline for one document.
///
/// Returns the chunk count and any non-fatal warnings (redaction issues);
/// any stage error fails the whole document.
async fn process_document(
    set: &CollaboratorSet,
    chunker: &BusinessChunker,
    config: &RunConfig,
    payload: &WorkPayload,
) -> Result<(usize, Vec<String>), PipelineError> {
    let descriptor = &payload.descriptor;
    let budget = if descriptor.file_kind.is_spreadsheet_like() {
        config.sheet_stage_timeout
    } else {
        config.stage_timeout
    };
    let mut warnings = Vec::new();

    let bytes = run_stage(
        Stage::Download,
        budget,
        set.downloader.download(&descriptor.path),
    )
    .await?;

    if !set
        .normalizer
        .can_process(&descriptor.path, &descriptor.display_name)
    {
        return Err(PipelineError::DocumentError {
            stage: Stage::Normalize,
            message: format!("unsupported document type: {}", descriptor.path),
        });
    }
    let (content, kind) = run_stage(
        Stage::Normalize,
        budget,
        set.normalizer
            .normalize(&descriptor.path, bytes, &descriptor.display_name),
    )
    .await?;

    let parsed = run_stage(
        Stage::Parse,
        budget,
        set.parser.parse(content, descriptor, kind),
    )
    .await?;
    let mut text = parsed.text;
    if text.trim().is_empty() {
        return Err(PipelineError::DocumentError {
            stage: Stage::Parse,
            message: format!("no text extracted from {}", descriptor.path),
        });
    }

    if payload.redact {
        match &set.redactor {
            Some(redactor) => {
                let outcome =
                    run_stage(Stage::Redact, budget, redactor.redact(&text, descriptor)).await?;
                warnings.extend(outcome.errors);
                if outcome.validation_failures > 0 {
                    warnings.push(format!(
                        "redaction validation failures: {}",
                        outcome.validation_failures
                    ));
                }
                text = outcome.redacted_text;
            }
            None => {
                return Err(PipelineError::DocumentError {
                    stage: Stage::Redact,
                    message: "redaction requested but no redactor configured".to_string(),
                });
            }
        }
    }

    // Chunking is pure CPU with a built-in worst-case guard and a flat
    // fallback, so it runs inline; it cannot hang or fail a document.
    let chunks = chunker.chunk(&text, &descriptor.path);

    if chunks.is_empty() {
        // Trivial content: nothing to embed, but not an error.
        return Ok((0, warnings));
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    run_stage(Stage::Embed, budget, set.indexer.embed(&texts)).await?;
    run_stage(
        Stage::Upsert,
        budget,
        set.indexer.upsert(&chunks, &payload.namespace),
    )
    .await?;

    Ok((chunks.len(), warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{doc, MockFactory};
    use tokio::sync::mpsc::unbounded_channel;

    async fn run_single(
        factory: MockFactory,
        items: Vec<WorkItem>,
        config: RunConfig,
    ) -> Vec<WorkerMessage> {
        let (work_tx, work_rx) = mpsc::channel(16);
        for item in items {
            work_tx.send(item).await.unwrap();
        }
        work_tx.send(WorkItem::Shutdown).await.unwrap();

        let (result_tx, mut result_rx) = unbounded_channel();
        run_worker(
            0,
            Arc::new(factory),
            Arc::new(config),
            SharedReceiver::new(work_rx),
            result_tx,
            CancellationToken::new(),
        )
        .await;

        let mut messages = Vec::new();
        while let Ok(msg) = result_rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    fn payload(path: &str) -> WorkItem {
        WorkItem::Document(Box::new(WorkPayload {
            descriptor: doc(path),
            namespace: "test".to_string(),
            redact: false,
        }))
    }

    #[tokio::test]
    async fn worker_processes_and_reports_stats() {
        let factory = MockFactory::default();
        let upserted = factory.upserted.clone();
        let messages = run_single(
            factory,
            vec![payload("a.txt"), payload("b.txt")],
            RunConfig::default(),
        )
        .await;

        assert_eq!(messages.len(), 3);
        let results: Vec<_> = messages
            .iter()
            .filter_map(|m| match m {
                WorkerMessage::Result(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert!(results.iter().all(|r| r.chunks_created > 0));

        match messages.last().unwrap() {
            WorkerMessage::Stats(stats) => {
                assert_eq!(stats.processed, 2);
                assert_eq!(stats.failed, 0);
            }
            other => panic!("expected stats, got {:?}", other),
        }
        assert!(!upserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_document_does_not_kill_worker() {
        let messages = run_single(
            MockFactory::default(),
            vec![payload("fail-parse.txt"), payload("b.txt")],
            RunConfig::default(),
        )
        .await;

        let results: Vec<_> = messages
            .iter()
            .filter_map(|m| match m {
                WorkerMessage::Result(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[0].errors[0].contains("parse"));
        assert!(results[1].success);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_stage_times_out_and_worker_continues() {
        let config = RunConfig {
            stage_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let messages = run_single(
            MockFactory::default(),
            vec![payload("hang-parse.txt"), payload("b.txt")],
            config,
        )
        .await;

        let results: Vec<_> = messages
            .iter()
            .filter_map(|m| match m {
                WorkerMessage::Result(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[0].errors[0].contains("timed out"));
        assert!(results[1].success, "worker must survive a timeout");
    }

    #[tokio::test]
    async fn construction_failure_is_fatal_message() {
        let factory = MockFactory {
            fail_build: true,
            ..Default::default()
        };
        let messages = run_single(factory, vec![payload("a.txt")], RunConfig::default()).await;

        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], WorkerMessage::Fatal { worker_id: 0, .. }));
    }

    #[tokio::test]
    async fn empty_parse_output_fails_document() {
        let messages = run_single(
            MockFactory::default(),
            vec![payload("empty.txt")],
            RunConfig::default(),
        )
        .await;
        match &messages[0] {
            WorkerMessage::Result(r) => {
                assert!(!r.success);
                assert!(r.errors[0].contains("no text extracted"));
            }
            other => panic!("expected result, got {:?}", other),
        }
    }
}
