//! Orchestrator: loads and filters the document set, feeds it to the
//! worker pool over a bounded channel, collects results, keeps the
//! checkpoint ledger current, and produces the final run report.
//!
//! Shutdown is two-stage. The drain token asks workers to finish only the
//! document already in flight and stop pulling new work; the ledger is
//! flushed immediately so completed outcomes survive. The force token
//! aborts worker tasks outright, accepting the loss of in-flight results.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::collaborators::CollaboratorFactory;
use crate::config::RunConfig;
use crate::document::{DocumentDescriptor, ProcessingStatus};
use crate::error::PipelineError;
use crate::ledger::{CheckpointLedger, FilterCriteria};
use crate::pipeline::progress::{ProgressPublisher, ProgressSnapshot};
use crate::pipeline::stats::{ReportBuilder, RunReport};
use crate::pipeline::types::{WorkItem, WorkPayload, WorkerMessage};
use crate::pipeline::worker::{run_worker, SharedReceiver};

/// Work channel capacity per worker; bounds orchestrator memory when
/// feeding outpaces the pool.
const WORK_CHANNEL_PER_WORKER: usize = 20;

pub struct Orchestrator {
    config: Arc<RunConfig>,
    drain: CancellationToken,
    force: CancellationToken,
    progress_tx: watch::Sender<ProgressSnapshot>,
}

impl Orchestrator {
    pub fn new(config: RunConfig) -> Self {
        let (progress_tx, _) = watch::channel(ProgressSnapshot::default());
        Self {
            config: Arc::new(config),
            drain: CancellationToken::new(),
            force: CancellationToken::new(),
            progress_tx,
        }
    }

    /// Token for the first-interrupt cooperative drain.
    pub fn drain_token(&self) -> CancellationToken {
        self.drain.clone()
    }

    /// Token for the second-interrupt forced termination.
    pub fn force_token(&self) -> CancellationToken {
        self.force.clone()
    }

    /// Observe live progress snapshots.
    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress_tx.subscribe()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run the full pipeline over the ledger's filtered document set.
    pub async fn run(
        &self,
        ledger: &mut CheckpointLedger,
        mut criteria: FilterCriteria,
        factory: Arc<dyn CollaboratorFactory>,
    ) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        criteria.exclude_processed = self.config.resume;

        let outcome = ledger.filter(&criteria);
        for (criterion, count) in &outcome.excluded {
            tracing::info!(criterion, count, "Excluded by selection criteria");
        }
        let total = outcome.selected.len();
        tracing::info!(
            selected = total,
            excluded = outcome.total_excluded(),
            namespace = %self.config.namespace,
            "Document set ready"
        );

        let mut builder = ReportBuilder::new(total, outcome.excluded.clone());
        if total == 0 {
            return Ok(builder.finish(started.elapsed(), false));
        }

        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let workers = self.config.workers.min(cores).max(1);

        let (work_tx, work_rx) = mpsc::channel::<WorkItem>(workers * WORK_CHANNEL_PER_WORKER);
        let shared_rx = SharedReceiver::new(work_rx);
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<WorkerMessage>();

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            handles.push(tokio::spawn(run_worker(
                worker_id,
                factory.clone(),
                self.config.clone(),
                shared_rx.clone(),
                result_tx.clone(),
                self.drain.clone(),
            )));
        }
        // Workers hold the only remaining senders; the channel closes when
        // the last one exits.
        drop(result_tx);
        tracing::info!(workers, requested = self.config.workers, "Worker pool started");

        let publisher = ProgressPublisher::from_sender(self.progress_tx.clone(), total);
        let mut pending: VecDeque<DocumentDescriptor> = outcome.selected.into();
        let mut live_workers = workers;
        let mut terminal = 0usize;
        let mut interrupted = false;

        // Feed and drain until every selected document has a result, the
        // pool dies, or a stop is requested.
        loop {
            if builder.completed() == total {
                break;
            }
            if live_workers == 0 {
                tracing::error!(
                    completed = builder.completed(),
                    total,
                    "All workers exited before the document set completed"
                );
                break;
            }

            tokio::select! {
                biased;
                _ = self.force.cancelled() => {
                    tracing::warn!("Force stop requested, terminating workers immediately");
                    interrupted = true;
                    for handle in &handles {
                        handle.abort();
                    }
                    break;
                }
                _ = self.drain.cancelled() => {
                    tracing::warn!(
                        remaining = pending.len(),
                        "Stop requested, draining in-flight documents"
                    );
                    interrupted = true;
                    pending.clear();
                    if let Err(e) = ledger.flush() {
                        tracing::error!(error = %e, "Ledger flush on interrupt failed");
                    }
                    break;
                }
                permit = work_tx.reserve(), if !pending.is_empty() => {
                    match permit {
                        Ok(permit) => {
                            let descriptor = pending.pop_front().expect("pending non-empty");
                            permit.send(WorkItem::Document(Box::new(WorkPayload {
                                descriptor,
                                namespace: self.config.namespace.clone(),
                                redact: self.config.redact,
                            })));
                        }
                        Err(_) => {
                            // All receivers gone; worker exits are reported
                            // through the result channel.
                            pending.clear();
                        }
                    }
                }
                msg = result_rx.recv() => {
                    match msg {
                        Some(msg) => self.record_message(
                            msg,
                            ledger,
                            &mut builder,
                            &publisher,
                            started,
                            &mut live_workers,
                            &mut terminal,
                        ),
                        None => break,
                    }
                }
            }
        }

        // Graceful completion: one poison item per live worker. On drain
        // the token already tells workers to stop pulling.
        if !interrupted && !self.force.is_cancelled() {
            for _ in 0..live_workers {
                if work_tx.try_send(WorkItem::Shutdown).is_err() {
                    break;
                }
            }
        }

        // Collect final stats (and any in-flight results on drain) with a
        // bounded join; abort whoever is still alive afterwards.
        if !self.force.is_cancelled() {
            let deadline = tokio::time::sleep(self.config.join_timeout);
            tokio::pin!(deadline);
            while terminal < workers {
                tokio::select! {
                    biased;
                    _ = self.force.cancelled() => {
                        tracing::warn!("Force stop during drain");
                        interrupted = true;
                        for handle in &handles {
                            handle.abort();
                        }
                        break;
                    }
                    _ = &mut deadline => {
                        tracing::warn!(
                            outstanding = workers - terminal,
                            "Worker join timeout, force-terminating stragglers"
                        );
                        for handle in &handles {
                            handle.abort();
                        }
                        break;
                    }
                    msg = result_rx.recv() => {
                        match msg {
                            Some(msg) => self.record_message(
                                msg,
                                ledger,
                                &mut builder,
                                &publisher,
                                started,
                                &mut live_workers,
                                &mut terminal,
                            ),
                            None => break,
                        }
                    }
                }
            }
        }

        if let Err(e) = ledger.flush() {
            tracing::error!(error = %e, "Final ledger flush failed");
        }

        let report = builder.finish(started.elapsed(), interrupted);
        tracing::info!(
            processed = report.processed,
            failed = report.failed,
            chunks = report.total_chunks,
            elapsed_secs = report.elapsed.as_secs_f64(),
            interrupted = report.interrupted,
            "Run finished"
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn record_message(
        &self,
        msg: WorkerMessage,
        ledger: &mut CheckpointLedger,
        builder: &mut ReportBuilder,
        publisher: &ProgressPublisher,
        started: Instant,
        live_workers: &mut usize,
        terminal: &mut usize,
    ) {
        match msg {
            WorkerMessage::Result(result) => {
                let status = ProcessingStatus {
                    processed: result.success,
                    processing_time_secs: result.elapsed.as_secs_f64(),
                    chunks_created: result.chunks_created,
                    errors: result.errors.clone(),
                    parser_used: Some(result.parser_used.to_string()),
                    namespace: Some(self.config.namespace.clone()),
                    updated_at: Some(Utc::now()),
                };
                ledger.record_outcome(&result.path, status);
                builder.record(&result);
                publisher.update(builder.processed(), builder.failed(), started.elapsed());

                if ledger.pending_writes() >= self.config.flush_interval {
                    if let Err(e) = ledger.flush() {
                        tracing::error!(error = %e, "Periodic ledger flush failed");
                    }
                }
            }
            WorkerMessage::Fatal { worker_id, message } => {
                tracing::error!(
                    worker = worker_id,
                    error = %message,
                    "Worker fatal, continuing with a smaller pool"
                );
                builder.worker_fatal(worker_id, message);
                *live_workers = live_workers.saturating_sub(1);
                *terminal += 1;
            }
            WorkerMessage::Stats(stats) => {
                tracing::debug!(
                    worker = stats.worker_id,
                    processed = stats.processed,
                    failed = stats.failed,
                    "Worker finished"
                );
                builder.worker_stats(stats);
                *live_workers = live_workers.saturating_sub(1);
                *terminal += 1;
            }
        }
    }
}
