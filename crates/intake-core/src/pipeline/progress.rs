//! Live progress reporting for the orchestrator.
//!
//! The orchestrator recomputes throughput and ETA on every result and
//! publishes a snapshot on a watch channel; whoever renders the progress
//! line (the CLI) just follows the latest value. Liveness aid only, not a
//! correctness concern.

use std::time::Duration;

use tokio::sync::watch;

/// Point-in-time view of a running ingestion.
#[derive(Debug, Clone, Default)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub elapsed: Duration,
    /// Documents per second over the whole run so far.
    pub throughput: f64,
    /// `remaining / throughput`; `None` until throughput is meaningful.
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn completed(&self) -> usize {
        self.processed + self.failed
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed())
    }

    /// Single-line rendering used by log output and tests; the CLI draws
    /// its own bar from the raw fields.
    pub fn render(&self) -> String {
        let eta = match self.eta {
            Some(eta) => format!("{}s", eta.as_secs()),
            None => "--".to_string(),
        };
        format!(
            "{}/{} done ({} failed) | {:.2} docs/s | eta {}",
            self.completed(),
            self.total,
            self.failed,
            self.throughput,
            eta
        )
    }
}

/// Publishes snapshots to any number of observers.
#[derive(Debug)]
pub struct ProgressPublisher {
    tx: watch::Sender<ProgressSnapshot>,
    total: usize,
}

impl ProgressPublisher {
    pub fn new(total: usize) -> (Self, watch::Receiver<ProgressSnapshot>) {
        let (tx, rx) = watch::channel(ProgressSnapshot {
            total,
            ..Default::default()
        });
        (Self { tx, total }, rx)
    }

    /// Publish through an existing sender (observers subscribed before the
    /// document total was known).
    pub fn from_sender(tx: watch::Sender<ProgressSnapshot>, total: usize) -> Self {
        Self { tx, total }
    }

    pub fn update(&self, processed: usize, failed: usize, elapsed: Duration) {
        let completed = processed + failed;
        let throughput = if elapsed.as_secs_f64() > 0.0 {
            completed as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let remaining = self.total.saturating_sub(completed);
        let eta = (throughput > 0.0)
            .then(|| Duration::from_secs_f64(remaining as f64 / throughput));

        let snapshot = ProgressSnapshot {
            total: self.total,
            processed,
            failed,
            elapsed,
            throughput,
            eta,
        };
        // Observers may be gone (headless test runs); that's fine.
        let _ = self.tx.send(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_math() {
        let (publisher, rx) = ProgressPublisher::new(10);
        publisher.update(4, 1, Duration::from_secs(5));
        let snap = rx.borrow().clone();
        assert_eq!(snap.completed(), 5);
        assert_eq!(snap.remaining(), 5);
        assert!((snap.throughput - 1.0).abs() < 1e-9);
        assert_eq!(snap.eta.unwrap().as_secs(), 5);
        assert!(snap.render().contains("5/10 done"));
    }

    #[test]
    fn eta_absent_before_any_completion() {
        let (publisher, rx) = ProgressPublisher::new(10);
        publisher.update(0, 0, Duration::from_secs(1));
        assert!(rx.borrow().eta.is_none());
    }
}
