use async_trait::async_trait;
use health::HealthHandle;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::queue::{QueueError, QueuePort};
use crate::retry::RetryPolicy;

/// Enumeration of errors that end a poll cycle early.
/// Nothing from the cycle was acknowledged, so every message will be seen again.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("a transport error occurred when polling the queue: {0}")]
    TransportError(#[from] QueueError),
}

/// Tally of what happened to the messages of one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Messages handed out by the inbound queue.
    pub received: usize,
    /// Records forwarded or persisted.
    pub completed: usize,
    /// Records discarded by business rules.
    pub rejected: usize,
    /// Bodies that could not be parsed, dropped with a warning.
    pub malformed: usize,
    /// Messages left on the queue for redelivery because the downstream effect failed.
    pub deferred: usize,
    /// Deletes that failed. Those messages will be redelivered and processed again.
    pub ack_failures: usize,
}

impl CycleReport {
    pub fn received(count: usize) -> Self {
        Self {
            received: count,
            ..Default::default()
        }
    }
}

/// One poll-process-acknowledge worker. A stage owns the queue handles it needs and
/// is driven by `StageRunner`, one cycle at a time.
#[async_trait]
pub trait Stage: Send {
    /// Used in logs and as the `stage` metrics label.
    fn name(&self) -> &'static str;

    /// Poll the inbound queue once and handle everything received.
    async fn poll_once(&mut self) -> Result<CycleReport, StageError>;
}

/// Acknowledge a message, logging instead of failing: an unacknowledged message is
/// redelivered, which every stage tolerates.
pub async fn acknowledge<Q: QueuePort + ?Sized>(
    queue: &Q,
    receipt: &str,
    report: &mut CycleReport,
) -> bool {
    match queue.delete(receipt).await {
        Ok(()) => true,
        Err(error) => {
            error!("failed to delete message, it will be redelivered: {}", error);
            report.ack_failures += 1;
            false
        }
    }
}

/// Drives a `Stage` forever, reporting liveness on every cycle and backing off
/// while the queue is unreachable.
pub struct StageRunner<S> {
    stage: S,
    liveness: HealthHandle,
    retry_policy: RetryPolicy,
}

impl<S: Stage> StageRunner<S> {
    pub fn new(stage: S, liveness: HealthHandle, retry_policy: RetryPolicy) -> Self {
        Self {
            stage,
            liveness,
            retry_policy,
        }
    }

    /// Run one cycle and return how long to wait before the next one.
    pub async fn cycle(&mut self, consecutive_failures: &mut u32) -> Option<std::time::Duration> {
        self.liveness.report_healthy();
        let name = self.stage.name();
        let started = tokio::time::Instant::now();
        let result = self.stage.poll_once().await;
        metrics::histogram!("books_stage_cycle_duration_seconds", "stage" => name)
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(report) => {
                *consecutive_failures = 0;
                record_report(name, &report);
                if report.received == 0 {
                    debug!(stage = name, "no messages to process");
                } else {
                    info!(stage = name, ?report, "poll cycle finished");
                }
                None
            }
            Err(error) => {
                let backoff = self.retry_policy.time_until_next_retry(*consecutive_failures);
                *consecutive_failures = consecutive_failures.saturating_add(1);
                metrics::counter!("books_stage_cycle_errors_total", "stage" => name).increment(1);
                error!(stage = name, ?backoff, "poll cycle failed: {}", error);
                Some(backoff)
            }
        }
    }

    /// Run this stage until the process is stopped. Errors never end the loop.
    pub async fn run(mut self) {
        let mut consecutive_failures = 0;
        info!(stage = self.stage.name(), "starting poll loop");

        loop {
            if let Some(backoff) = self.cycle(&mut consecutive_failures).await {
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

fn record_report(stage: &'static str, report: &CycleReport) {
    metrics::counter!("books_stage_cycles_total", "stage" => stage).increment(1);

    let outcomes = [
        ("received", report.received),
        ("completed", report.completed),
        ("rejected", report.rejected),
        ("malformed", report.malformed),
        ("deferred", report.deferred),
        ("ack_failed", report.ack_failures),
    ];
    for (outcome, count) in outcomes {
        if count > 0 {
            metrics::counter!("books_stage_messages_total", "stage" => stage, "outcome" => outcome)
                .increment(count as u64);
        }
    }
}
