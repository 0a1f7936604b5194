use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::classify::StepKind;
use super::queue::{Claim, QueueError, RunQueue};
use super::step::{index_step, transfer_step, StepContext, StepError};
use crate::config::WorkerConfiguration;
use crate::services::{describe, BlobStore, IndexWriter};

/// Executes queued runs one step at a time under the retry policy.
pub struct Worker {
    queue: Arc<RunQueue>,
    blobs: Arc<dyn BlobStore>,
    writer: IndexWriter,
    poll_interval: Duration,
    base_retry_delay: Duration,
    retention: chrono::Duration,
}

const PRUNE_INTERVAL: Duration = Duration::from_secs(10 * 60);
const MAX_RETENTION_HOURS: u64 = 24 * 365 * 100;

impl Worker {
    pub fn new(
        queue: Arc<RunQueue>,
        blobs: Arc<dyn BlobStore>,
        writer: IndexWriter,
        config: &WorkerConfiguration,
    ) -> Self {
        Self {
            queue,
            blobs,
            writer,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            base_retry_delay: Duration::from_millis(config.base_retry_delay_ms),
            retention: chrono::Duration::hours(config.run_retention_hours.min(MAX_RETENTION_HOURS) as i64),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        tracing::info!(
            "Worker started, polling every {}ms",
            self.poll_interval.as_millis()
        );
        let mut last_prune: Option<Instant> = None;
        loop {
            if last_prune.map_or(true, |at| at.elapsed() >= PRUNE_INTERVAL) {
                if let Err(e) = self.prune().await {
                    tracing::warn!(error = %e, "Run pruning failed");
                }
                last_prune = Some(Instant::now());
            }
            if let Err(e) = self.run_due().await {
                tracing::error!(error = %e, "Worker pass failed");
            }
            self.queue.wait(self.poll_interval).await;
        }
    }

    /// Drop finished runs older than the retention window.
    pub async fn prune(&self) -> Result<usize, QueueError> {
        self.queue.prune_terminal(Utc::now() - self.retention).await
    }

    /// Execute steps until no run is due. Returns how many steps ran.
    pub async fn run_due(&self) -> Result<usize, QueueError> {
        let mut executed = 0;
        while let Some(claim) = self.queue.claim_due(Utc::now()).await? {
            let span = tracing::info_span!(
                "run_step",
                run_id = %claim.record.run_id,
                stage = %claim.record.stage,
                attempt = claim.attempt
            );
            let run_id = claim.record.run_id.clone();
            if let Err(e) = self.execute(claim).instrument(span).await {
                self.queue.release(&run_id, self.base_retry_delay).await;
                return Err(e);
            }
            executed += 1;
        }
        Ok(executed)
    }

    async fn execute(&self, claim: Claim) -> Result<(), QueueError> {
        let Claim {
            record,
            attempt,
            payload,
        } = claim;
        let run_id = record.run_id.as_str();
        let stage = record.stage;
        let ctx = StepContext::new(format!("{}/{}", run_id, stage), attempt);

        let outcome = match stage {
            StepKind::Transfer => {
                let Some(payload) = payload else {
                    self.queue
                        .fail(run_id, format!("[{}] Transfer payload missing", ctx.step_id))
                        .await?;
                    return Ok(());
                };
                transfer_step(self.blobs.as_ref(), &ctx, &record.job, payload)
                    .await
                    .map(Some)
            }
            StepKind::Index => {
                let Some(blob) = record.blob.as_ref() else {
                    self.queue
                        .fail(run_id, format!("[{}] Blob descriptor missing", ctx.step_id))
                        .await?;
                    return Ok(());
                };
                let text = record
                    .description
                    .clone()
                    .unwrap_or_else(|| describe(&record.job.metadata.acc, &record.job.name));
                index_step(&self.writer, &ctx, blob, &text, &record.job.metadata)
                    .await
                    .map(|()| None)
            }
        };

        match outcome {
            Ok(Some(blob)) => {
                let description = describe(&record.job.metadata.acc, &record.job.name);
                self.queue.advance_to_index(run_id, blob, description).await?;
            }
            Ok(None) => {
                self.queue.complete(run_id).await?;
                tracing::info!("Run completed");
            }
            Err(StepError::Fatal(message)) => {
                tracing::error!(error = %message, "Run failed");
                self.queue.fail(run_id, message).await?;
            }
            Err(err) if attempt > stage.max_attempts() => {
                tracing::error!(error = %err, "Retry budget exhausted");
                self.queue.fail(run_id, err.to_string()).await?;
            }
            Err(err) => {
                let delay = match &err {
                    StepError::Retryable { retry_after, .. } => *retry_after,
                    _ => self.backoff(attempt),
                };
                tracing::warn!(
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "Step will be retried"
                );
                self.queue.retry_after(run_id, delay).await?;
            }
        }
        Ok(())
    }

    /// Exponential backoff for unclassified failures.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_retry_delay.saturating_mul(factor)
    }
}
