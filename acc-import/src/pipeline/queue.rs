use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use super::classify::StepKind;
use super::step::TransferJob;
use crate::services::BlobDescriptor;

#[derive(Debug)]
pub enum QueueError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    UnknownRun(String),
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::Io(e) => write!(f, "IO error: {}", e),
            QueueError::Serialization(e) => write!(f, "Serialization error: {}", e),
            QueueError::UnknownRun(id) => write!(f, "Unknown run: {}", id),
        }
    }
}

impl std::error::Error for QueueError {}

impl From<std::io::Error> for QueueError {
    fn from(err: std::io::Error) -> Self {
        QueueError::Io(err)
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum RunStatus {
    Queued,
    Running {
        stage: StepKind,
        attempt: u32,
    },
    #[serde(rename_all = "camelCase")]
    Retrying {
        stage: StepKind,
        attempt: u32,
        not_before: DateTime<Utc>,
    },
    Completed {
        pathname: String,
    },
    Failed {
        error: String,
    },
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed { .. } | RunStatus::Failed { .. })
    }
}

/// Persisted state of one import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub status: RunStatus,
    pub stage: StepKind,
    pub transfer_attempts: u32,
    pub index_attempts: u32,
    pub job: TransferJob,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<BlobDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn attempts(&self, stage: StepKind) -> u32 {
        match stage {
            StepKind::Transfer => self.transfer_attempts,
            StepKind::Index => self.index_attempts,
        }
    }

    fn is_due(&self, now: DateTime<Utc>) -> bool {
        match &self.status {
            RunStatus::Queued => true,
            RunStatus::Retrying { not_before, .. } => *not_before <= now,
            _ => false,
        }
    }
}

/// A run handed to the worker for one attempt of its current stage.
#[derive(Debug)]
pub struct Claim {
    pub record: RunRecord,
    /// 1-based attempt number for `record.stage`.
    pub attempt: u32,
    /// Image bytes, loaded for the transfer stage only.
    pub payload: Option<Vec<u8>>,
}

/// Durable queue of import runs.
///
/// With a state directory every record lives in `runs/<runId>.json` and the
/// image bytes in `payloads/<runId>.bin`, so scheduled work survives a restart.
pub struct RunQueue {
    dir: Option<PathBuf>,
    runs: Mutex<HashMap<String, RunRecord>>,
    // Payloads for the in-memory mode
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    notify: Notify,
}

impl RunQueue {
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            runs: Mutex::new(HashMap::new()),
            payloads: Mutex::new(HashMap::new()),
            notify: Notify::new(),
        }
    }

    /// Open (or create) a queue under `dir`, reloading every stored run.
    /// Runs caught mid-attempt by a shutdown go back to `queued`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, QueueError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(dir.join("runs")).await?;
        fs::create_dir_all(dir.join("payloads")).await?;

        let mut runs = HashMap::new();
        let mut entries = fs::read_dir(dir.join("runs")).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let data = fs::read_to_string(&path).await?;
            let mut record: RunRecord = match serde_json::from_str(&data) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable run record");
                    continue;
                }
            };

            if matches!(record.status, RunStatus::Running { .. }) {
                record.status = RunStatus::Queued;
            }
            runs.insert(record.run_id.clone(), record);
        }

        let pending = runs.values().filter(|r| !r.status.is_terminal()).count();
        tracing::info!(
            "Run queue opened at {} with {} runs ({} pending)",
            dir.display(),
            runs.len(),
            pending
        );

        Ok(Self {
            dir: Some(dir),
            runs: Mutex::new(runs),
            payloads: Mutex::new(HashMap::new()),
            notify: Notify::new(),
        })
    }

    /// Schedule a transfer of `payload` and return the new run id.
    pub async fn enqueue(&self, job: TransferJob, payload: Vec<u8>) -> Result<String, QueueError> {
        let run_id = format!("run_{}", Uuid::new_v4().simple());
        let now = Utc::now();
        let record = RunRecord {
            run_id: run_id.clone(),
            status: RunStatus::Queued,
            stage: StepKind::Transfer,
            transfer_attempts: 0,
            index_attempts: 0,
            job,
            blob: None,
            description: None,
            created_at: now,
            updated_at: now,
        };

        self.store_payload(&run_id, payload).await?;
        self.persist(&record).await?;
        self.runs.lock().await.insert(run_id.clone(), record);
        self.notify.notify_one();

        tracing::debug!(run_id = %run_id, "Run enqueued");
        Ok(run_id)
    }

    pub async fn get(&self, run_id: &str) -> Option<RunRecord> {
        self.runs.lock().await.get(run_id).cloned()
    }

    /// Runs not yet completed or failed.
    pub async fn pending(&self) -> usize {
        self.runs
            .lock()
            .await
            .values()
            .filter(|r| !r.status.is_terminal())
            .count()
    }

    /// Take the oldest due run, mark it running and count the attempt.
    ///
    /// The stored record only changes once the payload is loaded and the new
    /// state is on disk; on error the run stays due.
    pub async fn claim_due(&self, now: DateTime<Utc>) -> Result<Option<Claim>, QueueError> {
        let mut runs = self.runs.lock().await;
        let Some(mut record) = runs
            .values()
            .filter(|r| r.is_due(now))
            .min_by(|a, b| a.created_at.cmp(&b.created_at))
            .cloned()
        else {
            return Ok(None);
        };

        let payload = match record.stage {
            StepKind::Transfer => self.load_payload(&record.run_id).await?,
            StepKind::Index => None,
        };

        let attempt = match record.stage {
            StepKind::Transfer => {
                record.transfer_attempts += 1;
                record.transfer_attempts
            }
            StepKind::Index => {
                record.index_attempts += 1;
                record.index_attempts
            }
        };
        record.status = RunStatus::Running {
            stage: record.stage,
            attempt,
        };
        record.updated_at = Utc::now();

        self.persist(&record).await?;
        runs.insert(record.run_id.clone(), record.clone());

        Ok(Some(Claim {
            record,
            attempt,
            payload,
        }))
    }

    /// Transfer succeeded: drop the payload and queue the index stage.
    pub async fn advance_to_index(
        &self,
        run_id: &str,
        blob: BlobDescriptor,
        description: String,
    ) -> Result<RunRecord, QueueError> {
        let record = self
            .update(run_id, |r| {
                r.stage = StepKind::Index;
                r.status = RunStatus::Queued;
                r.blob = Some(blob);
                r.description = Some(description);
            })
            .await?;
        self.delete_payload(run_id).await?;
        self.notify.notify_one();
        Ok(record)
    }

    pub async fn complete(&self, run_id: &str) -> Result<RunRecord, QueueError> {
        self.update(run_id, |r| {
            let pathname = r
                .blob
                .as_ref()
                .map_or_else(|| r.job.pathname.clone(), |b| b.pathname.clone());
            r.status = RunStatus::Completed { pathname };
        })
        .await
    }

    /// Put the current stage back in line after `delay`.
    pub async fn retry_after(&self, run_id: &str, delay: Duration) -> Result<RunRecord, QueueError> {
        let not_before = Utc::now() + Self::to_chrono(delay);
        self.update(run_id, |r| {
            r.status = RunStatus::Retrying {
                stage: r.stage,
                attempt: r.attempts(r.stage),
                not_before,
            };
        })
        .await
    }

    pub async fn fail(&self, run_id: &str, error: String) -> Result<RunRecord, QueueError> {
        let record = self
            .update(run_id, |r| r.status = RunStatus::Failed { error })
            .await?;
        self.delete_payload(run_id).await?;
        Ok(record)
    }

    /// Hand a claimed run back after its attempt could not be recorded.
    /// The in-memory state moves to `retrying` even when the record cannot be
    /// written.
    pub async fn release(&self, run_id: &str, delay: Duration) -> Option<RunRecord> {
        let not_before = Utc::now() + Self::to_chrono(delay);
        let mut runs = self.runs.lock().await;
        let record = runs.get_mut(run_id)?;
        if !matches!(record.status, RunStatus::Running { .. }) {
            return Some(record.clone());
        }

        record.status = RunStatus::Retrying {
            stage: record.stage,
            attempt: record.attempts(record.stage),
            not_before,
        };
        record.updated_at = Utc::now();
        let record = record.clone();
        drop(runs);

        if let Err(e) = self.persist(&record).await {
            tracing::warn!(run_id = %run_id, error = %e, "Released run kept in memory only");
        }
        self.notify.notify_one();
        Some(record)
    }

    /// Forget completed and failed runs last touched before `cutoff`.
    pub async fn prune_terminal(&self, cutoff: DateTime<Utc>) -> Result<usize, QueueError> {
        let expired: Vec<String> = self
            .runs
            .lock()
            .await
            .values()
            .filter(|r| r.status.is_terminal() && r.updated_at < cutoff)
            .map(|r| r.run_id.clone())
            .collect();

        for run_id in &expired {
            self.remove_record(run_id).await?;
            self.delete_payload(run_id).await?;
            self.runs.lock().await.remove(run_id);
        }

        if !expired.is_empty() {
            tracing::info!("Pruned {} finished runs", expired.len());
        }
        Ok(expired.len())
    }

    /// Sleep until something is enqueued or `timeout` passes.
    pub async fn wait(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
    }

    async fn update(
        &self,
        run_id: &str,
        change: impl FnOnce(&mut RunRecord),
    ) -> Result<RunRecord, QueueError> {
        let mut runs = self.runs.lock().await;
        let mut record = runs
            .get(run_id)
            .cloned()
            .ok_or_else(|| QueueError::UnknownRun(run_id.to_string()))?;
        change(&mut record);
        record.updated_at = Utc::now();

        self.persist(&record).await?;
        runs.insert(run_id.to_string(), record.clone());
        Ok(record)
    }

    async fn persist(&self, record: &RunRecord) -> Result<(), QueueError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let path = dir.join("runs").join(format!("{}.json", record.run_id));
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove_record(&self, run_id: &str) -> Result<(), QueueError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        match fs::remove_file(dir.join("runs").join(format!("{}.json", run_id))).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn to_chrono(delay: Duration) -> chrono::Duration {
        chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::hours(1))
    }

    fn payload_path(dir: &Path, run_id: &str) -> PathBuf {
        dir.join("payloads").join(format!("{}.bin", run_id))
    }

    async fn store_payload(&self, run_id: &str, payload: Vec<u8>) -> Result<(), QueueError> {
        match &self.dir {
            Some(dir) => fs::write(Self::payload_path(dir, run_id), payload).await?,
            None => {
                self.payloads.lock().await.insert(run_id.to_string(), payload);
            }
        }
        Ok(())
    }

    async fn load_payload(&self, run_id: &str) -> Result<Option<Vec<u8>>, QueueError> {
        match &self.dir {
            Some(dir) => match fs::read(Self::payload_path(dir, run_id)).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            },
            None => Ok(self.payloads.lock().await.get(run_id).cloned()),
        }
    }

    async fn delete_payload(&self, run_id: &str) -> Result<(), QueueError> {
        match &self.dir {
            Some(dir) => match fs::remove_file(Self::payload_path(dir, run_id)).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
            None => {
                self.payloads.lock().await.remove(run_id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccMetadata, ArtifactMetadata};

    fn job(id: &str) -> TransferJob {
        TransferJob {
            name: id.to_string(),
            pathname: format!("acc/{}", id),
            content_type: "image/jpeg".to_string(),
            size: 2,
            add_random_suffix: false,
            allow_overwrite: true,
            metadata: ArtifactMetadata::acc(AccMetadata {
                id: id.to_string(),
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn test_claim_counts_attempts_per_stage() {
        let queue = RunQueue::in_memory();
        let run_id = queue.enqueue(job("p1"), vec![1, 2]).await.unwrap();

        let claim = queue.claim_due(Utc::now()).await.unwrap().unwrap();
        assert_eq!(claim.record.run_id, run_id);
        assert_eq!(claim.attempt, 1);
        assert_eq!(claim.payload, Some(vec![1, 2]));
        assert!(queue.claim_due(Utc::now()).await.unwrap().is_none());

        queue.retry_after(&run_id, Duration::ZERO).await.unwrap();
        let claim = queue.claim_due(Utc::now()).await.unwrap().unwrap();
        assert_eq!(claim.attempt, 2);

        let blob = BlobDescriptor {
            pathname: "acc/p1".to_string(),
            url: "memory://blobs/acc/p1".to_string(),
            download_url: "memory://blobs/acc/p1?download=1".to_string(),
            content_type: "image/jpeg".to_string(),
            size: 2,
            uploaded_at: Utc::now(),
        };
        queue
            .advance_to_index(&run_id, blob, "p1".to_string())
            .await
            .unwrap();

        let claim = queue.claim_due(Utc::now()).await.unwrap().unwrap();
        assert_eq!(claim.record.stage, StepKind::Index);
        assert_eq!(claim.attempt, 1);
        assert!(claim.payload.is_none());

        let done = queue.complete(&run_id).await.unwrap();
        assert_eq!(
            done.status,
            RunStatus::Completed {
                pathname: "acc/p1".to_string()
            }
        );
        assert_eq!(queue.pending().await, 0);
    }

    #[tokio::test]
    async fn test_retrying_run_waits_for_not_before() {
        let queue = RunQueue::in_memory();
        let run_id = queue.enqueue(job("p1"), vec![1]).await.unwrap();
        queue.claim_due(Utc::now()).await.unwrap().unwrap();

        let record = queue
            .retry_after(&run_id, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(matches!(
            record.status,
            RunStatus::Retrying {
                stage: StepKind::Transfer,
                attempt: 1,
                ..
            }
        ));

        assert!(queue.claim_due(Utc::now()).await.unwrap().is_none());
        let later = Utc::now() + chrono::Duration::seconds(61);
        assert!(queue.claim_due(later).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_run() {
        let queue = RunQueue::in_memory();
        assert!(matches!(
            queue.complete("nope").await,
            Err(QueueError::UnknownRun(_))
        ));
        assert!(queue.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_runs_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let (pending_id, done_id) = {
            let queue = RunQueue::open(dir.path()).await.unwrap();
            let pending_id = queue.enqueue(job("p1"), vec![9, 9, 9]).await.unwrap();
            // Interrupted mid-attempt
            queue.claim_due(Utc::now()).await.unwrap().unwrap();

            let done_id = queue.enqueue(job("p2"), vec![1]).await.unwrap();
            queue.fail(&done_id, "boom".to_string()).await.unwrap();
            (pending_id, done_id)
        };

        let queue = RunQueue::open(dir.path()).await.unwrap();
        assert_eq!(queue.pending().await, 1);
        assert_eq!(
            queue.get(&done_id).await.unwrap().status,
            RunStatus::Failed {
                error: "boom".to_string()
            }
        );
        assert!(!dir
            .path()
            .join("payloads")
            .join(format!("{}.bin", done_id))
            .exists());

        let claim = queue.claim_due(Utc::now()).await.unwrap().unwrap();
        assert_eq!(claim.record.run_id, pending_id);
        assert_eq!(claim.attempt, 2);
        assert_eq!(claim.payload, Some(vec![9, 9, 9]));
    }

    #[tokio::test]
    async fn test_claim_leaves_run_due_when_record_cannot_be_written() {
        let dir = tempfile::tempdir().unwrap();
        let queue = RunQueue::open(dir.path()).await.unwrap();
        let run_id = queue.enqueue(job("p1"), vec![7]).await.unwrap();

        std::fs::remove_dir_all(dir.path().join("runs")).unwrap();
        assert!(queue.claim_due(Utc::now()).await.is_err());

        let record = queue.get(&run_id).await.unwrap();
        assert_eq!(record.status, RunStatus::Queued);
        assert_eq!(record.transfer_attempts, 0);

        std::fs::create_dir(dir.path().join("runs")).unwrap();
        let claim = queue.claim_due(Utc::now()).await.unwrap().unwrap();
        assert_eq!(claim.attempt, 1);
        assert_eq!(claim.payload, Some(vec![7]));
    }

    #[tokio::test]
    async fn test_release_after_failed_write_makes_run_claimable() {
        let dir = tempfile::tempdir().unwrap();
        let queue = RunQueue::open(dir.path()).await.unwrap();
        let run_id = queue.enqueue(job("p1"), vec![7]).await.unwrap();
        queue.claim_due(Utc::now()).await.unwrap().unwrap();

        std::fs::remove_dir_all(dir.path().join("runs")).unwrap();
        assert!(queue.complete(&run_id).await.is_err());
        assert_eq!(
            queue.get(&run_id).await.unwrap().status,
            RunStatus::Running {
                stage: StepKind::Transfer,
                attempt: 1
            }
        );

        let released = queue.release(&run_id, Duration::ZERO).await.unwrap();
        assert!(matches!(
            released.status,
            RunStatus::Retrying {
                stage: StepKind::Transfer,
                attempt: 1,
                ..
            }
        ));

        std::fs::create_dir(dir.path().join("runs")).unwrap();
        let claim = queue.claim_due(Utc::now()).await.unwrap().unwrap();
        assert_eq!(claim.record.run_id, run_id);
        assert_eq!(claim.attempt, 2);
    }

    #[tokio::test]
    async fn test_release_ignores_runs_that_are_not_running() {
        let queue = RunQueue::in_memory();
        let run_id = queue.enqueue(job("p1"), vec![1]).await.unwrap();
        queue.fail(&run_id, "boom".to_string()).await.unwrap();

        let record = queue.release(&run_id, Duration::ZERO).await.unwrap();
        assert!(record.status.is_terminal());
        assert!(queue.release("nope", Duration::ZERO).await.is_none());
    }

    #[tokio::test]
    async fn test_prune_drops_only_old_finished_runs() {
        let dir = tempfile::tempdir().unwrap();
        let queue = RunQueue::open(dir.path()).await.unwrap();
        let pending_id = queue.enqueue(job("p1"), vec![1]).await.unwrap();
        let failed_id = queue.enqueue(job("p2"), vec![2]).await.unwrap();
        queue.fail(&failed_id, "boom".to_string()).await.unwrap();

        let an_hour_ago = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(queue.prune_terminal(an_hour_ago).await.unwrap(), 0);
        assert!(queue.get(&failed_id).await.is_some());

        let later = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(queue.prune_terminal(later).await.unwrap(), 1);
        assert!(queue.get(&failed_id).await.is_none());
        assert!(queue.get(&pending_id).await.is_some());
        assert!(!dir
            .path()
            .join("runs")
            .join(format!("{}.json", failed_id))
            .exists());

        let queue = RunQueue::open(dir.path()).await.unwrap();
        assert!(queue.get(&failed_id).await.is_none());
        assert_eq!(queue.pending().await, 1);
    }

    #[test]
    fn test_status_serialization() {
        let status = RunStatus::Retrying {
            stage: StepKind::Index,
            attempt: 2,
            not_before: DateTime::from_timestamp(0, 0).unwrap(),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["state"], "retrying");
        assert_eq!(value["stage"], "index");
        assert_eq!(value["attempt"], 2);
        assert!(value.get("notBefore").is_some());
    }
}
