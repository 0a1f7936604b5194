use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::classify::{ceiling_message, classify, generic_message, Classification, StepKind};
use crate::models::ArtifactMetadata;
use crate::services::{BlobDescriptor, BlobStore, IndexWriter, PutOptions};

/// How a failed step attempt should be handled by the harness.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// Known transient failure with a backoff hint.
    #[error("{message}")]
    Retryable {
        message: String,
        retry_after: Duration,
    },

    /// Unclassified failure below the attempt ceiling.
    #[error("{0}")]
    Retry(String),

    #[error("{0}")]
    Fatal(String),
}

/// Identity of one step attempt. `attempt` starts at 1.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub step_id: String,
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
}

impl StepContext {
    pub fn new(step_id: impl Into<String>, attempt: u32) -> Self {
        Self {
            step_id: step_id.into(),
            attempt,
            started_at: Utc::now(),
        }
    }

    fn started_at_iso(&self) -> String {
        self.started_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Turn a raw failure message into the harness signal for `kind`.
    pub fn settle(&self, kind: StepKind, message: &str) -> StepError {
        match classify(kind, message) {
            Classification::Retryable {
                message,
                retry_after,
            } => StepError::Retryable {
                message,
                retry_after,
            },
            Classification::Fatal(message) => {
                StepError::Fatal(format!("[{}] {}", self.step_id, message))
            }
            Classification::Unclassified if self.attempt >= kind.max_attempts() => {
                StepError::Fatal(ceiling_message(
                    kind,
                    &self.step_id,
                    self.attempt,
                    &self.started_at_iso(),
                    message,
                ))
            }
            Classification::Unclassified => StepError::Retry(generic_message(kind, message)),
        }
    }
}

/// Everything the transfer step needs besides the bytes themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferJob {
    /// Display name: the trimmed title, or the photo id.
    pub name: String,
    pub pathname: String,
    pub content_type: String,
    pub size: u64,
    pub add_random_suffix: bool,
    pub allow_overwrite: bool,
    pub metadata: ArtifactMetadata,
}

/// Write the payload to blob storage.
pub async fn transfer_step(
    blobs: &dyn BlobStore,
    ctx: &StepContext,
    job: &TransferJob,
    bytes: Vec<u8>,
) -> Result<BlobDescriptor, StepError> {
    tracing::info!(
        "[{}] Uploading image (attempt {})... {}",
        ctx.step_id,
        ctx.attempt,
        job.name
    );

    let options = PutOptions {
        content_type: job.content_type.clone(),
        overwrite: job.allow_overwrite,
        add_random_suffix: job.add_random_suffix,
    };

    match blobs.put(&job.pathname, bytes, &options).await {
        Ok(blob) => {
            tracing::info!(
                "[{}] Successfully uploaded image {} at {}: {}",
                ctx.step_id,
                job.name,
                ctx.started_at_iso(),
                blob.url
            );
            Ok(blob)
        }
        Err(e) => {
            let outcome = ctx.settle(StepKind::Transfer, &e.0);
            tracing::warn!(step_id = %ctx.step_id, attempt = ctx.attempt, error = %outcome, "Upload attempt failed");
            Err(outcome)
        }
    }
}

/// Upsert the description and metadata for a stored blob.
pub async fn index_step(
    writer: &IndexWriter,
    ctx: &StepContext,
    blob: &BlobDescriptor,
    text: &str,
    metadata: &ArtifactMetadata,
) -> Result<(), StepError> {
    tracing::info!(
        "[{}] Indexing image (attempt {})... {}",
        ctx.step_id,
        ctx.attempt,
        blob.download_url
    );

    match writer.write(blob, text, Some(metadata)).await {
        Ok(()) => {
            tracing::info!(
                "[{}] Successfully indexed image at {}",
                ctx.step_id,
                ctx.started_at_iso()
            );
            Ok(())
        }
        Err(e) => {
            let outcome = ctx.settle(StepKind::Index, &e.0);
            tracing::warn!(step_id = %ctx.step_id, attempt = ctx.attempt, error = %outcome, "Index attempt failed");
            Err(outcome)
        }
    }
}
