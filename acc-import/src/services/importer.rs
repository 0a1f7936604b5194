use std::sync::Arc;
use thiserror::Error;

use super::blob_store::BlobStore;
use super::fetcher::{allowed_remote_url, is_allowed_content_type, resolve_content_type, ImageFetcher};
use crate::models::{
    pathname_for, AccMetadata, ArtifactMetadata, BatchReport, CandidatePhoto, ImportFailure,
    ImportOutcome, ImportRequest, StartedImport,
};
use crate::pipeline::{RunQueue, TransferJob};

/// Why a single photo could not be scheduled. Never affects its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("Missing photo id")]
    MissingPhotoId,

    /// Existence check failed for a reason other than "not found".
    #[error("{0}")]
    Lookup(String),

    #[error("Missing fileUrl")]
    MissingFileUrl,

    #[error("Invalid fileUrl")]
    InvalidFileUrl,

    #[error("Failed to fetch image ({0})")]
    FetchStatus(u16),

    #[error("Image exceeds size limit")]
    TooLarge,

    #[error("Unsupported content-type: {0}")]
    UnsupportedContentType(String),

    #[error("{0}")]
    Fetch(String),

    #[error("{0}")]
    Schedule(String),
}

impl ImportError {
    fn unsupported(content_type: &str) -> Self {
        if content_type.is_empty() {
            ImportError::UnsupportedContentType("unknown".to_string())
        } else {
            ImportError::UnsupportedContentType(content_type.to_string())
        }
    }
}

/// Validates each candidate photo, pulls its bytes and schedules a run.
pub struct Importer {
    blobs: Arc<dyn BlobStore>,
    fetcher: Arc<dyn ImageFetcher>,
    queue: Arc<RunQueue>,
}

impl Importer {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        fetcher: Arc<dyn ImageFetcher>,
        queue: Arc<RunQueue>,
    ) -> Self {
        Self {
            blobs,
            fetcher,
            queue,
        }
    }

    /// Process photos one at a time; every photo yields exactly one outcome.
    pub async fn import_batch(&self, request: &ImportRequest) -> BatchReport {
        let mut report = BatchReport::default();
        for photo in &request.photos {
            let outcome = self
                .import_photo(photo, &request.hub_id, &request.project_id)
                .await;
            report.record(outcome);
        }

        tracing::info!(
            started = report.started.len(),
            skipped = report.skipped_ids.len(),
            errors = report.errors.len(),
            "Import batch processed"
        );
        report
    }

    pub async fn import_photo(
        &self,
        photo: &CandidatePhoto,
        hub_id: &str,
        project_id: &str,
    ) -> ImportOutcome {
        let photo_id = photo.id.trim();
        if photo_id.is_empty() {
            return failure("", ImportError::MissingPhotoId);
        }

        match self.try_import(photo, photo_id, hub_id, project_id).await {
            Ok(Some(run_id)) => {
                tracing::info!(photo_id = %photo_id, run_id = %run_id, "Import scheduled");
                ImportOutcome::Started(StartedImport {
                    id: photo_id.to_string(),
                    run_id,
                })
            }
            Ok(None) => {
                tracing::debug!(photo_id = %photo_id, "Already imported, skipping");
                ImportOutcome::Skipped(photo_id.to_string())
            }
            Err(e) => {
                tracing::warn!(photo_id = %photo_id, error = %e, "Photo import rejected");
                failure(photo_id, e)
            }
        }
    }

    /// `Ok(None)` when the photo is already stored.
    async fn try_import(
        &self,
        photo: &CandidatePhoto,
        photo_id: &str,
        hub_id: &str,
        project_id: &str,
    ) -> Result<Option<String>, ImportError> {
        let pathname = pathname_for(photo_id);

        let existing = self
            .blobs
            .head(&pathname)
            .await
            .map_err(|e| ImportError::Lookup(e.0))?;
        if existing.is_some() {
            return Ok(None);
        }

        let file_url = photo.file_url.trim();
        if file_url.is_empty() {
            return Err(ImportError::MissingFileUrl);
        }
        let url = allowed_remote_url(file_url).ok_or(ImportError::InvalidFileUrl)?;

        let fetched = self.fetcher.fetch(&url).await?;
        let content_type = resolve_content_type(&url, &fetched.content_type);
        if !is_allowed_content_type(&content_type) {
            return Err(ImportError::unsupported(&content_type));
        }

        let title = photo.title.trim();
        let job = TransferJob {
            name: if title.is_empty() {
                photo_id.to_string()
            } else {
                title.to_string()
            },
            pathname,
            content_type,
            size: fetched.bytes.len() as u64,
            add_random_suffix: false,
            allow_overwrite: true,
            metadata: ArtifactMetadata::acc(AccMetadata {
                id: photo_id.to_string(),
                title: photo.title.clone(),
                description: photo.description.clone(),
                taken_at: photo.taken_at.clone(),
                thumbnail_url: photo.thumbnail_url.clone(),
                hub_id: hub_id.to_string(),
                project_id: project_id.to_string(),
            }),
        };

        let run_id = self
            .queue
            .enqueue(job, fetched.bytes)
            .await
            .map_err(|e| ImportError::Schedule(e.to_string()))?;
        Ok(Some(run_id))
    }
}

fn failure(id: &str, error: ImportError) -> ImportOutcome {
    ImportOutcome::Error(ImportFailure {
        id: id.to_string(),
        error: error.to_string(),
    })
}
