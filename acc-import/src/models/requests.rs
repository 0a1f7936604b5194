use acc_api::endpoints::{photos::Photo, Named};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use super::CandidatePhoto;
use crate::pipeline::{RunRecord, RunStatus};

/// Photos beyond this count in one import request are ignored.
pub const MAX_PHOTOS_PER_BATCH: usize = 25;

// GET /api/auth/callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

// GET /api/acc/hubs
#[derive(Debug, Serialize)]
pub struct HubsResponse {
    pub hubs: Vec<Named>,
}

// GET /api/acc/projects
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsParams {
    pub hub_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectsResponse {
    pub projects: Vec<Named>,
}

// GET /api/acc/photos
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotosParams {
    pub project_id: Option<String>,
    pub limit: Option<String>,
}

impl PhotosParams {
    /// Unparseable limits are treated as absent.
    pub fn limit(&self) -> Option<u32> {
        self.limit.as_deref().and_then(|l| l.trim().parse().ok())
    }
}

#[derive(Debug, Serialize)]
pub struct PhotosResponse {
    pub photos: Vec<Photo>,
}

// POST /api/acc/photos/check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub photo_ids: Vec<String>,
}

impl CheckRequest {
    /// Accepts only `{photoIds: string[]}`. Ids are trimmed, emptied ones
    /// dropped and duplicates removed, first occurrence wins.
    pub fn from_value(body: &Value) -> Option<Self> {
        let raw = body.as_object()?.get("photoIds")?.as_array()?;
        let ids = raw
            .iter()
            .map(Value::as_str)
            .collect::<Option<Vec<_>>>()?;

        let mut seen = HashSet::new();
        let photo_ids = ids
            .into_iter()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .filter(|id| seen.insert(*id))
            .map(str::to_string)
            .collect();

        Some(Self { photo_ids })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub uploaded_ids: Vec<String>,
}

// POST /api/upload/from-acc
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub photos: Vec<CandidatePhoto>,
    pub hub_id: String,
    pub project_id: String,
}

impl ImportRequest {
    /// Keeps at most `MAX_PHOTOS_PER_BATCH` entries, then drops any entry that
    /// is not an object with a string `id`.
    pub fn from_value(body: &Value) -> Result<Self, &'static str> {
        let body = body.as_object().ok_or("Invalid request body")?;
        let raw = body
            .get("photos")
            .and_then(Value::as_array)
            .ok_or("Invalid photos")?;

        let photos: Vec<CandidatePhoto> = raw
            .iter()
            .take(MAX_PHOTOS_PER_BATCH)
            .filter(|p| p.get("id").is_some_and(Value::is_string))
            .map(candidate_from_value)
            .collect();

        if photos.is_empty() {
            return Err("No photos provided");
        }

        let text = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Ok(Self {
            photos,
            hub_id: text("hubId"),
            project_id: text("projectId"),
        })
    }
}

/// Lenient per-field read: mistyped optional fields become empty.
fn candidate_from_value(value: &Value) -> CandidatePhoto {
    let field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    CandidatePhoto {
        id: field("id"),
        title: field("title"),
        description: field("description"),
        thumbnail_url: field("thumbnailUrl"),
        file_url: field("fileUrl"),
        taken_at: field("takenAt"),
    }
}

// GET /api/runs/{runId}
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub run_id: String,
    pub photo_id: String,
    /// Requested storage key. `Completed` carries the key actually written.
    pub target_pathname: String,
    #[serde(flatten)]
    pub status: RunStatus,
    pub transfer_attempts: u32,
    pub index_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RunRecord> for RunResponse {
    fn from(record: RunRecord) -> Self {
        Self {
            run_id: record.run_id,
            photo_id: record.job.metadata.acc.id,
            target_pathname: record.job.pathname,
            status: record.status,
            transfer_attempts: record.transfer_attempts,
            index_attempts: record.index_attempts,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

// DELETE /api/images/{*pathname}
#[derive(Debug, Serialize)]
pub struct DeleteImageResponse {
    pub success: bool,
}

// Health check
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
