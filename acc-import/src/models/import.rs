use serde::{Deserialize, Serialize};

/// Storage namespace for imported photos.
pub const ACC_PREFIX: &str = "acc/";

/// Deterministic storage key for a photo id.
pub fn pathname_for(photo_id: &str) -> String {
    format!("{}{}", ACC_PREFIX, photo_id)
}

/// A photo offered for import, as posted back by the browser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePhoto {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub file_url: String,
    #[serde(default)]
    pub taken_at: String,
}

impl From<acc_api::endpoints::photos::Photo> for CandidatePhoto {
    fn from(photo: acc_api::endpoints::photos::Photo) -> Self {
        Self {
            id: photo.id,
            title: photo.title,
            description: photo.description,
            thumbnail_url: photo.thumbnail_url,
            file_url: photo.file_url,
            taken_at: photo.taken_at,
        }
    }
}

/// `acc` block of the stored artifact's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub taken_at: String,
    pub thumbnail_url: String,
    pub hub_id: String,
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub source: String,
    pub acc: AccMetadata,
}

impl ArtifactMetadata {
    pub fn acc(acc: AccMetadata) -> Self {
        Self {
            source: "acc".to_string(),
            acc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedImport {
    pub id: String,
    pub run_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFailure {
    pub id: String,
    pub error: String,
}

/// What happened to one photo of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Started(StartedImport),
    Skipped(String),
    Error(ImportFailure),
}

/// Three-way partition of a batch. Every processed photo lands in exactly one list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub started: Vec<StartedImport>,
    pub skipped_ids: Vec<String>,
    pub errors: Vec<ImportFailure>,
}

impl BatchReport {
    pub fn record(&mut self, outcome: ImportOutcome) {
        match outcome {
            ImportOutcome::Started(started) => self.started.push(started),
            ImportOutcome::Skipped(id) => self.skipped_ids.push(id),
            ImportOutcome::Error(failure) => self.errors.push(failure),
        }
    }

    pub fn len(&self) -> usize {
        self.started.len() + self.skipped_ids.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
