pub mod hubs;
pub mod photos;
pub mod projects;

use serde::{Deserialize, Serialize};

/// Entry of a JSON:API style listing (`/project/v1/...`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEntry {
    pub id: Option<String>,
    pub attributes: Option<RawAttributes>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAttributes {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntriesResponse {
    pub data: Option<Vec<RawEntry>>,
}

/// `{id, name}` projection shared by hubs and projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Named {
    pub id: String,
    pub name: String,
}

impl From<RawEntry> for Named {
    fn from(entry: RawEntry) -> Self {
        let id = entry.id.unwrap_or_default();
        let name = entry
            .attributes
            .and_then(|a| a.name)
            .or(entry.name)
            .unwrap_or_else(|| id.clone());
        Self { id, name }
    }
}

impl EntriesResponse {
    pub fn into_named(self) -> Vec<Named> {
        self.data
            .unwrap_or_default()
            .into_iter()
            .map(Named::from)
            .collect()
    }
}
