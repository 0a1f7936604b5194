use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::blob_store::BlobDescriptor;
use super::search_index::{IndexError, IndexRecord, SearchIndex};
use crate::models::{AccMetadata, ArtifactMetadata};

/// Writes one search record per stored blob, keyed by pathname.
#[derive(Clone)]
pub struct IndexWriter {
    index: Arc<dyn SearchIndex>,
}

impl IndexWriter {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    /// Upsert `text` as searchable content, with the blob descriptor plus any
    /// import metadata as retrievable metadata. Import keys win on collision.
    pub async fn write(
        &self,
        blob: &BlobDescriptor,
        text: &str,
        extra: Option<&ArtifactMetadata>,
    ) -> Result<(), IndexError> {
        let mut metadata = to_object(blob)?;
        if let Some(extra) = extra {
            metadata.extend(to_object(extra)?);
        }

        self.index
            .upsert(IndexRecord {
                id: blob.pathname.clone(),
                content: json!({ "text": text }),
                metadata: Value::Object(metadata),
            })
            .await
    }
}

impl IndexWriter {
    /// Drop the record written for `pathname`. Unknown pathnames are not an error.
    pub async fn delete(&self, pathname: &str) -> Result<(), IndexError> {
        self.index.delete(pathname).await
    }
}

fn to_object<T: serde::Serialize>(value: &T) -> Result<Map<String, Value>, IndexError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(IndexError("invalid metadata: not an object".to_string())),
        Err(e) => Err(IndexError(format!("invalid metadata: {}", e))),
    }
}

/// Searchable text for an imported photo.
pub fn describe(acc: &AccMetadata, name: &str) -> String {
    let mut parts: Vec<String> = [acc.title.trim(), acc.description.trim()]
        .into_iter()
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    if !acc.taken_at.trim().is_empty() {
        parts.push(format!("Taken at {}", acc.taken_at.trim()));
    }

    if parts.is_empty() {
        name.to_string()
    } else {
        parts.join(". ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemorySearchIndex;
    use chrono::Utc;

    fn blob(pathname: &str) -> BlobDescriptor {
        BlobDescriptor {
            pathname: pathname.to_string(),
            url: format!("memory://blobs/{}", pathname),
            download_url: format!("memory://blobs/{}?download=1", pathname),
            content_type: "image/png".to_string(),
            size: 10,
            uploaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_write_merges_descriptor_and_import_metadata() {
        let index = Arc::new(MemorySearchIndex::new());
        let writer = IndexWriter::new(index.clone());
        let meta = ArtifactMetadata::acc(AccMetadata {
            id: "p1".to_string(),
            hub_id: "h".to_string(),
            project_id: "pr".to_string(),
            ..Default::default()
        });

        writer.write(&blob("acc/p1"), "first", Some(&meta)).await.unwrap();
        writer.write(&blob("acc/p1"), "second", Some(&meta)).await.unwrap();

        assert_eq!(index.len(), 1);
        let record = index.get("acc/p1").unwrap();
        assert_eq!(record.content, json!({ "text": "second" }));
        assert_eq!(record.metadata["pathname"], "acc/p1");
        assert_eq!(record.metadata["contentType"], "image/png");
        assert_eq!(record.metadata["source"], "acc");
        assert_eq!(record.metadata["acc"]["projectId"], "pr");
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let index = Arc::new(MemorySearchIndex::new());
        let writer = IndexWriter::new(index.clone());

        writer.write(&blob("acc/p1"), "kept", None).await.unwrap();
        writer.write(&blob("acc/p2"), "dropped", None).await.unwrap();
        writer.delete("acc/p2").await.unwrap();
        writer.delete("acc/missing").await.unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.get("acc/p2").is_none());
    }

    #[test]
    fn test_describe() {
        let acc = AccMetadata {
            title: " Footing ".to_string(),
            description: "North wall".to_string(),
            taken_at: "2024-05-01T10:00:00Z".to_string(),
            ..Default::default()
        };
        assert_eq!(
            describe(&acc, "p1"),
            "Footing. North wall. Taken at 2024-05-01T10:00:00Z"
        );
        assert_eq!(describe(&AccMetadata::default(), "p1"), "p1");
    }
}
