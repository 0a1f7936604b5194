use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct IndexError(pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub content: Value,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub content: Value,
    pub metadata: Value,
}

/// Text search index keyed by record id.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Insert or replace the record with the same id.
    async fn upsert(&self, record: IndexRecord) -> Result<(), IndexError>;

    async fn search(&self, query: &str, rerank: bool) -> Result<Vec<SearchHit>, IndexError>;

    async fn delete(&self, id: &str) -> Result<(), IndexError>;
}

/// Scores records by the share of query terms found in `content.text`.
#[derive(Default)]
pub struct MemorySearchIndex {
    records: DashMap<String, IndexRecord>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<IndexRecord> {
        self.records.get(id).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn upsert(&self, record: IndexRecord) -> Result<(), IndexError> {
        if record.id.is_empty() {
            return Err(IndexError("invalid record: empty id".to_string()));
        }
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn search(&self, query: &str, rerank: bool) -> Result<Vec<SearchHit>, IndexError> {
        let wanted = terms(query);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = self
            .records
            .iter()
            .filter_map(|entry| {
                let record = entry.value();
                let text = record
                    .content
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let found = terms(text).intersection(&wanted).count();
                (found > 0).then(|| SearchHit {
                    id: record.id.clone(),
                    score: found as f64 / wanted.len() as f64,
                    content: record.content.clone(),
                    metadata: record.metadata.clone(),
                })
            })
            .collect();

        if rerank {
            hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        } else {
            hits.sort_by(|a, b| a.id.cmp(&b.id));
        }
        Ok(hits)
    }

    async fn delete(&self, id: &str) -> Result<(), IndexError> {
        self.records.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, text: &str) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            content: json!({ "text": text }),
            metadata: json!({ "pathname": id }),
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = MemorySearchIndex::new();
        index.upsert(record("acc/1", "old")).await.unwrap();
        index.upsert(record("acc/1", "new")).await.unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.get("acc/1").unwrap().content, json!({ "text": "new" }));
    }

    #[tokio::test]
    async fn test_rerank_orders_by_score() {
        let index = MemorySearchIndex::new();
        index.upsert(record("acc/a", "concrete pour")).await.unwrap();
        index.upsert(record("acc/b", "Concrete pour, level 3")).await.unwrap();
        index.upsert(record("acc/c", "roof framing")).await.unwrap();

        let hits = index.search("level 3 concrete", true).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["acc/b", "acc/a"]);
        assert!(hits[0].score > hits[1].score);
        assert!((hits[0].score - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_delete_and_empty_query() {
        let index = MemorySearchIndex::new();
        index.upsert(record("acc/a", "crane")).await.unwrap();
        assert!(index.search("  ", true).await.unwrap().is_empty());

        index.delete("acc/a").await.unwrap();
        assert!(index.search("crane", false).await.unwrap().is_empty());
    }
}
