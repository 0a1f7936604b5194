use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error)]
#[error("Key-value store error: {0}")]
pub struct KvError(pub String);

impl From<serde_json::Error> for KvError {
    fn from(err: serde_json::Error) -> Self {
        KvError(err.to_string())
    }
}

/// TTL'd string store backing sessions.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Insert or replace `key`, resetting its TTL.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), KvError>;

    /// Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), KvError>;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

pub struct MemoryKvStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Like `new`, plus a background task sweeping expired keys every `interval`.
    pub fn with_cleanup(interval: Duration) -> Self {
        let store = Self::new();

        let entries = store.entries.clone();
        tokio::spawn(async move {
            cleanup_expired_entries(entries, interval).await;
        });

        tracing::info!(
            "Key-value store initialized with cleanup every {} seconds",
            interval.as_secs()
        );
        store
    }

    /// Entry count, expired-but-unswept keys included (for monitoring)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let now = Instant::now();
        let value = self
            .entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone());
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), KvError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Background task that periodically drops expired keys
async fn cleanup_expired_entries(entries: Arc<DashMap<String, Entry>>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let now = Instant::now();
        let initial_count = entries.len();

        entries.retain(|key, entry| {
            if entry.expires_at <= now {
                tracing::debug!(key = %key, "Dropping expired key");
                false
            } else {
                true
            }
        });

        let cleaned = initial_count.saturating_sub(entries.len());
        if cleaned > 0 {
            tracing::info!(
                "Cleaned up {} expired keys, {} remaining",
                cleaned,
                entries.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_values_expire_after_ttl() {
        let store = MemoryKvStore::new();
        store
            .set("k", "v".to_string(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_renews_ttl() {
        let store = MemoryKvStore::new();
        store
            .set("k", "v1".to_string(), Duration::from_secs(5))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        store
            .set("k", "v2".to_string(), Duration::from_secs(5))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryKvStore::new();
        store
            .set("k", "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_sweeps_expired_keys() {
        let store = MemoryKvStore::with_cleanup(Duration::from_secs(1));
        store
            .set("gone", "v".to_string(), Duration::from_millis(500))
            .await
            .unwrap();
        store
            .set("kept", "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.len(), 1);
    }
}
