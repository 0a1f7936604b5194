use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;
use thiserror::Error;

/// Storage failure. The message is what step classification inspects.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StorageError(pub String);

/// Descriptor of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobDescriptor {
    pub pathname: String,
    pub url: String,
    pub download_url: String,
    pub content_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub blobs: Vec<BlobDescriptor>,
    pub has_more: bool,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: String,
    pub overwrite: bool,
    pub add_random_suffix: bool,
}

/// Key to bytes object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// One page of objects under `prefix`, ordered by pathname.
    async fn list(
        &self,
        prefix: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<ListPage, StorageError>;

    /// `Ok(None)` means the object does not exist.
    async fn head(&self, pathname: &str) -> Result<Option<BlobDescriptor>, StorageError>;

    async fn put(
        &self,
        pathname: &str,
        bytes: Vec<u8>,
        options: &PutOptions,
    ) -> Result<BlobDescriptor, StorageError>;

    async fn delete(&self, pathname: &str) -> Result<(), StorageError>;
}

struct StoredBlob {
    descriptor: BlobDescriptor,
    bytes: Vec<u8>,
}

/// Process-local object storage.
pub struct MemoryBlobStore {
    base_url: String,
    blobs: RwLock<BTreeMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::with_base_url("memory://blobs")
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            blobs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Stored bytes for `pathname`, if any.
    pub fn bytes(&self, pathname: &str) -> Option<Vec<u8>> {
        self.blobs
            .read()
            .ok()?
            .get(pathname)
            .map(|blob| blob.bytes.clone())
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError("Blob store lock poisoned".to_string())
}

/// `photo.jpg` becomes `photo-1a2b3c4d.jpg`.
fn with_random_suffix(pathname: &str) -> String {
    let suffix: u32 = rand::rng().random();
    let (dir, file) = match pathname.rfind('/') {
        Some(i) => pathname.split_at(i + 1),
        None => ("", pathname),
    };
    match file.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}-{:08x}{}", dir, &file[..dot], suffix, &file[dot..]),
        _ => format!("{}{}-{:08x}", dir, file, suffix),
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list(
        &self,
        prefix: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<ListPage, StorageError> {
        let blobs = self.blobs.read().map_err(poisoned)?;
        let limit = limit.max(1);

        let mut matching = blobs
            .range::<str, _>((
                cursor.map_or(std::ops::Bound::Unbounded, std::ops::Bound::Excluded),
                std::ops::Bound::Unbounded,
            ))
            .filter(|(pathname, _)| pathname.starts_with(prefix))
            .map(|(_, blob)| blob.descriptor.clone());

        let page: Vec<BlobDescriptor> = matching.by_ref().take(limit).collect();
        let has_more = matching.next().is_some();
        let cursor = if has_more {
            page.last().map(|blob| blob.pathname.clone())
        } else {
            None
        };

        Ok(ListPage {
            blobs: page,
            has_more,
            cursor,
        })
    }

    async fn head(&self, pathname: &str) -> Result<Option<BlobDescriptor>, StorageError> {
        let blobs = self.blobs.read().map_err(poisoned)?;
        Ok(blobs.get(pathname).map(|blob| blob.descriptor.clone()))
    }

    async fn put(
        &self,
        pathname: &str,
        bytes: Vec<u8>,
        options: &PutOptions,
    ) -> Result<BlobDescriptor, StorageError> {
        if pathname.is_empty() {
            return Err(StorageError("pathname is required".to_string()));
        }

        let pathname = if options.add_random_suffix {
            with_random_suffix(pathname)
        } else {
            pathname.to_string()
        };

        let mut blobs = self.blobs.write().map_err(poisoned)?;
        if !options.overwrite && blobs.contains_key(&pathname) {
            return Err(StorageError(format!("This blob already exists: {}", pathname)));
        }

        let url = format!("{}/{}", self.base_url, pathname);
        let descriptor = BlobDescriptor {
            download_url: format!("{}?download=1", url),
            url,
            pathname: pathname.clone(),
            content_type: options.content_type.clone(),
            size: bytes.len() as u64,
            uploaded_at: Utc::now(),
        };

        blobs.insert(
            pathname,
            StoredBlob {
                descriptor: descriptor.clone(),
                bytes,
            },
        );
        Ok(descriptor)
    }

    async fn delete(&self, pathname: &str) -> Result<(), StorageError> {
        self.blobs.write().map_err(poisoned)?.remove(pathname);
        Ok(())
    }
}
