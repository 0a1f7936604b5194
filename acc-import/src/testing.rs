//! In-process fakes for the collaborators, shared by unit and integration tests.

use async_trait::async_trait;
use chrono::Duration;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

use crate::error::ServerError;
use crate::services::{
    BlobDescriptor, BlobStore, FetchedImage, ImageFetcher, ImportError, IndexError, IndexRecord,
    ListPage, MemoryBlobStore, MemorySearchIndex, PutOptions, SearchHit, SearchIndex,
    StorageError, TokenGrant, TokenProvider,
};

fn push(queue: &Mutex<VecDeque<String>>, message: &str) {
    if let Ok(mut queue) = queue.lock() {
        queue.push_back(message.to_string());
    }
}

fn pop(queue: &Mutex<VecDeque<String>>) -> Option<String> {
    queue.lock().ok()?.pop_front()
}

fn read(slot: &Mutex<Option<String>>) -> Option<String> {
    slot.lock().ok()?.clone()
}

fn write(slot: &Mutex<Option<String>>, message: &str) {
    if let Ok(mut slot) = slot.lock() {
        *slot = Some(message.to_string());
    }
}

/// Token provider answering from canned grants and counting calls.
pub struct StaticTokenProvider {
    exchange_grant: Option<TokenGrant>,
    refresh_grant: Option<TokenGrant>,
    exchange_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl StaticTokenProvider {
    /// Code exchange succeeds; refresh fails until `with_refresh_grant`.
    pub fn new() -> Self {
        Self {
            exchange_grant: Some(TokenGrant {
                access_token: "access-from-code".to_string(),
                refresh_token: Some("refresh-from-code".to_string()),
                expires_in: Duration::hours(1),
                token_type: "Bearer".to_string(),
            }),
            refresh_grant: None,
            exchange_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_refresh_grant(mut self, grant: TokenGrant) -> Self {
        self.refresh_grant = Some(grant);
        self
    }

    pub fn failing_exchange(mut self) -> Self {
        self.exchange_grant = None;
        self
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

impl Default for StaticTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://auth.example.test/authorize?state={}", state)
    }

    async fn exchange_code(&self, _code: &str) -> Result<TokenGrant, ServerError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.exchange_grant
            .clone()
            .ok_or_else(|| ServerError::OAuthError("invalid_grant".to_string()))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, ServerError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_grant
            .clone()
            .ok_or_else(|| ServerError::OAuthError("invalid_grant".to_string()))
    }
}

/// Memory blob store with injectable failures and call counters.
#[derive(Default)]
pub struct ScriptedBlobStore {
    inner: MemoryBlobStore,
    put_failures: Mutex<VecDeque<String>>,
    head_failure: Mutex<Option<String>>,
    list_failure: Mutex<Option<String>>,
    list_calls: AtomicUsize,
    head_calls: AtomicUsize,
    put_calls: AtomicUsize,
}

impl ScriptedBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryBlobStore {
        &self.inner
    }

    /// The next `put` fails with `message`. Calls stack.
    pub fn fail_next_put(&self, message: &str) {
        push(&self.put_failures, message);
    }

    /// Every `head` fails with `message` from now on.
    pub fn fail_heads(&self, message: &str) {
        write(&self.head_failure, message);
    }

    pub fn fail_lists(&self, message: &str) {
        write(&self.list_failure, message);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for ScriptedBlobStore {
    async fn list(
        &self,
        prefix: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<ListPage, StorageError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = read(&self.list_failure) {
            return Err(StorageError(message));
        }
        self.inner.list(prefix, limit, cursor).await
    }

    async fn head(&self, pathname: &str) -> Result<Option<BlobDescriptor>, StorageError> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = read(&self.head_failure) {
            return Err(StorageError(message));
        }
        self.inner.head(pathname).await
    }

    async fn put(
        &self,
        pathname: &str,
        bytes: Vec<u8>,
        options: &PutOptions,
    ) -> Result<BlobDescriptor, StorageError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = pop(&self.put_failures) {
            return Err(StorageError(message));
        }
        self.inner.put(pathname, bytes, options).await
    }

    async fn delete(&self, pathname: &str) -> Result<(), StorageError> {
        self.inner.delete(pathname).await
    }
}

/// Memory search index whose upserts can be made to fail.
#[derive(Default)]
pub struct ScriptedSearchIndex {
    inner: MemorySearchIndex,
    upsert_failures: Mutex<VecDeque<String>>,
}

impl ScriptedSearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemorySearchIndex {
        &self.inner
    }

    pub fn fail_next_upsert(&self, message: &str) {
        push(&self.upsert_failures, message);
    }
}

#[async_trait]
impl SearchIndex for ScriptedSearchIndex {
    async fn upsert(&self, record: IndexRecord) -> Result<(), IndexError> {
        if let Some(message) = pop(&self.upsert_failures) {
            return Err(IndexError(message));
        }
        self.inner.upsert(record).await
    }

    async fn search(&self, query: &str, rerank: bool) -> Result<Vec<SearchHit>, IndexError> {
        self.inner.search(query, rerank).await
    }

    async fn delete(&self, id: &str) -> Result<(), IndexError> {
        self.inner.delete(id).await
    }
}

/// Image fetcher returning one canned response and recording requested URLs.
pub struct StubFetcher {
    response: Result<FetchedImage, ImportError>,
    urls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn image(bytes: Vec<u8>, content_type: &str) -> Self {
        Self {
            response: Ok(FetchedImage {
                bytes,
                content_type: content_type.to_string(),
            }),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ImportError) -> Self {
        Self {
            response: Err(error),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.urls.lock().map(|urls| urls.len()).unwrap_or_default()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().map(|urls| urls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ImageFetcher for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedImage, ImportError> {
        if let Ok(mut urls) = self.urls.lock() {
            urls.push(url.to_string());
        }
        self.response.clone()
    }
}
