#![allow(dead_code)]

use acc_import::{
    models::Session,
    pipeline::RunQueue,
    router,
    services::MemorySearchIndex,
    testing::{ScriptedBlobStore, StaticTokenProvider, StubFetcher},
    AppState, Settings,
};
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const JPEG_URL: &str = "https://bucket.s3.amazonaws.com/photos/p.jpg";

pub struct Harness {
    pub app: Router,
    pub state: AppState,
    pub tokens: Arc<StaticTokenProvider>,
    pub blobs: Arc<ScriptedBlobStore>,
    pub search: Arc<MemorySearchIndex>,
    pub fetcher: Arc<StubFetcher>,
    pub queue: Arc<RunQueue>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(
            StaticTokenProvider::new(),
            StubFetcher::image(vec![0xff, 0xd8, 0xff], "image/jpeg"),
            acc_api::BASE_URL,
        )
    }

    pub fn with(tokens: StaticTokenProvider, fetcher: StubFetcher, catalog_url: &str) -> Self {
        let tokens = Arc::new(tokens);
        let blobs = Arc::new(ScriptedBlobStore::new());
        let search = Arc::new(MemorySearchIndex::new());
        let fetcher = Arc::new(fetcher);
        let queue = Arc::new(RunQueue::in_memory());

        let state = AppState::new(
            Settings {
                production: false,
                public_url: "/".to_string(),
                acc_api_base_url: catalog_url.to_string(),
            },
            Arc::new(acc_import::services::MemoryKvStore::new()),
            tokens.clone(),
            blobs.clone(),
            search.clone(),
            fetcher.clone(),
            queue.clone(),
        );

        Self {
            app: router(state.clone()),
            state,
            tokens,
            blobs,
            search,
            fetcher,
            queue,
        }
    }

    /// Store a session and return the matching `Cookie` header value.
    pub async fn session_cookie(&self, session: Session) -> String {
        let session_id = self.state.sessions.create_session(&session).await.unwrap();
        format!("acc_session={}", session_id)
    }

    pub async fn signed_in(&self) -> String {
        self.session_cookie(fresh_session()).await
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::delete(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, cookie: Option<&str>, body: &Value) -> Response<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }
}

pub fn fresh_session() -> Session {
    Session {
        access_token: "live-token".to_string(),
        refresh_token: Some("refresh".to_string()),
        expires_at: Utc::now() + Duration::hours(1),
        token_type: Some("Bearer".to_string()),
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// `name=value` of the first `Set-Cookie` for `name`.
pub fn cookie_pair(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .find(|c| c.starts_with(&format!("{}=", name)))
        .and_then(|c| c.split(';').next().map(str::to_string))
}
