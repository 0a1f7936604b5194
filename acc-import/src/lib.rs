pub mod config;
pub mod cookies;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod services;

// Always exposed: the integration tests build the router on these fakes
pub mod testing;

pub use config::Configuration;
pub use error::ServerError;

use axum::{
    routing::{delete, get, post},
    Router,
};
use pipeline::RunQueue;
use services::{
    BlobStore, ImageFetcher, Importer, IndexWriter, KvStore, SearchIndex, SessionManager,
    TokenProvider,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Request-independent settings the handlers read.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Marks cookies `Secure`.
    pub production: bool,
    pub public_url: String,
    pub acc_api_base_url: String,
}

impl Settings {
    pub fn from_configuration(configuration: &Configuration) -> Self {
        Self {
            production: configuration.server.production,
            public_url: configuration.server.public_url.clone(),
            acc_api_base_url: configuration.acc.api_base_url.clone(),
        }
    }

    /// Where the browser lands after a successful sign-in.
    pub fn import_redirect(&self) -> String {
        let separator = if self.public_url.contains('?') { '&' } else { '?' };
        format!("{}{}import=1", self.public_url, separator)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub tokens: Arc<dyn TokenProvider>,
    pub blobs: Arc<dyn BlobStore>,
    pub index: IndexWriter,
    pub importer: Arc<Importer>,
    pub queue: Arc<RunQueue>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        kv: Arc<dyn KvStore>,
        tokens: Arc<dyn TokenProvider>,
        blobs: Arc<dyn BlobStore>,
        search: Arc<dyn SearchIndex>,
        fetcher: Arc<dyn ImageFetcher>,
        queue: Arc<RunQueue>,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(kv, tokens.clone())),
            importer: Arc::new(Importer::new(blobs.clone(), fetcher, queue.clone())),
            tokens,
            blobs,
            index: IndexWriter::new(search),
            queue,
            settings: Arc::new(settings),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/auth/login", get(handlers::login))
        .route("/api/auth/callback", get(handlers::oauth_callback))
        .route(
            "/api/auth/logout",
            get(handlers::logout).post(handlers::logout),
        )
        .route("/api/acc/hubs", get(handlers::list_hubs))
        .route("/api/acc/projects", get(handlers::list_projects))
        .route("/api/acc/photos", get(handlers::list_photos))
        .route("/api/acc/photos/check", post(handlers::check_photos))
        .route("/api/upload/from-acc", post(handlers::import_from_acc))
        .route("/api/runs/{run_id}", get(handlers::get_run))
        .route("/api/images/{*pathname}", delete(handlers::delete_image))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES)),
        )
        .with_state(state)
}
