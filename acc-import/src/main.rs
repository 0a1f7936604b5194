use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use acc_import::{
    pipeline::{RunQueue, Worker},
    router,
    services::{
        HttpImageFetcher, IndexWriter, MemoryBlobStore, MemoryKvStore, MemorySearchIndex,
        OAuthClient,
    },
    AppState, Configuration, Settings,
};

const KV_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .init();

    // Load configuration
    let configuration = Configuration::new()?;
    tracing::info!("Configuration loaded successfully");

    // Collaborators
    let kv = Arc::new(MemoryKvStore::with_cleanup(KV_CLEANUP_INTERVAL));
    let tokens = Arc::new(OAuthClient::new(&configuration.oauth)?);
    let blobs = Arc::new(MemoryBlobStore::new());
    let search = Arc::new(MemorySearchIndex::new());
    let fetcher = Arc::new(HttpImageFetcher::new()?);
    let queue = Arc::new(RunQueue::open(&configuration.server.state_dir).await?);

    // Durable runs execute outside the request cycle
    Worker::new(
        queue.clone(),
        blobs.clone(),
        IndexWriter::new(search.clone()),
        &configuration.worker,
    )
    .spawn();

    let app_state = AppState::new(
        Settings::from_configuration(&configuration),
        kv,
        tokens,
        blobs,
        search,
        fetcher,
        queue,
    );
    let app = router(app_state);

    // Start server
    let addr = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
