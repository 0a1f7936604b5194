use acc_import::services::{HttpImageFetcher, ImageFetcher, ImportError};
use axum::{
    body::{Body, Bytes},
    http::{header, StatusCode},
    response::Redirect,
    routing::get,
    Router,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use url::Url;

/// Image host stand-in listening on an ephemeral port.
async fn spawn_origin() -> Url {
    let app = Router::new()
        .route(
            "/photo.jpg",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "Image/JPEG; charset=binary")],
                    vec![0xffu8, 0xd8, 0xff, 0xe0],
                )
            }),
        )
        .route("/bare", get(|| async { vec![1u8, 2, 3] }))
        .route("/large.png", get(|| async { vec![0u8; 64] }))
        .route(
            "/chunked.png",
            get(|| async {
                // Streamed bodies go out chunked, without a content-length
                let chunks = (0..4).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![0u8; 32])));
                Body::from_stream(futures::stream::iter(chunks))
            }),
        )
        .route(
            "/expired.jpg",
            get(|| async { (StatusCode::FORBIDDEN, "Request has expired") }),
        )
        .route("/moved.jpg", get(|| async { Redirect::to("/photo.jpg") }))
        .route(
            "/elsewhere.jpg",
            get(|| async { Redirect::temporary("https://attacker.example/p.jpg") }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{}/", addr)).unwrap()
}

fn fetcher() -> HttpImageFetcher {
    HttpImageFetcher::new().unwrap()
}

#[tokio::test]
async fn test_fetch_normalizes_content_type() {
    let origin = spawn_origin().await;
    let fetched = fetcher()
        .fetch(&origin.join("photo.jpg").unwrap())
        .await
        .unwrap();

    assert_eq!(fetched.bytes, vec![0xff, 0xd8, 0xff, 0xe0]);
    assert_eq!(fetched.content_type, "image/jpeg");
}

#[tokio::test]
async fn test_fetch_without_content_type() {
    let origin = spawn_origin().await;
    let fetched = fetcher()
        .fetch(&origin.join("bare").unwrap())
        .await
        .unwrap();

    assert_eq!(fetched.bytes, vec![1, 2, 3]);
    // axum labels raw bytes as octet-stream
    assert_eq!(fetched.content_type, "application/octet-stream");
}

#[tokio::test]
async fn test_fetch_reports_upstream_status() {
    let origin = spawn_origin().await;
    let err = fetcher()
        .fetch(&origin.join("expired.jpg").unwrap())
        .await
        .unwrap_err();

    assert_eq!(err, ImportError::FetchStatus(403));
    assert_eq!(err.to_string(), "Failed to fetch image (403)");
}

#[tokio::test]
async fn test_fetch_does_not_follow_redirects() {
    let origin = spawn_origin().await;

    let err = fetcher()
        .fetch(&origin.join("moved.jpg").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err, ImportError::FetchStatus(303));

    let err = fetcher()
        .fetch(&origin.join("elsewhere.jpg").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err, ImportError::FetchStatus(307));
}

#[tokio::test]
async fn test_fetch_enforces_size_ceiling() {
    let origin = spawn_origin().await;
    let url = origin.join("large.png").unwrap();

    let err = HttpImageFetcher::with_max_bytes(16)
        .unwrap()
        .fetch(&url)
        .await
        .unwrap_err();
    assert_eq!(err, ImportError::TooLarge);

    let fetched = HttpImageFetcher::with_max_bytes(64)
        .unwrap()
        .fetch(&url)
        .await
        .unwrap();
    assert_eq!(fetched.bytes.len(), 64);
}

#[tokio::test]
async fn test_fetch_caps_chunked_body_without_length() {
    let origin = spawn_origin().await;
    let url = origin.join("chunked.png").unwrap();

    let err = HttpImageFetcher::with_max_bytes(100)
        .unwrap()
        .fetch(&url)
        .await
        .unwrap_err();
    assert_eq!(err, ImportError::TooLarge);

    let fetched = HttpImageFetcher::with_max_bytes(128)
        .unwrap()
        .fetch(&url)
        .await
        .unwrap();
    assert_eq!(fetched.bytes.len(), 128);
}

#[tokio::test]
async fn test_fetch_rejects_declared_length_before_body_arrives() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await.unwrap();
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: image/jpeg\r\ncontent-length: 1000000000\r\n\r\n",
            )
            .await
            .unwrap();
        // Hold the connection open without ever sending the body
        tokio::time::sleep(Duration::from_secs(60)).await;
        drop(socket);
    });

    let url = Url::parse(&format!("http://{}/huge.jpg", addr)).unwrap();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        HttpImageFetcher::with_max_bytes(1024).unwrap().fetch(&url),
    )
    .await
    .expect("oversized response should be rejected from its headers");
    assert_eq!(result.unwrap_err(), ImportError::TooLarge);
}

#[tokio::test]
async fn test_fetch_connection_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{}/gone.jpg", addr)).unwrap();
    let err = fetcher().fetch(&url).await.unwrap_err();
    assert!(matches!(err, ImportError::Fetch(_)));
}
