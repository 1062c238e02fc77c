//! Drives the HTTP backends against throwaway local servers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use storyreel_backends::{
    await_video, BackendError, GenerationOutcome, HttpImageBackend, HttpVideoBackend, ImageBackend,
    LocalObjectStore, ObjectStore, PollConfig, RetryPolicy, VideoBackend, VideoPayload,
};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn fixed_status(status: StatusCode, body: &'static str) -> Router {
    Router::new().route("/v1/images", post(move || async move { (status, body) }))
}

#[tokio::test]
async fn image_success_returns_bytes() {
    let base = serve(Router::new().route("/v1/images", post(|| async { PNG.to_vec() }))).await;
    let backend = HttpImageBackend::new(base, "img-model");

    let outcome = backend.generate("a fox", Some(b"ref")).await.unwrap();

    assert_eq!(outcome, GenerationOutcome::Generated(PNG.to_vec()));
}

#[tokio::test]
async fn image_client_error_is_structured_rejection() {
    let base = serve(fixed_status(StatusCode::UNPROCESSABLE_ENTITY, "prompt refused")).await;
    let backend = HttpImageBackend::new(base, "img-model");

    let outcome = backend.generate("bad", None).await.unwrap();

    assert_matches!(outcome, GenerationOutcome::Rejected(reason) if reason.contains("prompt refused"));
}

#[tokio::test]
async fn image_server_error_is_retryable() {
    let base = serve(fixed_status(StatusCode::SERVICE_UNAVAILABLE, "busy")).await;
    let backend = HttpImageBackend::new(base, "img-model");

    assert_matches!(
        backend.generate("a fox", None).await,
        Err(BackendError::Api { status: 503, .. })
    );
}

#[tokio::test]
async fn retry_recovers_from_transient_server_errors() {
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/v1/images",
        post(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    (StatusCode::BAD_GATEWAY, Vec::new())
                } else {
                    (StatusCode::OK, PNG.to_vec())
                }
            }
        }),
    );
    let backend = HttpImageBackend::new(serve(app).await, "img-model");
    let policy = RetryPolicy::new(3, Duration::from_millis(5));

    let outcome = policy
        .run("image", || backend.generate("a fox", None))
        .await
        .unwrap();

    assert_eq!(outcome, GenerationOutcome::Generated(PNG.to_vec()));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[derive(Clone)]
struct VideoServer {
    base: Arc<std::sync::OnceLock<String>>,
    polls: Arc<AtomicU32>,
}

#[tokio::test]
async fn video_submit_poll_download() {
    let state = VideoServer {
        base: Arc::new(std::sync::OnceLock::new()),
        polls: Arc::new(AtomicU32::new(0)),
    };
    let app = Router::new()
        .route(
            "/v1/videos",
            post(|| async { Json(serde_json::json!({"operation_id": "op-7"})) }),
        )
        .route(
            "/v1/videos/{id}",
            get(|State(s): State<VideoServer>, Path(id): Path<String>| async move {
                assert_eq!(id, "op-7");
                if s.polls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Json(serde_json::json!({"status": "running"}))
                } else {
                    let base = s.base.get().cloned().unwrap_or_default();
                    Json(serde_json::json!({
                        "status": "succeeded",
                        "video_uri": format!("{base}/files/op-7.mp4"),
                    }))
                }
            }),
        )
        .route("/files/op-7.mp4", get(|| async { b"mp4".to_vec() }))
        .with_state(state.clone());
    let base = serve(app).await;
    let _ = state.base.set(base.clone());
    let backend = HttpVideoBackend::new(base, "vid-model");

    let submission = match backend.submit("noir fox", PNG, 5.0).await.unwrap() {
        GenerationOutcome::Generated(s) => s,
        GenerationOutcome::Rejected(r) => panic!("unexpected rejection: {r}"),
    };
    assert_eq!(submission.operation_id, "op-7");

    let config = PollConfig {
        interval: Duration::from_millis(5),
        max_attempts: 5,
    };
    let payload = match await_video(&backend, &submission, &config).await {
        GenerationOutcome::Generated(p) => p,
        GenerationOutcome::Rejected(r) => panic!("unexpected rejection: {r}"),
    };
    let VideoPayload::Uri(uri) = payload else {
        panic!("expected a uri payload");
    };

    assert_eq!(backend.download(&uri).await.unwrap(), b"mp4");
    assert_eq!(state.polls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn object_store_fetches_foreign_urls_over_http() {
    let base = serve(Router::new().route("/remote.png", get(|| async { PNG.to_vec() }))).await;
    let dir = tempfile::tempdir().unwrap();
    let store = LocalObjectStore::new(dir.path(), "http://media.test");

    let bytes = store.fetch(&format!("{base}/remote.png")).await.unwrap();

    assert_eq!(bytes, PNG);
}
