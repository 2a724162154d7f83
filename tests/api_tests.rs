//! HTTP API integration tests
//!
//! Drive the router in-process with `tower::ServiceExt::oneshot`.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use neuroscope_lib::api::{build_router, AppState};
use neuroscope_lib::models::{Artifact, RawVerdict};
use neuroscope_lib::services::detection::{
    ClassificationError, Classifier, DeterministicHeuristicClassifier, Fingerprint, MIB,
};
use neuroscope_lib::services::{
    DetectionOrchestrator, InMemoryRecordStore, ProviderError, RecordStore, StaticTokenSessions,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "neuroscope-test-boundary";
const TOKEN: &str = "secret-token";

fn offline_app() -> Router {
    build_router(AppState::offline())
}

fn app_with_history(store: Arc<InMemoryRecordStore>) -> Router {
    let sessions = StaticTokenSessions::new(HashMap::from([(TOKEN.to_string(), "user-42".to_string())]));
    let records: Arc<dyn RecordStore> = store;
    build_router(AppState::new(
        DetectionOrchestrator::offline(),
        Arc::new(sessions),
        Some(records),
    ))
}

fn text_request(body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/detect/text")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn multipart_request(uri: &str, file: Option<(&str, &str, Vec<u8>)>, last_modified: Option<i64>) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    if let Some(ms) = last_modified {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"lastModified\"\r\n\r\n{ms}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, mime, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: {mime}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&bytes);
        body.extend_from_slice(b"\r\n");
    } else {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nnothing\r\n").as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn detect_text_hello_world_is_stable() {
    for _ in 0..3 {
        let (status, body) = send(offline_app(), text_request(json!({ "content": "Hello world" }), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "AI-Generated Text");
        assert_eq!(body["confidence"], 86.0);
        assert_eq!(body["modality"], "text");
        assert_eq!(body["fingerprint"], "1084");
        assert_eq!(body["confidenceFallback"], false);
    }
}

#[tokio::test]
async fn detect_text_rejects_blank_content() {
    let (status, body) = send(offline_app(), text_request(json!({ "content": "  \n " }), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "EMPTY");
    assert_eq!(body["error"], "Please enter some text to analyze.");
}

#[tokio::test]
async fn detect_text_requires_content_field() {
    let (status, body) = send(offline_app(), text_request(json!({}), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "NO_INPUT");
    assert_eq!(body["error"], "No content provided");
}

#[tokio::test]
async fn detect_text_checks_declared_mime_type() {
    let body = json!({ "content": "PNG bytes?", "fileName": "cat.png", "mimeType": "image/png" });
    let (status, body) = send(offline_app(), text_request(body, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "WRONG_TYPE");
    assert_eq!(body["error"], "Please upload a valid text file (e.g., .txt, .md, .json).");

    let body = json!({ "content": "{\"a\": 1}", "fileName": "a.json", "mimeType": "application/json" });
    let (status, body) = send(offline_app(), text_request(body, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modality"], "text");
}

#[tokio::test]
async fn detect_text_malformed_json_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/detect/text")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(offline_app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn detect_image_accepts_png() {
    let request = multipart_request(
        "/api/detect/image",
        Some(("cat.png", "image/png", vec![0x89, b'P', b'N', b'G'])),
        Some(1_700_000_000_000),
    );
    let (status, body) = send(offline_app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modality"], "image");
    assert_eq!(body["fingerprint"], "cat.png-4-image/png-1700000000000");
    let confidence = body["confidence"].as_f64().unwrap();
    assert!((70.0..90.0).contains(&confidence));
}

#[tokio::test]
async fn detect_image_size_boundary() {
    let exact = multipart_request(
        "/api/detect/image",
        Some(("big.jpg", "image/jpeg", vec![1u8; (10 * MIB) as usize])),
        None,
    );
    let (status, _) = send(offline_app(), exact).await;
    assert_eq!(status, StatusCode::OK);

    let over = multipart_request(
        "/api/detect/image",
        Some(("big.jpg", "image/jpeg", vec![1u8; (10 * MIB + 1) as usize])),
        None,
    );
    let (status, body) = send(offline_app(), over).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "TOO_LARGE");
    assert_eq!(body["error"], "File size exceeds 10MB.");
}

#[tokio::test]
async fn detect_image_rejects_wrong_type_and_empty() {
    let wrong = multipart_request("/api/detect/image", Some(("a.txt", "text/plain", b"hi".to_vec())), None);
    let (status, body) = send(offline_app(), wrong).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "WRONG_TYPE");

    let empty = multipart_request("/api/detect/image", Some(("a.png", "image/png", Vec::new())), None);
    let (status, body) = send(offline_app(), empty).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "EMPTY");
}

#[tokio::test]
async fn detect_audio_without_file() {
    let (status, body) = send(offline_app(), multipart_request("/api/detect/audio", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No audio file uploaded");
}

#[tokio::test]
async fn detect_audio_accepts_video_through_combined_uploader() {
    let request = multipart_request("/api/detect/audio", Some(("v.mp4", "video/mp4", vec![0; 64])), None);
    let (status, body) = send(offline_app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modality"], "video");
    let result = body["result"].as_str().unwrap();
    assert!(result.ends_with("Video"));
}

#[tokio::test]
async fn detect_video_rejects_audio() {
    let request = multipart_request("/api/detect/video", Some(("a.mp3", "audio/mpeg", vec![0; 64])), None);
    let (status, body) = send(offline_app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please upload a valid video file.");
}

struct Unreachable;

#[async_trait]
impl Classifier for Unreachable {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn classify(&self, _: &Artifact, _: &Fingerprint) -> Result<RawVerdict, ClassificationError> {
        Err(ClassificationError::Provider(ProviderError::ApiError {
            status: 401,
            message: "invalid api key".to_string(),
        }))
    }
}

#[tokio::test]
async fn classification_failure_is_generic_500() {
    let heuristic: Arc<dyn Classifier> = Arc::new(DeterministicHeuristicClassifier::new());
    let orchestrator = DetectionOrchestrator::new(Arc::new(Unreachable), heuristic.clone(), heuristic.clone(), heuristic);
    let app = build_router(AppState::new(orchestrator, Arc::new(StaticTokenSessions::default()), None));

    let (status, body) = send(app, text_request(json!({ "content": "anything" }), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Text detection failed");
    assert_eq!(body["code"], "DETECTION_FAILED");
    assert!(!body.to_string().contains("invalid api key"));
}

#[tokio::test]
async fn history_records_only_authenticated_submissions() {
    let store = Arc::new(InMemoryRecordStore::new());

    let (status, _) = send(
        app_with_history(store.clone()),
        text_request(json!({ "content": "anonymous text" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.len().await, 0);

    let (status, _) = send(
        app_with_history(store.clone()),
        text_request(json!({ "content": "Hello world", "fileName": "notes.txt" }), Some(TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.len().await, 1);

    let request = Request::builder()
        .uri("/api/history")
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app_with_history(store.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["subjectId"], "user-42");
    assert_eq!(items[0]["result"], "AI-Generated Text");
    assert_eq!(items[0]["inputData"], "Hello world");
    assert_eq!(items[0]["fileName"], "notes.txt");
}

#[tokio::test]
async fn history_requires_session() {
    let request = Request::builder().uri("/api/history").body(Body::empty()).unwrap();
    let (status, body) = send(app_with_history(Arc::new(InMemoryRecordStore::new())), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn health_reports_ok() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(offline_app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "neuroscope");
}
