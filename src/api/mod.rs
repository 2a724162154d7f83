//! HTTP API
//!
//! One detection route per uploader, plus history and health.

pub mod error;
pub mod upload;

pub use error::{ApiError, ApiResult};

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::{header::AUTHORIZATION, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::models::{
    Artifact, DetectResponse, DetectionRecord, HistoryListResponse, TextDetectRequest, Uploader,
};
use crate::services::detection::{DetectionOrchestrator, DetectionOutcome, MIB};
use crate::services::history::{RecordStore, SessionProvider, StaticTokenSessions};

/// Largest request body accepted by any route; per-uploader limits are enforced by validation.
const MAX_BODY_BYTES: usize = (50 * MIB + MIB) as usize;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<DetectionOrchestrator>,
    pub sessions: Arc<dyn SessionProvider>,
    /// `None` disables history persistence
    pub records: Option<Arc<dyn RecordStore>>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        orchestrator: DetectionOrchestrator,
        sessions: Arc<dyn SessionProvider>,
        records: Option<Arc<dyn RecordStore>>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            sessions,
            records,
            startup_time: Utc::now(),
        }
    }

    /// Heuristic classifiers, no sessions, no history.
    pub fn offline() -> Self {
        Self::new(
            DetectionOrchestrator::offline(),
            Arc::new(StaticTokenSessions::default()),
            None,
        )
    }

    async fn subject(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))?;
        self.sessions.subject(token).await
    }

    /// Append a history record for the session subject. Failures are logged only.
    async fn persist(&self, headers: &HeaderMap, artifact: &Artifact, outcome: &DetectionOutcome) {
        let Some(store) = self.records.as_ref() else {
            return;
        };
        let Some(subject) = self.subject(headers).await else {
            return;
        };
        let record = DetectionRecord::new(subject, artifact, &outcome.verdict);
        let id = record.id;
        match store.insert(record).await {
            Ok(()) => info!(record_id = %id, "history.saved"),
            Err(e) => warn!(error = %e, "history.save_failed"),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/detect/text", post(detect_text))
        .route("/api/detect/image", post(detect_image))
        .route("/api/detect/audio", post(detect_audio))
        .route("/api/detect/video", post(detect_video))
        .route("/api/history", get(list_history))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn run_detection(
    state: &AppState,
    headers: &HeaderMap,
    artifact: Artifact,
) -> ApiResult<Json<DetectResponse>> {
    let outcome = state.orchestrator.detect(&artifact).await?;
    state.persist(headers, &artifact, &outcome).await;

    Ok(Json(DetectResponse {
        result: outcome.verdict.label,
        confidence: outcome.verdict.confidence,
        modality: outcome.verdict.modality,
        fingerprint: outcome.fingerprint.to_string(),
        confidence_fallback: outcome.verdict.confidence_fallback,
    }))
}

/// POST /api/detect/text
pub async fn detect_text(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<TextDetectRequest>, JsonRejection>,
) -> ApiResult<Json<DetectResponse>> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let content = request
        .content
        .ok_or_else(|| ApiError::NoInput("No content provided".to_string()))?;

    let mut artifact = Artifact::text(content, request.file_name);
    if let Some(mime) = request.mime_type {
        artifact = artifact.with_mime_type(mime);
    }

    run_detection(&state, &headers, artifact).await
}

fn missing_file_message(uploader: Uploader) -> &'static str {
    match uploader {
        Uploader::Media => "No audio file uploaded",
        Uploader::Video => "No video file uploaded",
        Uploader::Text | Uploader::Image => "No file uploaded",
    }
}

async fn detect_upload(
    state: AppState,
    headers: HeaderMap,
    multipart: Multipart,
    uploader: Uploader,
) -> ApiResult<Json<DetectResponse>> {
    let upload = upload::read_upload(multipart, uploader)
        .await?
        .ok_or_else(|| ApiError::NoInput(missing_file_message(uploader).to_string()))?;

    run_detection(&state, &headers, upload.into_artifact(uploader)).await
}

/// POST /api/detect/image
pub async fn detect_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<Json<DetectResponse>> {
    detect_upload(state, headers, multipart, Uploader::Image).await
}

/// POST /api/detect/audio (combined audio-or-video uploader)
pub async fn detect_audio(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<Json<DetectResponse>> {
    detect_upload(state, headers, multipart, Uploader::Media).await
}

/// POST /api/detect/video
pub async fn detect_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<Json<DetectResponse>> {
    detect_upload(state, headers, multipart, Uploader::Video).await
}

/// GET /api/history
pub async fn list_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<HistoryListResponse>> {
    let subject = state.subject(&headers).await.ok_or(ApiError::Unauthorized)?;
    let items = match state.records.as_ref() {
        Some(store) => store
            .list(&subject)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        None => Vec::new(),
    };
    Ok(Json(HistoryListResponse { items }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    Json(HealthResponse {
        status: "ok".to_string(),
        module: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
    })
}
