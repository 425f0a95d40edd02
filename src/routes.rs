use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Request, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, cors::{Any, CorsLayer}, trace::TraceLayer};
use uuid::Uuid;

use crate::{
    diagnosis::DiagnosisClient,
    envelope::{handle_panic, Envelope},
    error::PipelineError,
    ingest::{ImageIngestor, RejectionReason},
    models::{DiagnosisRequest, DiagnosisResult, UploadedImage},
};

const SERVICE_NAME: &str = "Leaf Disease Detection API";

#[derive(Clone)]
pub struct AppState {
    pub diagnosis: Arc<DiagnosisClient>,
    pub ingestor: ImageIngestor,
}

pub fn build_router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/disease-detection-file", post(disease_detection_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "AI-powered leaf disease detection using vision language models",
        "endpoints": {
            "disease_detection": "/disease-detection-file (POST) - Upload image for disease detection",
            "health_check": "/health (GET) - API health status"
        },
        "status": "operational"
    }))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME
    }))
}

pub async fn disease_detection_file(State(state): State<AppState>, multipart: Multipart) -> Envelope {
    Envelope::from(detect(&state, multipart).await)
}

async fn detect(state: &AppState, mut multipart: Multipart) -> Result<DiagnosisResult, PipelineError> {
    let upload = read_upload(&mut multipart, &state.ingestor).await?;
    let filename = upload.filename.as_deref().unwrap_or("<unnamed>");
    tracing::info!(
        filename,
        content_type = upload.content_type.as_deref().unwrap_or("<none>"),
        size = upload.bytes.len(),
        "🌿 Processing image for disease detection"
    );

    let image = state
        .ingestor
        .validate(upload.bytes, upload.content_type.as_deref())?;
    let request = DiagnosisRequest::from_image(image);
    let result = state.diagnosis.diagnose(&request).await?;

    tracing::info!(filename, outcome = result.outcome_kind().as_str(), "Disease detection completed successfully");
    Ok(result)
}

/// Pulls the `file` field out of the form; other fields are skipped. The
/// declared type is checked before the body is read.
async fn read_upload(multipart: &mut Multipart, ingestor: &ImageIngestor) -> Result<UploadedImage, PipelineError> {
    let limit = ingestor.max_bytes();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        if let Err(reason) = ingestor.check_type(content_type.as_deref()) {
            tracing::warn!(filename = filename.as_deref().unwrap_or("<unnamed>"), "Invalid file type attempted");
            return Err(reason.into());
        }
        let bytes = field.bytes().await.map_err(|e| upload_error(e, limit))?;
        return Ok(UploadedImage { bytes, content_type, filename });
    }
    Err(PipelineError::MissingFile)
}

fn upload_error(err: MultipartError, limit: usize) -> PipelineError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        RejectionReason::TooLarge { limit }.into()
    } else {
        PipelineError::MalformedUpload(err.body_text())
    }
}
