use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::caption::{self, CaptionError, CaptionGenerator};
use crate::models::{ErrorResponse, RecommendResponse, UploadResponse};
use crate::query;
use crate::scrape::ProductScraper;
use crate::upload::ScopedUpload;

const FILE_FIELD: &str = "file";

// ── Application context ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub captioner: Arc<dyn CaptionGenerator>,
    pub scraper: Arc<ProductScraper>,
    pub temp_dir: PathBuf,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/recommend/", post(recommend))
        .route("/recommend", post(recommend))
        .route("/upload/", post(upload_echo))
        .route("/upload", post(upload_echo))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Failed to analyze image: {0}")]
    Analysis(#[from] CaptionError),
    #[error("No file uploaded under field 'file'")]
    MissingFile,
    #[error("{0}")]
    Multipart(#[from] MultipartError),
    #[error("{0}")]
    NotMultipart(#[from] MultipartRejection),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Analysis(_) => (StatusCode::BAD_REQUEST, ErrorResponse::new(self.to_string(), None)),
            ApiError::MissingFile => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::new(self.to_string(), None),
            ),
            ApiError::Multipart(e) => (
                e.status(),
                ErrorResponse::new("Invalid upload", Some(e.body_text())),
            ),
            ApiError::NotMultipart(e) => (
                e.status(),
                ErrorResponse::new("Invalid upload", Some(e.body_text())),
            ),
            ApiError::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("Internal Server Error", Some(details.clone())),
            ),
        };

        if status.is_server_error() {
            error!("unexpected server error: {}", self);
        } else {
            warn!("request rejected ({}): {}", status.as_u16(), self);
        }

        (status, Json(body)).into_response()
    }
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "request handler panicked".to_string()
    };
    ApiError::Internal(details).into_response()
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn home() -> impl IntoResponse {
    Json(json!({"message": "Welcome to the Outfit Recommendation API!"}))
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn recommend(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let (filename, bytes) = read_file_field(multipart?).await?;

    let upload = ScopedUpload::persist(&state.temp_dir, &filename, bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("saving upload failed: {}", e)))?;
    info!("uploaded file {:?} saved at: {}", filename, upload.path().display());

    let image = caption::open_image(upload.path()).await?;
    let description = state.captioner.describe(&image).await?;
    info!("image description: {}", description);

    let search = query::normalize(&description);
    let products = state.scraper.scrape(&search).await;
    info!("myntra results: {:?}", products);

    Ok(Json(RecommendResponse::success(description, products)))
}

async fn upload_echo(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let (filename, _) = read_file_field(multipart?).await?;
    Ok(Json(UploadResponse { filename }))
}

async fn read_file_field(mut multipart: Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await?;
        return Ok((filename, bytes.to_vec()));
    }
    Err(ApiError::MissingFile)
}
