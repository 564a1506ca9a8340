use super::{error::ApiError, AppState};
use crate::media::{content_disposition, DownloadRequest, MediaInfo};
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

const INFO_FAILED: &str = "Failed to get media info";
const DOWNLOAD_FAILED: &str = "Download failed";

#[derive(Debug, Deserialize)]
pub struct InfoRequest {
    #[serde(default)]
    pub url: String,
}

fn read_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        debug!("Rejected request body: {}", rejection);
        ApiError::bad_request("Invalid request body")
    })
}

fn require_url(url: &str) -> Result<&str, ApiError> {
    let url = url.trim();
    if url.is_empty() {
        Err(ApiError::bad_request("URL is required"))
    } else {
        Ok(url)
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "Link Downloader API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn download_info(
    State(state): State<AppState>,
    payload: Result<Json<InfoRequest>, JsonRejection>,
) -> Result<Json<MediaInfo>, ApiError> {
    let request = read_body(payload)?;
    let url = require_url(&request.url)?;

    state
        .media
        .info(url)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_media(e, INFO_FAILED, state.expose_errors))
}

pub async fn download_start(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let mut request = read_body(payload)?;
    request.url = require_url(&request.url)?.to_string();

    let download = state
        .media
        .download(&request)
        .await
        .map_err(|e| ApiError::from_media(e, DOWNLOAD_FAILED, state.expose_errors))?;

    let disposition = HeaderValue::from_str(&content_disposition(&download.filename))
        .map_err(|e| ApiError::internal(DOWNLOAD_FAILED, e.to_string()))?;
    let content_type = HeaderValue::from_str(&download.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(download.body),
    )
        .into_response())
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
