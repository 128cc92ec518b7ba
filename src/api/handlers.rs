//! HTTP handlers.

use std::path::Path;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::downloader::models::{validate_url, RenditionDescriptor};
use crate::downloader::{
    classify, DownloadError, MediaManifest, Platform, Quality, RetrievalResult, SourceRequest,
};

const INFO_FAILURE_MESSAGE: &str = "Failed to extract video information";

#[derive(Debug, Deserialize)]
pub struct InfoRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub quality: Option<String>,
    /// Target container (mp4, webm, mkv, mov)
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub audio_only: bool,
}

#[derive(Debug, Serialize)]
pub struct FormatEntry {
    pub format_id: String,
    pub quality: String,
    pub ext: String,
    pub filesize: u64,
    pub resolution: String,
    pub fps: Option<f32>,
    pub vcodec: String,
    pub acodec: String,
}

impl From<&RenditionDescriptor> for FormatEntry {
    fn from(r: &RenditionDescriptor) -> Self {
        Self {
            format_id: r.format_id.clone(),
            quality: r.quality_label.clone(),
            ext: r.container_ext.clone(),
            filesize: r.size_bytes,
            resolution: r.resolution(),
            fps: r.frame_rate,
            vcodec: r.video_codec.clone().unwrap_or_else(|| "unknown".to_string()),
            acodec: r.audio_codec.clone().unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub success: bool,
    pub title: String,
    pub thumbnail: String,
    pub duration: u64,
    pub uploader: String,
    pub view_count: u64,
    pub description: String,
    pub upload_date: String,
    pub platform: Platform,
    pub formats: Vec<FormatEntry>,
    pub url: String,
}

impl From<MediaManifest> for InfoResponse {
    fn from(m: MediaManifest) -> Self {
        Self {
            success: true,
            formats: m.available_renditions.iter().map(FormatEntry::from).collect(),
            title: m.title,
            thumbnail: m.thumbnail_url,
            duration: m.duration_seconds,
            uploader: m.uploader,
            view_count: m.view_count,
            description: m.description,
            upload_date: m.upload_date,
            platform: m.platform,
            url: m.url,
        }
    }
}

fn body_error(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
}

/// URL checks shared by both POST endpoints
fn supported_url(raw: &str) -> ApiResult<(String, Platform)> {
    let url = validate_url(raw)?;
    let platform = classify(&url);
    if platform == Platform::Unknown {
        return Err(DownloadError::UnsupportedPlatform.into());
    }
    Ok((url, platform))
}

/// GET /
pub async fn index(State(state): State<AppState>) -> Json<Value> {
    let platforms: Vec<&str> = Platform::SUPPORTED.iter().map(|p| p.display_name()).collect();

    Json(json!({
        "status": "running",
        "message": "Video Downloader Backend API - Multi-Platform Support",
        "version": env!("CARGO_PKG_VERSION"),
        "platforms": platforms,
        "endpoints": {
            "/api/info": "POST - Get video information",
            "/api/download": "POST - Download video",
            "/api/platforms": "GET - Supported platforms",
            "/api/health": "GET - Health check",
        },
        "tools": state.tools.as_ref(),
    }))
}

/// GET /api/platforms
pub async fn platforms() -> Json<Value> {
    let platforms: Vec<Value> = Platform::SUPPORTED
        .iter()
        .map(|p| {
            json!({
                "name": p.display_name(),
                "id": p.id(),
                "supported": true,
                "features": p.features(),
            })
        })
        .collect();

    Json(json!({ "success": true, "platforms": platforms }))
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| ApiError::internal(format!("timestamp formatting failed: {}", e)))?;

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": timestamp,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "platforms_supported": Platform::SUPPORTED.len(),
    })))
}

/// POST /api/info
pub async fn video_info(
    State(state): State<AppState>,
    payload: Result<Json<InfoRequest>, JsonRejection>,
) -> ApiResult<Json<InfoResponse>> {
    let Json(req) = payload.map_err(body_error)?;
    let (url, platform) = supported_url(&req.url)?;

    info!(platform = %platform, url = %url, "info requested");

    let manifest = state
        .prober
        .probe(&url)
        .await
        .map_err(|e| ApiError::from(e).with_message(INFO_FAILURE_MESSAGE))?;

    Ok(Json(InfoResponse::from(manifest)))
}

/// POST /api/download
pub async fn download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload.map_err(body_error)?;
    let (url, platform) = supported_url(&req.url)?;

    let quality = parse_quality(req.quality.as_deref());
    let container = req.format.as_deref().unwrap_or("mp4");
    let request = SourceRequest::new(&url, quality, container, req.audio_only)?;

    let result = state.pipeline.retrieve(&request).await.map_err(|e| {
        let message = format!("Download failed for {}: {}", platform, e);
        ApiError::from(e).with_message(message)
    })?;

    stream_artifact(&result).await
}

/// Unknown quality strings fall back to best
fn parse_quality(raw: Option<&str>) -> Quality {
    match raw.map(str::parse::<Quality>) {
        None => Quality::Best,
        Some(Ok(q)) => q,
        Some(Err(e)) => {
            warn!(error = %e, "falling back to best quality");
            Quality::Best
        }
    }
}

async fn stream_artifact(result: &RetrievalResult) -> ApiResult<Response> {
    let file = tokio::fs::File::open(&result.local_path)
        .await
        .map_err(|e| ApiError::from(DownloadError::Io(e)))?;
    let length = file
        .metadata()
        .await
        .map(|m| m.len())
        .unwrap_or(result.size_bytes);

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(content_type_for_filename(&result.filename)),
    );
    headers.insert(
        CONTENT_LENGTH,
        HeaderValue::from_str(&length.to_string())
            .map_err(|_| ApiError::internal("invalid content length header"))?,
    );
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&build_content_disposition(&result.filename))
            .map_err(|_| ApiError::internal("invalid content disposition header"))?,
    );

    info!(file = %result.filename, bytes = length, "streaming artifact");

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body).into_response())
}

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub(crate) fn content_type_for_filename(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}

/// `attachment` with an ASCII fallback name plus the RFC 5987 UTF-8 name
pub(crate) fn build_content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_filename(filename),
        urlencoding::encode(filename)
    )
}

fn ascii_filename(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let compact = sanitized.trim();
    if compact.is_empty() {
        "download.bin".to_string()
    } else {
        compact.to_string()
    }
}
