use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use vidgrab_lib::api::{create_router, AppState};
use vidgrab_lib::downloader::connectors::{FetchTarget, FetchedStream};
use vidgrab_lib::downloader::format_selector::{ConnectorCapabilities, RenditionSpec};
use vidgrab_lib::downloader::models::{AudioTarget, ProbedMedia, RenditionDescriptor};
use vidgrab_lib::downloader::{
    ConnectorRegistry, DownloadError, EngineConfig, MediaProcessor, MetadataProber, Platform,
    PlatformConnector, RetrievalPipeline,
};

const PAYLOAD: &[u8] = b"not really a video, but small";

struct MockConnector {
    platform: Platform,
    fail_probe: bool,
}

#[async_trait::async_trait]
impl PlatformConnector for MockConnector {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn capabilities(&self) -> ConnectorCapabilities {
        ConnectorCapabilities::default()
    }

    async fn probe_metadata(&self, _url: &str) -> Result<ProbedMedia, DownloadError> {
        if self.fail_probe {
            return Err(DownloadError::ProbeFailed(
                "ERROR: [youtube] gone: Video unavailable".to_string(),
            ));
        }

        let mut renditions: Vec<RenditionDescriptor> = [2160u32, 1080, 720, 480, 360, 240, 144]
            .into_iter()
            .flat_map(|h| {
                ["avc1.4d401e", "vp9"].into_iter().map(move |codec| RenditionDescriptor {
                    format_id: format!("{}-{}", h, codec),
                    quality_label: format!("{}p", h),
                    container_ext: if codec == "vp9" { "webm" } else { "mp4" }.to_string(),
                    size_bytes: h as u64 * 1000,
                    width: Some(h * 16 / 9),
                    height: Some(h),
                    frame_rate: Some(30.0),
                    video_codec: Some(codec.to_string()),
                    audio_codec: Some("none".to_string()),
                    audio_bitrate: None,
                })
            })
            .collect();
        renditions.push(RenditionDescriptor {
            format_id: "140".to_string(),
            container_ext: "m4a".to_string(),
            size_bytes: 3_000_000,
            video_codec: Some("none".to_string()),
            audio_codec: Some("mp4a.40.2".to_string()),
            audio_bitrate: Some(128.0),
            ..Default::default()
        });

        Ok(ProbedMedia {
            id: "dQw4w9WgXcQ".to_string(),
            title: "Never Gonna Give You Up".to_string(),
            duration_seconds: 212,
            uploader: "Rick Astley".to_string(),
            view_count: 1_500_000_000,
            description: "x".repeat(400),
            renditions,
            ..Default::default()
        })
    }

    async fn fetch_stream(
        &self,
        _url: &str,
        rendition: &RenditionSpec,
        target: &FetchTarget,
    ) -> Result<FetchedStream, DownloadError> {
        let ext = rendition.ext.clone().unwrap_or_else(|| "mp4".to_string());
        let path = target.path_with_ext(&ext);
        tokio::fs::write(&path, PAYLOAD).await?;
        Ok(FetchedStream::from_path(path))
    }
}

/// Concatenates inputs instead of running ffmpeg
struct MockProcessor;

#[async_trait::async_trait]
impl MediaProcessor for MockProcessor {
    async fn transcode_audio(
        &self,
        input: &Path,
        output: &Path,
        _target: &AudioTarget,
    ) -> Result<(), DownloadError> {
        tokio::fs::copy(input, output).await?;
        Ok(())
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), DownloadError> {
        let mut bytes = tokio::fs::read(video).await?;
        bytes.extend(tokio::fs::read(audio).await?);
        tokio::fs::write(output, bytes).await?;
        Ok(())
    }

    async fn remux(&self, input: &Path, output: &Path) -> Result<(), DownloadError> {
        tokio::fs::copy(input, output).await?;
        Ok(())
    }
}

fn create_test_app(scratch: &Path, fail_probe: bool) -> Router {
    let mut registry = ConnectorRegistry::new();
    for platform in Platform::SUPPORTED {
        registry.register(
            platform,
            Arc::new(MockConnector {
                platform,
                fail_probe,
            }),
        );
    }
    let registry = Arc::new(registry);

    let config = EngineConfig::default()
        .with_scratch_dir(scratch)
        .with_probe_timeout(Duration::from_secs(5));
    let prober = MetadataProber::new(Arc::clone(&registry), config.probe_timeout);
    let pipeline = RetrievalPipeline::new(registry, Arc::new(MockProcessor), config);

    create_router(AppState::new(prober, pipeline, Vec::new()), &["*".to_string()])
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn info_rejects_unsupported_platform() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path(), false);

    let response = app
        .oneshot(post_json("/api/info", json!({"url": "https://vimeo.com/1"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Unsupported platform"));
}

#[tokio::test]
async fn info_validates_url() {
    let dir = tempfile::tempdir().unwrap();

    let cases = [
        (json!({}), "URL is required"),
        (json!({"url": "   "}), "URL is required"),
        (json!({"url": "youtube.com/watch?v=1"}), "Invalid URL format"),
    ];

    for (payload, expected) in cases {
        let app = create_test_app(dir.path(), false);
        let response = app.oneshot(post_json("/api/info", payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], expected);
    }
}

#[tokio::test]
async fn info_returns_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path(), false);

    let response = app
        .oneshot(post_json(
            "/api/info",
            json!({"url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["platform"], "youtube");
    assert_eq!(body["duration"], 212);
    assert_eq!(body["description"].as_str().unwrap().len(), 200);

    let formats = body["formats"].as_array().unwrap();
    assert_eq!(formats.len(), 10);
    let sizes: Vec<u64> = formats
        .iter()
        .map(|f| f["filesize"].as_u64().unwrap())
        .collect();
    assert!(sizes.windows(2).all(|w| w[0] >= w[1]));
    assert!(formats.iter().all(|f| f["vcodec"] != "none"));
    assert_eq!(formats[0]["resolution"], "3840x2160");
}

#[tokio::test]
async fn info_probe_failure_carries_message() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path(), true);

    let response = app
        .oneshot(post_json("/api/info", json!({"url": "https://youtu.be/gone"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Failed to extract video information");
    assert!(body["error"].as_str().unwrap().contains("Video unavailable"));
}

#[tokio::test]
async fn download_streams_requested_container() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path(), false);

    let response = app
        .oneshot(post_json(
            "/api/download",
            json!({
                "url": "https://youtu.be/dQw4w9WgXcQ",
                "quality": "360p",
                "format": "mp4",
                "audio_only": false
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"Never Gonna Give You Up_dQw4w9WgXcQ_"));
    assert!(disposition.contains(".mp4"));

    let length: usize = headers[header::CONTENT_LENGTH]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(length > 0);
    assert_eq!(bytes.len(), length);
    // video part followed by audio part
    assert_eq!(bytes.len(), PAYLOAD.len() * 2);
}

#[tokio::test]
async fn download_audio_only_is_mp3() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path(), false);

    let response = app
        .oneshot(post_json(
            "/api/download",
            json!({"url": "https://youtu.be/dQw4w9WgXcQ", "quality": "1080p", "audio_only": true}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains(".mp3"));
}

#[tokio::test]
async fn download_rejects_unknown_container() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path(), false);

    let response = app
        .oneshot(post_json(
            "/api/download",
            json!({"url": "https://youtu.be/dQw4w9WgXcQ", "format": "avi"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Unsupported container format"));
}

#[tokio::test]
async fn download_unknown_quality_falls_back_to_best() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path(), false);

    let response = app
        .oneshot(post_json(
            "/api/download",
            json!({"url": "https://youtu.be/dQw4w9WgXcQ", "quality": "8k"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn platforms_lists_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path(), false);

    let response = app.oneshot(get("/api/platforms")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    let platforms = body["platforms"].as_array().unwrap();
    assert_eq!(platforms.len(), 6);
    assert_eq!(platforms[3]["name"], "Twitter/X");
    assert_eq!(platforms[3]["id"], "twitter");
    assert!(platforms.iter().all(|p| p["supported"] == true));
}

#[tokio::test]
async fn health_reports_uptime() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path(), false);

    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["platforms_supported"], 6);
    assert!(body["uptime_seconds"].is_u64());
    assert!(body["timestamp"].as_str().unwrap().contains('T'));
}

#[tokio::test]
async fn index_describes_service() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path(), false);

    let response = app.oneshot(get("/")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["status"], "running");
    assert_eq!(body["platforms"].as_array().unwrap().len(), 6);
    assert!(body["endpoints"]["/api/download"].is_string());
    assert!(body["tools"].is_array());
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(dir.path(), false);

    let response = app.oneshot(get("/api/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Endpoint not found");
}
