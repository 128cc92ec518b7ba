// yt-dlp connector - drives the native `yt-dlp` binary
//
// One connector type serves every platform; the ConnectorProfile carries the
// per-platform headers, referer and extractor arguments.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::traits::{
    extension_of, ConnectorProfile, FetchTarget, FetchedStream, PlatformConnector, USER_AGENT,
};
use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::{ConnectorCapabilities, RenditionSpec};
use crate::downloader::models::{NetworkConfig, ProbedMedia, RenditionDescriptor};
use crate::downloader::platform::Platform;
use crate::downloader::utils::{last_line, run_output, CommandError};

/// CLI-based connector using the yt-dlp binary
pub struct YtDlpConnector {
    binary: String,
    profile: ConnectorProfile,
    network: NetworkConfig,
    max_filesize: Option<u64>,
}

impl YtDlpConnector {
    pub fn new(binary: impl Into<String>, platform: Platform, network: NetworkConfig) -> Self {
        Self {
            binary: binary.into(),
            profile: ConnectorProfile::for_platform(platform),
            network,
            max_filesize: None,
        }
    }

    /// Let yt-dlp abort transfers that would exceed `bytes`
    pub fn with_max_filesize(mut self, bytes: Option<u64>) -> Self {
        self.max_filesize = bytes;
        self
    }

    /// Arguments shared by probe and fetch: identity, headers, network
    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--socket-timeout".to_string(),
            self.network.socket_timeout.to_string(),
            "--user-agent".to_string(),
            USER_AGENT.to_string(),
        ];

        for (name, value) in &self.profile.headers {
            args.push("--add-header".to_string());
            args.push(format!("{}:{}", name, value));
        }

        if let Some(referer) = &self.profile.referer {
            args.push("--referer".to_string());
            args.push(referer.clone());
        }

        for extractor_arg in &self.profile.extractor_args {
            args.push("--extractor-args".to_string());
            args.push(extractor_arg.clone());
        }

        if let Some(proxy) = &self.network.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        if let Some(path) = &self.network.cookies_path {
            args.push("--cookies".to_string());
            args.push(path.clone());
        }

        args
    }

    fn build_probe_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-warnings".to_string(),
            "--skip-download".to_string(),
            "--retries".to_string(),
            "2".to_string(),
        ];
        args.extend(self.common_args());
        args.push(url.to_string());
        args
    }

    fn build_fetch_args(
        &self,
        url: &str,
        rendition: &RenditionSpec,
        target: &FetchTarget,
    ) -> Vec<String> {
        let template = target.dir.join(format!("{}.%(ext)s", target.stem));

        let mut args = vec![
            "-f".to_string(),
            rendition.selector.clone(),
            "--no-update".to_string(),
            "--no-part".to_string(),
            "--no-mtime".to_string(),
            "--retries".to_string(),
            "5".to_string(),
            "--fragment-retries".to_string(),
            "50".to_string(),
            "-o".to_string(),
            template.to_string_lossy().into_owned(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
        ];
        args.extend(self.common_args());

        // Only combined query expressions need yt-dlp to merge
        if let Some(container) = &rendition.merge_into {
            if rendition.selector.contains('+') {
                args.push("--merge-output-format".to_string());
                args.push(container.clone());
            }
        }

        if let Some(limit) = self.max_filesize {
            args.push("--max-filesize".to_string());
            args.push(limit.to_string());
        }

        if self.profile.nocheckcert {
            args.push("--no-check-certificates".to_string());
        }
        if self.profile.geo_bypass {
            args.push("--geo-bypass".to_string());
        }

        args.push(url.to_string());
        args
    }

    async fn run(&self, args: Vec<String>) -> Result<std::process::Output, DownloadError> {
        debug!(binary = %self.binary, args = %args.join(" "), "running yt-dlp");
        run_output(&self.binary, &args).await.map_err(|e| match e {
            CommandError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                DownloadError::ToolNotFound(format!("yt-dlp binary not found at {}", self.binary))
            }
            other => DownloadError::internal(other.to_string()),
        })
    }
}

#[async_trait]
impl PlatformConnector for YtDlpConnector {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn platform(&self) -> Platform {
        self.profile.platform.unwrap_or(Platform::Unknown)
    }

    fn capabilities(&self) -> ConnectorCapabilities {
        self.profile.capabilities
    }

    async fn probe_metadata(&self, url: &str) -> Result<ProbedMedia, DownloadError> {
        let output = self.run(self.build_probe_args(url)).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(platform = %self.platform(), "yt-dlp probe failed: {}", stderr.trim());
            return Err(DownloadError::probe_from_stderr(&stderr));
        }

        parse_json(&output.stdout)
    }

    async fn fetch_stream(
        &self,
        url: &str,
        rendition: &RenditionSpec,
        target: &FetchTarget,
    ) -> Result<FetchedStream, DownloadError> {
        let output = self.run(self.build_fetch_args(url, rendition, target)).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                platform = %self.platform(),
                format = %rendition.selector,
                "yt-dlp transfer failed: {}",
                stderr.trim()
            );
            return Err(DownloadError::transfer_from_stderr(&stderr));
        }

        if let Some(printed) = last_line(&output.stdout) {
            let path = PathBuf::from(printed);
            if tokio::fs::metadata(&path).await.is_ok() {
                return Ok(FetchedStream::from_path(path));
            }
        }

        // --max-filesize makes yt-dlp exit 0 without writing anything
        let path = find_by_stem(&target.dir, &target.stem)
            .await
            .ok_or_else(|| DownloadError::ArtifactMissing(target.path_with_ext("*")))?;
        Ok(FetchedStream::from_path(path))
    }
}

/// Locate `<stem>.<ext>` in `dir`, ignoring partial downloads
async fn find_by_stem(dir: &Path, stem: &str) -> Option<PathBuf> {
    let prefix = format!("{}.", stem);
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let ext = extension_of(&path);
        if name.starts_with(&prefix) && ext != "part" && ext != "ytdl" {
            return Some(path);
        }
    }

    None
}

/// Parse `--dump-json` output into probed metadata
pub(crate) fn parse_json(stdout: &[u8]) -> Result<ProbedMedia, DownloadError> {
    let json: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| DownloadError::ProbeFailed(format!("Invalid JSON from yt-dlp: {}", e)))?;

    let text = |key: &str, default: &str| json[key].as_str().unwrap_or(default).to_string();

    Ok(ProbedMedia {
        id: text("id", "unknown"),
        title: text("title", "Unknown"),
        thumbnail: text("thumbnail", ""),
        duration_seconds: json["duration"].as_f64().unwrap_or(0.0).max(0.0) as u64,
        uploader: text("uploader", "Unknown"),
        view_count: json["view_count"].as_u64().unwrap_or(0),
        description: text("description", ""),
        upload_date: text("upload_date", ""),
        webpage_url: text("webpage_url", ""),
        renditions: parse_formats(&json),
    })
}

/// Some extractors (single-asset pages) return no `formats` array at all;
/// that yields an empty catalog rather than an error.
fn parse_formats(json: &serde_json::Value) -> Vec<RenditionDescriptor> {
    let Some(formats) = json["formats"].as_array() else {
        return Vec::new();
    };

    formats
        .iter()
        .map(|f| RenditionDescriptor {
            format_id: f["format_id"].as_str().unwrap_or("").to_string(),
            quality_label: f["format_note"].as_str().unwrap_or("Unknown").to_string(),
            container_ext: f["ext"].as_str().unwrap_or("mp4").to_string(),
            size_bytes: f["filesize"]
                .as_u64()
                .or_else(|| f["filesize_approx"].as_u64())
                .unwrap_or(0),
            width: f["width"].as_u64().map(|w| w as u32),
            height: f["height"].as_u64().map(|h| h as u32),
            frame_rate: f["fps"].as_f64().map(|fps| fps as f32),
            video_codec: f["vcodec"].as_str().map(|s| s.to_string()),
            audio_codec: f["acodec"].as_str().map(|s| s.to_string()),
            audio_bitrate: f["abr"].as_f64().map(|a| a as f32),
        })
        .filter(|r| !r.format_id.is_empty())
        .collect()
}
