// PlatformConnector trait and per-platform request profiles

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::{ConnectorCapabilities, RenditionSpec};
use crate::downloader::models::ProbedMedia;
use crate::downloader::platform::Platform;

/// Browser identity presented to every platform
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const COMMON_HEADERS: [(&str, &str); 3] = [
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    ),
    ("Accept-Language", "en-us,en;q=0.5"),
    ("Sec-Fetch-Mode", "navigate"),
];

/// Where a connector should write a fetched stream
#[derive(Debug, Clone)]
pub struct FetchTarget {
    pub dir: PathBuf,
    /// File stem without extension; the connector picks the extension
    pub stem: String,
}

impl FetchTarget {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    /// Path for this target with a given extension
    pub fn path_with_ext(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.stem, ext))
    }
}

/// A stream that landed on disk
#[derive(Debug, Clone)]
pub struct FetchedStream {
    pub path: PathBuf,
    /// Extension of `path`, lowercase, without the dot
    pub ext: String,
}

impl FetchedStream {
    pub fn from_path(path: PathBuf) -> Self {
        let ext = extension_of(&path);
        Self { path, ext }
    }
}

pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Request shaping applied when talking to one platform
#[derive(Debug, Clone, Default)]
pub struct ConnectorProfile {
    pub platform: Option<Platform>,
    pub headers: Vec<(String, String)>,
    pub referer: Option<String>,
    /// yt-dlp `--extractor-args` values
    pub extractor_args: Vec<String>,
    pub capabilities: ConnectorCapabilities,
    /// Skip TLS certificate checks on transfers
    pub nocheckcert: bool,
    pub geo_bypass: bool,
}

impl ConnectorProfile {
    pub fn for_platform(platform: Platform) -> Self {
        let base = Self {
            platform: Some(platform),
            headers: COMMON_HEADERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            nocheckcert: true,
            geo_bypass: true,
            ..Default::default()
        };

        match platform {
            Platform::YouTube => {
                base.with_extractor_arg("youtube:player_client=android,web;skip=dash,hls")
            }
            Platform::TikTok => base
                .with_extractor_arg("tiktok:api_hostname=api22-normal-c-useast2a.tiktokv.com")
                .with_referer("https://www.tiktok.com/")
                .with_single_asset(true),
            Platform::Instagram => base
                .with_referer("https://www.instagram.com/")
                .with_single_asset(true),
            Platform::Twitter => base
                .with_referer("https://twitter.com/")
                .with_single_asset(true),
            Platform::Facebook | Platform::Sora | Platform::Unknown => base,
        }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn with_extractor_arg(mut self, arg: impl Into<String>) -> Self {
        self.extractor_args.push(arg.into());
        self
    }

    pub fn with_single_asset(mut self, enabled: bool) -> Self {
        self.capabilities.single_asset = enabled;
        self
    }
}

/// Trait for platform connectors
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    /// Name of the connector (for logging)
    fn name(&self) -> &'static str;

    fn platform(&self) -> Platform;

    fn capabilities(&self) -> ConnectorCapabilities;

    /// Fetch metadata and the full rendition catalog without downloading
    async fn probe_metadata(&self, url: &str) -> Result<ProbedMedia, DownloadError>;

    /// Fetch one rendition (or query expression) into `target`
    async fn fetch_stream(
        &self,
        url: &str,
        rendition: &RenditionSpec,
        target: &FetchTarget,
    ) -> Result<FetchedStream, DownloadError>;
}
