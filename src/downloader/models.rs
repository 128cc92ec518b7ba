// Common data models for the extraction engine

use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use super::errors::DownloadError;
use super::platform::Platform;

/// Containers the muxer can produce
pub const SUPPORTED_CONTAINERS: [&str; 4] = ["mp4", "webm", "mkv", "mov"];

/// Maximum description length surfaced in a manifest
pub const DESCRIPTION_LIMIT: usize = 200;

/// Maximum number of renditions surfaced in a manifest
pub const RENDITION_LIMIT: usize = 10;

/// Requested video quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Best,
    Uhd4k,
    Hd1080,
    Hd720,
    Sd480,
    Sd360,
}

impl Quality {
    /// Height ceiling for this quality, `None` for best
    pub fn height_ceiling(&self) -> Option<u32> {
        match self {
            Self::Best => None,
            Self::Uhd4k => Some(2160),
            Self::Hd1080 => Some(1080),
            Self::Hd720 => Some(720),
            Self::Sd480 => Some(480),
            Self::Sd360 => Some(360),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::Uhd4k => "4k",
            Self::Hd1080 => "1080p",
            Self::Hd720 => "720p",
            Self::Sd480 => "480p",
            Self::Sd360 => "360p",
        }
    }
}

impl FromStr for Quality {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "best" => Ok(Self::Best),
            "4k" | "2160p" => Ok(Self::Uhd4k),
            "1080p" => Ok(Self::Hd1080),
            "720p" => Ok(Self::Hd720),
            "480p" => Ok(Self::Sd480),
            "360p" => Ok(Self::Sd360),
            other => Err(DownloadError::invalid_input(format!(
                "Unknown quality: {}",
                other
            ))),
        }
    }
}

/// A validated retrieval request. Immutable once built.
#[derive(Debug, Clone)]
pub struct SourceRequest {
    url: String,
    quality: Quality,
    container: String,
    audio_only: bool,
}

impl SourceRequest {
    pub fn new(
        url: &str,
        quality: Quality,
        container: &str,
        audio_only: bool,
    ) -> Result<Self, DownloadError> {
        let url = validate_url(url)?;
        let container = container.trim().to_lowercase();
        if !SUPPORTED_CONTAINERS.contains(&container.as_str()) {
            return Err(DownloadError::invalid_input(format!(
                "Unsupported container format: {}. Supported: {}",
                container,
                SUPPORTED_CONTAINERS.join(", ")
            )));
        }

        Ok(Self {
            url,
            quality,
            container,
            audio_only,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn audio_only(&self) -> bool {
        self.audio_only
    }
}

/// Trim a URL and check it is an absolute http(s) URL.
pub fn validate_url(url: &str) -> Result<String, DownloadError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(DownloadError::invalid_input("URL is required"));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(DownloadError::invalid_input("Invalid URL format"));
    }
    Ok(url.to_string())
}

/// One concrete encoded variant of a media asset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenditionDescriptor {
    /// Format ID (e.g., "137", "140", "hd")
    pub format_id: String,
    /// Format note (e.g., "1080p", "tiny")
    pub quality_label: String,
    /// File extension (mp4, webm, m4a)
    pub container_ext: String,
    /// Size in bytes, 0 when unknown
    pub size_bytes: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f32>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    /// Audio bitrate in kbps
    pub audio_bitrate: Option<f32>,
}

impl RenditionDescriptor {
    /// "WxH", with "?" for an unknown side
    pub fn resolution(&self) -> String {
        let side = |v: Option<u32>| v.map_or_else(|| "?".to_string(), |n| n.to_string());
        format!("{}x{}", side(self.width), side(self.height))
    }

    pub fn has_video(&self) -> bool {
        codec_present(&self.video_codec)
    }

    pub fn has_audio(&self) -> bool {
        codec_present(&self.audio_codec)
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio() && !self.has_video()
    }
}

fn codec_present(codec: &Option<String>) -> bool {
    codec
        .as_deref()
        .map_or(false, |c| !c.is_empty() && c != "none")
}

/// Raw connector answer: metadata plus the full, unfiltered rendition list
#[derive(Debug, Clone, Default)]
pub struct ProbedMedia {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub duration_seconds: u64,
    pub uploader: String,
    pub view_count: u64,
    pub description: String,
    pub upload_date: String,
    pub webpage_url: String,
    pub renditions: Vec<RenditionDescriptor>,
}

/// Externally visible metadata for a source URL
#[derive(Debug, Clone)]
pub struct MediaManifest {
    pub title: String,
    pub thumbnail_url: String,
    pub duration_seconds: u64,
    pub uploader: String,
    pub view_count: u64,
    pub description: String,
    pub upload_date: String,
    pub platform: Platform,
    pub url: String,
    /// Video-bearing renditions, largest first, at most `RENDITION_LIMIT`
    pub available_renditions: Vec<RenditionDescriptor>,
}

impl MediaManifest {
    pub fn from_probed(probed: ProbedMedia, platform: Platform, url: &str) -> Self {
        let mut renditions: Vec<RenditionDescriptor> = probed
            .renditions
            .into_iter()
            .filter(RenditionDescriptor::has_video)
            .collect();
        // Stable sort keeps upstream order among equal sizes; unknown (0) sorts last
        renditions.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
        renditions.truncate(RENDITION_LIMIT);

        Self {
            title: probed.title,
            thumbnail_url: probed.thumbnail,
            duration_seconds: probed.duration_seconds,
            uploader: probed.uploader,
            view_count: probed.view_count,
            description: truncate_chars(&probed.description, DESCRIPTION_LIMIT),
            upload_date: probed.upload_date,
            platform,
            url: url.to_string(),
            available_renditions: renditions,
        }
    }
}

fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

/// Fixed audio output produced for audio-only requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTarget {
    pub codec: &'static str,
    pub extension: &'static str,
    pub bitrate_kbps: u32,
}

impl AudioTarget {
    pub const MP3_192: AudioTarget = AudioTarget {
        codec: "libmp3lame",
        extension: "mp3",
        bitrate_kbps: 192,
    };
}

/// A finished retrieval. `local_path` stays valid until the janitor reclaims it.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub local_path: PathBuf,
    pub filename: String,
    pub title: String,
    pub size_bytes: u64,
    pub duration_seconds: u64,
    pub container_format: String,
    pub platform: Platform,
}

/// Network configuration handed to connectors
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// SOCKS5/HTTP proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,

    /// Path to a Netscape cookies.txt file
    pub cookies_path: Option<String>,

    /// Per-socket timeout in seconds passed to yt-dlp
    pub socket_timeout: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            cookies_path: None,
            socket_timeout: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendition(id: &str, size: u64, vcodec: Option<&str>) -> RenditionDescriptor {
        RenditionDescriptor {
            format_id: id.to_string(),
            container_ext: "mp4".to_string(),
            size_bytes: size,
            video_codec: vcodec.map(str::to_string),
            audio_codec: Some("mp4a.40.2".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_quality_parsing() {
        assert_eq!("720p".parse::<Quality>().unwrap(), Quality::Hd720);
        assert_eq!("4K".parse::<Quality>().unwrap(), Quality::Uhd4k);
        assert_eq!("2160p".parse::<Quality>().unwrap(), Quality::Uhd4k);
        assert_eq!("".parse::<Quality>().unwrap(), Quality::Best);
        assert!("8k".parse::<Quality>().is_err());
        assert_eq!(Quality::Sd360.height_ceiling(), Some(360));
        assert_eq!(Quality::Best.height_ceiling(), None);
    }

    #[test]
    fn test_source_request_validation() {
        let req = SourceRequest::new("  https://youtu.be/x ", Quality::Best, "MP4", false).unwrap();
        assert_eq!(req.url(), "https://youtu.be/x");
        assert_eq!(req.container(), "mp4");

        let err = SourceRequest::new("", Quality::Best, "mp4", false).unwrap_err();
        assert_eq!(err.to_string(), "URL is required");

        let err = SourceRequest::new("ftp://youtu.be/x", Quality::Best, "mp4", false).unwrap_err();
        assert_eq!(err.to_string(), "Invalid URL format");

        assert!(SourceRequest::new("https://youtu.be/x", Quality::Best, "exe", false).is_err());
    }

    #[test]
    fn test_resolution_placeholder() {
        let mut r = rendition("1", 0, Some("avc1"));
        assert_eq!(r.resolution(), "?x?");
        r.width = Some(1280);
        r.height = Some(720);
        assert_eq!(r.resolution(), "1280x720");
    }

    #[test]
    fn test_manifest_filters_sorts_and_truncates() {
        let mut renditions = vec![
            rendition("audio", 5_000, Some("none")),
            rendition("nocodec", 9_000, None),
            rendition("unknown-size", 0, Some("vp9")),
        ];
        for i in 0..12u64 {
            renditions.push(rendition(&format!("v{}", i), (i + 1) * 1_000, Some("avc1.4d401f")));
        }

        let manifest = MediaManifest::from_probed(
            ProbedMedia {
                title: "Clip".to_string(),
                description: "d".repeat(500),
                renditions,
                ..Default::default()
            },
            Platform::YouTube,
            "https://youtu.be/x",
        );

        let list = &manifest.available_renditions;
        assert_eq!(list.len(), RENDITION_LIMIT);
        assert!(list.iter().all(RenditionDescriptor::has_video));
        assert!(list.windows(2).all(|w| w[0].size_bytes >= w[1].size_bytes));
        assert_eq!(list[0].format_id, "v11");
        assert!(!list.iter().any(|r| r.format_id == "audio" || r.format_id == "nocodec"));
        assert_eq!(manifest.description.chars().count(), DESCRIPTION_LIMIT);
    }

    #[test]
    fn test_unknown_sizes_sort_last() {
        let manifest = MediaManifest::from_probed(
            ProbedMedia {
                renditions: vec![
                    rendition("a", 0, Some("avc1")),
                    rendition("b", 10, Some("avc1")),
                    rendition("c", 0, Some("avc1")),
                ],
                ..Default::default()
            },
            Platform::TikTok,
            "https://tiktok.com/x",
        );
        let ids: Vec<&str> = manifest
            .available_renditions
            .iter()
            .map(|r| r.format_id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_description_truncation_is_char_safe() {
        let manifest = MediaManifest::from_probed(
            ProbedMedia {
                description: "é".repeat(300),
                ..Default::default()
            },
            Platform::YouTube,
            "https://youtu.be/x",
        );
        assert_eq!(manifest.description.chars().count(), 200);
    }
}
