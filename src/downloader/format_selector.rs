// FormatSelector - deterministic stream selection
//
// Turns a rendition catalog plus a request policy into a StreamSpec:
// - Audio-only: best audio rendition, transcoded to a fixed target
// - Video: best video at or below the quality ceiling, plus best audio
//   when the video rendition is silent
// - Single-asset platforms: best pre-muxed rendition, ceiling ignored
// - No catalog: a direct yt-dlp query expression instead of format ids

use std::cmp::Ordering;

use super::errors::DownloadError;
use super::models::{AudioTarget, Quality, RenditionDescriptor};

/// How a single rendition is addressed when fetching
#[derive(Debug, Clone, PartialEq)]
pub struct RenditionSpec {
    /// yt-dlp format selector: a concrete format id or a query expression
    pub selector: String,
    /// Extension the rendition is expected to arrive with, if known
    pub ext: Option<String>,
    pub height: Option<u32>,
    /// Container yt-dlp should merge into when the query combines streams
    pub merge_into: Option<String>,
}

impl RenditionSpec {
    fn from_rendition(r: &RenditionDescriptor) -> Self {
        Self {
            selector: r.format_id.clone(),
            ext: Some(r.container_ext.clone()).filter(|e| !e.is_empty()),
            height: r.height,
            merge_into: None,
        }
    }

    fn query(selector: impl Into<String>, merge_into: Option<&str>) -> Self {
        Self {
            selector: selector.into(),
            ext: merge_into.map(str::to_string),
            height: None,
            merge_into: merge_into.map(str::to_string),
        }
    }
}

/// What the retrieval pipeline has to fetch and how to combine it
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSpec {
    /// One rendition, used as-is (remuxed if its container differs)
    Single { rendition: RenditionSpec },
    /// Separate video and audio, muxed by the pipeline
    Split {
        video: RenditionSpec,
        audio: RenditionSpec,
    },
    /// Audio source transcoded to a fixed target
    Audio {
        source: RenditionSpec,
        target: AudioTarget,
    },
}

/// Request-side policy the selector applies
#[derive(Debug, Clone, Copy)]
pub struct SelectionPolicy<'a> {
    pub quality: Quality,
    pub container: &'a str,
    pub audio_only: bool,
}

/// Per-connector knobs relevant to selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectorCapabilities {
    /// Platform only exposes a single pre-muxed "best" asset
    pub single_asset: bool,
}

/// Format selector with deterministic ranking
pub struct FormatSelector;

impl FormatSelector {
    pub fn select(
        renditions: &[RenditionDescriptor],
        policy: &SelectionPolicy<'_>,
        capabilities: ConnectorCapabilities,
    ) -> Result<StreamSpec, DownloadError> {
        if policy.audio_only {
            return Ok(Self::select_audio(renditions));
        }

        if renditions.is_empty() {
            return Ok(Self::direct_query(policy, capabilities));
        }

        if capabilities.single_asset {
            return Ok(Self::select_single_asset(renditions));
        }

        Self::select_video(renditions, policy)
    }

    /// Query expression used when the connector exposed no catalog
    pub fn direct_query(
        policy: &SelectionPolicy<'_>,
        capabilities: ConnectorCapabilities,
    ) -> StreamSpec {
        if policy.audio_only {
            return StreamSpec::Audio {
                source: RenditionSpec::query("bestaudio/best", None),
                target: AudioTarget::MP3_192,
            };
        }

        if capabilities.single_asset {
            return StreamSpec::Single {
                rendition: RenditionSpec::query("best", None),
            };
        }

        let selector = match policy.quality.height_ceiling() {
            Some(h) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
            None => "bestvideo+bestaudio/best".to_string(),
        };
        StreamSpec::Single {
            rendition: RenditionSpec::query(selector, Some(policy.container)),
        }
    }

    fn select_audio(renditions: &[RenditionDescriptor]) -> StreamSpec {
        let audio_only: Vec<&RenditionDescriptor> =
            renditions.iter().filter(|r| r.is_audio_only()).collect();

        let source = Self::find_best_audio(&audio_only, None)
            .or_else(|| {
                // Fall back to a muxed rendition and strip its video in the transcode
                let muxed: Vec<&RenditionDescriptor> =
                    renditions.iter().filter(|r| r.has_audio()).collect();
                Self::find_best_video(&muxed, None)
            })
            .map(RenditionSpec::from_rendition)
            .unwrap_or_else(|| RenditionSpec::query("bestaudio/best", None));

        StreamSpec::Audio {
            source,
            target: AudioTarget::MP3_192,
        }
    }

    fn select_single_asset(renditions: &[RenditionDescriptor]) -> StreamSpec {
        let muxed: Vec<&RenditionDescriptor> = renditions
            .iter()
            .filter(|r| r.has_video() && r.has_audio())
            .collect();
        let video: Vec<&RenditionDescriptor> =
            renditions.iter().filter(|r| r.has_video()).collect();

        let rendition = Self::find_best_video(&muxed, None)
            .or_else(|| Self::find_best_video(&video, None))
            .map(RenditionSpec::from_rendition)
            .unwrap_or_else(|| RenditionSpec::query("best", None));

        StreamSpec::Single { rendition }
    }

    fn select_video(
        renditions: &[RenditionDescriptor],
        policy: &SelectionPolicy<'_>,
    ) -> Result<StreamSpec, DownloadError> {
        let ceiling = policy.quality.height_ceiling();
        let video: Vec<&RenditionDescriptor> =
            renditions.iter().filter(|r| r.has_video()).collect();

        let fitting: Vec<&RenditionDescriptor> = video
            .iter()
            .copied()
            .filter(|r| match (ceiling, r.height) {
                (Some(max), Some(h)) => h <= max,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .collect();

        // Renditions of unknown height only count when nothing with a known height fits
        let candidates = if fitting.is_empty() && ceiling.is_some() {
            video.iter().copied().filter(|r| r.height.is_none()).collect()
        } else {
            fitting
        };

        let best = Self::find_best_video(&candidates, Some(policy.container)).ok_or_else(|| {
            DownloadError::FormatUnavailable(match ceiling {
                Some(h) => format!("no video rendition at or below {}p", h),
                None => "no video rendition".to_string(),
            })
        })?;

        if best.has_audio() {
            return Ok(StreamSpec::Single {
                rendition: RenditionSpec::from_rendition(best),
            });
        }

        let audio: Vec<&RenditionDescriptor> =
            renditions.iter().filter(|r| r.is_audio_only()).collect();

        Ok(match Self::find_best_audio(&audio, Some(policy.container)) {
            Some(a) => StreamSpec::Split {
                video: RenditionSpec::from_rendition(best),
                audio: RenditionSpec::from_rendition(a),
            },
            None => StreamSpec::Single {
                rendition: RenditionSpec::from_rendition(best),
            },
        })
    }

    /// Best video by height, frame rate, container compatibility, then size.
    /// Ties keep the earliest rendition so the choice is deterministic.
    fn find_best_video<'a>(
        formats: &[&'a RenditionDescriptor],
        container: Option<&str>,
    ) -> Option<&'a RenditionDescriptor> {
        formats.iter().copied().fold(None, |best, candidate| match best {
            None => Some(candidate),
            Some(current) => {
                if Self::compare_video(candidate, current, container) == Ordering::Greater {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        })
    }

    fn compare_video(
        a: &RenditionDescriptor,
        b: &RenditionDescriptor,
        container: Option<&str>,
    ) -> Ordering {
        a.height
            .unwrap_or(0)
            .cmp(&b.height.unwrap_or(0))
            .then_with(|| {
                let fps = |r: &RenditionDescriptor| (r.frame_rate.unwrap_or(0.0) * 100.0) as u32;
                fps(a).cmp(&fps(b))
            })
            .then_with(|| {
                let compat = |r: &RenditionDescriptor| {
                    container.map_or(false, |c| video_codec_fits(c, r.video_codec.as_deref()))
                };
                compat(a).cmp(&compat(b))
            })
            .then_with(|| a.size_bytes.cmp(&b.size_bytes))
    }

    /// Best audio by container compatibility, bitrate, then size.
    fn find_best_audio<'a>(
        formats: &[&'a RenditionDescriptor],
        container: Option<&str>,
    ) -> Option<&'a RenditionDescriptor> {
        let key = |r: &RenditionDescriptor| {
            (
                container.map_or(false, |c| audio_codec_fits(c, r.audio_codec.as_deref())),
                (r.audio_bitrate.unwrap_or(0.0) * 100.0) as u32,
                r.size_bytes,
            )
        };

        formats.iter().copied().fold(None, |best, candidate| match best {
            None => Some(candidate),
            Some(current) if key(candidate) > key(current) => Some(candidate),
            Some(current) => Some(current),
        })
    }
}

fn video_codec_fits(container: &str, codec: Option<&str>) -> bool {
    let codec = codec.unwrap_or("");
    match container {
        "mp4" | "mov" => ["avc1", "h264", "hev1", "hvc1", "av01"]
            .iter()
            .any(|p| codec.starts_with(p)),
        "webm" => ["vp8", "vp9", "vp09", "av01"].iter().any(|p| codec.starts_with(p)),
        _ => true,
    }
}

fn audio_codec_fits(container: &str, codec: Option<&str>) -> bool {
    let codec = codec.unwrap_or("");
    match container {
        "mp4" | "mov" => codec.starts_with("mp4a") || codec.starts_with("aac"),
        "webm" => codec.starts_with("opus") || codec.starts_with("vorbis"),
        _ => true,
    }
}
