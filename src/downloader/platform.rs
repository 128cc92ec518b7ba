// Platform classifier - maps a source URL to the platform that hosts it

use std::fmt;

use regex::Regex;
use serde::Serialize;

/// Supported upstream platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    TikTok,
    Instagram,
    Twitter,
    Facebook,
    Sora,
    Unknown,
}

impl Platform {
    /// Every platform that has a connector, in catalog order
    pub const SUPPORTED: [Platform; 6] = [
        Platform::YouTube,
        Platform::TikTok,
        Platform::Instagram,
        Platform::Twitter,
        Platform::Facebook,
        Platform::Sora,
    ];

    /// Stable wire identifier
    pub fn id(&self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::TikTok => "tiktok",
            Self::Instagram => "instagram",
            Self::Twitter => "twitter",
            Self::Facebook => "facebook",
            Self::Sora => "sora",
            Self::Unknown => "unknown",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::YouTube => "YouTube",
            Self::TikTok => "TikTok",
            Self::Instagram => "Instagram",
            Self::Twitter => "Twitter/X",
            Self::Facebook => "Facebook",
            Self::Sora => "Sora (OpenAI)",
            Self::Unknown => "Unknown",
        }
    }

    /// Feature tags shown in the platform catalog
    pub fn features(&self) -> &'static [&'static str] {
        match self {
            Self::YouTube => &["4K", "Audio", "Subtitles"],
            Self::TikTok => &["No Watermark", "HD"],
            Self::Instagram => &["Reels", "IGTV", "Posts"],
            Self::Twitter => &["HD", "GIFs"],
            Self::Facebook => &["HD", "Stories"],
            Self::Sora => &["AI Videos"],
            Self::Unknown => &[],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

lazy_static::lazy_static! {
    // Order matters: patterns can overlap and the first match wins.
    static ref PLATFORM_PATTERNS: Vec<(Platform, Regex)> = vec![
        (Platform::YouTube, Regex::new(r"(?i)(youtube\.com|youtu\.be)").unwrap()),
        (Platform::TikTok, Regex::new(r"(?i)tiktok\.com").unwrap()),
        (Platform::Instagram, Regex::new(r"(?i)instagram\.com").unwrap()),
        (Platform::Twitter, Regex::new(r"(?i)(twitter\.com|x\.com)").unwrap()),
        (Platform::Facebook, Regex::new(r"(?i)facebook\.com").unwrap()),
        (Platform::Sora, Regex::new(r"(?i)(openai\.com.*sora|sora\.openai\.com)").unwrap()),
    ];
}

/// Detect the platform of a URL. Pure and total: no match yields `Unknown`.
pub fn classify(url: &str) -> Platform {
    PLATFORM_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(url))
        .map(|(platform, _)| *platform)
        .unwrap_or(Platform::Unknown)
}
