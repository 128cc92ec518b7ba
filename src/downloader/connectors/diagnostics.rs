// Failure diagnostics - identifies why an upstream platform refused a request
//
// yt-dlp reports every failure as free-form stderr. This module maps the
// common shapes of that text onto a small set of reasons so failure messages
// carry an actionable hint instead of a raw log tail.

/// Reasons why a platform might refuse a probe or transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingReason {
    /// HTTP 403 Forbidden - general access denied
    Http403Forbidden,

    /// YouTube SABR streaming protection hides the requested formats
    SabrStreaming,

    /// Proof of Origin token required
    PoTokenRequired,

    /// Age-restricted content requiring login
    AgeRestricted,

    GeoBlocked,

    /// Network timeout (soft IP block)
    NetworkTimeout,

    /// Rate limiting (429 or similar)
    RateLimited,

    BotDetection,

    /// Private or login-only post
    PrivateContent,

    /// Deleted, removed or otherwise unavailable
    Unavailable,

    /// DRM-protected or paid content; no workaround exists
    DrmProtected,

    /// The URL is not something the extractor understands
    UnsupportedUrl,
}

impl BlockingReason {
    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Http403Forbidden => "Access denied (HTTP 403)",
            Self::SabrStreaming => "SABR streaming protection active",
            Self::PoTokenRequired => "Proof of Origin token required",
            Self::AgeRestricted => "Age-restricted content",
            Self::GeoBlocked => "Geographic restriction",
            Self::NetworkTimeout => "Network timeout (possible IP throttling)",
            Self::RateLimited => "Rate limited by the platform",
            Self::BotDetection => "Bot detection triggered",
            Self::PrivateContent => "Private content",
            Self::Unavailable => "Media unavailable",
            Self::DrmProtected => "DRM-protected content",
            Self::UnsupportedUrl => "URL not recognised by the extractor",
        }
    }
}

/// Analyze error output and return the blocking reason, if one is recognised
pub fn diagnose_error(error: &str) -> Option<BlockingReason> {
    let lower = error.to_lowercase();

    // Checked in order of specificity, DRM first
    if lower.contains("drm")
        || lower.contains("widevine")
        || lower.contains("playready")
        || lower.contains("fairplay")
        || lower.contains("requires purchase")
        || lower.contains("this video requires payment")
    {
        return Some(BlockingReason::DrmProtected);
    }

    if lower.contains("unsupported url") {
        return Some(BlockingReason::UnsupportedUrl);
    }

    if lower.contains("sabr") {
        return Some(BlockingReason::SabrStreaming);
    }

    if lower.contains("po token") || lower.contains("proof of origin") {
        return Some(BlockingReason::PoTokenRequired);
    }

    if lower.contains("age-restricted")
        || lower.contains("sign in to confirm your age")
        || lower.contains("age_verification")
    {
        return Some(BlockingReason::AgeRestricted);
    }

    if lower.contains("private video")
        || lower.contains("video is private")
        || lower.contains("this account is private")
        || lower.contains("login required")
    {
        return Some(BlockingReason::PrivateContent);
    }

    if lower.contains("video unavailable")
        || lower.contains("has been removed")
        || lower.contains("no longer available")
        || lower.contains("video is unavailable")
        || lower.contains("no video could be found")
    {
        return Some(BlockingReason::Unavailable);
    }

    if lower.contains("not available in your country")
        || lower.contains("blocked in your country")
        || lower.contains("geo restriction")
        || lower.contains("geo-restricted")
    {
        return Some(BlockingReason::GeoBlocked);
    }

    if lower.contains("http error 429")
        || lower.contains("rate limit")
        || lower.contains("too many requests")
    {
        return Some(BlockingReason::RateLimited);
    }

    if lower.contains("not a bot")
        || lower.contains("captcha")
        || lower.contains("unusual traffic")
    {
        return Some(BlockingReason::BotDetection);
    }

    if lower.contains("http error 403") || lower.contains("forbidden") {
        return Some(BlockingReason::Http403Forbidden);
    }

    if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection refused")
        || lower.contains("network is unreachable")
    {
        return Some(BlockingReason::NetworkTimeout);
    }

    None
}
