// Error types for the extraction engine

use std::path::PathBuf;

use thiserror::Error;

use super::connectors::diagnostics::diagnose_error;

/// Pipeline stage a timeout or tool failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Probe,
    Transfer,
    Transcode,
    Mux,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Probe => write!(f, "probe"),
            Self::Transfer => write!(f, "transfer"),
            Self::Transcode => write!(f, "transcode"),
            Self::Mux => write!(f, "mux"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Missing or malformed request data
    #[error("{0}")]
    InvalidInput(String),

    /// URL did not match any known platform
    #[error("Unsupported platform. Supported: YouTube, TikTok, Instagram, Twitter, Facebook, Sora")]
    UnsupportedPlatform,

    /// Connector could not fetch metadata
    #[error("Metadata probe failed: {0}")]
    ProbeFailed(String),

    /// Nothing in the catalog satisfies the requested policy
    #[error("Requested format is not available: {0}")]
    FormatUnavailable(String),

    /// Network or stream fetch error
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: Stage, secs: u64 },

    #[error("Audio transcode failed: {0}")]
    TranscodeFailed(String),

    #[error("Mux failed: {0}")]
    MuxFailed(String),

    /// Post-pipeline verification could not find a usable file
    #[error("File not found after download: {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("Artifact is {size} bytes, limit is {limit} bytes")]
    ArtifactTooLarge { size: u64, limit: u64 },

    /// yt-dlp or ffmpeg not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DownloadError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Build a probe failure from raw yt-dlp stderr.
    pub fn probe_from_stderr(stderr: &str) -> Self {
        Self::ProbeFailed(describe_tool_failure(stderr))
    }

    /// Build a transfer failure from raw yt-dlp stderr.
    pub fn transfer_from_stderr(stderr: &str) -> Self {
        Self::TransferFailed(describe_tool_failure(stderr))
    }

    /// Whether the failure is attributable to the caller's request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::UnsupportedPlatform
                | Self::ProbeFailed(_)
                | Self::FormatUnavailable(_)
                | Self::ArtifactTooLarge { .. }
        )
    }
}

/// Condense tool stderr into one line, prefixed by the diagnosed reason.
fn describe_tool_failure(stderr: &str) -> String {
    let important: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:") || l.contains("HTTP Error"))
        .take(2)
        .collect();

    let details = if important.is_empty() {
        stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("unknown error")
            .chars()
            .take(200)
            .collect()
    } else {
        important.join(" | ")
    };

    match diagnose_error(stderr) {
        Some(reason) => format!("{} ({})", reason.description(), details),
        None => details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_condensed_to_error_lines() {
        let stderr = "[youtube] abc: Downloading webpage\n\
                      WARNING: something minor\n\
                      ERROR: [youtube] abc: Video unavailable\n";
        let err = DownloadError::transfer_from_stderr(stderr);
        let msg = err.to_string();
        assert!(msg.starts_with("Transfer failed:"));
        assert!(msg.contains("ERROR: [youtube] abc: Video unavailable"));
        assert!(!msg.contains("WARNING"));
    }

    #[test]
    fn test_stderr_without_error_lines_uses_last_line() {
        let err = DownloadError::probe_from_stderr("first\nsecond\n\n");
        assert_eq!(err.to_string(), "Metadata probe failed: second");
    }

    #[test]
    fn test_client_error_classes() {
        assert!(DownloadError::UnsupportedPlatform.is_client_error());
        assert!(DownloadError::invalid_input("URL is required").is_client_error());
        assert!(!DownloadError::MuxFailed("x".into()).is_client_error());
        assert!(!DownloadError::Timeout { stage: Stage::Transfer, secs: 5 }.is_client_error());
    }
}
