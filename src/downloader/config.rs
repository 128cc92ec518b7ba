// Engine configuration passed to the prober, pipeline, janitor and connectors

use std::path::PathBuf;
use std::time::Duration;

use super::models::NetworkConfig;

/// Engine-wide settings. Built once at startup; components hold a clone.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding transient artifacts; swept by the janitor
    pub scratch_dir: PathBuf,
    /// Largest artifact the pipeline will hand back
    pub max_artifact_bytes: u64,
    /// Age after which the janitor deletes a file
    pub cache_expiry: Duration,
    pub probe_timeout: Duration,
    pub transfer_timeout: Duration,
    /// Bound for a single transcode or mux
    pub postprocess_timeout: Duration,
    pub network: NetworkConfig,
    /// Explicit yt-dlp path; located automatically when unset
    pub ytdlp_path: Option<String>,
    /// Explicit ffmpeg path; located automatically when unset
    pub ffmpeg_path: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("vidgrab"),
            max_artifact_bytes: 500 * 1024 * 1024,
            cache_expiry: Duration::from_secs(2 * 3600),
            probe_timeout: Duration::from_secs(60),
            transfer_timeout: Duration::from_secs(1800),
            postprocess_timeout: Duration::from_secs(900),
            network: NetworkConfig::default(),
            ytdlp_path: None,
            ffmpeg_path: None,
        }
    }
}

impl EngineConfig {
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn with_max_artifact_bytes(mut self, bytes: u64) -> Self {
        self.max_artifact_bytes = bytes;
        self
    }

    pub fn with_cache_expiry(mut self, expiry: Duration) -> Self {
        self.cache_expiry = expiry;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    pub fn with_postprocess_timeout(mut self, timeout: Duration) -> Self {
        self.postprocess_timeout = timeout;
        self
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }
}
