// Application configuration

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::downloader::{EngineConfig, NetworkConfig};

const MIB: u64 = 1024 * 1024;

/// Server plus engine configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup. Unset or unparsable values fall back
    /// to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let engine_defaults = defaults.engine.clone();

        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &str, default: u64| parse_or(text(key), default);

        let network = NetworkConfig {
            proxy: text("PROXY_URL"),
            cookies_path: text("COOKIES_PATH"),
            socket_timeout: parse_or(
                text("SOCKET_TIMEOUT_SECS"),
                engine_defaults.network.socket_timeout,
            ),
        };

        let engine = EngineConfig {
            scratch_dir: text("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(engine_defaults.scratch_dir),
            max_artifact_bytes: number("MAX_ARTIFACT_MB", engine_defaults.max_artifact_bytes / MIB)
                .saturating_mul(MIB),
            cache_expiry: Duration::from_secs(
                number("CACHE_EXPIRE_HOURS", engine_defaults.cache_expiry.as_secs() / 3600)
                    .saturating_mul(3600),
            ),
            probe_timeout: Duration::from_secs(number(
                "PROBE_TIMEOUT_SECS",
                engine_defaults.probe_timeout.as_secs(),
            )),
            transfer_timeout: Duration::from_secs(number(
                "TRANSFER_TIMEOUT_SECS",
                engine_defaults.transfer_timeout.as_secs(),
            )),
            postprocess_timeout: Duration::from_secs(number(
                "POSTPROCESS_TIMEOUT_SECS",
                engine_defaults.postprocess_timeout.as_secs(),
            )),
            network,
            ytdlp_path: text("YTDLP_PATH"),
            ffmpeg_path: text("FFMPEG_PATH"),
        };

        Self {
            host: text("HOST").unwrap_or(defaults.host),
            port: parse_or(text("PORT"), defaults.port),
            cors_origins: text("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            engine,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}
