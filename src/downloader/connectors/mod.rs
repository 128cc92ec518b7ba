// Connector registry - maps each platform to the connector that serves it

pub mod diagnostics;
pub mod traits;
pub mod ytdlp;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::errors::DownloadError;
use super::models::NetworkConfig;
use super::platform::Platform;

pub use diagnostics::{diagnose_error, BlockingReason};
pub use traits::{ConnectorProfile, FetchTarget, FetchedStream, PlatformConnector};
pub use ytdlp::YtDlpConnector;

/// Platform to connector lookup. Populated once at startup, read-only afterwards.
#[derive(Default, Clone)]
pub struct ConnectorRegistry {
    connectors: HashMap<Platform, Arc<dyn PlatformConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a yt-dlp connector for every supported platform
    pub fn with_ytdlp(binary: &str, network: &NetworkConfig, max_filesize: Option<u64>) -> Self {
        let mut registry = Self::new();
        for platform in Platform::SUPPORTED {
            let connector = YtDlpConnector::new(binary, platform, network.clone())
                .with_max_filesize(max_filesize);
            registry.register(platform, Arc::new(connector));
        }
        registry
    }

    /// Register (or replace) the connector for `platform`
    pub fn register(&mut self, platform: Platform, connector: Arc<dyn PlatformConnector>) {
        debug!(platform = %platform, connector = connector.name(), "registering connector");
        self.connectors.insert(platform, connector);
    }

    pub fn resolve(&self, platform: Platform) -> Result<Arc<dyn PlatformConnector>, DownloadError> {
        if platform == Platform::Unknown {
            return Err(DownloadError::UnsupportedPlatform);
        }
        self.connectors
            .get(&platform)
            .cloned()
            .ok_or(DownloadError::UnsupportedPlatform)
    }

    pub fn platforms(&self) -> Vec<Platform> {
        Platform::SUPPORTED
            .into_iter()
            .filter(|p| self.connectors.contains_key(p))
            .collect()
    }
}
