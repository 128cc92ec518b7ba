// Metadata prober - manifest retrieval without transferring payload bytes

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::connectors::{ConnectorRegistry, PlatformConnector};
use super::errors::{DownloadError, Stage};
use super::models::{MediaManifest, ProbedMedia};
use super::platform::{classify, Platform};

pub struct MetadataProber {
    registry: Arc<ConnectorRegistry>,
    probe_timeout: Duration,
}

impl MetadataProber {
    pub fn new(registry: Arc<ConnectorRegistry>, probe_timeout: Duration) -> Self {
        Self {
            registry,
            probe_timeout,
        }
    }

    /// Classify `url`, probe it and shape the result into a manifest.
    pub async fn probe(&self, url: &str) -> Result<MediaManifest, DownloadError> {
        let platform = classify(url);
        let connector = self.registry.resolve(platform)?;

        let probed = probe_media(connector.as_ref(), url, self.probe_timeout).await?;
        info!(
            platform = %platform,
            id = %probed.id,
            renditions = probed.renditions.len(),
            "metadata probed"
        );

        Ok(MediaManifest::from_probed(probed, platform, url))
    }
}

/// Run a connector probe under a deadline, normalising every failure to a
/// probe-stage error.
pub(crate) async fn probe_media(
    connector: &dyn PlatformConnector,
    url: &str,
    limit: Duration,
) -> Result<ProbedMedia, DownloadError> {
    let platform: Platform = connector.platform();

    match tokio::time::timeout(limit, connector.probe_metadata(url)).await {
        Ok(Ok(probed)) => Ok(probed),
        Ok(Err(e)) => {
            warn!(platform = %platform, connector = connector.name(), error = %e, "probe failed");
            Err(match e {
                DownloadError::ProbeFailed(_) | DownloadError::ToolNotFound(_) => e,
                other => DownloadError::ProbeFailed(other.to_string()),
            })
        }
        Err(_) => {
            warn!(platform = %platform, secs = limit.as_secs(), "probe timed out");
            Err(DownloadError::Timeout {
                stage: Stage::Probe,
                secs: limit.as_secs(),
            })
        }
    }
}
