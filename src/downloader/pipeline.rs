// Retrieval pipeline - probe, select, fetch, post-process, verify
//
// Every retrieval writes under a unique stem:
//   <sanitized title>_<media id>_<8 hex>[.video|.audio].<ext>
// so concurrent retrievals never collide and a failed one can be swept by
// stem without touching anybody else's files.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::EngineConfig;
use super::connectors::{ConnectorRegistry, FetchTarget, FetchedStream, PlatformConnector};
use super::errors::{DownloadError, Stage};
use super::format_selector::{FormatSelector, RenditionSpec, SelectionPolicy, StreamSpec};
use super::janitor::Janitor;
use super::models::{ProbedMedia, RetrievalResult, SourceRequest};
use super::platform::{classify, Platform};
use super::postprocess::MediaProcessor;
use super::prober::probe_media;
use super::utils::{sanitize_filename, MAX_COMPONENT_BYTES};

pub struct RetrievalPipeline {
    registry: Arc<ConnectorRegistry>,
    processor: Arc<dyn MediaProcessor>,
    janitor: Janitor,
    config: EngineConfig,
}

/// Final location plus the extension the artifact must end up with
struct Produced {
    path: PathBuf,
    forced_ext: String,
}

impl RetrievalPipeline {
    pub fn new(
        registry: Arc<ConnectorRegistry>,
        processor: Arc<dyn MediaProcessor>,
        config: EngineConfig,
    ) -> Self {
        let janitor = Janitor::new(config.scratch_dir.clone(), config.cache_expiry);
        Self {
            registry,
            processor,
            janitor,
            config,
        }
    }

    pub fn janitor(&self) -> &Janitor {
        &self.janitor
    }

    pub async fn retrieve(
        &self,
        request: &SourceRequest,
    ) -> Result<RetrievalResult, DownloadError> {
        // Fire-and-forget; coalesced inside the janitor
        let _ = self.janitor.spawn_sweep();

        let platform = classify(request.url());
        if platform == Platform::Unknown {
            return Err(DownloadError::UnsupportedPlatform);
        }
        let connector = self.registry.resolve(platform)?;

        info!(
            platform = %platform,
            quality = request.quality().as_str(),
            container = request.container(),
            audio_only = request.audio_only(),
            "retrieval started"
        );

        tokio::fs::create_dir_all(&self.config.scratch_dir).await?;

        let probed =
            probe_media(connector.as_ref(), request.url(), self.config.probe_timeout).await?;

        let policy = SelectionPolicy {
            quality: request.quality(),
            container: request.container(),
            audio_only: request.audio_only(),
        };
        let spec = FormatSelector::select(&probed.renditions, &policy, connector.capabilities())?;
        debug!(?spec, "streams selected");

        let stem = unique_stem(&probed);
        let produced = match self.produce(connector.as_ref(), request, &spec, &stem).await {
            Ok(p) => p,
            Err(e) => {
                warn!(platform = %platform, error = %e, "retrieval failed, cleaning up");
                remove_by_stem(&self.config.scratch_dir, &stem).await;
                return Err(e);
            }
        };

        let (path, size_bytes) = match self.verify(&produced, &stem).await {
            Ok(found) => found,
            Err(e) => {
                remove_by_stem(&self.config.scratch_dir, &stem).await;
                return Err(e);
            }
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| stem.clone());

        info!(
            platform = %platform,
            file = %filename,
            size_bytes,
            "retrieval finished"
        );

        Ok(RetrievalResult {
            local_path: path,
            filename,
            title: probed.title,
            size_bytes,
            duration_seconds: probed.duration_seconds,
            container_format: produced.forced_ext,
            platform,
        })
    }

    /// Fetch the selected streams and run whatever post-processing they need.
    async fn produce(
        &self,
        connector: &dyn PlatformConnector,
        request: &SourceRequest,
        spec: &StreamSpec,
        stem: &str,
    ) -> Result<Produced, DownloadError> {
        let dir = &self.config.scratch_dir;
        let container = request.container();

        match spec {
            StreamSpec::Audio { source, target } => {
                let fetch_target = FetchTarget::new(dir, format!("{stem}.audio"));
                let fetched = self.fetch(connector, request.url(), source, &fetch_target).await?;
                let output = dir.join(format!("{}.{}", stem, target.extension));

                self.postprocess(
                    Stage::Transcode,
                    self.processor.transcode_audio(&fetched.path, &output, target),
                )
                .await?;
                remove_quietly(&fetched.path).await;

                Ok(Produced {
                    path: output,
                    forced_ext: target.extension.to_string(),
                })
            }
            StreamSpec::Split { video, audio } => {
                let video_target = FetchTarget::new(dir, format!("{stem}.video"));
                let video_file = self
                    .fetch(connector, request.url(), video, &video_target)
                    .await?;
                let audio_target = FetchTarget::new(dir, format!("{stem}.audio"));
                let audio_file = self
                    .fetch(connector, request.url(), audio, &audio_target)
                    .await?;
                let output = dir.join(format!("{}.{}", stem, container));

                self.postprocess(
                    Stage::Mux,
                    self.processor.mux(&video_file.path, &audio_file.path, &output),
                )
                .await?;
                remove_quietly(&video_file.path).await;
                remove_quietly(&audio_file.path).await;

                Ok(Produced {
                    path: output,
                    forced_ext: container.to_string(),
                })
            }
            StreamSpec::Single { rendition } => {
                let fetched = self
                    .fetch(connector, request.url(), rendition, &FetchTarget::new(dir, stem))
                    .await?;

                if fetched.ext == container || fetched.ext.is_empty() {
                    return Ok(Produced {
                        path: fetched.path,
                        forced_ext: container.to_string(),
                    });
                }

                debug!(from = %fetched.ext, to = container, "remuxing into requested container");
                let output = dir.join(format!("{}.{}", stem, container));
                self.postprocess(Stage::Mux, self.processor.remux(&fetched.path, &output))
                    .await?;
                remove_quietly(&fetched.path).await;

                Ok(Produced {
                    path: output,
                    forced_ext: container.to_string(),
                })
            }
        }
    }

    async fn fetch(
        &self,
        connector: &dyn PlatformConnector,
        url: &str,
        rendition: &RenditionSpec,
        target: &FetchTarget,
    ) -> Result<FetchedStream, DownloadError> {
        let limit = self.config.transfer_timeout;
        debug!(format = %rendition.selector, stem = %target.stem, "fetching stream");

        match tokio::time::timeout(limit, connector.fetch_stream(url, rendition, target)).await {
            Ok(result) => result,
            Err(_) => Err(timeout_error(Stage::Transfer, limit)),
        }
    }

    async fn postprocess<F>(&self, stage: Stage, work: F) -> Result<(), DownloadError>
    where
        F: Future<Output = Result<(), DownloadError>>,
    {
        let limit = self.config.postprocess_timeout;
        match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => Err(timeout_error(stage, limit)),
        }
    }

    /// Two-step lookup: the path the pipeline produced, else the stem with the
    /// forced extension. The artifact must be a non-empty regular file within
    /// the size limit.
    async fn verify(
        &self,
        produced: &Produced,
        stem: &str,
    ) -> Result<(PathBuf, u64), DownloadError> {
        let fallback = self
            .config
            .scratch_dir
            .join(format!("{}.{}", stem, produced.forced_ext));

        let mut found = None;
        for candidate in [&produced.path, &fallback] {
            if let Ok(meta) = tokio::fs::metadata(candidate).await {
                if meta.is_file() && meta.len() > 0 {
                    found = Some((candidate.clone(), meta.len()));
                    break;
                }
            }
        }

        let (path, size) =
            found.ok_or_else(|| DownloadError::ArtifactMissing(fallback.clone()))?;

        if size > self.config.max_artifact_bytes {
            warn!(
                path = %path.display(),
                size,
                limit = self.config.max_artifact_bytes,
                "artifact too large"
            );
            remove_quietly(&path).await;
            return Err(DownloadError::ArtifactTooLarge {
                size,
                limit: self.config.max_artifact_bytes,
            });
        }

        Ok((path, size))
    }
}

fn timeout_error(stage: Stage, limit: Duration) -> DownloadError {
    warn!(%stage, secs = limit.as_secs(), "stage timed out");
    DownloadError::Timeout {
        stage,
        secs: limit.as_secs(),
    }
}

/// Media ids are short in practice; cap them so the stem stays bounded
const MAX_ID_BYTES: usize = 40;

fn unique_stem(probed: &ProbedMedia) -> String {
    let tag = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}",
        sanitize_filename(&probed.title, MAX_COMPONENT_BYTES),
        sanitize_filename(&probed.id, MAX_ID_BYTES),
        &tag[..8]
    )
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove intermediate file");
        }
    }
}

/// Best-effort removal of every file this retrieval wrote
async fn remove_by_stem(dir: &Path, stem: &str) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().starts_with(stem) {
            remove_quietly(&entry.path()).await;
        }
    }
}
