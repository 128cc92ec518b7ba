pub mod api;
pub mod config;
pub mod downloader;

use std::sync::Arc;

use tracing::info;

use api::{create_router, AppState};
use config::AppConfig;
use downloader::{
    ConnectorRegistry, FfmpegProcessor, MetadataProber, RetrievalPipeline, ToolLocator, ToolType,
};

/// Wire the engine from configuration: locate tools, register the yt-dlp
/// connectors and build the prober and pipeline.
pub async fn build_state(config: &AppConfig) -> AppState {
    let engine = config.engine.clone();
    let locator = ToolLocator::new(engine.ytdlp_path.clone(), engine.ffmpeg_path.clone());
    let tools = locator.get_all_tools().await;

    let registry = Arc::new(ConnectorRegistry::with_ytdlp(
        &locator.resolve(ToolType::YtDlp),
        &engine.network,
        Some(engine.max_artifact_bytes),
    ));
    let processor = Arc::new(FfmpegProcessor::new(locator.resolve(ToolType::Ffmpeg)));

    let prober = MetadataProber::new(Arc::clone(&registry), engine.probe_timeout);
    let pipeline = RetrievalPipeline::new(registry, processor, engine);

    AppState::new(prober, pipeline, tools)
}

/// Serve the API until `shutdown` resolves.
pub async fn run<F>(config: AppConfig, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let state = build_state(&config).await;
    info!(
        scratch_dir = %config.engine.scratch_dir.display(),
        expiry_secs = config.engine.cache_expiry.as_secs(),
        "engine ready"
    );

    let app = create_router(state, &config.cors_origins);
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
