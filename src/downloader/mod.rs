// Downloader module - extraction and retrieval engine

pub mod config;
pub mod connectors;
pub mod errors;
pub mod format_selector;
pub mod janitor;
pub mod models;
pub mod pipeline;
pub mod platform;
pub mod postprocess;
pub mod prober;
pub mod tools;
pub mod utils;

pub use config::EngineConfig;
pub use connectors::{ConnectorRegistry, PlatformConnector};
pub use errors::{DownloadError, Stage};
pub use format_selector::{FormatSelector, StreamSpec};
pub use janitor::{Janitor, SweepReport};
pub use models::{MediaManifest, NetworkConfig, Quality, RetrievalResult, SourceRequest};
pub use pipeline::RetrievalPipeline;
pub use platform::{classify, Platform};
pub use postprocess::{FfmpegProcessor, MediaProcessor};
pub use prober::MetadataProber;
pub use tools::{ToolInfo, ToolLocator, ToolType};
