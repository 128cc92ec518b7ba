// Post-processing - audio transcode and container mux via ffmpeg

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::errors::DownloadError;
use super::models::AudioTarget;
use super::utils::{last_line, run_output, CommandError};

/// Builder for ffmpeg command lines.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<PathBuf>,
    output: PathBuf,
    output_args: Vec<String>,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            log_level: "error".to_string(),
        }
    }

    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(path.as_ref().to_path_buf());
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Map stream `spec` (e.g. `0:v:0`) into the output
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Copy every mapped stream without re-encoding
    pub fn stream_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-nostdin".to_string(),
            "-v".to_string(),
            self.log_level.clone(),
        ];

        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.to_string_lossy().into_owned());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Transcode and mux boundary of the retrieval pipeline
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Extract the audio of `input` and encode it to `target` at `output`
    async fn transcode_audio(
        &self,
        input: &Path,
        output: &Path,
        target: &AudioTarget,
    ) -> Result<(), DownloadError>;

    /// Combine a video-only and an audio-only file into one container
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), DownloadError>;

    /// Rewrap a single file into another container
    async fn remux(&self, input: &Path, output: &Path) -> Result<(), DownloadError>;
}

/// MediaProcessor backed by the ffmpeg binary
pub struct FfmpegProcessor {
    binary: String,
}

impl FfmpegProcessor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, command: FfmpegCommand) -> Result<(), String> {
        let args = command.build_args();
        debug!(binary = %self.binary, args = %args.join(" "), "running ffmpeg");

        let output = run_output(&self.binary, &args).await.map_err(|e| match e {
            CommandError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                format!("ffmpeg not found at {}", self.binary)
            }
            other => other.to_string(),
        })?;

        if output.status.success() {
            Ok(())
        } else {
            let detail = last_line(&output.stderr)
                .unwrap_or_else(|| format!("ffmpeg exited with {}", output.status));
            warn!(binary = %self.binary, "ffmpeg failed: {}", detail);
            Err(detail)
        }
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn transcode_audio(
        &self,
        input: &Path,
        output: &Path,
        target: &AudioTarget,
    ) -> Result<(), DownloadError> {
        let command = FfmpegCommand::new(output)
            .input(input)
            .no_video()
            .audio_codec(target.codec)
            .audio_bitrate(format!("{}k", target.bitrate_kbps));
        self.run(command).await.map_err(DownloadError::TranscodeFailed)
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), DownloadError> {
        let command = FfmpegCommand::new(output)
            .input(video)
            .input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .stream_copy();
        self.run(command).await.map_err(DownloadError::MuxFailed)
    }

    async fn remux(&self, input: &Path, output: &Path) -> Result<(), DownloadError> {
        let command = FfmpegCommand::new(output).input(input).stream_copy();
        self.run(command).await.map_err(DownloadError::MuxFailed)
    }
}
