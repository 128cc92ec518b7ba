// Tool locator - finds yt-dlp and ffmpeg and reports their versions

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use super::utils::{run_output_with_timeout, CommandError};

const VERSION_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

/// Resolves tool binaries: explicit override, then well-known install
/// locations, then `PATH`.
pub struct ToolLocator {
    ytdlp_override: Option<String>,
    ffmpeg_override: Option<String>,
}

impl ToolLocator {
    pub fn new(ytdlp_override: Option<String>, ffmpeg_override: Option<String>) -> Self {
        Self {
            ytdlp_override,
            ffmpeg_override,
        }
    }

    /// Path to run the tool with. Falls back to the bare binary name so a
    /// missing tool surfaces as a typed error at call time.
    pub fn resolve(&self, tool: ToolType) -> String {
        self.locate(tool)
            .unwrap_or_else(|| tool.as_str().to_string())
    }

    pub fn locate(&self, tool: ToolType) -> Option<String> {
        let explicit = match tool {
            ToolType::YtDlp => self.ytdlp_override.as_deref(),
            ToolType::Ffmpeg => self.ffmpeg_override.as_deref(),
        };
        if let Some(path) = explicit.filter(|p| !p.trim().is_empty()) {
            return Some(path.to_string());
        }

        let binary_name = tool.as_str();
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name),
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];
        for path in common_paths {
            if Path::new(&path).exists() {
                return Some(path);
            }
        }

        which::which(binary_name)
            .ok()
            .map(|p| p.to_string_lossy().into_owned())
    }

    pub async fn get_tool_info(&self, tool: ToolType) -> ToolInfo {
        let path = self.locate(tool);
        let version = match &path {
            Some(p) => get_version(p, tool).await,
            None => None,
        };

        ToolInfo {
            name: tool.as_str().to_string(),
            tool_type: tool,
            is_available: version.is_some(),
            version,
            path,
        }
    }

    /// Detect every tool once; logs what was found
    pub async fn get_all_tools(&self) -> Vec<ToolInfo> {
        let mut tools = Vec::new();
        for tool in [ToolType::YtDlp, ToolType::Ffmpeg] {
            let info = self.get_tool_info(tool).await;
            if info.is_available {
                info!(
                    tool = %info.name,
                    path = info.path.as_deref().unwrap_or(""),
                    version = info.version.as_deref().unwrap_or(""),
                    "tool detected"
                );
            } else {
                warn!(tool = %info.name, "tool not available; related operations will fail");
            }
            tools.push(info);
        }
        tools
    }
}

async fn get_version(path: &str, tool: ToolType) -> Option<String> {
    let args = vec![tool.version_arg().to_string()];
    match run_output_with_timeout(path, &args, VERSION_TIMEOUT_SECS).await {
        Ok(output) if output.status.success() => {
            let out = String::from_utf8_lossy(&output.stdout);
            parse_version(tool, &out)
        }
        Ok(_) => None,
        Err(CommandError::Timeout(secs)) => {
            warn!(tool = tool.as_str(), secs, "version probe timed out");
            None
        }
        Err(_) => None,
    }
}

/// yt-dlp prints a bare date version; ffmpeg prints a banner whose first line
/// reads `ffmpeg version <v> Copyright ...`.
fn parse_version(tool: ToolType, stdout: &str) -> Option<String> {
    let first = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    match tool {
        ToolType::YtDlp => Some(first.to_string()),
        ToolType::Ffmpeg => first
            .strip_prefix("ffmpeg version ")
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_string)
            .or_else(|| Some(first.to_string())),
    }
}
