// Helper functions shared by connectors and post-processing

use std::process::{Output, Stdio};

use thiserror::Error;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration};

/// Maximum length in bytes of a sanitized filename component. Leaves room
/// for the media id, the unique tag and `.video.<ext>` under the usual
/// 255-byte filename limit.
pub const MAX_COMPONENT_BYTES: usize = 150;

/// Failure to run an external command to completion
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {0}s")]
    Timeout(u64),
}

/// Run a command to completion and capture its output.
///
/// The child is killed if the returned future is dropped, so callers can put
/// their own deadline around it.
pub async fn run_output(program: &str, args: &[String]) -> Result<Output, CommandError> {
    TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })
}

/// Run command with timeout (shared utility)
pub async fn run_output_with_timeout(
    program: &str,
    args: &[String],
    timeout_secs: u64,
) -> Result<Output, CommandError> {
    match timeout(Duration::from_secs(timeout_secs), run_output(program, args)).await {
        Ok(result) => result,
        Err(_) => Err(CommandError::Timeout(timeout_secs)),
    }
}

/// Make a media title safe for use as a filename component.
///
/// Path separators, reserved characters and control characters become `_`,
/// runs of whitespace collapse to one space, and the result is capped at
/// `max_bytes` of UTF-8 on a char boundary. An empty result falls back to
/// `"media"`.
pub fn sanitize_filename(title: &str, max_bytes: usize) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = truncate_utf8(collapsed.trim_matches(|c: char| c == '.' || c == ' '), max_bytes)
        .trim_end()
        .to_string();

    if trimmed.is_empty() {
        "media".to_string()
    } else {
        trimmed
    }
}

/// Longest prefix of `value` that fits in `max_bytes` without splitting a char
fn truncate_utf8(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Last non-empty line of tool output, trimmed
pub fn last_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_path_characters() {
        assert_eq!(sanitize_filename("a/b\\c:d", MAX_COMPONENT_BYTES), "a_b_c_d");
        assert_eq!(
            sanitize_filename("../../etc/passwd", MAX_COMPONENT_BYTES),
            "_.._etc_passwd"
        );
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(
            sanitize_filename("  My   Great\tVideo \n", MAX_COMPONENT_BYTES),
            "My Great Video"
        );
    }

    #[test]
    fn test_sanitize_empty_falls_back() {
        assert_eq!(sanitize_filename("", MAX_COMPONENT_BYTES), "media");
        assert_eq!(sanitize_filename("  ...  ", MAX_COMPONENT_BYTES), "media");
    }

    #[test]
    fn test_sanitize_keeps_unicode_and_caps_length() {
        assert_eq!(
            sanitize_filename("Видео 日本", MAX_COMPONENT_BYTES),
            "Видео 日本"
        );
        let long = "x".repeat(300);
        assert_eq!(sanitize_filename(&long, MAX_COMPONENT_BYTES).len(), MAX_COMPONENT_BYTES);
    }

    #[test]
    fn test_sanitize_caps_multibyte_titles_by_bytes() {
        // 3 bytes per char
        let title = "日本語のタイトル".repeat(12);
        let sanitized = sanitize_filename(&title, MAX_COMPONENT_BYTES);
        assert!(sanitized.len() <= MAX_COMPONENT_BYTES);
        assert_eq!(sanitized.chars().count(), 50);
        assert!(title.starts_with(&sanitized));

        let emoji = "🎬".repeat(100);
        assert_eq!(sanitize_filename(&emoji, 10), "🎬🎬");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate_utf8("abc", 10), "abc");
        assert_eq!(truncate_utf8("héllo", 2), "h");
        assert_eq!(truncate_utf8("héllo", 3), "hé");
    }

    #[test]
    fn test_last_line() {
        assert_eq!(last_line(b"one\ntwo\n\n").as_deref(), Some("two"));
        assert_eq!(last_line(b"   \n"), None);
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = run_output_with_timeout("vidgrab-definitely-missing-binary", &[], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
