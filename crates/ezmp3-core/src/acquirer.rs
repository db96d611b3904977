//! Remote audio acquisition using yt-dlp

use crate::config::{AcquireConfig, DEFAULT_FORMAT, DEFAULT_USER_AGENT};
use crate::error::AcquireError;
use serde::Deserialize;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

/// A syntactically plausible single-video URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrl(Url);

impl SourceUrl {
    pub fn parse(input: &str) -> Result<Self, AcquireError> {
        let trimmed = input.trim();
        let url = Url::parse(trimmed).map_err(|_| AcquireError::InvalidUrl(trimmed.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(AcquireError::InvalidUrl(trimmed.to_string()));
        }
        match url.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => return Err(AcquireError::InvalidUrl(trimmed.to_string())),
        }

        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Info record yt-dlp prints for the fetched item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
}

#[derive(Debug)]
pub struct AcquiredAudio {
    pub path: PathBuf,
    pub size: u64,
    pub info: Option<VideoInfo>,
}

#[derive(Debug)]
pub struct Acquirer {
    yt_dlp_path: PathBuf,
    format: String,
    user_agent: String,
}

impl Acquirer {
    pub fn new(yt_dlp_path: PathBuf) -> Self {
        Self {
            yt_dlp_path,
            format: DEFAULT_FORMAT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_config(yt_dlp_path: PathBuf, config: &AcquireConfig) -> Self {
        Self {
            yt_dlp_path,
            format: config.format.clone(),
            user_agent: config.user_agent.clone(),
        }
    }

    /// Fetch the best audio stream of `source` into `output`, overwriting it.
    ///
    /// On failure `output` may be absent or partial; callers must not trust it.
    pub async fn acquire(
        &self,
        source: &SourceUrl,
        output: &Path,
    ) -> Result<AcquiredAudio, AcquireError> {
        info!("Downloading audio from: {}", source);

        let result = Command::new(&self.yt_dlp_path)
            .args(["-f", &self.format])
            // A playlist URL yields at most the single referenced item
            .arg("--no-playlist")
            .args(["--user-agent", &self.user_agent])
            .arg("--force-overwrites")
            .args(["--no-part", "--no-progress"])
            // Print the info JSON but still download
            .args(["--dump-json", "--no-simulate"])
            .arg("-o")
            .arg(output)
            .arg("--")
            .arg(source.as_str())
            .output()
            .await;

        let output_result = match result {
            Ok(out) => out,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(AcquireError::FetcherNotFound),
            Err(e) => return Err(AcquireError::Io(e)),
        };

        if !output_result.status.success() {
            let stderr = String::from_utf8_lossy(&output_result.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            return Err(classify_failure(source, &stderr, output_result.status.code()));
        }

        let size = match tokio::fs::metadata(output).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => meta.len(),
            _ => return Err(AcquireError::EmptyDownload(output.to_path_buf())),
        };

        let stdout = String::from_utf8_lossy(&output_result.stdout);
        let info = parse_info(&stdout);
        if let Some(ref info) = info {
            debug!("Downloaded: {} ({})", info.title, info.id);
        }

        info!("Downloaded {} bytes to {}", size, output.display());

        Ok(AcquiredAudio {
            path: output.to_path_buf(),
            size,
            info,
        })
    }
}

fn parse_info(stdout: &str) -> Option<VideoInfo> {
    let line = stdout.lines().find(|l| l.trim_start().starts_with('{'))?;
    match serde_json::from_str(line) {
        Ok(info) => Some(info),
        Err(e) => {
            warn!("Ignoring unparsable yt-dlp info record: {}", e);
            None
        }
    }
}

/// Map yt-dlp's stderr onto a failure kind.
fn classify_failure(source: &SourceUrl, stderr: &str, code: Option<i32>) -> AcquireError {
    let lower = stderr.to_lowercase();
    let url = source.to_string();

    if lower.contains("is not a valid url") || lower.contains("unsupported url") {
        return AcquireError::InvalidUrl(url);
    }
    if lower.contains("available in your country")
        || lower.contains("geo restriction")
        || lower.contains("geo-restricted")
    {
        return AcquireError::GeoRestricted(url);
    }
    if lower.contains("video unavailable")
        || lower.contains("private video")
        || lower.contains("has been removed")
        || lower.contains("http error 404")
        || lower.contains("this video is no longer available")
    {
        return AcquireError::VideoUnavailable(url);
    }
    if lower.contains("http error 429")
        || lower.contains("http error 403")
        || lower.contains("sign in to confirm")
        || lower.contains("too many requests")
    {
        return AcquireError::Blocked(url);
    }

    AcquireError::FetcherFailed(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceUrl {
        SourceUrl::parse("https://video.example/watch?id=abc").unwrap()
    }

    #[test]
    fn test_source_url_validation() {
        assert!(SourceUrl::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
        assert!(SourceUrl::parse("  https://youtu.be/dQw4w9WgXcQ ").is_ok());
        assert!(SourceUrl::parse("http://video.example/watch?id=abc").is_ok());
        assert!(SourceUrl::parse("ftp://video.example/abc").is_err());
        assert!(SourceUrl::parse("not a url").is_err());
        assert!(SourceUrl::parse("").is_err());
        assert!(SourceUrl::parse("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_classify_failure() {
        let cases = [
            ("ERROR: [youtube] abc: Video unavailable", "unavailable"),
            ("ERROR: [youtube] abc: Private video. Sign in if you've been granted access", "unavailable"),
            ("ERROR: unable to download webpage: HTTP Error 429: Too Many Requests", "blocked"),
            ("ERROR: [youtube] abc: Sign in to confirm you're not a bot", "blocked"),
            ("ERROR: The uploader has not made this video available in your country", "geo"),
            ("ERROR: 'abc' is not a valid URL", "invalid"),
            ("ERROR: something else entirely", "other"),
        ];

        for (stderr, expected) in cases {
            let kind = match classify_failure(&source(), stderr, Some(1)) {
                AcquireError::VideoUnavailable(_) => "unavailable",
                AcquireError::Blocked(_) => "blocked",
                AcquireError::GeoRestricted(_) => "geo",
                AcquireError::InvalidUrl(_) => "invalid",
                AcquireError::FetcherFailed(Some(1)) => "other",
                other => panic!("unexpected classification: {other:?}"),
            };
            assert_eq!(kind, expected, "stderr: {stderr}");
        }
    }

    #[test]
    fn test_parse_info_is_lenient() {
        let info = parse_info("[info] noise\n{\"id\":\"abc\",\"title\":\"Clip\",\"duration\":10.0,\"ext\":\"webm\"}\n")
            .unwrap();
        assert_eq!(info.id, "abc");
        assert_eq!(info.duration, Some(10.0));

        assert!(parse_info("").is_none());
        assert!(parse_info("{not json").is_none());
    }
}
