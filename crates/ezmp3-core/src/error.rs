//! Error types for ezmp3-core

use crate::converter::Backend;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, JobError>;

/// Coarse failure signals of a job. These are the only errors a UI sees.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] AcquireError),

    #[error("Source file is empty or missing: {}", .0.display())]
    EmptyOrMissingSource(PathBuf),

    #[error("All conversion backends failed: {}", BackendFailures(.0))]
    ConversionExhausted(Vec<BackendFailure>),

    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

impl JobError {
    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            JobError::Acquisition(AcquireError::InvalidUrl(_)) => {
                "That does not look like a single video URL."
            }
            JobError::Acquisition(AcquireError::FetcherNotFound) => {
                "yt-dlp is not installed. Run `ezmp3 doctor` to check dependencies."
            }
            JobError::Acquisition(_) => {
                "Failed to download audio. The video may be unavailable, or the platform \
                 may be temporarily blocking automated downloads."
            }
            JobError::EmptyOrMissingSource(_) => "The downloaded file is empty or does not exist.",
            JobError::ConversionExhausted(_) => "Could not convert the audio file to MP3.",
            JobError::Unexpected(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

impl From<ConvertError> for JobError {
    fn from(e: ConvertError) -> Self {
        match e {
            ConvertError::EmptyOrMissingSource(path) => JobError::EmptyOrMissingSource(path),
            ConvertError::Exhausted(failures) => JobError::ConversionExhausted(failures),
        }
    }
}

impl From<ConfigError> for JobError {
    fn from(e: ConfigError) -> Self {
        JobError::Unexpected(e.to_string())
    }
}

impl From<std::io::Error> for JobError {
    fn from(e: std::io::Error) -> Self {
        JobError::Unexpected(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("yt-dlp not found. Install with: pip install yt-dlp")]
    FetcherNotFound,

    #[error("yt-dlp failed with exit code: {0:?}")]
    FetcherFailed(Option<i32>),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Video unavailable or removed: {0}")]
    VideoUnavailable(String),

    #[error("Request blocked by the platform: {0}")]
    Blocked(String),

    #[error("Video is not available in this region: {0}")]
    GeoRestricted(String),

    #[error("Download produced no audio at {}", .0.display())]
    EmptyDownload(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single conversion backend. Always recovered by trying the next one.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("ffmpeg not found")]
    FfmpegNotFound,

    #[error("ffmpeg exited with code: {0:?}")]
    FfmpegFailed(Option<i32>),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("backend produced an empty file")]
    EmptyOutput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Whether the backend could not run at all, as opposed to running and failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BackendError::Unavailable(_) | BackendError::FfmpegNotFound)
    }
}

/// A backend that was tried and what went wrong.
#[derive(Debug)]
pub struct BackendFailure {
    pub backend: Backend,
    pub error: BackendError,
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.backend, self.error)
    }
}

struct BackendFailures<'a>(&'a [BackendFailure]);

impl fmt::Display for BackendFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no backends configured");
        }
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Source file is empty or missing: {}", .0.display())]
    EmptyOrMissingSource(PathBuf),

    #[error("All conversion backends failed: {}", BackendFailures(.0))]
    Exhausted(Vec<BackendFailure>),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(String),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
