//! MP3 conversion with an ordered chain of fallback backends
//!
//! Every backend renders into a private staging file next to the target and the
//! staged file is only moved onto the target once the backend has succeeded and
//! produced a non-empty file. A failing backend never leaves a half-written
//! target behind.

use crate::error::{BackendError, BackendFailure, ConvertError};
use crate::segment;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Parameters of the direct encoder invocation.
pub const ENCODER_SAMPLE_RATE: u32 = 44_100;
pub const ENCODER_CHANNELS: u16 = 2;
pub const ENCODER_BITRATE: &str = "192k";

/// Conversion strategy. Order in [`Backend::ALL`] is the fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Open the input as a container, take its audio stream, re-encode to MP3
    ContainerDemux,
    /// Decode to an in-memory segment, then export as MP3
    SegmentTranscode,
    /// Run the encoder process directly with fixed parameters
    ExternalEncoder,
}

impl Backend {
    pub const ALL: [Backend; 3] = [
        Backend::ContainerDemux,
        Backend::SegmentTranscode,
        Backend::ExternalEncoder,
    ];

    /// Whether this build carries everything the backend needs in-process.
    pub fn is_compiled_in(&self) -> bool {
        match self {
            Backend::SegmentTranscode => segment::AVAILABLE,
            Backend::ContainerDemux | Backend::ExternalEncoder => true,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "container-demux" | "demux" => Some(Backend::ContainerDemux),
            "segment-transcode" | "segment" => Some(Backend::SegmentTranscode),
            "external-encoder" | "encoder" => Some(Backend::ExternalEncoder),
            _ => None,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::ContainerDemux => write!(f, "container-demux"),
            Backend::SegmentTranscode => write!(f, "segment-transcode"),
            Backend::ExternalEncoder => write!(f, "external-encoder"),
        }
    }
}

/// Outcome of a successful conversion.
#[derive(Debug)]
pub struct Conversion {
    pub path: PathBuf,
    pub size: u64,
    pub backend: Backend,
    /// Backends tried before the successful one
    pub failures: Vec<BackendFailure>,
}

#[derive(Debug)]
pub struct Converter {
    ffmpeg_path: PathBuf,
    chain: Vec<Backend>,
}

impl Converter {
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self::with_chain(ffmpeg_path, Backend::ALL.to_vec())
    }

    /// Converter that only tries `chain`, in the given order
    pub fn with_chain(ffmpeg_path: PathBuf, chain: Vec<Backend>) -> Self {
        Self { ffmpeg_path, chain }
    }

    pub fn chain(&self) -> &[Backend] {
        &self.chain
    }

    /// Convert `input` to MP3 at `output`, stopping at the first backend that succeeds.
    pub async fn convert(&self, input: &Path, output: &Path) -> Result<Conversion, ConvertError> {
        check_source(input).await?;

        let mut failures = Vec::new();

        for &backend in &self.chain {
            info!("Converting with {}", backend);

            match self.attempt(backend, input, output).await {
                Ok(size) => {
                    info!("Converted with {} to: {}", backend, output.display());
                    return Ok(Conversion {
                        path: output.to_path_buf(),
                        size,
                        backend,
                        failures,
                    });
                }
                Err(error) => {
                    if error.is_unavailable() {
                        warn!("{} unavailable, trying next backend: {}", backend, error);
                    } else {
                        warn!("{} failed, trying next backend: {}", backend, error);
                    }
                    failures.push(BackendFailure { backend, error });
                }
            }
        }

        Err(ConvertError::Exhausted(failures))
    }

    async fn attempt(&self, backend: Backend, input: &Path, output: &Path) -> Result<u64, BackendError> {
        // Dropping the staging path on any early return deletes it
        let staged = staging_path(output)?;

        match backend {
            Backend::ContainerDemux => self.container_demux(input, &staged).await?,
            Backend::SegmentTranscode => segment::transcode(&self.ffmpeg_path, input, &staged).await?,
            Backend::ExternalEncoder => self.external_encoder(input, &staged).await?,
        }

        let size = tokio::fs::metadata(&staged).await?.len();
        if size == 0 {
            return Err(BackendError::EmptyOutput);
        }

        staged.persist(output).map_err(|e| BackendError::Io(e.error))?;
        Ok(size)
    }

    async fn container_demux(&self, input: &Path, staged: &Path) -> Result<(), BackendError> {
        let ffmpeg = self.ffmpeg_path.clone();
        let input = input.to_path_buf();
        let staged = staged.to_path_buf();

        tokio::task::spawn_blocking(move || demux_reencode(&ffmpeg, &input, &staged))
            .await
            .map_err(|e| BackendError::Encode(format!("demux task aborted: {e}")))?
    }

    async fn external_encoder(&self, input: &Path, staged: &Path) -> Result<(), BackendError> {
        let sample_rate = ENCODER_SAMPLE_RATE.to_string();
        let channels = ENCODER_CHANNELS.to_string();

        let result = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-vn")
            .args(["-ar", &sample_rate])
            .args(["-ac", &channels])
            .args(["-b:a", ENCODER_BITRATE])
            .arg(staged)
            .output()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(BackendError::FfmpegNotFound),
            Err(e) => return Err(BackendError::Io(e)),
        };

        if !out.status.success() {
            debug!("ffmpeg stderr: {}", String::from_utf8_lossy(&out.stderr));
            return Err(BackendError::FfmpegFailed(out.status.code()));
        }

        Ok(())
    }
}

/// Runs on a blocking thread: ffmpeg-sidecar drives the child synchronously.
fn demux_reencode(ffmpeg: &Path, input: &Path, staged: &Path) -> Result<(), BackendError> {
    let mut child = FfmpegCommand::new_with_path(ffmpeg)
        .hide_banner()
        .overwrite()
        .input(input)
        .args(["-map", "0:a:0", "-vn"])
        .args(["-c:a", "libmp3lame"])
        // Deterministic bytes for a fixed input
        .args(["-map_metadata", "-1", "-fflags", "+bitexact", "-flags:a", "+bitexact"])
        .args(["-f", "mp3"])
        .output(staged)
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => BackendError::FfmpegNotFound,
            _ => BackendError::Io(e),
        })?;

    let events = child
        .iter()
        .map_err(|e| BackendError::Encode(e.to_string()))?;

    let mut last_error = None;
    for event in events {
        match event {
            FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, msg) | FfmpegEvent::Error(msg) => {
                debug!("[ffmpeg] {}", msg);
                last_error = Some(msg);
            }
            FfmpegEvent::Log(_, msg) => debug!("[ffmpeg] {}", msg),
            _ => {}
        }
    }

    let status = child.wait()?;
    if !status.success() {
        if let Some(msg) = last_error {
            debug!("container demux last error: {}", msg);
        }
        return Err(BackendError::FfmpegFailed(status.code()));
    }

    Ok(())
}

async fn check_source(input: &Path) -> Result<(), ConvertError> {
    match tokio::fs::metadata(input).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => {
            warn!("Source is empty or missing: {}", input.display());
            Err(ConvertError::EmptyOrMissingSource(input.to_path_buf()))
        }
    }
}

/// Fresh staging file in the target's directory, removed when dropped.
fn staging_path(output: &Path) -> Result<TempPath, BackendError> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let file = tempfile::Builder::new()
        .prefix(".ezmp3-")
        .suffix(".mp3")
        .tempfile_in(dir)?;

    Ok(file.into_temp_path())
}
