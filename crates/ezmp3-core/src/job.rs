//! One end-to-end acquire-then-convert run in a private workspace

use crate::acquirer::{Acquirer, SourceUrl};
use crate::converter::{Backend, Converter};
use crate::error::{AcquireError, JobError, Result};
use crate::probe::Prober;
use crate::Config;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Well-known name of the downloaded audio inside a job directory.
pub const RAW_FILE_NAME: &str = "audio.webm";
/// Well-known name of the encoded audio, also the delivered file name.
pub const MP3_FILE_NAME: &str = "audio.mp3";
pub const MP3_MIME_TYPE: &str = "audio/mp3";

/// The two files a job works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    pub raw: PathBuf,
    pub mp3: PathBuf,
}

impl JobPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            raw: dir.join(RAW_FILE_NAME),
            mp3: dir.join(MP3_FILE_NAME),
        }
    }
}

/// Job progress stages
#[derive(Debug, Clone)]
pub enum JobStage {
    Acquiring { url: String },
    Converting { title: Option<String>, source_bytes: u64 },
    Complete {
        file_name: String,
        size: u64,
        backend: Backend,
        duration: Option<f64>,
        elapsed: Duration,
    },
    Failed { stage: String, error: String },
}

impl JobStage {
    /// Progress text for the user.
    pub fn message(&self) -> String {
        match self {
            JobStage::Acquiring { .. } => "Downloading audio...".to_string(),
            JobStage::Converting { .. } => "Converting audio to MP3...".to_string(),
            JobStage::Complete { .. } => {
                "Conversion successful! Download your MP3 below:".to_string()
            }
            JobStage::Failed { stage, .. } => format!("Failed during {}", stage),
        }
    }
}

/// The finished MP3, ready to hand to the user.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    pub backend: Backend,
    pub duration: Option<f64>,
}

pub struct Job {
    acquirer: Acquirer,
    converter: Converter,
    prober: Prober,
    temp_root: PathBuf,
    keep_temp: bool,
    progress_tx: mpsc::Sender<JobStage>,
}

impl Job {
    pub fn new(
        acquirer: Acquirer,
        converter: Converter,
        prober: Prober,
        temp_root: PathBuf,
        progress_tx: mpsc::Sender<JobStage>,
    ) -> Self {
        Self {
            acquirer,
            converter,
            prober,
            temp_root,
            keep_temp: false,
            progress_tx,
        }
    }

    /// Build a job from configuration, resolving tool paths.
    pub fn from_config(config: &Config, progress_tx: mpsc::Sender<JobStage>) -> Result<Self> {
        let yt_dlp_path = config
            .yt_dlp_path()
            .map_err(|_| AcquireError::FetcherNotFound)?;
        let ffmpeg_path = config.ffmpeg_path()?;

        let job = Self::new(
            Acquirer::with_config(yt_dlp_path, &config.acquire),
            Converter::new(ffmpeg_path.clone()),
            Prober::new(ffmpeg_path),
            config.temp_dir(),
            progress_tx,
        );
        Ok(job.keep_temp(!config.temp.cleanup))
    }

    /// Keep the job directory after the run (for debugging)
    pub fn keep_temp(mut self, keep: bool) -> Self {
        self.keep_temp = keep;
        self
    }

    /// Acquire `url`, convert it to MP3 and read the result for delivery.
    ///
    /// The job directory and everything in it is removed on every exit path
    /// unless `keep_temp` is set.
    pub async fn run(&self, url: &str) -> Result<Delivery> {
        let start_time = Instant::now();

        let result = match SourceUrl::parse(url) {
            Ok(source) => self.run_in_workspace(&source, start_time).await,
            Err(e) => Err(e.into()),
        };

        if let Err(ref e) = result {
            let _ = self
                .progress_tx
                .send(JobStage::Failed {
                    stage: failed_stage(e).to_string(),
                    error: e.to_string(),
                })
                .await;
        }

        result
    }

    async fn run_in_workspace(&self, source: &SourceUrl, start_time: Instant) -> Result<Delivery> {
        let id = Uuid::new_v4();
        tokio::fs::create_dir_all(&self.temp_root).await?;
        let workspace = tempfile::Builder::new()
            .prefix(&format!("ezmp3-{}-", id.simple()))
            .tempdir_in(&self.temp_root)?;

        info!("Starting job {} for: {}", id, source);
        debug!("Job directory: {}", workspace.path().display());

        let paths = JobPaths::in_dir(workspace.path());
        let result = self.run_stages(source, &paths, start_time).await;

        if self.keep_temp {
            let kept = workspace.keep();
            debug!("Job files kept at: {}", kept.display());
        } else if let Err(e) = workspace.close() {
            warn!("Failed to remove job directory: {}", e);
        }

        result
    }

    async fn run_stages(
        &self,
        source: &SourceUrl,
        paths: &JobPaths,
        start_time: Instant,
    ) -> Result<Delivery> {
        // 1. Acquire
        let _ = self
            .progress_tx
            .send(JobStage::Acquiring {
                url: source.to_string(),
            })
            .await;

        let acquired = self.acquirer.acquire(source, &paths.raw).await?;

        // 2. Convert
        let _ = self
            .progress_tx
            .send(JobStage::Converting {
                title: acquired.info.as_ref().map(|i| i.title.clone()),
                source_bytes: acquired.size,
            })
            .await;

        let conversion = self.converter.convert(&acquired.path, &paths.mp3).await?;
        let duration = self
            .prober
            .probe(&conversion.path)
            .await
            .and_then(|info| info.duration);

        // 3. Read for delivery, then drop the MP3 right away
        let bytes = tokio::fs::read(&conversion.path).await?;
        if bytes.is_empty() {
            return Err(JobError::Unexpected(format!(
                "{} is empty after conversion",
                conversion.path.display()
            )));
        }
        if !self.keep_temp {
            tokio::fs::remove_file(&conversion.path).await?;
        }

        let elapsed = start_time.elapsed();
        info!(
            "Job complete via {} ({} bytes, {:.1}s)",
            conversion.backend,
            bytes.len(),
            elapsed.as_secs_f32()
        );

        let _ = self
            .progress_tx
            .send(JobStage::Complete {
                file_name: MP3_FILE_NAME.to_string(),
                size: bytes.len() as u64,
                backend: conversion.backend,
                duration,
                elapsed,
            })
            .await;

        Ok(Delivery {
            file_name: MP3_FILE_NAME.to_string(),
            mime_type: MP3_MIME_TYPE,
            bytes,
            backend: conversion.backend,
            duration,
        })
    }
}

fn failed_stage(error: &JobError) -> &'static str {
    match error {
        JobError::Acquisition(_) => "download",
        JobError::EmptyOrMissingSource(_) | JobError::ConversionExhausted(_) => "conversion",
        JobError::Unexpected(_) => "job",
    }
}
