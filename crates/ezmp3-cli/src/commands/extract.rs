use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::args::ExtractOptions;
use ezmp3_core::{
    config::Config,
    error::JobError,
    job::{Job, JobStage},
};

pub async fn run(url: &str, options: &ExtractOptions, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    let output_dir = options
        .output
        .clone()
        .unwrap_or_else(|| config.output.directory.clone());

    // Create progress channel
    let (tx, mut rx) = mpsc::channel(32);

    let job = Job::from_config(&config, tx)
        .map_err(report)?
        .keep_temp(options.keep_temp || !config.temp.cleanup);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template(
        "{spinner:.cyan} [{elapsed_precise}] {msg}",
    )?);
    pb.enable_steady_tick(Duration::from_millis(100));

    // Spawn progress handler
    let progress_handle = tokio::spawn(async move {
        while let Some(stage) = rx.recv().await {
            match &stage {
                JobStage::Acquiring { .. } => pb.set_message(stage.message()),
                JobStage::Converting { title, .. } => match title {
                    Some(title) => {
                        pb.set_message(format!("{} ({})", stage.message(), truncate(title, 40)))
                    }
                    None => pb.set_message(stage.message()),
                },
                JobStage::Complete {
                    backend,
                    duration,
                    elapsed,
                    ..
                } => {
                    let length = duration
                        .map(|d| format!(", {:.1}s of audio", d))
                        .unwrap_or_default();
                    pb.finish_with_message(format!(
                        "{} (via {}{}, took {:.1}s)",
                        stage.message(),
                        backend,
                        length,
                        elapsed.as_secs_f32()
                    ));
                }
                JobStage::Failed { .. } => pb.abandon_with_message(stage.message()),
            }
        }
    });

    let result = job.run(url).await;

    // Closing the channel lets the progress handler finish
    drop(job);
    progress_handle.await?;

    match result {
        Ok(delivery) => {
            tokio::fs::create_dir_all(&output_dir)
                .await
                .with_context(|| format!("Failed to create {}", output_dir.display()))?;
            let target = output_dir.join(&delivery.file_name);
            tokio::fs::write(&target, &delivery.bytes)
                .await
                .with_context(|| format!("Failed to save {}", target.display()))?;

            println!("\nSaved: {} ({})", target.display(), delivery.mime_type);
            Ok(())
        }
        Err(e) => Err(report(e)),
    }
}

/// Log the detailed cause; the user sees the short message.
fn report(error: JobError) -> anyhow::Error {
    tracing::error!("{}", error);
    anyhow::anyhow!(error.user_message())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezmp3_core::error::AcquireError;

    #[test]
    fn test_report_shows_the_short_message() {
        let err = report(JobError::from(AcquireError::FetcherNotFound));
        assert_eq!(
            err.to_string(),
            "yt-dlp is not installed. Run `ezmp3 doctor` to check dependencies."
        );

        let err = report(JobError::Unexpected("ffmpeg not found in PATH".to_string()));
        assert_eq!(err.to_string(), "An unexpected error occurred. Please try again.");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 40), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        assert_eq!(truncate("ééééééééé", 6), "ééé...");
    }
}
