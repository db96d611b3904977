use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use ezmp3_core::{config::Config, Backend, Converter};

pub async fn run(
    input: &Path,
    output: Option<&Path>,
    backends: &[Backend],
    config_path: Option<&Path>,
) -> Result<()> {
    let config = Config::load(config_path)?;
    let ffmpeg_path = config.ffmpeg_path()?;

    let converter = if backends.is_empty() {
        Converter::new(ffmpeg_path)
    } else {
        Converter::with_chain(ffmpeg_path, backends.to_vec())
    };

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output(input));
    if output == input {
        bail!("Output would overwrite the input: {}", input.display());
    }

    let start = Instant::now();
    let conversion = converter.convert(input, &output).await?;

    for failure in &conversion.failures {
        println!("  skipped {}", failure);
    }
    println!(
        "Converted with {} in {:.1}s: {} ({} bytes)",
        conversion.backend,
        start.elapsed().as_secs_f32(),
        conversion.path.display(),
        conversion.size
    );

    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("mp3")
}
