use anyhow::Result;
use std::path::Path;
use ezmp3_core::config::Config;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    println!("ezmp3 configuration\n");
    print!("{}", toml::to_string_pretty(&config)?);

    if config.paths.yt_dlp.is_none() || config.paths.ffmpeg.is_none() {
        println!("\n# unset tool paths are looked up on PATH");
    }
    if config.temp.directory.is_none() {
        println!("# job directories go under {}", config.temp_dir().display());
    }

    // Show config file locations
    println!("\nConfig file locations (later wins):");
    if let Some(p) = Config::default_path() {
        println!("  1. {}", p.display());
    }
    if let Some(p) = config_path {
        println!("  2. {} (specified)", p.display());
    }
    println!("  3. Environment variables (EZMP3_*, nested with __)");

    Ok(())
}
