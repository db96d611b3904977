use anyhow::Result;
use std::path::Path;
use tokio::process::Command;

use ezmp3_core::{config::Config, probe::Prober, Backend};

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    println!("ezmp3 dependency check\n");

    let mut all_ok = true;

    // Check yt-dlp
    print!("yt-dlp:            ");
    match config.yt_dlp_path() {
        Ok(path) => match Command::new(&path).arg("--version").output().await {
            Ok(out) if out.status.success() => {
                let v = String::from_utf8_lossy(&out.stdout);
                println!("OK ({})", v.trim());
            }
            _ => {
                println!("FOUND but failed to get version ({})", path.display());
                all_ok = false;
            }
        },
        Err(_) => {
            println!("NOT FOUND");
            println!("                   Install with: pip install yt-dlp");
            all_ok = false;
        }
    }

    // Check FFmpeg and its MP3 encoder
    print!("ffmpeg:            ");
    match config.ffmpeg_path() {
        Ok(path) => {
            match Command::new(&path).arg("-version").output().await {
                Ok(out) if out.status.success() => {
                    let stdout = String::from_utf8_lossy(&out.stdout);
                    let version = ffmpeg_version(&stdout).unwrap_or("unknown");
                    println!("OK ({})", version);
                }
                _ => {
                    println!("FOUND but failed to get version ({})", path.display());
                    all_ok = false;
                }
            }

            print!("  libmp3lame:      ");
            if Prober::new(path).has_mp3_encoder().await {
                println!("OK");
            } else {
                println!("MISSING");
                println!("                   Every backend encodes through libmp3lame");
                all_ok = false;
            }
        }
        Err(_) => {
            println!("NOT FOUND");
            println!("                   Install with: apt install ffmpeg (or brew install ffmpeg)");
            all_ok = false;
        }
    }

    println!("\nConversion backends (in fallback order):");
    for backend in Backend::ALL {
        let status = if backend.is_compiled_in() {
            "available"
        } else {
            "not compiled in (enable the `segment` feature)"
        };
        println!("  {:<18} {}", backend.to_string(), status);
    }

    println!();
    if all_ok {
        println!("All dependencies OK!");
    } else {
        println!("Some dependencies are missing. See above for installation instructions.");
    }

    Ok(())
}

/// `ffmpeg version 6.1.1 Copyright ...` -> `6.1.1`
fn ffmpeg_version(version_output: &str) -> Option<&str> {
    version_output.lines().next()?.split_whitespace().nth(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_version() {
        let out = "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023 the FFmpeg developers\nbuilt with gcc";
        assert_eq!(ffmpeg_version(out), Some("6.1.1-3ubuntu5"));
        assert_eq!(ffmpeg_version(""), None);
    }
}
