//! Audio file inspection using FFmpeg

use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct AudioInfo {
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub duration: Option<f64>,
    pub codec: Option<String>,
}

#[derive(Debug)]
pub struct Prober {
    ffmpeg_path: PathBuf,
}

impl Prober {
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self { ffmpeg_path }
    }

    /// Read stream info from FFmpeg's banner. `None` if FFmpeg can't be run.
    pub async fn probe(&self, input: &Path) -> Option<AudioInfo> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .arg("-i")
            .arg(input)
            .args(["-f", "null", "-"])
            .output()
            .await;

        let output = match output {
            Ok(out) => out,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                debug!("probe failed for {}: {}", input.display(), e);
                return None;
            }
        };

        // FFmpeg writes stream info to stderr
        let stderr = String::from_utf8_lossy(&output.stderr);
        Some(parse_audio_info(&stderr))
    }

    /// Whether this FFmpeg build can encode MP3.
    pub async fn has_mp3_encoder(&self) -> bool {
        match Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-encoders"])
            .output()
            .await
        {
            Ok(out) => String::from_utf8_lossy(&out.stdout).contains("libmp3lame"),
            Err(_) => false,
        }
    }
}

pub fn parse_audio_info(ffmpeg_output: &str) -> AudioInfo {
    AudioInfo {
        sample_rate: parse_sample_rate(ffmpeg_output),
        channels: parse_channels(ffmpeg_output),
        duration: parse_duration(ffmpeg_output),
        codec: parse_codec(ffmpeg_output),
    }
}

fn audio_stream(ffmpeg_output: &str) -> Option<regex::Captures<'_>> {
    // Looks like "Audio: opus, 48000 Hz, stereo, fltp"
    let re = Regex::new(r"Audio: (\w+)[^,\n]*, (\d+) Hz, ([\w.()]+)").ok()?;
    re.captures(ffmpeg_output)
}

fn parse_codec(ffmpeg_output: &str) -> Option<String> {
    let caps = audio_stream(ffmpeg_output)?;
    Some(caps.get(1)?.as_str().to_string())
}

fn parse_sample_rate(ffmpeg_output: &str) -> Option<u32> {
    let caps = audio_stream(ffmpeg_output)?;
    caps.get(2)?.as_str().parse().ok()
}

fn parse_channels(ffmpeg_output: &str) -> Option<u8> {
    let caps = audio_stream(ffmpeg_output)?;
    match caps.get(3)?.as_str() {
        "mono" => Some(1),
        "stereo" => Some(2),
        layout if layout.starts_with("5.1") => Some(6),
        layout if layout.starts_with("7.1") => Some(8),
        _ => None,
    }
}

fn parse_duration(ffmpeg_output: &str) -> Option<f64> {
    // Looks like "Duration: 00:03:45.12"
    let re = Regex::new(r"Duration: (\d+):(\d+):(\d+)\.(\d+)").ok()?;
    let caps = re.captures(ffmpeg_output)?;

    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    let fraction = caps.get(4)?.as_str();
    let fractional: f64 = format!("0.{}", fraction).parse().ok()?;

    Some(hours * 3600.0 + minutes * 60.0 + seconds + fractional)
}
