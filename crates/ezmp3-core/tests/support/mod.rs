//! Stand-in `yt-dlp` and `ffmpeg` executables that record how they were called.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// How a stand-in behaves for one kind of invocation.
#[derive(Debug, Clone, Copy)]
pub enum Mode {
    /// Write output derived from the input and exit 0
    Ok,
    /// Print an error and exit 1 without writing
    Fail,
    /// Write some bytes, then exit 1
    Partial,
    /// Exit 0 without writing anything
    Empty,
}

fn ffmpeg_action(mode: Mode, backend: &str) -> String {
    match mode {
        Mode::Ok => format!(
            "{{ printf 'ID3-{backend}-'; cat \"$input\"; }} > \"$out\"; exit 0"
        ),
        Mode::Fail => {
            "echo \"$input: Invalid data found when processing input\" >&2; exit 1".to_string()
        }
        Mode::Partial => "printf 'ID3-half' > \"$out\"; exit 1".to_string(),
        Mode::Empty => "exit 0".to_string(),
    }
}

/// Raw PCM decode for the segment backend: two stereo frames of s16le on stdout.
fn ffmpeg_decode_action(mode: Mode) -> String {
    match mode {
        Mode::Ok => "printf '\\000\\100\\000\\300\\000\\100\\000\\300'; exit 0".to_string(),
        Mode::Fail | Mode::Partial => {
            "echo \"$input: Invalid data found when processing input\" >&2; exit 1".to_string()
        }
        Mode::Empty => "exit 0".to_string(),
    }
}

pub struct FakeFfmpeg {
    pub path: PathBuf,
    /// One line per invocation with the full argument list
    pub log: PathBuf,
    /// One line per backend invocation: demux, segment-decode, segment or encoder
    pub calls: PathBuf,
}

impl FakeFfmpeg {
    pub fn install(dir: &Path, demux: Mode, segment: Mode, encoder: Mode) -> Self {
        let path = dir.join("ffmpeg");
        let log = dir.join("ffmpeg.log");
        let calls = dir.join("ffmpeg.calls");

        let script = format!(
            r#"#!/bin/sh
echo "$*" >> '{log}'
out=""
input=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-i" ]; then input="$a"; fi
  out="$a"
  prev="$a"
done
case "$*" in
  *"-f s16le"*)
    echo segment-decode >> '{calls}'
    {decode}
    ;;
esac
case "$out" in
  -)
    echo "  Duration: 00:00:10.00, start: 0.000000, bitrate: 192 kb/s" >&2
    echo "  Stream #0:0: Audio: mp3, 44100 Hz, stereo, fltp, 192 kb/s" >&2
    exit 0
    ;;
  -*)
    exit 0
    ;;
esac
case "$*" in
  *"-map 0:a:0"*) backend=demux ;;
  *"-b:a 192k"*) backend=encoder ;;
  *) backend=segment ;;
esac
echo "$backend" >> '{calls}'
case "$backend" in
  demux) {demux} ;;
  encoder) {encoder} ;;
  *) {segment} ;;
esac
"#,
            log = log.display(),
            calls = calls.display(),
            demux = ffmpeg_action(demux, "demux"),
            segment = ffmpeg_action(segment, "segment"),
            decode = ffmpeg_decode_action(segment),
            encoder = ffmpeg_action(encoder, "encoder"),
        );
        write_executable(&path, &script);

        Self { path, log, calls }
    }

    /// Backends that reached ffmpeg, in order.
    pub fn calls(&self) -> Vec<String> {
        read_lines(&self.calls)
    }

    pub fn invocations(&self) -> Vec<String> {
        read_lines(&self.log)
    }

    pub fn was_invoked(&self) -> bool {
        self.log.exists()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FetchMode {
    Ok,
    Removed,
    Blocked,
    EmptyFile,
}

pub struct FakeYtDlp {
    pub path: PathBuf,
    pub log: PathBuf,
}

impl FakeYtDlp {
    pub fn install(dir: &Path, mode: FetchMode) -> Self {
        let path = dir.join("yt-dlp");
        let log = dir.join("yt-dlp.log");

        let action = match mode {
            FetchMode::Ok => concat!(
                "printf 'webm-audio-ten-seconds' > \"$out\"\n",
                "echo '{\"id\":\"abc\",\"title\":\"Ten Seconds\",\"duration\":10.0,\"ext\":\"webm\"}'\n",
                "exit 0"
            ),
            FetchMode::Removed => concat!(
                "echo 'ERROR: [generic] abc: Video unavailable. This video has been removed by the uploader' >&2\n",
                "exit 1"
            ),
            FetchMode::Blocked => concat!(
                "echo 'ERROR: unable to download webpage: HTTP Error 429: Too Many Requests' >&2\n",
                "exit 1"
            ),
            FetchMode::EmptyFile => ": > \"$out\"\nexit 0",
        };

        let script = format!(
            r#"#!/bin/sh
echo "$*" >> '{log}'
out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
{action}
"#,
            log = log.display(),
        );
        write_executable(&path, &script);

        Self { path, log }
    }

    pub fn invocations(&self) -> Vec<String> {
        read_lines(&self.log)
    }
}

fn write_executable(path: &Path, script: &str) {
    std::fs::write(path, script).unwrap();
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|s| s.lines().map(String::from).collect())
        .unwrap_or_default()
}

/// Write a short stereo sine tone as 16-bit WAV.
pub fn write_tone(path: &Path, seconds: u32) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for n in 0..(8000 * seconds) {
        let t = n as f32 / 8000.0;
        let v = ((t * 440.0 * std::f32::consts::TAU).sin() * 8000.0) as i16;
        writer.write_sample(v).unwrap();
        writer.write_sample(v).unwrap();
    }
    writer.finalize().unwrap();
}

/// Names of all entries in `dir`, sorted.
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
