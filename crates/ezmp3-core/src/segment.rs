//! Segment transcode: decode to memory, export through ffmpeg
//!
//! Decoding uses symphonia where it can read the input and otherwise asks
//! ffmpeg for raw PCM. symphonia has no Opus decoder, so WebM/Opus lands on
//! the ffmpeg route. Compiled only with the `segment` feature. Without it the
//! backend reports itself unavailable and the converter moves on.

use crate::error::BackendError;
use std::path::Path;
#[cfg(feature = "segment")]
use tracing::debug;

/// Whether the segment backend was compiled in.
pub const AVAILABLE: bool = cfg!(feature = "segment");

#[cfg(feature = "segment")]
pub use imp::AudioSegment;

/// Decode `input` and export it as MP3 at `output`.
#[cfg(feature = "segment")]
pub async fn transcode(ffmpeg: &Path, input: &Path, output: &Path) -> Result<(), BackendError> {
    let source = input.to_path_buf();
    let native = tokio::task::spawn_blocking(move || AudioSegment::from_file(&source))
        .await
        .map_err(|e| BackendError::Decode(format!("decode task aborted: {e}")))?;

    let segment = match native {
        Ok(segment) => segment,
        Err(e) => {
            debug!("symphonia cannot decode {} ({}), decoding with ffmpeg", input.display(), e);
            AudioSegment::from_ffmpeg(ffmpeg, input).await?
        }
    };

    segment.export_mp3(ffmpeg, output).await
}

#[cfg(not(feature = "segment"))]
pub async fn transcode(_ffmpeg: &Path, _input: &Path, _output: &Path) -> Result<(), BackendError> {
    Err(BackendError::Unavailable(
        "built without the `segment` feature".to_string(),
    ))
}

#[cfg(feature = "segment")]
mod imp {
    use crate::converter::{ENCODER_CHANNELS, ENCODER_SAMPLE_RATE};
    use crate::error::BackendError;
    use std::fs::File;
    use std::io::ErrorKind;
    use std::path::Path;
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
    pub use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;
    use tokio::process::Command;
    use tracing::{debug, info, warn};

    /// Decoded audio held in memory as interleaved `f32` samples.
    #[derive(Debug, Clone)]
    pub struct AudioSegment {
        pub samples: Vec<f32>,
        pub sample_rate: u32,
        pub channels: u16,
    }

    impl AudioSegment {
        /// Decode the first audio track of a media file with symphonia. Blocking.
        ///
        /// `Unsupported` means symphonia has no reader or codec for the input.
        pub fn from_file(path: &Path) -> Result<Self, SymphoniaError> {
            let file = File::open(path)?;
            let mss = MediaSourceStream::new(Box::new(file), Default::default());

            let mut hint = Hint::new();
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                hint.with_extension(ext);
            }

            let probed = symphonia::default::get_probe().format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )?;

            let mut format = probed.format;

            let track = format
                .tracks()
                .iter()
                .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
                .ok_or(SymphoniaError::Unsupported("no audio track found"))?;

            let track_id = track.id;
            let mut decoder = symphonia::default::get_codecs()
                .make(&track.codec_params, &DecoderOptions::default())?;

            let mut samples: Vec<f32> = Vec::new();
            let mut sample_buf: Option<SampleBuffer<f32>> = None;
            // Rate and layout of the decoded buffers, which the samples follow
            let mut layout: Option<(u32, u16)> = None;

            loop {
                let packet = match format.next_packet() {
                    Ok(packet) => packet,
                    Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                    Err(SymphoniaError::ResetRequired) => break,
                    Err(e) if samples.is_empty() => return Err(e),
                    Err(e) => {
                        warn!("Stopping decode early: {}", e);
                        break;
                    }
                };

                if packet.track_id() != track_id {
                    continue;
                }

                let decoded = match decoder.decode(&packet) {
                    Ok(decoded) => decoded,
                    Err(SymphoniaError::DecodeError(e)) => {
                        warn!("Skipping undecodable packet: {}", e);
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                let spec = *decoded.spec();
                if layout.is_none() {
                    layout = Some((spec.rate, spec.channels.count() as u16));
                }

                let needed = decoded.capacity();
                if sample_buf.as_ref().map_or(true, |b| b.capacity() < needed) {
                    sample_buf = Some(SampleBuffer::new(needed as u64, spec));
                }
                if let Some(ref mut buf) = sample_buf {
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
            }

            let (sample_rate, channels) = match layout {
                Some(layout) if !samples.is_empty() => layout,
                _ => return Err(SymphoniaError::DecodeError("no audio decoded")),
            };

            debug!(
                "Decoded {} samples ({} Hz, {} ch)",
                samples.len(),
                sample_rate,
                channels
            );

            Ok(Self {
                samples,
                sample_rate,
                channels,
            })
        }

        /// Decode any input ffmpeg understands to 16-bit PCM at the encoder's
        /// rate and channel count.
        pub async fn from_ffmpeg(ffmpeg: &Path, input: &Path) -> Result<Self, BackendError> {
            let sample_rate = ENCODER_SAMPLE_RATE.to_string();
            let channels = ENCODER_CHANNELS.to_string();

            let result = Command::new(ffmpeg)
                .args(["-hide_banner", "-loglevel", "error"])
                .arg("-i")
                .arg(input)
                .arg("-vn")
                .args(["-f", "s16le", "-acodec", "pcm_s16le"])
                .args(["-ar", &sample_rate])
                .args(["-ac", &channels])
                .arg("-")
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

            let samples = pcm_s16le_to_f32(&out.stdout);
            if samples.is_empty() {
                return Err(BackendError::Decode("no audio decoded".to_string()));
            }

            debug!("Decoded {} samples with ffmpeg", samples.len());

            Ok(Self {
                samples,
                sample_rate: ENCODER_SAMPLE_RATE,
                channels: ENCODER_CHANNELS,
            })
        }

        pub fn duration_secs(&self) -> f64 {
            if self.sample_rate == 0 || self.channels == 0 {
                return 0.0;
            }
            self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
        }

        /// Write the segment as 16-bit PCM WAV. Blocking.
        pub fn write_wav(&self, path: &Path) -> Result<(), BackendError> {
            let spec = hound::WavSpec {
                channels: self.channels,
                sample_rate: self.sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };

            let mut writer =
                hound::WavWriter::create(path, spec).map_err(|e| BackendError::Encode(e.to_string()))?;
            for &sample in &self.samples {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                writer
                    .write_sample(value)
                    .map_err(|e| BackendError::Encode(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| BackendError::Encode(e.to_string()))
        }

        /// Export as MP3 via an intermediate WAV next to `output`.
        pub async fn export_mp3(self, ffmpeg: &Path, output: &Path) -> Result<(), BackendError> {
            info!("Exporting {:.1}s segment to MP3", self.duration_secs());

            let dir = match output.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let wav = tempfile::Builder::new()
                .prefix(".ezmp3-segment-")
                .suffix(".wav")
                .tempfile_in(dir)?
                .into_temp_path();

            let wav_path = wav.to_path_buf();
            tokio::task::spawn_blocking(move || self.write_wav(&wav_path))
                .await
                .map_err(|e| BackendError::Encode(format!("export task aborted: {e}")))??;

            let result = Command::new(ffmpeg)
                .args(["-hide_banner", "-loglevel", "error", "-y"])
                .arg("-i")
                .arg(&*wav)
                .args(["-c:a", "libmp3lame", "-f", "mp3"])
                .arg(output)
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

    fn pcm_s16le_to_f32(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect()
    }

}
