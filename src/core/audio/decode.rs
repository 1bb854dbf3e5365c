//! Audio normalization: any supported container → 16 kHz mono `f32`.
//!
//! Containers are demuxed and decoded with symphonia, downmixed by averaging
//! channels and resampled with rubato's windowed-sinc resampler. Browser
//! recorders usually produce Opus inside WebM, which symphonia can demux but
//! not decode. For those streams, and for containers symphonia does not
//! recognise at all (MP4/AAC from Safari, for example), the decoder shells out
//! to `ffmpeg` when a fallback is configured.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer as PcmBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use super::{AudioError, SampleBuffer, TARGET_SAMPLE_RATE};

/// Frames fed to the resampler per call.
const RESAMPLE_CHUNK: usize = 1024;

/// Decodes a container file on disk into a mono buffer at [`TARGET_SAMPLE_RATE`].
///
/// Implementations block and are run on the worker pool.
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<SampleBuffer, AudioError>;
}

/// Converts a file with an external `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegFallback {
    program: PathBuf,
}

impl FfmpegFallback {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Decode `path` to mono `f32` samples at `sample_rate`.
    pub fn decode(&self, path: &Path, sample_rate: u32) -> Result<Vec<f32>, AudioError> {
        let output = Command::new(&self.program)
            .arg("-nostdin")
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(path)
            .args(["-vn", "-ac", "1", "-ar"])
            .arg(sample_rate.to_string())
            .args(["-f", "f32le", "pipe:1"])
            .output()
            .map_err(|e| {
                AudioError::Ffmpeg(format!("failed to run {}: {e}", self.program.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .trim()
                .chars()
                .rev()
                .take(300)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            return Err(AudioError::Ffmpeg(format!(
                "exited with {}: {tail}",
                output.status
            )));
        }

        Ok(output
            .stdout
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
}

/// Native decoder backed by symphonia with an optional ffmpeg fallback.
#[derive(Debug, Clone)]
pub struct SymphoniaDecoder {
    target_rate: u32,
    fallback: Option<FfmpegFallback>,
}

impl SymphoniaDecoder {
    pub fn new(fallback: Option<FfmpegFallback>) -> Self {
        Self {
            target_rate: TARGET_SAMPLE_RATE,
            fallback,
        }
    }

    fn decode_native(&self, path: &Path) -> Result<(Vec<f32>, u32), AudioError> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| match e {
                SymphoniaError::Unsupported(msg) => {
                    AudioError::UnsupportedContainer(msg.to_string())
                }
                SymphoniaError::IoError(io) if io.kind() == ErrorKind::UnexpectedEof => {
                    AudioError::Empty
                }
                other => AudioError::Decode(other.to_string()),
            })?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::Decode("no audio track in container".to_string()))?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(msg) => AudioError::UnsupportedCodec(msg.to_string()),
                other => AudioError::Decode(other.to_string()),
            })?;

        let mut mono = Vec::new();
        let mut skipped_packets = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(AudioError::Decode(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate = spec.rate;
                    let channels = spec.channels.count().max(1);
                    let mut pcm = PcmBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    pcm.copy_interleaved_ref(decoded);
                    mono.extend(downmix(pcm.samples(), channels));
                }
                // A corrupt packet is skipped; the stream may still be usable.
                Err(SymphoniaError::DecodeError(msg)) => {
                    skipped_packets += 1;
                    debug!(reason = msg, "Skipping undecodable packet");
                }
                Err(e) => return Err(AudioError::Decode(e.to_string())),
            }
        }

        if skipped_packets > 0 {
            warn!(skipped_packets, "Decoded audio with corrupt packets skipped");
        }
        if mono.is_empty() {
            return Err(AudioError::Empty);
        }
        if sample_rate == 0 {
            return Err(AudioError::Decode("stream has no sample rate".to_string()));
        }

        Ok((mono, sample_rate))
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> Result<SampleBuffer, AudioError> {
        match self.decode_native(path) {
            Ok((samples, rate)) => {
                let resampled = resample(&samples, rate, self.target_rate)?;
                debug!(
                    source_rate = rate,
                    samples = resampled.len(),
                    "Decoded audio natively"
                );
                Ok(SampleBuffer::new(resampled, self.target_rate))
            }
            Err(
                native @ (AudioError::UnsupportedCodec(_) | AudioError::UnsupportedContainer(_)),
            ) => {
                let Some(fallback) = &self.fallback else {
                    return Err(native);
                };
                debug!(
                    reason = %native,
                    program = %fallback.program().display(),
                    "Not decodable natively, converting with ffmpeg"
                );
                let samples = match fallback.decode(path, self.target_rate) {
                    Ok(samples) => samples,
                    // ffmpeg could not read it either; the container error is the useful one
                    Err(e) if matches!(native, AudioError::UnsupportedContainer(_)) => {
                        debug!(error = %e, "ffmpeg fallback failed");
                        return Err(native);
                    }
                    Err(e) => return Err(e),
                };
                if samples.is_empty() {
                    return Err(AudioError::Empty);
                }
                Ok(SampleBuffer::new(samples, self.target_rate))
            }
            Err(e) => Err(e),
        }
    }
}

/// Average interleaved frames down to one channel.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => interleaved.to_vec(),
        n => interleaved
            .chunks_exact(n)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect(),
    }
}

/// Resample mono `samples` from `from_rate` to `to_rate`.
///
/// The output is trimmed of the resampler delay and has
/// `round(len * to_rate / from_rate)` samples.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(AudioError::Resample(format!(
            "invalid rates {from_rate} -> {to_rate}"
        )));
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut out = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);

    let mut chunks = samples.chunks_exact(RESAMPLE_CHUNK);
    for chunk in &mut chunks {
        let input = [chunk];
        let frames = resampler
            .process(&input[..], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        out.extend_from_slice(&frames[0]);
    }

    let rest = chunks.remainder();
    if !rest.is_empty() {
        let input = [rest];
        let frames = resampler
            .process_partial(Some(&input[..]), None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        out.extend_from_slice(&frames[0]);
    }

    // Drain the filter tail
    while out.len() < expected + delay {
        let frames = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        if frames[0].is_empty() {
            break;
        }
        out.extend_from_slice(&frames[0]);
    }

    let mut trimmed: Vec<f32> = out.into_iter().skip(delay).take(expected).collect();
    trimmed.resize(expected, 0.0);
    Ok(trimmed)
}
