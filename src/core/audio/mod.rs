//! Audio processing stages used by the STT pipeline.
//!
//! - `decode` - container decoding, downmix and resampling to 16 kHz mono
//! - `denoise` - spectral-gating noise reduction
//! - `wav` - canonical 16-bit PCM WAV encoding for the recognizer

pub mod decode;
pub mod denoise;
pub mod wav;

pub use decode::{AudioDecoder, FfmpegFallback, SymphoniaDecoder};
pub use denoise::{NoiseReducer, NoiseReductionConfig, SpectralGate};
pub use wav::{overwrite_wav_mono, read_wav_mono, write_wav_mono};

use std::time::Duration;

/// Sample rate every stage after decoding works at.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Decoded audio: mono `f32` samples in `[-1.0, 1.0]` at a fixed rate.
///
/// Stages never mutate a buffer they are given; each produces a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Always mono in this pipeline.
    pub fn channels(&self) -> u16 {
        1
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Root-mean-square level of the buffer.
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum / self.samples.len() as f64).sqrt() as f32
    }
}

/// Errors produced by the audio stages.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No demuxer recognised the container
    #[error("Unsupported or unrecognised audio container: {0}")]
    UnsupportedContainer(String),

    /// The container was recognised but its codec has no native decoder
    #[error("Unsupported audio codec: {0}")]
    UnsupportedCodec(String),

    #[error("Audio decode failed: {0}")]
    Decode(String),

    #[error("Audio stream contains no samples")]
    Empty,

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("ffmpeg conversion failed: {0}")]
    Ffmpeg(String),

    #[error("WAV encoding failed: {0}")]
    Wav(String),

    #[error("Noise reduction failed: {0}")]
    Denoise(String),
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => AudioError::Io(e),
            other => AudioError::Wav(other.to_string()),
        }
    }
}
