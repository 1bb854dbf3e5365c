//! Spectral-gating noise reduction.
//!
//! The signal is taken to the short-time Fourier domain and every
//! time-frequency bin gets a gain in `[0, 1]` depending on how far it rises
//! above a per-frequency noise estimate. The mask is smoothed over a small
//! triangular neighbourhood so gating does not produce musical noise, then
//! blended with unity by `prop_decrease` and applied before resynthesis.
//!
//! Two noise estimates are supported:
//!
//! - **non-stationary** (default): the noise floor of each frequency bin is a
//!   zero-phase exponential moving average over `time_constant_s`, so the
//!   gate tracks slowly changing backgrounds. Bins are kept with a sigmoid of
//!   their relative excess over that floor.
//! - **stationary**: the floor is the mean plus `n_std_thresh_stationary`
//!   standard deviations of each bin's level in dB over the whole clip, and
//!   the mask is a hard threshold.
//!
//! Long clips are gated in chunks of `chunk_size` samples, each extended by
//! `padding` samples of real signal on both sides that are dropped again
//! afterwards. The stationary threshold is still computed over the whole clip,
//! one frame at a time, so memory stays proportional to a single chunk.

use std::fmt;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use tracing::debug;

use super::{AudioError, SampleBuffer};

const EPSILON: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

/// Removes background noise from a mono buffer. Output length equals input length.
pub trait NoiseReducer: Send + Sync {
    fn reduce(&self, input: &SampleBuffer) -> Result<SampleBuffer, AudioError>;
}

/// Tuning of the spectral gate.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseReductionConfig {
    /// Use a clip-wide noise threshold instead of a moving floor
    pub stationary: bool,
    /// Fraction of the estimated noise to remove, 0.0 leaves the signal untouched
    pub prop_decrease: f32,
    pub n_fft: usize,
    pub hop_length: usize,
    /// Averaging window of the non-stationary noise floor, in seconds
    pub time_constant_s: f32,
    pub thresh_n_mult_nonstationary: f32,
    pub sigmoid_slope_nonstationary: f32,
    pub n_std_thresh_stationary: f32,
    /// Mask smoothing extent across frequency; 0 disables
    pub freq_mask_smooth_hz: f32,
    /// Mask smoothing extent across time; 0 disables
    pub time_mask_smooth_ms: f32,
    /// Longest stretch gated in one pass, in samples; bounds peak memory
    pub chunk_size: usize,
    /// Neighbouring samples gated along with each chunk and then discarded
    pub padding: usize,
}

impl Default for NoiseReductionConfig {
    fn default() -> Self {
        Self {
            stationary: false,
            prop_decrease: 1.0,
            n_fft: 1024,
            hop_length: 256,
            time_constant_s: 2.0,
            thresh_n_mult_nonstationary: 2.0,
            sigmoid_slope_nonstationary: 10.0,
            n_std_thresh_stationary: 1.5,
            freq_mask_smooth_hz: 500.0,
            time_mask_smooth_ms: 50.0,
            chunk_size: 600_000,
            padding: 30_000,
        }
    }
}

impl NoiseReductionConfig {
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.n_fft < 16 {
            return Err(AudioError::Denoise(format!(
                "n_fft must be at least 16, got {}",
                self.n_fft
            )));
        }
        if self.hop_length == 0 || self.hop_length > self.n_fft {
            return Err(AudioError::Denoise(format!(
                "hop_length must be in 1..={}, got {}",
                self.n_fft, self.hop_length
            )));
        }
        if !(0.0..=1.0).contains(&self.prop_decrease) {
            return Err(AudioError::Denoise(format!(
                "prop_decrease must be within [0, 1], got {}",
                self.prop_decrease
            )));
        }
        if self.chunk_size < self.n_fft {
            return Err(AudioError::Denoise(format!(
                "chunk_size must be at least n_fft ({}), got {}",
                self.n_fft, self.chunk_size
            )));
        }
        if self.time_constant_s <= 0.0 {
            return Err(AudioError::Denoise(
                "time_constant_s must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// FFT-based spectral gate. Plans are built once and shared across requests.
pub struct SpectralGate {
    config: NoiseReductionConfig,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl fmt::Debug for SpectralGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralGate")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SpectralGate {
    pub fn new(config: NoiseReductionConfig) -> Result<Self, AudioError> {
        config.validate()?;
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(config.n_fft);
        let inverse = planner.plan_fft_inverse(config.n_fft);
        Ok(Self {
            window: hann_window(config.n_fft),
            config,
            forward,
            inverse,
        })
    }

    pub fn config(&self) -> &NoiseReductionConfig {
        &self.config
    }

    fn n_bins(&self) -> usize {
        self.config.n_fft / 2 + 1
    }

    fn frame_count(&self, len: usize) -> usize {
        len / self.config.hop_length + 1
    }

    /// Window and transform frame `t` into `frame`; samples outside the
    /// slice read as zero.
    fn load_frame(&self, samples: &[f32], t: usize, frame: &mut [Complex<f32>]) {
        let n_fft = self.config.n_fft;
        let origin = (t * self.config.hop_length) as isize - (n_fft / 2) as isize;
        for (i, slot) in frame.iter_mut().enumerate() {
            let idx = origin + i as isize;
            let sample = if idx >= 0 && (idx as usize) < samples.len() {
                samples[idx as usize]
            } else {
                0.0
            };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.forward.process(frame);
    }

    /// Centered STFT; frame `t` is centered on sample `t * hop`.
    fn stft(&self, samples: &[f32]) -> Vec<Vec<Complex<f32>>> {
        let n_bins = self.n_bins();
        let mut frame = vec![Complex::new(0.0, 0.0); self.config.n_fft];
        (0..self.frame_count(samples.len()))
            .map(|t| {
                self.load_frame(samples, t, &mut frame);
                frame[..n_bins].to_vec()
            })
            .collect()
    }

    /// Weighted overlap-add inverse of [`Self::stft`], cropped to `len` samples.
    fn istft(&self, spectrum: &[Vec<Complex<f32>>], len: usize) -> Vec<f32> {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let pad = n_fft / 2;
        let n_bins = self.n_bins();
        let total = (spectrum.len().saturating_sub(1)) * hop + n_fft;

        let mut output = vec![0.0_f32; total];
        let mut norm = vec![0.0_f32; total];
        let mut frame = vec![Complex::new(0.0, 0.0); n_fft];
        let scale = 1.0 / n_fft as f32;

        for (t, bins) in spectrum.iter().enumerate() {
            frame[..n_bins].copy_from_slice(bins);
            // Hermitian mirror of the positive half
            for k in n_bins..n_fft {
                frame[k] = frame[n_fft - k].conj();
            }
            self.inverse.process(&mut frame);

            let start = t * hop;
            for i in 0..n_fft {
                let w = self.window[i];
                output[start + i] += frame[i].re * scale * w;
                norm[start + i] += w * w;
            }
        }

        (0..len)
            .map(|i| {
                let idx = i + pad;
                if idx < total && norm[idx] > 1e-8 {
                    output[idx] / norm[idx]
                } else {
                    0.0
                }
            })
            .collect()
    }

    fn nonstationary_mask(&self, magnitudes: &[Vec<f32>], sample_rate: u32) -> Vec<Vec<f32>> {
        let cfg = &self.config;
        let floor = smooth_over_time(
            magnitudes,
            cfg.time_constant_s * sample_rate as f32 / cfg.hop_length as f32,
        );

        magnitudes
            .iter()
            .zip(&floor)
            .map(|(frame, floor_frame)| {
                frame
                    .iter()
                    .zip(floor_frame)
                    .map(|(&s, &f)| {
                        let above = (s - f) / (f + EPSILON);
                        sigmoid(
                            (above - cfg.thresh_n_mult_nonstationary)
                                * cfg.sigmoid_slope_nonstationary,
                        )
                    })
                    .collect()
            })
            .collect()
    }

    /// Per-bin dB threshold over every frame of `samples` (Welford).
    fn stationary_threshold(&self, samples: &[f32]) -> Vec<f32> {
        let n_bins = self.n_bins();
        let mut frame = vec![Complex::new(0.0, 0.0); self.config.n_fft];
        let mut magnitudes = vec![0.0_f32; n_bins];
        let mut mean = vec![0.0_f64; n_bins];
        let mut m2 = vec![0.0_f64; n_bins];

        let n_frames = self.frame_count(samples.len());
        for t in 0..n_frames {
            self.load_frame(samples, t, &mut frame);
            for (m, c) in magnitudes.iter_mut().zip(&frame[..n_bins]) {
                *m = c.norm();
            }
            let count = (t + 1) as f64;
            for ((db, mu), acc) in amp_to_db(&magnitudes).into_iter().zip(&mut mean).zip(&mut m2) {
                let db = f64::from(db);
                let delta = db - *mu;
                *mu += delta / count;
                *acc += delta * (db - *mu);
            }
        }

        mean.iter()
            .zip(&m2)
            .map(|(&mu, &acc)| {
                let std = (acc / n_frames as f64).sqrt();
                (mu + std * f64::from(self.config.n_std_thresh_stationary)) as f32
            })
            .collect()
    }

    fn stationary_mask(&self, magnitudes: &[Vec<f32>], threshold: &[f32]) -> Vec<Vec<f32>> {
        magnitudes
            .iter()
            .map(|frame| {
                amp_to_db(frame)
                    .into_iter()
                    .zip(threshold)
                    .map(|(db, &th)| if db > th { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect()
    }

    fn smoothing_extent(&self, sample_rate: u32) -> (usize, usize) {
        let cfg = &self.config;
        let bin_hz = sample_rate as f32 / cfg.n_fft as f32 * 2.0;
        let frame_ms = cfg.hop_length as f32 / sample_rate as f32 * 1000.0;
        let n_freq = (cfg.freq_mask_smooth_hz / bin_hz).max(0.0) as usize;
        let n_time = (cfg.time_mask_smooth_ms / frame_ms).max(0.0) as usize;
        (n_freq, n_time)
    }

    /// Gate one contiguous stretch; the output has the same length.
    fn gate_chunk(
        &self,
        samples: &[f32],
        sample_rate: u32,
        threshold: Option<&[f32]>,
    ) -> Vec<f32> {
        let mut spectrum = self.stft(samples);
        let magnitudes: Vec<Vec<f32>> = spectrum
            .iter()
            .map(|frame| frame.iter().map(|c| c.norm()).collect())
            .collect();

        let mut mask = match threshold {
            Some(threshold) => self.stationary_mask(&magnitudes, threshold),
            None => self.nonstationary_mask(&magnitudes, sample_rate),
        };
        drop(magnitudes);

        let (n_freq, n_time) = self.smoothing_extent(sample_rate);
        if n_freq > 0 || n_time > 0 {
            mask = smooth_mask(&mask, n_freq, n_time);
        }

        let keep = 1.0 - self.config.prop_decrease;
        for (frame, gains) in spectrum.iter_mut().zip(&mask) {
            for (bin, &g) in frame.iter_mut().zip(gains) {
                *bin *= g * self.config.prop_decrease + keep;
            }
        }
        drop(mask);

        self.istft(&spectrum, samples.len())
    }
}

impl NoiseReducer for SpectralGate {
    fn reduce(&self, input: &SampleBuffer) -> Result<SampleBuffer, AudioError> {
        if input.is_empty() {
            return Ok(input.clone());
        }
        if input.sample_rate() == 0 {
            return Err(AudioError::Denoise("sample rate is zero".to_string()));
        }

        let samples = input.samples();
        let rate = input.sample_rate();
        let threshold = self
            .config
            .stationary
            .then(|| self.stationary_threshold(samples));
        let threshold = threshold.as_deref();

        let chunk = self.config.chunk_size;
        let padding = self.config.padding;
        let mut output = Vec::with_capacity(samples.len());
        let mut chunks = 0usize;
        let mut start = 0;
        while start < samples.len() {
            let end = (start + chunk).min(samples.len());
            let lo = start.saturating_sub(padding);
            let hi = (end + padding).min(samples.len());
            let gated = self.gate_chunk(&samples[lo..hi], rate, threshold);
            output.extend_from_slice(&gated[start - lo..end - lo]);
            chunks += 1;
            start = end;
        }

        if output.iter().any(|s| !s.is_finite()) {
            return Err(AudioError::Denoise(
                "resynthesis produced non-finite samples".to_string(),
            ));
        }

        debug!(
            chunks,
            stationary = self.config.stationary,
            input_rms = input.rms(),
            "Applied spectral gate"
        );

        Ok(SampleBuffer::new(output, rate))
    }
}

/// Periodic Hann window.
fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * n as f32 / len as f32).cos())
        .collect()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn amp_to_db(magnitudes: &[f32]) -> Vec<f32> {
    let db: Vec<f32> = magnitudes
        .iter()
        .map(|&m| 20.0 * (m + f32::EPSILON).log10())
        .collect();
    let peak = db.iter().copied().fold(f32::MIN, f32::max).max(-1.0);
    db.into_iter().map(|d| d.max(peak - TOP_DB)).collect()
}

/// Forward-backward single-pole low-pass along the time axis of every bin.
fn smooth_over_time(magnitudes: &[Vec<f32>], t_frames: f32) -> Vec<Vec<f32>> {
    if magnitudes.is_empty() {
        return Vec::new();
    }
    let t2 = t_frames * t_frames;
    let b = ((1.0 + 4.0 * t2).sqrt() - 1.0) / (2.0 * t2);
    let n_bins = magnitudes[0].len();
    let n_frames = magnitudes.len();

    let mut out = vec![vec![0.0_f32; n_bins]; n_frames];
    let mut track = vec![0.0_f32; n_frames];
    for k in 0..n_bins {
        let mut y = magnitudes[0][k];
        for t in 0..n_frames {
            y = b * magnitudes[t][k] + (1.0 - b) * y;
            track[t] = y;
        }
        let mut y = track[n_frames - 1];
        for t in (0..n_frames).rev() {
            y = b * track[t] + (1.0 - b) * y;
            out[t][k] = y;
        }
    }
    out
}

/// Triangular kernel of half-width `n`, normalized to unit sum.
fn triangle(n: usize) -> Vec<f32> {
    let kernel: Vec<f32> = (0..=2 * n)
        .map(|i| 1.0 - (i as f32 - n as f32).abs() / (n as f32 + 1.0))
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.into_iter().map(|k| k / sum).collect()
}

/// Separable 2-D smoothing of a `[frame][bin]` mask.
fn smooth_mask(mask: &[Vec<f32>], n_freq: usize, n_time: usize) -> Vec<Vec<f32>> {
    let freq_kernel = triangle(n_freq);
    let time_kernel = triangle(n_time);
    let n_frames = mask.len();
    let n_bins = mask.first().map_or(0, Vec::len);

    let along_freq: Vec<Vec<f32>> = mask
        .iter()
        .map(|frame| convolve_same(frame, &freq_kernel, n_freq))
        .collect();

    let mut out = vec![vec![0.0_f32; n_bins]; n_frames];
    let mut column = vec![0.0_f32; n_frames];
    for k in 0..n_bins {
        for t in 0..n_frames {
            column[t] = along_freq[t][k];
        }
        for (t, value) in convolve_same(&column, &time_kernel, n_time)
            .into_iter()
            .enumerate()
        {
            out[t][k] = value;
        }
    }
    out
}

/// "Same"-size convolution; weights falling outside the signal are dropped
/// and the remainder renormalized.
fn convolve_same(signal: &[f32], kernel: &[f32], half: usize) -> Vec<f32> {
    let len = signal.len() as isize;
    (0..len)
        .map(|i| {
            let mut acc = 0.0;
            let mut weight = 0.0;
            for (j, &k) in kernel.iter().enumerate() {
                let idx = i + j as isize - half as isize;
                if (0..len).contains(&idx) {
                    acc += signal[idx as usize] * k;
                    weight += k;
                }
            }
            if weight > 0.0 { acc / weight } else { 0.0 }
        })
        .collect()
}
