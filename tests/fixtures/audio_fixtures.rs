//! Audio Test Fixtures
//!
//! Programmatically generated audio, so tests need no binary assets and every
//! run sees identical input.
//!
//! Samples are 16-bit signed PCM. WAV containers can be built at any sample
//! rate and channel count to exercise decoding and resampling.

use std::f32::consts::PI;

/// Standard sample rate for STT (16kHz)
pub const SAMPLE_RATE: u32 = 16000;

/// Duration constants (in samples at 16kHz)
pub const MS_100: usize = 1600;
pub const MS_500: usize = 8000;
pub const SECOND: usize = 16000;

/// Generate silence (zeros)
pub fn generate_silence(duration_samples: usize) -> Vec<i16> {
    vec![0i16; duration_samples]
}

/// Generate white noise with specified amplitude (0.0 - 1.0)
pub fn generate_white_noise(duration_samples: usize, amplitude: f32) -> Vec<i16> {
    let max_amplitude = amplitude * i16::MAX as f32;

    // Simple deterministic pseudo-random generator for reproducibility
    let mut state: u64 = 12345;
    (0..duration_samples)
        .map(|_| {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            let random = ((state >> 16) & 0x7FFF) as f32 / 0x7FFF as f32;
            ((random * 2.0 - 1.0) * max_amplitude) as i16
        })
        .collect()
}

/// Voiced sound: a 150 Hz fundamental with two harmonics
fn voiced_sample(i: usize, amplitude: f32) -> i16 {
    let t = i as f32 / SAMPLE_RATE as f32;
    let base_freq = 150.0;
    let fundamental = (2.0 * PI * base_freq * t).sin();
    let harmonic2 = (2.0 * PI * base_freq * 2.0 * t).sin() * 0.5;
    let harmonic3 = (2.0 * PI * base_freq * 3.0 * t).sin() * 0.25;
    let waveform = (fundamental + harmonic2 + harmonic3) / 1.75;
    (waveform * amplitude * i16::MAX as f32) as i16
}

/// Generate an utterance: short voiced syllables separated by silence.
///
/// Syllables are 120 ms long every 800 ms, so each onset stands well above
/// the running spectral floor and survives non-stationary noise gating.
pub fn generate_utterance(duration_samples: usize) -> Vec<i16> {
    let period = 800 * SAMPLE_RATE as usize / 1000;
    let syllable = 120 * SAMPLE_RATE as usize / 1000;
    let offset = 200 * SAMPLE_RATE as usize / 1000;

    (0..duration_samples)
        .map(|i| {
            let pos = (i + period - offset) % period;
            if i >= offset && pos < syllable {
                // Raised-cosine envelope avoids clicks at syllable edges
                let env = 0.5 - 0.5 * (2.0 * PI * pos as f32 / syllable as f32).cos();
                voiced_sample(i, 0.6 * env)
            } else {
                0
            }
        })
        .collect()
}

/// Generate an utterance with low-level background noise mixed in
pub fn generate_noisy_utterance(duration_samples: usize, noise_amplitude: f32) -> Vec<i16> {
    generate_utterance(duration_samples)
        .iter()
        .zip(generate_white_noise(duration_samples, noise_amplitude))
        .map(|(&s, n)| s.saturating_add(n))
        .collect()
}

/// Convert i16 samples to little-endian bytes
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Calculate RMS (root mean square) amplitude
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Create a WAV file header for interleaved 16-bit PCM
pub fn create_wav_header(num_samples: usize, sample_rate: u32, channels: u16) -> Vec<u8> {
    let data_size = (num_samples * 2) as u32; // 16-bit = 2 bytes per sample
    let file_size = data_size + 36;
    let block_align: u16 = 2 * channels;
    let byte_rate = sample_rate * block_align as u32;
    let bits_per_sample: u16 = 16;

    let mut header = Vec::with_capacity(44);

    // RIFF header
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&file_size.to_le_bytes());
    header.extend_from_slice(b"WAVE");

    // fmt chunk
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    header.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    header.extend_from_slice(&channels.to_le_bytes());
    header.extend_from_slice(&sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_size.to_le_bytes());

    header
}

/// Create a complete WAV file from interleaved samples
pub fn create_wav_file(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let mut wav = create_wav_header(samples.len(), sample_rate, channels);
    wav.extend(samples_to_bytes(samples));
    wav
}

/// 16 kHz mono WAV of `samples`
pub fn mono_wav(samples: &[i16]) -> Vec<u8> {
    create_wav_file(samples, SAMPLE_RATE, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_generation() {
        let silence = generate_silence(SECOND);
        assert_eq!(silence.len(), SECOND);
        assert!(silence.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_utterance_has_syllables_and_gaps() {
        let speech = generate_utterance(2 * SECOND);
        assert_eq!(speech.len(), 2 * SECOND);
        assert!(speech[..MS_100].iter().all(|&s| s == 0), "leading silence");
        assert!(calculate_rms(&speech) > 500.0);
        let silent_windows = speech
            .chunks(MS_100)
            .filter(|w| w.iter().all(|&s| s == 0))
            .count();
        assert!(silent_windows > 5);
    }

    #[test]
    fn test_wav_header_creation() {
        let header = create_wav_header(SECOND, 48000, 2);
        assert_eq!(header.len(), 44);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(u16::from_le_bytes([header[22], header[23]]), 2);
    }

    #[test]
    fn test_deterministic_generation() {
        assert_eq!(generate_white_noise(1000, 0.5), generate_white_noise(1000, 0.5));
        assert_eq!(generate_utterance(1000), generate_utterance(1000));
    }
}
