//! Canonical WAV encoding: 16-bit signed PCM, mono.

use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::{AudioError, SampleBuffer};

/// Write `buffer` as a mono 16-bit PCM WAV, clamping samples to `[-1.0, 1.0]`.
pub fn write_wav_mono(path: &Path, buffer: &SampleBuffer) -> Result<(), AudioError> {
    encode_into(File::create(path)?, buffer)
}

/// Like [`write_wav_mono`], but the file must already exist.
///
/// Used for scratch files, so a file removed by cleanup is never recreated.
pub fn overwrite_wav_mono(path: &Path, buffer: &SampleBuffer) -> Result<(), AudioError> {
    let file = OpenOptions::new().write(true).truncate(true).open(path)?;
    encode_into(file, buffer)
}

fn encode_into(file: File, buffer: &SampleBuffer) -> Result<(), AudioError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::new(BufWriter::new(file), spec)?;
    for &sample in buffer.samples() {
        writer.write_sample(to_pcm16(sample))?;
    }
    writer.finalize()?;
    Ok(())
}

/// Read a mono 16-bit PCM WAV back into `f32` samples.
pub fn read_wav_mono(path: &Path) -> Result<SampleBuffer, AudioError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels != 1 || spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int
    {
        return Err(AudioError::Wav(format!(
            "expected 16-bit mono PCM, got {} channel(s) of {}-bit {:?}",
            spec.channels, spec.bits_per_sample, spec.sample_format
        )));
    }

    let samples = reader
        .samples::<i16>()
        .map(|s| s.map(|v| v as f32 / 32768.0))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SampleBuffer::new(samples, spec.sample_rate))
}

fn to_pcm16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_written_file_is_canonical() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.wav");
        let buffer = SampleBuffer::new(vec![0.0, 0.5, -0.5, 0.25], 16_000);

        write_wav_mono(&path, &buffer).unwrap();

        let reader = WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, SampleFormat::Int);
        assert_eq!(reader.len(), 4);
    }

    #[test]
    fn test_read_back_within_quantization() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.wav");
        let buffer = SampleBuffer::new(vec![0.1, -0.3, 0.9, -0.99], 16_000);

        write_wav_mono(&path, &buffer).unwrap();
        let read = read_wav_mono(&path).unwrap();

        assert_eq!(read.sample_rate(), 16_000);
        for (a, b) in buffer.samples().iter().zip(read.samples()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_out_of_range_samples_are_clamped() {
        assert_eq!(to_pcm16(2.0), i16::MAX);
        assert_eq!(to_pcm16(-3.0), -i16::MAX);
        assert_eq!(to_pcm16(f32::NAN), 0);
    }

    #[test]
    fn test_read_rejects_stereo() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(read_wav_mono(&path), Err(AudioError::Wav(_))));
    }

    #[test]
    fn test_overwrite_never_recreates_a_removed_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gone.wav");
        let buffer = SampleBuffer::new(vec![0.25; 8], 16_000);

        let err = overwrite_wav_mono(&path, &buffer).unwrap_err();
        assert!(matches!(err, AudioError::Io(_)));
        assert!(!path.exists());

        std::fs::write(&path, b"stale bytes longer than nothing").unwrap();
        overwrite_wav_mono(&path, &buffer).unwrap();
        assert_eq!(read_wav_mono(&path).unwrap().len(), 8);
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let buffer = SampleBuffer::new(vec![0.0], 16_000);
        let err = write_wav_mono(Path::new("/nonexistent/dir/out.wav"), &buffer).unwrap_err();
        assert!(matches!(err, AudioError::Io(_)));
    }
}
