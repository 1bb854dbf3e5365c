//! Performance benchmarks for the audio stages of the STT pipeline
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::Duration;
use tempfile::TempDir;
use voice_bridge::core::audio::{
    AudioDecoder, NoiseReducer, NoiseReductionConfig, SampleBuffer, SpectralGate,
    SymphoniaDecoder, decode, write_wav_mono,
};
use voice_bridge::core::tts::split_text;

const RATE: u32 = 16_000;

/// Voiced bursts over low noise, `seconds` long at `rate`
fn test_signal(seconds: usize, rate: u32) -> Vec<f32> {
    let mut state: u64 = 7;
    (0..seconds * rate as usize)
        .map(|i| {
            let t = i as f32 / rate as f32;
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let noise = ((state >> 33) as f32 / (1u64 << 31) as f32 - 0.5) * 0.02;
            let burst = if (t * 1.25).fract() < 0.15 { 0.4 } else { 0.0 };
            burst * (2.0 * std::f32::consts::PI * 150.0 * t).sin() + noise
        })
        .collect()
}

/// Benchmark the spectral gate in both modes
fn bench_noise_reduction(c: &mut Criterion) {
    let mut group = c.benchmark_group("noise_reduction");
    group.measurement_time(Duration::from_secs(8));
    group.sample_size(20);

    for seconds in [1usize, 5, 15] {
        let input = SampleBuffer::new(test_signal(seconds, RATE), RATE);
        group.throughput(Throughput::Elements(input.len() as u64));

        for stationary in [false, true] {
            let gate = SpectralGate::new(NoiseReductionConfig {
                stationary,
                ..NoiseReductionConfig::default()
            })
            .unwrap();
            let name = if stationary { "stationary" } else { "nonstationary" };
            group.bench_with_input(BenchmarkId::new(name, seconds), &input, |b, input| {
                b.iter(|| gate.reduce(black_box(input)).unwrap());
            });
        }
    }

    group.finish();
}

/// Benchmark decoding a WAV from disk, with and without resampling
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.measurement_time(Duration::from_secs(5));

    let tmp = TempDir::new().unwrap();
    let decoder = SymphoniaDecoder::new(None);

    for rate in [16_000u32, 48_000] {
        let path = tmp.path().join(format!("input_{rate}.wav"));
        let buffer = SampleBuffer::new(test_signal(5, rate), rate);
        write_wav_mono(&path, &buffer).unwrap();

        group.throughput(Throughput::Elements(buffer.len() as u64));
        group.bench_with_input(BenchmarkId::new("wav_5s", rate), &path, |b, path| {
            b.iter(|| decoder.decode(black_box(path)).unwrap());
        });
    }

    let samples = test_signal(5, 44_100);
    group.bench_function("resample_44100_to_16000", |b| {
        b.iter(|| decode::resample(black_box(&samples), 44_100, RATE).unwrap());
    });

    group.finish();
}

/// Benchmark TTS text chunking
fn bench_split_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_text");

    let text = "این یک جملهٔ آزمایشی برای تبدیل متن به گفتار است. ".repeat(100);
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("persian_5000_chars", |b| {
        b.iter(|| split_text(black_box(&text), 100));
    });

    group.finish();
}

criterion_group!(benches, bench_noise_reduction, bench_decode, bench_split_text);
criterion_main!(benches);
