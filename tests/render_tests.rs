//! Render & Export Tests
//!
//! End-to-end tests for noise generation, offline rendering of whole
//! soundscapes and WAV export.

use std::fs;

use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

use lull::config::{EngineConfig, MixSettings};
use lull::dsp::{generate_noise, BrownIntegrator, NoiseColor, NoiseGenerator, PinkAlgorithm};
use lull::engine::{export_audio, peak_amplitude, render_preset, ExportFormat};
use lull::preset::{builtin_presets, SoundPreset};

/// Upward zero crossings of a channel
fn upward_crossings(samples: &[f32]) -> usize {
    samples
        .windows(2)
        .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
        .count()
}

// === Noise Buffers ===

#[test]
fn test_brown_five_seconds_at_48k() {
    let mut rng = StdRng::seed_from_u64(1);
    let buffer = generate_noise(NoiseColor::Brown, 5.0, 48000, &mut rng).unwrap();

    assert_eq!(buffer.len(), 240000);
    assert!(buffer.samples().iter().all(|s| (-1.05..=1.05).contains(s)));
    assert_abs_diff_eq!(buffer.duration_secs(), 5.0, epsilon = 1e-9);
}

#[test]
fn test_every_generator_stays_in_range() {
    let mut rng = StdRng::seed_from_u64(9);
    for pink in [PinkAlgorithm::Kellett, PinkAlgorithm::Legacy] {
        let generator = NoiseGenerator::new(pink, 0.25);
        for color in [NoiseColor::Pink, NoiseColor::Brown] {
            let buffer = generator.generate(color, 2.0, 44100, &mut rng).unwrap();
            assert_eq!(buffer.len(), 88200);
            assert!(buffer.samples().iter().all(|s| s.is_finite() && s.abs() <= 1.05));
        }
    }
}

#[test]
fn test_brown_recursion_matches_reference() {
    let mut rng = StdRng::seed_from_u64(77);
    let white: Vec<f32> = (0..10_000).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let mut integrator = BrownIntegrator::new();
    let mut y = 0.0_f32;
    for &w in &white {
        y = (y + 0.02 * w) / 1.02;
        assert_eq!(integrator.process(w).to_bits(), y.to_bits());
    }
}

// === Soundscape Rendering ===

#[test]
fn test_tones_land_in_their_own_ears() {
    // Tones only: mute the noise bed and freeze the auto-pan
    let config = EngineConfig {
        mix: MixSettings {
            noise_gain: 0.0,
            pan_depth: 0.0,
            ..MixSettings::default()
        },
        ..EngineConfig::default()
    };
    let preset = SoundPreset::new("test", 100.0, 2.0, NoiseColor::Brown);
    let audio = render_preset(&preset, 2.0, &config).unwrap();

    let left = upward_crossings(audio.channel(0));
    let right = upward_crossings(audio.channel(1));
    assert!((198..=200).contains(&left), "left crossings: {}", left);
    assert!((202..=204).contains(&right), "right crossings: {}", right);
}

#[test]
fn test_rendered_presets_are_bounded() {
    let config = EngineConfig::default().with_seed(5);
    for preset in builtin_presets() {
        let audio = render_preset(&preset, 1.0, &config).unwrap();
        assert_eq!(audio.len(), 48000);
        assert!(audio.is_finite());
        let peak = peak_amplitude(&audio);
        assert!(peak > 0.0 && peak <= 1.0, "{} peak {}", preset.id, peak);
    }
}

#[test]
fn test_config_file_drives_render() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lull.toml");
    fs::write(
        &path,
        r#"
        sample_rate = 22050
        loop_seconds = 2.0
        seed = 8
        "#,
    )
    .unwrap();

    let config = EngineConfig::load(&path).unwrap();
    let audio = render_preset(&builtin_presets()[1], 0.5, &config).unwrap();
    assert_eq!(audio.sample_rate, 22050);
    assert_eq!(audio.len(), 11025);
}

// === WAV Export ===

#[test]
fn test_render_to_wav() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("delta.wav");
    let config = EngineConfig::default().with_seed(21);

    let audio = render_preset(&builtin_presets()[0], 0.25, &config).unwrap();
    export_audio(&audio, &path, ExportFormat::default()).unwrap();

    let reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 48000);
    assert_eq!(spec.bits_per_sample, 24);
    assert_eq!(reader.duration(), 12000);
}

#[test]
fn test_float_export_is_lossless() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("theta.wav");
    let config = EngineConfig::default().with_seed(4);

    let audio = render_preset(&builtin_presets()[1], 0.1, &config).unwrap();
    export_audio(&audio, &path, ExportFormat::float()).unwrap();

    let mut reader = hound::WavReader::open(&path).unwrap();
    let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
    assert_eq!(samples, audio.to_interleaved());
}
