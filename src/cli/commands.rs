//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::config::EngineConfig;
use crate::dsp::{NoiseColor, NoiseGenerator};
use crate::engine::{
    calculate_peak, calculate_rms, export_audio, render_preset, rms, AudioBuffer, ExportFormat,
};
use crate::error::{LullError, Result};
use crate::preset::{PresetLibrary, SoundPreset};

const HEADPHONE_NOTICE: &str = "Binaural beats need headphones: each ear must hear only its own tone.";

/// Built-in presets plus any found at `library`
pub fn load_library(library: Option<&Path>) -> Result<PresetLibrary> {
    let mut presets = PresetLibrary::builtin();
    if let Some(path) = library {
        info!("Loading presets from: {}", path.display());
        presets.extend(PresetLibrary::load(path)?)?;
    }
    Ok(presets)
}

/// List available presets.
pub fn list_presets(library: Option<&Path>, json: bool) -> Result<()> {
    let presets = load_library(library)?;

    if json {
        let all: Vec<&SoundPreset> = presets.iter().collect();
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }

    println!("Presets:");
    println!("{:-<60}", "");
    for preset in presets.iter() {
        println!(
            "{:<8} {:<14} {:>6.1} Hz + {:>4.1} Hz beat, {} noise",
            preset.id.as_str(),
            preset.name,
            preset.base_carrier_frequency,
            preset.beat_frequency,
            preset.noise_color
        );
        if !preset.description.is_empty() {
            println!("         {}", preset.description);
        }
    }
    println!("{:-<60}", "");
    println!("{}", HEADPHONE_NOTICE);

    Ok(())
}

/// Render a preset to a WAV file.
pub fn render(
    config: &EngineConfig,
    library: Option<&Path>,
    preset_id: &str,
    seconds: f64,
    out: &Path,
    bit_depth: u16,
) -> Result<()> {
    let presets = load_library(library)?;
    let preset = presets.require(preset_id)?;

    info!("Rendering '{}' for {} s", preset.id, seconds);
    let audio = render_preset(preset, seconds, config)?;
    export_audio(&audio, out, ExportFormat::new(bit_depth))?;

    println!(
        "Rendered {} ({} / {} Hz) to {}",
        preset.name,
        preset.left_frequency(),
        preset.right_frequency(),
        out.display()
    );
    println!(
        "peak {:.1} dBFS, rms {:.1} dBFS",
        calculate_peak(&audio),
        calculate_rms(&audio)
    );
    if preset.requires_headphones() {
        println!("{}", HEADPHONE_NOTICE);
    }

    Ok(())
}

/// Write a single noise loop to a WAV file and print its fingerprint.
pub fn noise(config: &EngineConfig, color: NoiseColor, seconds: f32, out: &Path) -> Result<()> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let generator = NoiseGenerator::new(config.pink_algorithm, config.crossfade_seconds);
    let buffer = generator.generate(color, seconds, config.sample_rate, &mut rng)?;

    let audio = AudioBuffer::from_mono(buffer.samples().to_vec(), buffer.sample_rate());
    export_audio(&audio, out, ExportFormat::default())?;

    println!(
        "{} noise, {} samples, rms {:.3} -> {}",
        color,
        buffer.len(),
        rms(buffer.samples()),
        out.display()
    );
    println!("fingerprint: {}", buffer.fingerprint());

    Ok(())
}

/// How long `play` keeps the session running
///
/// # Errors
/// * `InvalidConfig` - If `seconds` is not finite and positive
pub fn play_duration(seconds: f64) -> Result<Duration> {
    if !(seconds.is_finite() && seconds > 0.0) {
        return Err(LullError::InvalidConfig {
            reason: format!("play duration must be positive, got {}", seconds),
        });
    }
    Duration::try_from_secs_f64(seconds).map_err(|e| LullError::InvalidConfig {
        reason: format!("play duration {} s: {}", seconds, e),
    })
}

/// Play a preset on the audio device for `seconds`.
#[cfg(feature = "cpal-output")]
pub fn play(
    config: &EngineConfig,
    library: Option<&Path>,
    preset_id: &str,
    seconds: f64,
    device: Option<&str>,
) -> Result<()> {
    use crate::backend::CpalBackend;
    use crate::engine::SessionController;

    let duration = play_duration(seconds)?;
    let presets = load_library(library)?;
    let preset = presets.require(preset_id)?;

    let backend = match device {
        Some(name) => CpalBackend::with_device(name),
        None => CpalBackend::new(),
    };
    let mut controller = SessionController::with_config(backend, config.clone())?;
    controller.start(preset)?;

    println!("Playing {} for {} s", preset.name, seconds);
    println!("{}", HEADPHONE_NOTICE);
    std::thread::sleep(duration);

    controller.stop();
    Ok(())
}
