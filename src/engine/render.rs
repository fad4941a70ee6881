//! Offline rendering of whole soundscapes

use tracing::info;

use super::controller::SessionController;
use super::{AudioBuffer, ChannelLayout};
use crate::backend::OfflineBackend;
use crate::config::EngineConfig;
use crate::error::{LullError, Result};
use crate::preset::SoundPreset;

/// Frames pulled from the graph per render call
pub const RENDER_BLOCK_FRAMES: usize = 4096;

/// Render `seconds` of the soundscape for `preset` at the configured rate
///
/// # Errors
/// * `InvalidPreset` - If the preset does not validate
/// * `InvalidConfig` - If `seconds` is not positive or the config is invalid
///
/// # Example
/// ```
/// use lull::config::EngineConfig;
/// use lull::engine::render_preset;
/// use lull::preset::builtin_presets;
///
/// let config = EngineConfig::default().with_seed(1);
/// let audio = render_preset(&builtin_presets()[0], 0.5, &config).unwrap();
/// assert_eq!(audio.len(), 24000);
/// assert_eq!(audio.channels(), 2);
/// ```
pub fn render_preset(preset: &SoundPreset, seconds: f64, config: &EngineConfig) -> Result<AudioBuffer> {
    if !(seconds.is_finite() && seconds > 0.0) {
        return Err(LullError::InvalidConfig {
            reason: format!("render length must be positive, got {} s", seconds),
        });
    }

    let backend = OfflineBackend::new(config.sample_rate);
    let mut controller = SessionController::with_config(backend, config.clone())?;
    controller.start(preset)?;

    let total = (seconds * config.sample_rate as f64).round() as usize;
    let mut output = AudioBuffer::new(0, ChannelLayout::Stereo, config.sample_rate);
    let mut remaining = total;
    while remaining > 0 {
        let frames = remaining.min(RENDER_BLOCK_FRAMES);
        output.append(&controller.render(frames)?)?;
        remaining -= frames;
    }

    controller.stop();
    info!(preset = %preset.id, frames = total, "rendered soundscape");
    Ok(output)
}
