//! Engine configuration
//!
//! Loaded from TOML; every key is optional and falls back to the values
//! the soundscapes were tuned with.
//!
//! ```toml
//! loop_seconds = 5.0
//! pink_algorithm = "kellett"
//!
//! [mix]
//! noise_gain = 0.15
//! pan_depth = 0.3
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dsp::PinkAlgorithm;
use crate::engine::DEFAULT_SAMPLE_RATE;
use crate::error::{LullError, Result};

/// Longest configurable noise loop in seconds
pub const MAX_LOOP_SECONDS: f32 = 600.0;

/// Levels and modulation of the session graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixSettings {
    /// Noise bed level
    pub noise_gain: f32,
    /// Binaural tone level, kept low so it sits under the noise
    pub tone_gain: f32,
    /// Rate of the noise auto-pan in Hz
    pub pan_lfo_hz: f64,
    /// Auto-pan excursion as a fraction of full pan range
    pub pan_depth: f32,
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            noise_gain: 0.15,
            tone_gain: 0.05,
            pan_lfo_hz: 0.1,
            pan_depth: 0.3,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Length of the looped noise buffer
    pub loop_seconds: f32,
    /// Tail-into-head crossfade hiding the loop seam
    pub crossfade_seconds: f32,
    pub pink_algorithm: PinkAlgorithm,
    /// Reuse noise buffers across sessions with the same color and rate
    pub cache_noise: bool,
    /// Fixed RNG seed; random when absent
    pub seed: Option<u64>,
    /// Sample rate of the offline renderer
    pub sample_rate: u32,
    pub mix: MixSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            loop_seconds: 5.0,
            crossfade_seconds: 0.25,
            pink_algorithm: PinkAlgorithm::Kellett,
            cache_noise: true,
            seed: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            mix: MixSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check every value is usable
    ///
    /// # Errors
    /// * `InvalidConfig` - Naming the first offending key
    pub fn validate(&self) -> Result<()> {
        positive("loop_seconds", self.loop_seconds as f64)?;
        at_most("loop_seconds", self.loop_seconds, MAX_LOOP_SECONDS)?;
        non_negative("crossfade_seconds", self.crossfade_seconds as f64)?;
        at_most("crossfade_seconds", self.crossfade_seconds, MAX_LOOP_SECONDS)?;
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate must be positive"));
        }
        non_negative("mix.noise_gain", self.mix.noise_gain as f64)?;
        non_negative("mix.tone_gain", self.mix.tone_gain as f64)?;
        positive("mix.pan_lfo_hz", self.mix.pan_lfo_hz)?;
        non_negative("mix.pan_depth", self.mix.pan_depth as f64)?;
        if self.mix.pan_depth > 1.0 {
            return Err(invalid(format!(
                "mix.pan_depth must be at most 1.0, got {}",
                self.mix.pan_depth
            )));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> LullError {
    LullError::InvalidConfig {
        reason: reason.into(),
    }
}

fn positive(key: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{} must be positive, got {}", key, value)))
    }
}

fn non_negative(key: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{} must be zero or more, got {}", key, value)))
    }
}

fn at_most(key: &str, value: f32, max: f32) -> Result<()> {
    if value <= max {
        Ok(())
    } else {
        Err(invalid(format!("{} must be at most {}, got {}", key, max, value)))
    }
}
