//! Colored noise generation
//!
//! Produces loopable blocks of pink or brown noise. White noise is drawn
//! uniformly from [-1, 1) and shaped by one of the filters below.
//!
//! # Brown
//! One-pole leaky integrator `y[i] = (y[i-1] + 0.02·w[i]) / 1.02` followed
//! by a fixed ×3.5 gain compensation.
//!
//! # Pink
//! Paul Kellett's refined filter (seven feedback taps, roughly -3 dB/octave
//! from ~10 Hz up to ~20 kHz at 44.1 kHz). The older single-pole
//! approximation `y[i] = (y[i-1] + 0.05·w[i]) / 1.05` is still available as
//! [`PinkAlgorithm::Legacy`]; it leans brown rather than pink and is kept
//! only so renders can be compared against earlier recordings.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{LullError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Integration coefficient of the brown-noise recursion
pub const BROWN_COEFFICIENT: f32 = 0.02;

/// Gain restoring audible level after integration
pub const BROWN_GAIN_COMPENSATION: f32 = 3.5;

/// Integration coefficient of the legacy pink approximation
pub const LEGACY_PINK_COEFFICIENT: f32 = 0.05;

/// Output scaling for the Kellett filter (keeps peaks near full scale)
const KELLETT_OUTPUT_GAIN: f32 = 0.11;

/// Longest noise loop, in samples (ten minutes at 192 kHz)
pub const MAX_BUFFER_SAMPLES: usize = 600 * 192_000;

// ============================================================================
// Noise Color
// ============================================================================

/// Spectral color of a noise bed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseColor {
    /// ~ -3 dB/octave
    Pink,
    /// ~ -6 dB/octave (integrated white noise)
    Brown,
}

impl fmt::Display for NoiseColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseColor::Pink => write!(f, "pink"),
            NoiseColor::Brown => write!(f, "brown"),
        }
    }
}

impl FromStr for NoiseColor {
    type Err = LullError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pink" => Ok(NoiseColor::Pink),
            "brown" | "red" => Ok(NoiseColor::Brown),
            other => Err(LullError::InvalidConfig {
                reason: format!("unknown noise color '{}' (expected pink or brown)", other),
            }),
        }
    }
}

/// Which filter produces pink noise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinkAlgorithm {
    /// Paul Kellett's refined multi-tap filter
    #[default]
    Kellett,
    /// Single-pole low-pass approximation (brownish, not true pink)
    Legacy,
}

// ============================================================================
// Filters
// ============================================================================

/// Leaky integrator producing brown noise from white noise
///
/// `process` returns the raw recursion output before gain compensation so
/// that a fixed white sequence reproduces bit-identical values.
#[derive(Debug, Clone, Default)]
pub struct BrownIntegrator {
    last_out: f32,
}

impl BrownIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn process(&mut self, white: f32) -> f32 {
        self.last_out = (self.last_out + BROWN_COEFFICIENT * white) / (1.0 + BROWN_COEFFICIENT);
        self.last_out
    }
}

/// Paul Kellett's refined pink-noise filter
#[derive(Debug, Clone, Default)]
pub struct KellettPinkFilter {
    b: [f32; 7],
}

impl KellettPinkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn process(&mut self, white: f32) -> f32 {
        let b = &mut self.b;
        b[0] = 0.99886 * b[0] + white * 0.055_517_9;
        b[1] = 0.99332 * b[1] + white * 0.075_075_9;
        b[2] = 0.96900 * b[2] + white * 0.153_852;
        b[3] = 0.86650 * b[3] + white * 0.310_485_6;
        b[4] = 0.55000 * b[4] + white * 0.532_952_2;
        b[5] = -0.7616 * b[5] - white * 0.016_898;
        let pink = b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362;
        b[6] = white * 0.115_926;
        pink * KELLETT_OUTPUT_GAIN
    }
}

/// Single-pole pink approximation
#[derive(Debug, Clone, Default)]
pub struct LegacyPinkFilter {
    last_out: f32,
}

impl LegacyPinkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn process(&mut self, white: f32) -> f32 {
        self.last_out =
            (self.last_out + LEGACY_PINK_COEFFICIENT * white) / (1.0 + LEGACY_PINK_COEFFICIENT);
        self.last_out
    }
}

/// Shapes white noise into the requested color, gain compensation included
#[derive(Debug, Clone)]
enum ColorFilter {
    Brown(BrownIntegrator),
    Kellett(KellettPinkFilter),
    LegacyPink(LegacyPinkFilter),
}

impl ColorFilter {
    fn new(color: NoiseColor, pink: PinkAlgorithm) -> Self {
        match (color, pink) {
            (NoiseColor::Brown, _) => ColorFilter::Brown(BrownIntegrator::new()),
            (NoiseColor::Pink, PinkAlgorithm::Kellett) => {
                ColorFilter::Kellett(KellettPinkFilter::new())
            }
            (NoiseColor::Pink, PinkAlgorithm::Legacy) => {
                ColorFilter::LegacyPink(LegacyPinkFilter::new())
            }
        }
    }

    #[inline]
    fn process(&mut self, white: f32) -> f32 {
        match self {
            ColorFilter::Brown(f) => f.process(white) * BROWN_GAIN_COMPENSATION,
            ColorFilter::Kellett(f) => f.process(white),
            ColorFilter::LegacyPink(f) => f.process(white),
        }
    }
}

// ============================================================================
// Noise Buffer
// ============================================================================

/// Immutable block of generated mono noise
///
/// Cloning shares the underlying samples.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
    color: NoiseColor,
}

impl NoiseBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, color: NoiseColor) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            color,
        }
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn color(&self) -> NoiseColor {
        self.color
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Whether two buffers share the same allocation
    pub fn shares_storage(&self, other: &NoiseBuffer) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }

    /// SHA-256 of the little-endian sample bytes, as lowercase hex
    ///
    /// Two generators fed the same white sequence must agree on this value.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for sample in self.samples.iter() {
            hasher.update(sample.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Builds loopable noise buffers
#[derive(Debug, Clone, Copy, Default)]
pub struct NoiseGenerator {
    pink: PinkAlgorithm,
    crossfade_secs: f32,
}

impl NoiseGenerator {
    /// Create a generator
    ///
    /// # Arguments
    /// * `pink` - Filter used for pink noise
    /// * `crossfade_secs` - Length of the tail-into-head crossfade (0 disables it)
    pub fn new(pink: PinkAlgorithm, crossfade_secs: f32) -> Self {
        Self {
            pink,
            crossfade_secs: crossfade_secs.max(0.0),
        }
    }

    pub fn pink_algorithm(&self) -> PinkAlgorithm {
        self.pink
    }

    /// Number of samples a buffer of `duration_secs` holds at `sample_rate`
    ///
    /// # Errors
    /// * `InvalidConfig` - If the length is not finite or exceeds
    ///   [`MAX_BUFFER_SAMPLES`]
    pub fn buffer_len(duration_secs: f32, sample_rate: u32) -> Result<usize> {
        let len = (duration_secs as f64 * sample_rate as f64).round();
        if !(len.is_finite() && len >= 0.0 && len <= MAX_BUFFER_SAMPLES as f64) {
            return Err(LullError::InvalidConfig {
                reason: format!(
                    "{}s at {} Hz exceeds the {} sample noise limit",
                    duration_secs, sample_rate, MAX_BUFFER_SAMPLES
                ),
            });
        }
        Ok(len as usize)
    }

    /// Generate a loopable noise buffer
    ///
    /// # Errors
    /// * `InvalidConfig` - If the duration or sample rate is not positive, or
    ///   the buffer would exceed [`MAX_BUFFER_SAMPLES`]
    pub fn generate<R: Rng + ?Sized>(
        &self,
        color: NoiseColor,
        duration_secs: f32,
        sample_rate: u32,
        rng: &mut R,
    ) -> Result<NoiseBuffer> {
        if !(duration_secs.is_finite() && duration_secs > 0.0) {
            return Err(LullError::InvalidConfig {
                reason: format!("noise duration must be positive, got {}", duration_secs),
            });
        }
        if sample_rate == 0 {
            return Err(LullError::InvalidConfig {
                reason: "sample rate must be positive".to_string(),
            });
        }

        let len = Self::buffer_len(duration_secs, sample_rate)?;
        if len == 0 {
            return Err(LullError::InvalidConfig {
                reason: format!(
                    "{}s at {} Hz yields an empty buffer",
                    duration_secs, sample_rate
                ),
            });
        }

        // fade_len <= len / 2, so the sum stays under 2 * MAX_BUFFER_SAMPLES
        let fade_len = self.fade_len(len, sample_rate);
        let white: Vec<f32> = (0..len + fade_len)
            .map(|_| rng.gen_range(-1.0_f32..1.0_f32))
            .collect();

        Ok(self.shape(color, &white, len, sample_rate))
    }

    /// Shape a caller-supplied white sequence without crossfading
    ///
    /// The output has exactly `white.len()` samples. Used to check the
    /// recursion against a known input.
    pub fn generate_from_white(&self, color: NoiseColor, white: &[f32], sample_rate: u32) -> NoiseBuffer {
        let mut filter = ColorFilter::new(color, self.pink);
        let samples = white
            .iter()
            .map(|&w| filter.process(w).clamp(-1.0, 1.0))
            .collect();
        NoiseBuffer::new(samples, sample_rate, color)
    }

    fn fade_len(&self, len: usize, sample_rate: u32) -> usize {
        let requested = (self.crossfade_secs as f64 * sample_rate as f64).round();
        if requested.is_finite() && requested < (len / 2) as f64 {
            requested as usize
        } else {
            len / 2
        }
    }

    fn shape(&self, color: NoiseColor, white: &[f32], len: usize, sample_rate: u32) -> NoiseBuffer {
        let mut filter = ColorFilter::new(color, self.pink);
        let shaped: Vec<f32> = white.iter().map(|&w| filter.process(w)).collect();

        let fade_len = shaped.len() - len;
        let mut samples = shaped[..len].to_vec();

        // The tail continues past sample len-1, so fading it over the head
        // makes len-1 -> 0 continue the same filtered process.
        for i in 0..fade_len {
            let t = i as f32 / fade_len as f32;
            let angle = t * std::f32::consts::FRAC_PI_2;
            samples[i] = samples[i] * angle.sin() + shaped[len + i] * angle.cos();
        }

        for sample in samples.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }

        NoiseBuffer::new(samples, sample_rate, color)
    }
}

/// Generate a loopable noise buffer with the default pink filter and crossfade
pub fn generate_noise<R: Rng + ?Sized>(
    color: NoiseColor,
    duration_secs: f32,
    sample_rate: u32,
    rng: &mut R,
) -> Result<NoiseBuffer> {
    NoiseGenerator::new(PinkAlgorithm::Kellett, 0.25).generate(color, duration_secs, sample_rate, rng)
}

// ============================================================================
// Unit Tests
// ============================================================================
