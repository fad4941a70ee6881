//! Signal primitives
//!
//! Noise shaping, sine oscillators and stereo panning used by the audio
//! graph nodes.

mod noise;
mod oscillator;
mod pan;

pub use noise::{
    generate_noise, BrownIntegrator, KellettPinkFilter, LegacyPinkFilter, NoiseBuffer,
    NoiseColor, NoiseGenerator, PinkAlgorithm, BROWN_COEFFICIENT, BROWN_GAIN_COMPENSATION,
    LEGACY_PINK_COEFFICIENT, MAX_BUFFER_SAMPLES,
};
pub use oscillator::SineOscillator;
pub use pan::{pan_gains, StereoPanner, PAN_LEFT, PAN_RIGHT};
