//! Equal-power stereo panning
//!
//! Same law as the Web Audio `StereoPannerNode` for a mono input:
//! `x = (pan + 1) / 2`, `left = cos(x·π/2)`, `right = sin(x·π/2)`.

use std::f32::consts::FRAC_PI_2;

/// Hard left
pub const PAN_LEFT: f32 = -1.0;

/// Hard right
pub const PAN_RIGHT: f32 = 1.0;

/// Left/right gains for a pan position in [-1, 1] (clamped)
#[inline]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let x = (pan.clamp(PAN_LEFT, PAN_RIGHT) + 1.0) * 0.5;
    let angle = x * FRAC_PI_2;
    (angle.cos(), angle.sin())
}

/// Mono-to-stereo panner with a base position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoPanner {
    pan: f32,
}

impl StereoPanner {
    pub fn new(pan: f32) -> Self {
        Self {
            pan: pan.clamp(PAN_LEFT, PAN_RIGHT),
        }
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    /// Pan a mono sample, with `modulation` added to the base position
    #[inline]
    pub fn process(&self, input: f32, modulation: f32) -> (f32, f32) {
        let (left, right) = pan_gains(self.pan + modulation);
        (input * left, input * right)
    }
}

impl Default for StereoPanner {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hard_pans_isolate_channels() {
        let (l, r) = StereoPanner::new(PAN_LEFT).process(1.0, 0.0);
        assert_relative_eq!(l, 1.0, epsilon = 1e-6);
        assert_relative_eq!(r, 0.0, epsilon = 1e-6);

        let (l, r) = StereoPanner::new(PAN_RIGHT).process(1.0, 0.0);
        assert_relative_eq!(l, 0.0, epsilon = 1e-6);
        assert_relative_eq!(r, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_center_is_equal_power() {
        let (l, r) = pan_gains(0.0);
        assert_relative_eq!(l, r, epsilon = 1e-6);
        assert_relative_eq!(l * l + r * r, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_modulation_is_clamped() {
        let panner = StereoPanner::new(0.9);
        let (l, r) = panner.process(1.0, 0.5);
        assert_relative_eq!(l, 0.0, epsilon = 1e-6);
        assert_relative_eq!(r, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_constructor_clamps() {
        assert_eq!(StereoPanner::new(-3.0).pan(), PAN_LEFT);
    }
}
