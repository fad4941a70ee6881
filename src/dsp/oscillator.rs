//! Sine oscillator
//!
//! Phase is accumulated in f64 so low-frequency LFOs and long sessions do
//! not drift audibly.

use std::f64::consts::TAU;

/// Continuous sine oscillator
#[derive(Debug, Clone)]
pub struct SineOscillator {
    frequency: f64,
    phase: f64,
    phase_increment: f64,
    sample_rate: u32,
}

impl SineOscillator {
    /// Create an oscillator at `frequency` Hz, starting at phase 0
    pub fn new(frequency: f64, sample_rate: u32) -> Self {
        let mut osc = Self {
            frequency,
            phase: 0.0,
            phase_increment: 0.0,
            sample_rate,
        };
        osc.update_increment();
        osc
    }

    /// The configured frequency, exactly as set
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
        self.update_increment();
    }

    /// Produce the next sample in [-1, 1]
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let value = self.phase.sin();
        // The increment exceeds TAU when the frequency is above the sample rate
        self.phase = (self.phase + self.phase_increment).rem_euclid(TAU);
        value as f32
    }

    fn update_increment(&mut self) {
        self.phase_increment = if self.sample_rate == 0 {
            0.0
        } else {
            TAU * self.frequency / self.sample_rate as f64
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frequency_is_exact() {
        let osc = SineOscillator::new(102.0, 48000);
        assert_eq!(osc.frequency(), 102.0);
    }

    #[test]
    fn test_starts_at_zero_and_reaches_peak_at_quarter_period() {
        // 1 kHz at 48 kHz: a quarter period is 12 samples
        let mut osc = SineOscillator::new(1000.0, 48000);
        assert_eq!(osc.next_sample(), 0.0);
        for _ in 0..11 {
            osc.next_sample();
        }
        assert_relative_eq!(osc.next_sample(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_zero_crossings_match_frequency() {
        let mut osc = SineOscillator::new(100.0, 48000);
        let samples: Vec<f32> = (0..48000).map(|_| osc.next_sample()).collect();
        let rising = samples
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count();
        assert!((99..=101).contains(&rising), "got {} rising crossings", rising);
    }

    #[test]
    fn test_set_frequency_keeps_phase_continuous() {
        let mut osc = SineOscillator::new(0.1, 48000);
        for _ in 0..1000 {
            osc.next_sample();
        }
        let before = osc.next_sample();
        osc.set_frequency(0.2);
        let after = osc.next_sample();
        assert!((after - before).abs() < 1e-3);
    }

    #[test]
    fn test_phase_stays_wrapped_above_sample_rate() {
        let mut osc = SineOscillator::new(60000.0, 48000);
        for _ in 0..480_000 {
            assert!(osc.next_sample().is_finite());
        }
        assert!((0.0..TAU).contains(&osc.phase), "phase {}", osc.phase);

        // 60 kHz aliases to 12 kHz: a quarter of a turn per sample
        let mut reference = SineOscillator::new(12000.0, 48000);
        let mut osc = SineOscillator::new(60000.0, 48000);
        for _ in 0..1000 {
            assert_relative_eq!(osc.next_sample(), reference.next_sample(), epsilon = 1e-4);
        }
    }
}
