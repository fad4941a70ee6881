//! Audio Buffer Management
//!
//! Non-interleaved 32-bit float buffers used for offline renders and WAV
//! export, plus level measurement helpers.

use crate::error::{LullError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default sample rate for offline rendering (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Linear RMS level of a slice of samples (0.0 for empty input)
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Calculate the RMS level of an audio buffer in dB
///
/// Returns -f32::INFINITY for empty or silent buffers.
pub fn calculate_rms(buffer: &AudioBuffer) -> f32 {
    let total_samples = buffer.num_channels() * buffer.num_samples();
    if total_samples == 0 {
        return f32::NEG_INFINITY;
    }

    let sum_squares: f64 = buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();

    let rms = (sum_squares / total_samples as f64).sqrt() as f32;
    linear_to_db(rms)
}

/// Largest absolute sample value of an audio buffer (linear, 0.0 if empty)
pub fn peak_amplitude(buffer: &AudioBuffer) -> f32 {
    buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| s.abs())
        .fold(0.0_f32, f32::max)
}

/// Calculate the peak level of an audio buffer in dB
pub fn calculate_peak(buffer: &AudioBuffer) -> f32 {
    linear_to_db(peak_amplitude(buffer))
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Rendered audio, one `Vec<f32>` per channel
///
/// # Example
/// ```
/// use lull::engine::{AudioBuffer, ChannelLayout};
///
/// let buffer = AudioBuffer::new(48000, ChannelLayout::Stereo, 48000);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 48000);
/// ```
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer with `num_samples` per channel
    pub fn new(num_samples: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        let num_channels = layout.num_channels();
        Self {
            samples: vec![vec![0.0_f32; num_samples]; num_channels],
            sample_rate,
        }
    }

    /// Create a stereo buffer from separate left/right channels
    pub fn from_stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if left.len() != right.len() {
            return Err(LullError::graph(format!(
                "stereo channel lengths differ: {} vs {}",
                left.len(),
                right.len()
            )));
        }
        Ok(Self {
            samples: vec![left, right],
            sample_rate,
        })
    }

    /// Create a mono buffer
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: vec![samples],
            sample_rate,
        }
    }

    /// Convert the buffer to interleaved format (L, R, L, R, ... for stereo)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let num_channels = self.channels();
        let num_samples = self.len();

        if num_channels == 0 || num_samples == 0 {
            return Vec::new();
        }

        let mut interleaved = Vec::with_capacity(num_channels * num_samples);
        for sample_idx in 0..num_samples {
            for channel in &self.samples {
                interleaved.push(channel[sample_idx]);
            }
        }
        interleaved
    }

    /// Append another buffer with the same channel count
    pub fn append(&mut self, other: &AudioBuffer) -> Result<()> {
        if other.channels() != self.channels() {
            return Err(LullError::graph(format!(
                "cannot append {}-channel audio to {}-channel buffer",
                other.channels(),
                self.channels()
            )));
        }
        for (dst, src) in self.samples.iter_mut().zip(&other.samples) {
            dst.extend_from_slice(src);
        }
        Ok(())
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Alias for channels()
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels()
    }

    /// Number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Alias for len()
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.len()
    }

    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Check that every sample is finite (no NaN/Inf)
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|channel| channel.iter())
            .all(|s| s.is_finite())
    }

    /// Check whether every sample is exactly zero
    pub fn is_silent(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|channel| channel.iter())
            .all(|&s| s == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_buffer_is_silent() {
        let buffer = AudioBuffer::new(100, ChannelLayout::Stereo, 48000);
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.len(), 100);
        assert!(buffer.is_silent());
        assert_eq!(calculate_rms(&buffer), f32::NEG_INFINITY);
    }

    #[test]
    fn test_interleave_order() {
        let buffer = AudioBuffer::from_stereo(vec![1.0, 2.0], vec![-1.0, -2.0], 48000).unwrap();
        assert_eq!(buffer.to_interleaved(), vec![1.0, -1.0, 2.0, -2.0]);
    }

    #[test]
    fn test_from_stereo_rejects_mismatched_lengths() {
        assert!(AudioBuffer::from_stereo(vec![0.0; 3], vec![0.0; 2], 48000).is_err());
    }

    #[test]
    fn test_append() {
        let mut a = AudioBuffer::new(10, ChannelLayout::Stereo, 48000);
        let b = AudioBuffer::new(5, ChannelLayout::Stereo, 48000);
        a.append(&b).unwrap();
        assert_eq!(a.len(), 15);

        let mono = AudioBuffer::new(5, ChannelLayout::Mono, 48000);
        assert!(a.append(&mono).is_err());
    }

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::new(24000, ChannelLayout::Mono, 48000);
        assert_relative_eq!(buffer.duration_secs(), 0.5);
    }

    #[test]
    fn test_rms_of_full_scale_square() {
        let samples: Vec<f32> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert_relative_eq!(rms(&samples), 1.0);
        let buffer = AudioBuffer::from_mono(samples, 48000);
        assert_relative_eq!(calculate_rms(&buffer), 0.0, epsilon = 1e-6);
        assert_relative_eq!(calculate_peak(&buffer), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_peak_amplitude_is_linear() {
        let buffer = AudioBuffer::from_stereo(vec![0.25, -0.5], vec![0.1, 0.0], 48000).unwrap();
        assert_relative_eq!(peak_amplitude(&buffer), 0.5);
        assert_relative_eq!(calculate_peak(&buffer), -6.0206, epsilon = 1e-3);

        let silent = AudioBuffer::new(16, ChannelLayout::Stereo, 48000);
        assert_eq!(peak_amplitude(&silent), 0.0);
        assert_eq!(calculate_peak(&silent), f32::NEG_INFINITY);
    }

    #[test]
    fn test_db_conversions() {
        assert_relative_eq!(linear_to_db(0.5), -6.0206, epsilon = 1e-3);
        assert_eq!(linear_to_db(0.0), f32::NEG_INFINITY);
    }
}
