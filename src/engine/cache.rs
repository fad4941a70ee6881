//! Noise buffer cache
//!
//! Generating a loop costs a few hundred thousand filter steps, so buffers
//! are kept and shared between sessions that would produce the same shape.
//! Cached buffers are [`NoiseBuffer`] clones and share sample storage.

use std::collections::HashMap;

use tracing::debug;

use crate::dsp::{NoiseBuffer, NoiseColor, NoiseGenerator, PinkAlgorithm};
use crate::error::Result;

/// What makes two generated loops interchangeable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub color: NoiseColor,
    pub pink_algorithm: PinkAlgorithm,
    pub loop_samples: usize,
    pub sample_rate: u32,
}

impl CacheKey {
    /// # Errors
    /// * `InvalidConfig` - If the loop is longer than a noise buffer may be
    pub fn new(
        color: NoiseColor,
        pink_algorithm: PinkAlgorithm,
        loop_seconds: f32,
        sample_rate: u32,
    ) -> Result<Self> {
        Ok(Self {
            color,
            pink_algorithm,
            loop_samples: NoiseGenerator::buffer_len(loop_seconds, sample_rate)?,
            sample_rate,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoiseCache {
    entries: HashMap<CacheKey, NoiseBuffer>,
    hits: u64,
    misses: u64,
}

impl NoiseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&NoiseBuffer> {
        self.entries.get(key)
    }

    /// Cached buffer for `key`, generating it with `generate` on a miss
    ///
    /// A failed generation caches nothing.
    pub fn get_or_try_insert_with<F>(&mut self, key: CacheKey, generate: F) -> Result<NoiseBuffer>
    where
        F: FnOnce() -> Result<NoiseBuffer>,
    {
        if let Some(buffer) = self.entries.get(&key) {
            self.hits += 1;
            debug!(color = %key.color, samples = key.loop_samples, "noise cache hit");
            return Ok(buffer.clone());
        }

        self.misses += 1;
        let buffer = generate()?;
        debug!(color = %key.color, samples = buffer.len(), "noise cache miss; generated");
        self.entries.insert(key, buffer.clone());
        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LullError;

    fn buffer(color: NoiseColor) -> NoiseBuffer {
        NoiseBuffer::new(vec![0.1; 16], 48000, color)
    }

    #[test]
    fn test_hit_shares_storage() {
        let mut cache = NoiseCache::new();
        let key = CacheKey::new(NoiseColor::Brown, PinkAlgorithm::Kellett, 5.0, 48000).unwrap();
        assert_eq!(key.loop_samples, 240000);

        let first = cache
            .get_or_try_insert_with(key, || Ok(buffer(NoiseColor::Brown)))
            .unwrap();
        let second = cache
            .get_or_try_insert_with(key, || panic!("should not regenerate"))
            .unwrap();

        assert!(first.shares_storage(&second));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_keys_distinguish_shape() {
        let brown = CacheKey::new(NoiseColor::Brown, PinkAlgorithm::Kellett, 5.0, 48000).unwrap();
        let pink = CacheKey::new(NoiseColor::Pink, PinkAlgorithm::Kellett, 5.0, 48000).unwrap();
        let legacy = CacheKey::new(NoiseColor::Pink, PinkAlgorithm::Legacy, 5.0, 48000).unwrap();
        let cd_rate = CacheKey::new(NoiseColor::Brown, PinkAlgorithm::Kellett, 5.0, 44100).unwrap();

        assert_ne!(brown, pink);
        assert_ne!(pink, legacy);
        assert_ne!(brown, cd_rate);
    }

    #[test]
    fn test_failed_generation_is_not_cached() {
        let mut cache = NoiseCache::new();
        let key = CacheKey::new(NoiseColor::Pink, PinkAlgorithm::Kellett, 1.0, 48000).unwrap();

        let result = cache.get_or_try_insert_with(key, || {
            Err(LullError::InvalidConfig {
                reason: "boom".into(),
            })
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
        assert!(cache.get(&key).is_none());
    }
}
