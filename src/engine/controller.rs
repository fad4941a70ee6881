//! Session controller
//!
//! Owns at most one [`PlaybackSession`] and moves between two states:
//!
//! ```text
//!   Idle ──start(p)──► Playing(p)
//!   Playing(p) ──start(q)──► (teardown p) ──► Playing(q)
//!   Playing(p) ──stop──► Idle
//!   Playing(p) ──toggle(p)──► Idle
//! ```
//!
//! The previous session is always torn down before a new context is
//! opened, so two sessions never play at once.

use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use super::cache::{CacheKey, NoiseCache};
use super::session::{PlaybackSession, TeardownReport};
use super::{AudioBuffer, ChannelLayout};
use crate::backend::{AudioBackend, OfflineBackend, OutputContext};
use crate::config::EngineConfig;
use crate::dsp::{NoiseBuffer, NoiseColor, NoiseGenerator};
use crate::error::Result;
use crate::preset::{PresetId, SoundPreset};

/// Observable controller state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// Nothing is playing
    #[default]
    Idle,
    /// A soundscape for this preset is playing
    Playing(PresetId),
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "Idle"),
            SessionStatus::Playing(id) => write!(f, "Playing({})", id),
        }
    }
}

enum SessionState<C: OutputContext> {
    Idle,
    Playing(PlaybackSession<C>),
}

/// Starts, stops and switches soundscapes on an [`AudioBackend`]
pub struct SessionController<B: AudioBackend> {
    backend: B,
    config: EngineConfig,
    generator: NoiseGenerator,
    cache: Option<NoiseCache>,
    rng: StdRng,
    state: SessionState<B::Context>,
    last_teardown: Option<TeardownReport>,
}

impl<B: AudioBackend> SessionController<B> {
    /// Create an idle controller with the default configuration
    ///
    /// # Example
    /// ```
    /// use lull::backend::OfflineBackend;
    /// use lull::engine::SessionController;
    ///
    /// let controller = SessionController::new(OfflineBackend::new(48000));
    /// assert!(!controller.is_playing());
    /// ```
    pub fn new(backend: B) -> Self {
        Self::build(backend, EngineConfig::default())
    }

    /// Create an idle controller
    ///
    /// # Errors
    /// * `InvalidConfig` - If the configuration does not validate
    pub fn with_config(backend: B, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(backend, config))
    }

    fn build(backend: B, config: EngineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            generator: NoiseGenerator::new(config.pink_algorithm, config.crossfade_seconds),
            cache: config.cache_noise.then(NoiseCache::new),
            rng,
            backend,
            config,
            state: SessionState::Idle,
            last_teardown: None,
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Start the soundscape for `preset`, replacing any active session
    ///
    /// The preset is validated before anything is touched; an invalid
    /// preset leaves the current state as it was. Any active session is
    /// fully torn down before the new context is opened.
    ///
    /// # Errors
    /// * `InvalidPreset` - If a frequency is non-positive or not finite
    /// * `AudioUnavailable` - If the backend cannot open an output; the
    ///   controller is then idle
    ///
    /// # Example
    /// ```
    /// use lull::backend::OfflineBackend;
    /// use lull::engine::SessionController;
    /// use lull::preset::builtin_presets;
    ///
    /// let presets = builtin_presets();
    /// let mut controller = SessionController::new(OfflineBackend::new(48000));
    /// controller.start(&presets[0]).unwrap();
    /// assert!(controller.is_active("delta"));
    ///
    /// controller.start(&presets[1]).unwrap();
    /// assert!(controller.is_active("theta"));
    /// assert!(!controller.is_active("delta"));
    /// ```
    pub fn start(&mut self, preset: &SoundPreset) -> Result<()> {
        preset.validate()?;

        self.teardown_active();

        let mut context = self.backend.open().map_err(|e| {
            warn!(backend = self.backend.name(), error = %e, "cannot open audio output");
            e
        })?;

        let noise = match self.noise_for(preset.noise_color, context.sample_rate()) {
            Ok(noise) => noise,
            Err(e) => {
                if let Err(close_err) = context.close() {
                    warn!(error = %close_err, "failed to close context after noise generation failed");
                }
                return Err(e);
            }
        };

        let session = PlaybackSession::build(context, preset, noise, &self.config.mix)?;
        info!(from = "Idle", to = %SessionStatus::Playing(preset.id.clone()), "session state change");
        self.state = SessionState::Playing(session);
        Ok(())
    }

    /// Stop the active session, if any
    ///
    /// Release failures are logged and recorded in [`Self::last_teardown`];
    /// the controller always ends idle.
    pub fn stop(&mut self) {
        if self.teardown_active() {
            info!(to = "Idle", "session state change");
        } else {
            debug!("stop while idle");
        }
    }

    /// Stop if `preset` is the one playing, start it otherwise
    ///
    /// # Example
    /// ```
    /// use lull::backend::OfflineBackend;
    /// use lull::engine::SessionController;
    /// use lull::preset::builtin_presets;
    ///
    /// let theta = &builtin_presets()[1];
    /// let mut controller = SessionController::new(OfflineBackend::new(48000));
    /// controller.toggle(theta).unwrap();
    /// assert!(controller.is_active("theta"));
    /// controller.toggle(theta).unwrap();
    /// assert!(!controller.is_playing());
    /// ```
    pub fn toggle(&mut self, preset: &SoundPreset) -> Result<()> {
        if self.is_active(preset.id.as_str()) {
            self.stop();
            Ok(())
        } else {
            self.start(preset)
        }
    }

    /// Tear down the active session; returns whether there was one
    fn teardown_active(&mut self) -> bool {
        match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Playing(session) => {
                let report = session.teardown();
                if !report.is_clean() {
                    warn!(
                        preset = %report.preset_id,
                        failures = report.failures.len(),
                        "session torn down with errors"
                    );
                }
                self.last_teardown = Some(report);
                true
            }
            SessionState::Idle => false,
        }
    }

    fn noise_for(&mut self, color: NoiseColor, sample_rate: u32) -> Result<NoiseBuffer> {
        let generator = self.generator;
        let loop_seconds = self.config.loop_seconds;
        let rng = &mut self.rng;
        let mut generate = || generator.generate(color, loop_seconds, sample_rate, &mut *rng);

        match self.cache.as_mut() {
            Some(cache) => {
                let key = CacheKey::new(color, generator.pink_algorithm(), loop_seconds, sample_rate)?;
                cache.get_or_try_insert_with(key, generate)
            }
            None => generate(),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether the session for `preset_id` is the one playing
    pub fn is_active(&self, preset_id: &str) -> bool {
        self.active_preset_id()
            .map(|id| id.as_str() == preset_id)
            .unwrap_or(false)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, SessionState::Playing(_))
    }

    pub fn status(&self) -> SessionStatus {
        match &self.state {
            SessionState::Idle => SessionStatus::Idle,
            SessionState::Playing(session) => SessionStatus::Playing(session.preset_id().clone()),
        }
    }

    pub fn active_preset_id(&self) -> Option<&PresetId> {
        self.session().map(|s| s.preset_id())
    }

    pub fn session(&self) -> Option<&PlaybackSession<B::Context>> {
        match &self.state {
            SessionState::Playing(session) => Some(session),
            SessionState::Idle => None,
        }
    }

    /// (left, right) frequencies of the playing binaural pair
    pub fn tone_frequencies(&self) -> Option<(f64, f64)> {
        self.session()?.tone_frequencies()
    }

    /// Report of the most recent teardown
    pub fn last_teardown(&self) -> Option<&TeardownReport> {
        self.last_teardown.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&NoiseCache> {
        self.cache.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: AudioBackend> Drop for SessionController<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SessionController<OfflineBackend> {
    /// Pull `frames` frames from the active session; silence when idle
    pub fn render(&mut self, frames: usize) -> Result<AudioBuffer> {
        match &mut self.state {
            SessionState::Playing(session) => session.context_mut().render(frames),
            SessionState::Idle => Ok(AudioBuffer::new(
                frames,
                ChannelLayout::Stereo,
                self.backend.sample_rate(),
            )),
        }
    }
}
