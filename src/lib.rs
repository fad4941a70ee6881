//! Lull - Procedural Sleep Soundscapes
//!
//! Lull plays soundscapes built from two layers:
//! 1. A colored noise bed (pink or brown), looped seamlessly and slowly
//!    auto-panned
//! 2. A binaural beat: two sine tones a few hertz apart, one per ear
//!
//! # Architecture
//!
//! - `dsp`: noise generation, oscillators, panning
//! - `graph`: a small node graph (sources, gains, panners) rendered per frame
//! - `backend`: output contexts hosting a graph, offline or on a device
//! - `engine`: playback sessions and the controller that keeps at most one
//!   of them alive
//!
//! # Example
//!
//! ```
//! use lull::backend::OfflineBackend;
//! use lull::engine::SessionController;
//! use lull::preset::PresetLibrary;
//!
//! let presets = PresetLibrary::builtin();
//! let mut controller = SessionController::new(OfflineBackend::new(48000));
//!
//! controller.start(presets.require("delta").unwrap()).unwrap();
//! assert!(controller.is_active("delta"));
//!
//! let audio = controller.render(480).unwrap();
//! assert_eq!(audio.channels(), 2);
//!
//! controller.stop();
//! assert!(!controller.is_playing());
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod graph;
pub mod preset;

pub use error::{LullError, Result};
