//! Audio Engine Module
//!
//! Session lifecycle and rendering:
//! - Playback sessions and their teardown
//! - The session controller state machine
//! - Noise buffer caching
//! - Offline rendering and WAV export

pub mod buffer;
pub mod cache;
pub mod controller;
pub mod io;
pub mod render;
pub mod session;

pub use buffer::{
    calculate_peak, calculate_rms, linear_to_db, peak_amplitude, rms, AudioBuffer, ChannelLayout,
    DEFAULT_SAMPLE_RATE,
};
pub use cache::{CacheKey, NoiseCache};
pub use controller::{SessionController, SessionStatus};
pub use io::{export_audio, import_audio, ExportFormat};
pub use render::{render_preset, RENDER_BLOCK_FRAMES};
pub use session::{NodeRole, PlaybackSession, ReleaseFailure, SessionNodes, TeardownReport};
