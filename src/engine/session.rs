//! Playback sessions
//!
//! A session owns one output context and the ten nodes of a soundscape:
//!
//! ```text
//! noise source ──► noise panner ──► noise gain ──────────┐
//!                      ▲ pan                             │
//! pan LFO ──► pan depth┘                                 ▼
//! left tone  ──► left pan  ──┐                       destination
//! right tone ──► right pan ──┴──► beat gain ─────────────▲
//! ```
//!
//! Teardown walks every role explicitly; adding a role to [`SessionNodes`]
//! without releasing it does not compile.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::backend::OutputContext;
use crate::config::MixSettings;
use crate::dsp::{NoiseBuffer, PAN_LEFT, PAN_RIGHT};
use crate::error::{LullError, Result};
use crate::graph::{Connection, NodeId};
use crate::preset::{PresetId, SoundPreset};

/// The fixed roles of a soundscape graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    NoiseSource,
    NoisePanner,
    PanLfo,
    PanDepth,
    NoiseGain,
    LeftTone,
    RightTone,
    LeftPan,
    RightPan,
    BeatGain,
}

impl NodeRole {
    /// Roles that must be stopped, not just disconnected
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            NodeRole::NoiseSource | NodeRole::PanLfo | NodeRole::LeftTone | NodeRole::RightTone
        )
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeRole::NoiseSource => "noise source",
            NodeRole::NoisePanner => "noise panner",
            NodeRole::PanLfo => "pan LFO",
            NodeRole::PanDepth => "pan depth",
            NodeRole::NoiseGain => "noise gain",
            NodeRole::LeftTone => "left tone",
            NodeRole::RightTone => "right tone",
            NodeRole::LeftPan => "left pan",
            NodeRole::RightPan => "right pan",
            NodeRole::BeatGain => "beat gain",
        };
        f.write_str(name)
    }
}

/// Node handles of one session, one field per role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionNodes {
    pub noise_source: NodeId,
    pub noise_panner: NodeId,
    pub pan_lfo: NodeId,
    pub pan_depth: NodeId,
    pub noise_gain: NodeId,
    pub left_tone: NodeId,
    pub right_tone: NodeId,
    pub left_pan: NodeId,
    pub right_pan: NodeId,
    pub beat_gain: NodeId,
}

impl SessionNodes {
    /// Every role with its node, sources first
    pub fn entries(&self) -> [(NodeRole, NodeId); 10] {
        let SessionNodes {
            noise_source,
            noise_panner,
            pan_lfo,
            pan_depth,
            noise_gain,
            left_tone,
            right_tone,
            left_pan,
            right_pan,
            beat_gain,
        } = *self;
        [
            (NodeRole::NoiseSource, noise_source),
            (NodeRole::PanLfo, pan_lfo),
            (NodeRole::LeftTone, left_tone),
            (NodeRole::RightTone, right_tone),
            (NodeRole::NoisePanner, noise_panner),
            (NodeRole::PanDepth, pan_depth),
            (NodeRole::NoiseGain, noise_gain),
            (NodeRole::LeftPan, left_pan),
            (NodeRole::RightPan, right_pan),
            (NodeRole::BeatGain, beat_gain),
        ]
    }

    pub fn get(&self, role: NodeRole) -> NodeId {
        match role {
            NodeRole::NoiseSource => self.noise_source,
            NodeRole::NoisePanner => self.noise_panner,
            NodeRole::PanLfo => self.pan_lfo,
            NodeRole::PanDepth => self.pan_depth,
            NodeRole::NoiseGain => self.noise_gain,
            NodeRole::LeftTone => self.left_tone,
            NodeRole::RightTone => self.right_tone,
            NodeRole::LeftPan => self.left_pan,
            NodeRole::RightPan => self.right_pan,
            NodeRole::BeatGain => self.beat_gain,
        }
    }
}

/// A node operation that failed during teardown
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseFailure {
    pub role: NodeRole,
    pub operation: &'static str,
    pub reason: String,
}

impl From<&ReleaseFailure> for LullError {
    fn from(failure: &ReleaseFailure) -> Self {
        LullError::NodeReleaseFailed {
            role: failure.role.to_string(),
            reason: format!("{} failed: {}", failure.operation, failure.reason),
        }
    }
}

/// What a teardown managed to release
#[derive(Debug, Clone, PartialEq)]
pub struct TeardownReport {
    pub session_id: Uuid,
    pub preset_id: PresetId,
    pub released: Vec<NodeRole>,
    pub failures: Vec<ReleaseFailure>,
    /// Error closing the context, if any
    pub close_error: Option<String>,
    /// How long the session was playing
    pub played_for: chrono::Duration,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.close_error.is_none()
    }
}

/// One live soundscape
#[derive(Debug)]
pub struct PlaybackSession<C: OutputContext> {
    id: Uuid,
    preset: SoundPreset,
    started_at: DateTime<Utc>,
    context: C,
    nodes: SessionNodes,
    noise: NoiseBuffer,
}

impl<C: OutputContext> PlaybackSession<C> {
    /// Wire and start the soundscape graph on `context`
    ///
    /// On failure the context is closed before returning, so nothing built
    /// so far keeps running.
    pub fn build(
        mut context: C,
        preset: &SoundPreset,
        noise: NoiseBuffer,
        mix: &MixSettings,
    ) -> Result<Self> {
        let id = Uuid::new_v4();
        let span = info_span!("session", session_id = %id, preset = %preset.id);
        let _guard = span.enter();

        match wire(&mut context, preset, &noise, mix) {
            Ok(nodes) => {
                info!(
                    left_hz = preset.left_frequency(),
                    right_hz = preset.right_frequency(),
                    color = %preset.noise_color,
                    "session started"
                );
                Ok(Self {
                    id,
                    preset: preset.clone(),
                    started_at: Utc::now(),
                    context,
                    nodes,
                    noise,
                })
            }
            Err(e) => {
                warn!(error = %e, "session build failed; closing context");
                if let Err(close_err) = context.close() {
                    warn!(error = %close_err, "failed to close context after build failure");
                }
                Err(e)
            }
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn preset(&self) -> &SoundPreset {
        &self.preset
    }

    pub fn preset_id(&self) -> &PresetId {
        &self.preset.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }

    pub fn nodes(&self) -> &SessionNodes {
        &self.nodes
    }

    pub fn noise(&self) -> &NoiseBuffer {
        &self.noise
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// (left, right) tone frequencies as set on the oscillators
    pub fn tone_frequencies(&self) -> Option<(f64, f64)> {
        let left = self.context.frequency(self.nodes.left_tone)?;
        let right = self.context.frequency(self.nodes.right_tone)?;
        Some((left, right))
    }

    /// Stop every source, disconnect every node, close the context
    ///
    /// Each step is attempted regardless of earlier failures.
    pub fn teardown(mut self) -> TeardownReport {
        let span = info_span!("session", session_id = %self.id, preset = %self.preset.id);
        let _guard = span.enter();

        let mut failures = Vec::new();
        let mut released = Vec::new();

        for (role, node) in self.nodes.entries() {
            let mut ok = true;
            if role.is_source() {
                if let Err(e) = self.context.stop(node) {
                    ok = false;
                    failures.push(ReleaseFailure {
                        role,
                        operation: "stop",
                        reason: e.to_string(),
                    });
                }
            }
            if let Err(e) = self.context.disconnect(node) {
                ok = false;
                failures.push(ReleaseFailure {
                    role,
                    operation: "disconnect",
                    reason: e.to_string(),
                });
            }
            if ok {
                released.push(role);
            }
        }

        let close_error = self.context.close().err().map(|e| e.to_string());

        for failure in &failures {
            warn!(error = %LullError::from(failure), "node release failed");
        }
        if let Some(reason) = &close_error {
            warn!(reason = %reason, "failed to close output context");
        }
        let played_for = self.elapsed();
        debug!(
            released = released.len(),
            failed = failures.len(),
            played_ms = played_for.num_milliseconds(),
            "session torn down"
        );

        TeardownReport {
            session_id: self.id,
            preset_id: self.preset.id.clone(),
            released,
            failures,
            close_error,
            played_for,
        }
    }
}

fn wire<C: OutputContext>(
    ctx: &mut C,
    preset: &SoundPreset,
    noise: &NoiseBuffer,
    mix: &MixSettings,
) -> Result<SessionNodes> {
    // Noise bed with slow auto-pan
    let noise_source = ctx.create_buffer_source(noise.clone(), true)?;
    let noise_panner = ctx.create_panner(0.0)?;
    let pan_lfo = ctx.create_oscillator(mix.pan_lfo_hz)?;
    let pan_depth = ctx.create_gain(mix.pan_depth)?;
    let noise_gain = ctx.create_gain(mix.noise_gain)?;

    ctx.connect(pan_lfo, Connection::Node(pan_depth))?;
    ctx.connect(pan_depth, Connection::PanParam(noise_panner))?;
    ctx.connect(noise_source, Connection::Node(noise_panner))?;
    ctx.connect(noise_panner, Connection::Node(noise_gain))?;

    // Binaural pair, one tone per ear
    let left_tone = ctx.create_oscillator(preset.left_frequency())?;
    let right_tone = ctx.create_oscillator(preset.right_frequency())?;
    let left_pan = ctx.create_panner(PAN_LEFT)?;
    let right_pan = ctx.create_panner(PAN_RIGHT)?;
    let beat_gain = ctx.create_gain(mix.tone_gain)?;

    ctx.connect(left_tone, Connection::Node(left_pan))?;
    ctx.connect(right_tone, Connection::Node(right_pan))?;
    ctx.connect(left_pan, Connection::Node(beat_gain))?;
    ctx.connect(right_pan, Connection::Node(beat_gain))?;

    ctx.connect(noise_gain, Connection::Destination)?;
    ctx.connect(beat_gain, Connection::Destination)?;

    for source in [pan_lfo, noise_source, left_tone, right_tone] {
        ctx.start(source)?;
    }

    Ok(SessionNodes {
        noise_source,
        noise_panner,
        pan_lfo,
        pan_depth,
        noise_gain,
        left_tone,
        right_tone,
        left_pan,
        right_pan,
        beat_gain,
    })
}
