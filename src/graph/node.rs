//! Graph node types and events

use std::fmt;
use std::ops::{Add, AddAssign, Mul};

use crate::dsp::{NoiseBuffer, SineOscillator, StereoPanner};

/// Handle to a node inside a [`MixGraph`](super::MixGraph)
///
/// Ids are never reused within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Plays a noise buffer, optionally looping
    BufferSource,
    /// Continuous sine oscillator
    Oscillator,
    /// Mono-to-stereo equal-power panner
    Panner,
    /// Linear gain stage
    Gain,
}

impl NodeKind {
    /// Sources produce signal and must be started/stopped
    pub fn is_source(&self) -> bool {
        matches!(self, NodeKind::BufferSource | NodeKind::Oscillator)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::BufferSource => write!(f, "buffer-source"),
            NodeKind::Oscillator => write!(f, "oscillator"),
            NodeKind::Panner => write!(f, "panner"),
            NodeKind::Gain => write!(f, "gain"),
        }
    }
}

/// Where a node's output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connection {
    /// Signal input of another node
    Node(NodeId),
    /// Pan parameter of a panner (modulation, added to its base pan)
    PanParam(NodeId),
    /// The device output
    Destination,
}

impl Connection {
    pub(crate) fn target(&self) -> Option<NodeId> {
        match self {
            Connection::Node(id) | Connection::PanParam(id) => Some(*id),
            Connection::Destination => None,
        }
    }
}

/// Structural change in a graph, reported to a [`GraphObserver`]
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    NodeCreated { node: NodeId, kind: NodeKind },
    Connected { from: NodeId, to: Connection },
    Started(NodeId),
    Stopped(NodeId),
    Disconnected(NodeId),
    Removed(NodeId),
    Closed,
}

/// Receives every structural change of a graph
pub trait GraphObserver: Send {
    fn on_event(&mut self, event: &GraphEvent);
}

/// One stereo sample
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub const SILENCE: StereoFrame = StereoFrame {
        left: 0.0,
        right: 0.0,
    };

    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    pub fn mono(value: f32) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Average of both channels
    #[inline]
    pub fn downmix(&self) -> f32 {
        (self.left + self.right) * 0.5
    }
}

impl Add for StereoFrame {
    type Output = StereoFrame;

    fn add(self, rhs: StereoFrame) -> StereoFrame {
        StereoFrame::new(self.left + rhs.left, self.right + rhs.right)
    }
}

impl AddAssign for StereoFrame {
    fn add_assign(&mut self, rhs: StereoFrame) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl Mul<f32> for StereoFrame {
    type Output = StereoFrame;

    fn mul(self, rhs: f32) -> StereoFrame {
        StereoFrame::new(self.left * rhs, self.right * rhs)
    }
}

/// Node state held by the graph
#[derive(Debug, Clone)]
pub(crate) enum Node {
    BufferSource {
        buffer: NoiseBuffer,
        looping: bool,
        position: usize,
        running: bool,
    },
    Oscillator {
        oscillator: SineOscillator,
        running: bool,
    },
    Panner {
        panner: StereoPanner,
    },
    Gain {
        gain: f32,
    },
}

impl Node {
    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            Node::BufferSource { .. } => NodeKind::BufferSource,
            Node::Oscillator { .. } => NodeKind::Oscillator,
            Node::Panner { .. } => NodeKind::Panner,
            Node::Gain { .. } => NodeKind::Gain,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        match self {
            Node::BufferSource { running, .. } | Node::Oscillator { running, .. } => *running,
            _ => false,
        }
    }

    pub(crate) fn set_running(&mut self, value: bool) {
        match self {
            Node::BufferSource { running, .. } | Node::Oscillator { running, .. } => {
                *running = value
            }
            _ => {}
        }
    }

    /// Compute the next output frame
    ///
    /// `input` is the summed signal input, `modulation` the summed value
    /// connected to the node's parameter (pan).
    pub(crate) fn tick(&mut self, input: StereoFrame, modulation: f32) -> StereoFrame {
        match self {
            Node::BufferSource {
                buffer,
                looping,
                position,
                running,
            } => {
                if !*running || buffer.is_empty() {
                    return StereoFrame::SILENCE;
                }
                if *position >= buffer.len() {
                    if *looping {
                        *position = 0;
                    } else {
                        *running = false;
                        return StereoFrame::SILENCE;
                    }
                }
                let value = buffer.samples()[*position];
                *position += 1;
                StereoFrame::mono(value)
            }
            Node::Oscillator {
                oscillator,
                running,
            } => {
                if !*running {
                    return StereoFrame::SILENCE;
                }
                StereoFrame::mono(oscillator.next_sample())
            }
            Node::Panner { panner } => {
                let (left, right) = panner.process(input.downmix(), modulation);
                StereoFrame::new(left, right)
            }
            Node::Gain { gain } => input * *gain,
        }
    }
}
