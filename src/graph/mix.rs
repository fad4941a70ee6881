//! Mix graph
//!
//! Owns the nodes of one output context and renders them frame by frame.
//! Evaluation order is a topological sort of the connections, rebuilt
//! lazily after structural changes; connections that would form a cycle
//! are rejected.

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, trace};

use super::node::{Connection, GraphEvent, GraphObserver, Node, NodeId, NodeKind, StereoFrame};
use crate::dsp::{NoiseBuffer, SineOscillator, StereoPanner};
use crate::engine::AudioBuffer;
use crate::error::{LullError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Edge {
    from: NodeId,
    to: Connection,
}

/// Precomputed evaluation step for one node
#[derive(Debug, Clone, Default)]
struct Step {
    node: usize,
    inputs: Vec<usize>,
    modulators: Vec<usize>,
}

/// Evaluation plan: steps in topological order, outputs indexed by step
#[derive(Debug, Clone, Default)]
struct Plan {
    steps: Vec<Step>,
    sinks: Vec<usize>,
}

/// Audio graph of one output context
pub struct MixGraph {
    sample_rate: u32,
    nodes: Vec<Option<Node>>,
    edges: Vec<Edge>,
    plan: Option<Plan>,
    scratch: Vec<StereoFrame>,
    observer: Option<Box<dyn GraphObserver>>,
    closed: bool,
}

impl fmt::Debug for MixGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixGraph")
            .field("sample_rate", &self.sample_rate)
            .field("live_nodes", &self.live_nodes().len())
            .field("edges", &self.edges.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl MixGraph {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            nodes: Vec::new(),
            edges: Vec::new(),
            plan: None,
            scratch: Vec::new(),
            observer: None,
            closed: false,
        }
    }

    /// Attach an observer that receives every structural change
    pub fn set_observer(&mut self, observer: Box<dyn GraphObserver>) {
        self.observer = Some(observer);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ========================================================================
    // Node Creation
    // ========================================================================

    /// Add a source that plays `buffer`, looping if requested
    pub fn add_buffer_source(&mut self, buffer: NoiseBuffer, looping: bool) -> Result<NodeId> {
        if buffer.sample_rate() != self.sample_rate {
            debug!(
                buffer_rate = buffer.sample_rate(),
                graph_rate = self.sample_rate,
                "buffer sample rate differs from graph; playing sample-for-sample"
            );
        }
        self.insert(Node::BufferSource {
            buffer,
            looping,
            position: 0,
            running: false,
        })
    }

    /// Add a sine oscillator
    ///
    /// # Errors
    /// * `GraphError` - If the frequency is negative or not finite
    pub fn add_oscillator(&mut self, frequency: f64) -> Result<NodeId> {
        if !frequency.is_finite() || frequency < 0.0 {
            return Err(LullError::graph(format!(
                "oscillator frequency must be finite and non-negative, got {}",
                frequency
            )));
        }
        self.insert(Node::Oscillator {
            oscillator: SineOscillator::new(frequency, self.sample_rate),
            running: false,
        })
    }

    pub fn add_panner(&mut self, pan: f32) -> Result<NodeId> {
        self.insert(Node::Panner {
            panner: StereoPanner::new(pan),
        })
    }

    pub fn add_gain(&mut self, gain: f32) -> Result<NodeId> {
        self.insert(Node::Gain { gain })
    }

    fn insert(&mut self, node: Node) -> Result<NodeId> {
        self.ensure_open()?;
        let id = NodeId(self.nodes.len());
        let kind = node.kind();
        self.nodes.push(Some(node));
        self.plan = None;
        self.emit(GraphEvent::NodeCreated { node: id, kind });
        Ok(id)
    }

    // ========================================================================
    // Wiring
    // ========================================================================

    /// Connect a node's output
    ///
    /// # Errors
    /// * `GraphError` - Unknown node, pan modulation of a non-panner, or a
    ///   connection that would create a cycle
    pub fn connect(&mut self, from: NodeId, to: Connection) -> Result<()> {
        self.ensure_open()?;
        self.node(from)?;

        if let Some(target) = to.target() {
            let target_node = self.node(target)?;
            if matches!(to, Connection::PanParam(_)) && target_node.kind() != NodeKind::Panner {
                return Err(LullError::graph(format!(
                    "{} is a {}, it has no pan parameter",
                    target,
                    target_node.kind()
                )));
            }
            if target == from || self.reaches(target, from) {
                return Err(LullError::graph(format!(
                    "connecting {} to {} would create a cycle",
                    from, target
                )));
            }
        }

        let edge = Edge { from, to };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
            self.plan = None;
            self.emit(GraphEvent::Connected { from, to });
        }
        Ok(())
    }

    /// Remove every outgoing connection of a node
    pub fn disconnect(&mut self, node: NodeId) -> Result<()> {
        self.node(node)?;
        let before = self.edges.len();
        self.edges.retain(|e| e.from != node);
        if self.edges.len() != before {
            self.plan = None;
        }
        self.emit(GraphEvent::Disconnected(node));
        Ok(())
    }

    /// Remove a node and every connection touching it
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        self.node(node)?;
        self.edges
            .retain(|e| e.from != node && e.to.target() != Some(node));
        self.nodes[node.0] = None;
        self.plan = None;
        self.emit(GraphEvent::Removed(node));
        Ok(())
    }

    // ========================================================================
    // Source Control
    // ========================================================================

    /// Start a source node; starting a running source is a no-op
    pub fn start(&mut self, node: NodeId) -> Result<()> {
        self.ensure_open()?;
        let entry = self.source_mut(node)?;
        if !entry.is_running() {
            entry.set_running(true);
            self.emit(GraphEvent::Started(node));
        }
        Ok(())
    }

    /// Stop a source node immediately; stopping twice is a no-op
    pub fn stop(&mut self, node: NodeId) -> Result<()> {
        let entry = self.source_mut(node)?;
        if entry.is_running() {
            entry.set_running(false);
            self.emit(GraphEvent::Stopped(node));
        }
        Ok(())
    }

    /// Stop every source and drop all nodes; idempotent
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        for node in self.nodes.iter_mut().flatten() {
            node.set_running(false);
        }
        self.nodes.iter_mut().for_each(|slot| *slot = None);
        self.edges.clear();
        self.plan = None;
        self.closed = true;
        self.emit(GraphEvent::Closed);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.nodes
            .get(node.0)
            .and_then(|slot| slot.as_ref())
            .map(|n| n.kind())
    }

    /// Oscillator frequency, exactly as configured
    pub fn frequency(&self, node: NodeId) -> Option<f64> {
        match self.nodes.get(node.0)?.as_ref()? {
            Node::Oscillator { oscillator, .. } => Some(oscillator.frequency()),
            _ => None,
        }
    }

    /// Base pan of a panner
    pub fn pan(&self, node: NodeId) -> Option<f32> {
        match self.nodes.get(node.0)?.as_ref()? {
            Node::Panner { panner } => Some(panner.pan()),
            _ => None,
        }
    }

    /// Gain of a gain stage
    pub fn gain(&self, node: NodeId) -> Option<f32> {
        match self.nodes.get(node.0)?.as_ref()? {
            Node::Gain { gain } => Some(*gain),
            _ => None,
        }
    }

    pub fn is_running(&self, node: NodeId) -> bool {
        self.nodes
            .get(node.0)
            .and_then(|slot| slot.as_ref())
            .map(|n| n.is_running())
            .unwrap_or(false)
    }

    /// Ids of all nodes still present
    pub fn live_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    /// Sources currently producing signal
    pub fn running_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.as_ref().map(|n| n.is_running()).unwrap_or(false))
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    /// Nodes with a path (through signal or parameter inputs) to the output
    pub fn connected_to_destination(&self) -> Vec<NodeId> {
        let mut reached = vec![false; self.nodes.len()];
        let mut queue: VecDeque<NodeId> = self
            .edges
            .iter()
            .filter(|e| e.to == Connection::Destination)
            .map(|e| e.from)
            .collect();

        while let Some(node) = queue.pop_front() {
            if reached[node.0] {
                continue;
            }
            reached[node.0] = true;
            for edge in &self.edges {
                if edge.to.target() == Some(node) && !reached[edge.from.0] {
                    queue.push_back(edge.from);
                }
            }
        }

        reached
            .iter()
            .enumerate()
            .filter(|(_, &r)| r)
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render one frame of the destination mix
    pub fn render_frame(&mut self) -> StereoFrame {
        if self.closed {
            return StereoFrame::SILENCE;
        }
        if self.plan.is_none() {
            self.plan = Some(self.build_plan());
        }
        let plan = match self.plan.as_ref() {
            Some(plan) => plan,
            None => return StereoFrame::SILENCE,
        };

        self.scratch.clear();
        self.scratch.resize(plan.steps.len(), StereoFrame::SILENCE);

        for (i, step) in plan.steps.iter().enumerate() {
            let mut input = StereoFrame::SILENCE;
            for &src in &step.inputs {
                input += self.scratch[src];
            }
            let modulation: f32 = step.modulators.iter().map(|&m| self.scratch[m].downmix()).sum();

            self.scratch[i] = match self.nodes[step.node].as_mut() {
                Some(node) => node.tick(input, modulation),
                None => StereoFrame::SILENCE,
            };
        }

        let mut out = StereoFrame::SILENCE;
        for &sink in &plan.sinks {
            out += self.scratch[sink];
        }
        out
    }

    /// Render `frames` frames into a stereo buffer
    pub fn render(&mut self, frames: usize) -> AudioBuffer {
        let mut left = Vec::with_capacity(frames);
        let mut right = Vec::with_capacity(frames);
        for _ in 0..frames {
            let frame = self.render_frame();
            left.push(frame.left);
            right.push(frame.right);
        }
        AudioBuffer {
            samples: vec![left, right],
            sample_rate: self.sample_rate,
        }
    }

    /// Fill an interleaved device buffer with `channels` channels
    ///
    /// Mono devices get the downmix; channels past the second are silent.
    pub fn fill_interleaved(&mut self, output: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        for frame in output.chunks_mut(channels) {
            let rendered = self.render_frame();
            match frame.len() {
                1 => frame[0] = rendered.downmix(),
                _ => {
                    frame[0] = rendered.left;
                    frame[1] = rendered.right;
                    frame[2..].iter_mut().for_each(|s| *s = 0.0);
                }
            }
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(LullError::graph("output context is closed"))
        } else {
            Ok(())
        }
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .ok_or_else(|| LullError::graph(format!("unknown node {}", id)))
    }

    fn source_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        let node = self
            .nodes
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| LullError::graph(format!("unknown node {}", id)))?;
        if !node.kind().is_source() {
            return Err(LullError::graph(format!(
                "{} is a {}, only sources can be started or stopped",
                id,
                node.kind()
            )));
        }
        Ok(node)
    }

    /// Whether `to` is reachable from `from` following connections
    fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if visited[node.0] {
                continue;
            }
            visited[node.0] = true;
            for edge in self.edges.iter().filter(|e| e.from == node) {
                if let Some(next) = edge.to.target() {
                    stack.push(next);
                }
            }
        }
        false
    }

    fn build_plan(&self) -> Plan {
        let live = self.live_nodes();
        let mut in_degree = vec![0_usize; self.nodes.len()];
        for edge in &self.edges {
            if let Some(target) = edge.to.target() {
                in_degree[target.0] += 1;
            }
        }

        let mut ready: VecDeque<NodeId> = live
            .iter()
            .copied()
            .filter(|id| in_degree[id.0] == 0)
            .collect();
        let mut order = Vec::with_capacity(live.len());
        while let Some(node) = ready.pop_front() {
            order.push(node);
            for edge in self.edges.iter().filter(|e| e.from == node) {
                if let Some(target) = edge.to.target() {
                    in_degree[target.0] -= 1;
                    if in_degree[target.0] == 0 {
                        ready.push_back(target);
                    }
                }
            }
        }

        let mut position = vec![usize::MAX; self.nodes.len()];
        for (i, node) in order.iter().enumerate() {
            position[node.0] = i;
        }

        let steps = order
            .iter()
            .map(|node| {
                let mut step = Step {
                    node: node.0,
                    ..Step::default()
                };
                for edge in &self.edges {
                    match edge.to {
                        Connection::Node(target) if target == *node => {
                            step.inputs.push(position[edge.from.0])
                        }
                        Connection::PanParam(target) if target == *node => {
                            step.modulators.push(position[edge.from.0])
                        }
                        _ => {}
                    }
                }
                step
            })
            .collect();

        let sinks = self
            .edges
            .iter()
            .filter(|e| e.to == Connection::Destination)
            .map(|e| position[e.from.0])
            .collect();

        trace!(nodes = order.len(), "rebuilt evaluation plan");
        Plan { steps, sinks }
    }

    fn emit(&mut self, event: GraphEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::NoiseColor;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    struct Recorder(Arc<Mutex<Vec<GraphEvent>>>);

    impl GraphObserver for Recorder {
        fn on_event(&mut self, event: &GraphEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn constant_buffer(value: f32, len: usize) -> NoiseBuffer {
        NoiseBuffer::new(vec![value; len], 48000, NoiseColor::Brown)
    }

    // ------------------------------------------------------------------------
    // Wiring
    // ------------------------------------------------------------------------

    #[test]
    fn test_source_through_gain_to_destination() {
        let mut graph = MixGraph::new(48000);
        let src = graph.add_buffer_source(constant_buffer(1.0, 4), true).unwrap();
        let gain = graph.add_gain(0.5).unwrap();
        graph.connect(src, Connection::Node(gain)).unwrap();
        graph.connect(gain, Connection::Destination).unwrap();

        assert_eq!(graph.render_frame(), StereoFrame::SILENCE, "not started yet");
        graph.start(src).unwrap();
        assert_eq!(graph.render_frame(), StereoFrame::new(0.5, 0.5));
    }

    #[test]
    fn test_order_independent_of_creation_order() {
        // Destination-side nodes created first
        let mut graph = MixGraph::new(48000);
        let gain = graph.add_gain(2.0).unwrap();
        let panner = graph.add_panner(-1.0).unwrap();
        let src = graph.add_buffer_source(constant_buffer(0.25, 4), true).unwrap();
        graph.connect(panner, Connection::Node(gain)).unwrap();
        graph.connect(src, Connection::Node(panner)).unwrap();
        graph.connect(gain, Connection::Destination).unwrap();
        graph.start(src).unwrap();

        let frame = graph.render_frame();
        assert_relative_eq!(frame.left, 0.5, epsilon = 1e-6);
        assert_relative_eq!(frame.right, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rejects_cycles() {
        let mut graph = MixGraph::new(48000);
        let a = graph.add_gain(1.0).unwrap();
        let b = graph.add_gain(1.0).unwrap();
        graph.connect(a, Connection::Node(b)).unwrap();
        assert!(graph.connect(b, Connection::Node(a)).is_err());
        assert!(graph.connect(a, Connection::Node(a)).is_err());
    }

    #[test]
    fn test_pan_param_requires_panner() {
        let mut graph = MixGraph::new(48000);
        let lfo = graph.add_oscillator(0.1).unwrap();
        let gain = graph.add_gain(1.0).unwrap();
        assert!(graph.connect(lfo, Connection::PanParam(gain)).is_err());
    }

    #[test]
    fn test_unknown_node_is_an_error() {
        let mut graph = MixGraph::new(48000);
        assert!(graph.start(NodeId(3)).is_err());
        assert!(graph.connect(NodeId(0), Connection::Destination).is_err());
    }

    #[test]
    fn test_only_sources_can_start() {
        let mut graph = MixGraph::new(48000);
        let gain = graph.add_gain(1.0).unwrap();
        assert!(graph.start(gain).is_err());
    }

    // ------------------------------------------------------------------------
    // Modulation
    // ------------------------------------------------------------------------

    #[test]
    fn test_pan_modulation_adds_to_base() {
        let mut graph = MixGraph::new(48000);
        let src = graph.add_buffer_source(constant_buffer(1.0, 8), true).unwrap();
        let panner = graph.add_panner(0.0).unwrap();
        // A buffer of 1.0 as a modulator pushes pan to hard right
        let modulator = graph.add_buffer_source(constant_buffer(1.0, 8), true).unwrap();
        graph.connect(src, Connection::Node(panner)).unwrap();
        graph.connect(modulator, Connection::PanParam(panner)).unwrap();
        graph.connect(panner, Connection::Destination).unwrap();
        graph.start(src).unwrap();
        graph.start(modulator).unwrap();

        let frame = graph.render_frame();
        assert_relative_eq!(frame.left, 0.0, epsilon = 1e-6);
        assert_relative_eq!(frame.right, 1.0, epsilon = 1e-6);
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    #[test]
    fn test_connected_to_destination_follows_paths() {
        let mut graph = MixGraph::new(48000);
        let src = graph.add_oscillator(100.0).unwrap();
        let lfo = graph.add_oscillator(0.1).unwrap();
        let panner = graph.add_panner(0.0).unwrap();
        let orphan = graph.add_gain(1.0).unwrap();
        graph.connect(src, Connection::Node(panner)).unwrap();
        graph.connect(lfo, Connection::PanParam(panner)).unwrap();
        graph.connect(panner, Connection::Destination).unwrap();

        let connected = graph.connected_to_destination();
        assert_eq!(connected, vec![src, lfo, panner]);
        assert!(!connected.contains(&orphan));

        graph.disconnect(panner).unwrap();
        assert!(graph.connected_to_destination().is_empty());
    }

    #[test]
    fn test_remove_drops_node_and_its_edges() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut graph = MixGraph::new(48000);
        graph.set_observer(Box::new(Recorder(events.clone())));

        let src = graph.add_buffer_source(constant_buffer(1.0, 4), true).unwrap();
        let gain = graph.add_gain(0.5).unwrap();
        let direct = graph.add_buffer_source(constant_buffer(0.25, 4), true).unwrap();
        graph.connect(src, Connection::Node(gain)).unwrap();
        graph.connect(gain, Connection::Destination).unwrap();
        graph.connect(direct, Connection::Destination).unwrap();
        graph.start(src).unwrap();
        graph.start(direct).unwrap();
        assert_eq!(graph.render_frame(), StereoFrame::new(0.75, 0.75));

        graph.remove(gain).unwrap();
        assert_eq!(graph.kind(gain), None);
        assert_eq!(graph.connected_to_destination(), vec![direct]);
        assert_eq!(graph.render_frame(), StereoFrame::new(0.25, 0.25));
        assert!(graph.connect(src, Connection::Node(gain)).is_err());
        assert!(graph.remove(gain).is_err());

        let events = events.lock().unwrap();
        assert_eq!(events.last(), Some(&GraphEvent::Removed(gain)));
    }

    #[test]
    fn test_close_releases_everything() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut graph = MixGraph::new(48000);
        graph.set_observer(Box::new(Recorder(events.clone())));

        let osc = graph.add_oscillator(200.0).unwrap();
        graph.connect(osc, Connection::Destination).unwrap();
        graph.start(osc).unwrap();
        assert_eq!(graph.running_nodes(), vec![osc]);

        graph.close();
        graph.close();
        assert!(graph.is_closed());
        assert!(graph.live_nodes().is_empty());
        assert!(graph.running_nodes().is_empty());
        assert_eq!(graph.render_frame(), StereoFrame::SILENCE);
        assert!(graph.add_gain(1.0).is_err());

        let events = events.lock().unwrap();
        assert_eq!(events.iter().filter(|e| **e == GraphEvent::Closed).count(), 1);
    }

    #[test]
    fn test_stop_is_immediate_and_idempotent() {
        let mut graph = MixGraph::new(48000);
        let osc = graph.add_oscillator(1000.0).unwrap();
        graph.connect(osc, Connection::Destination).unwrap();
        graph.start(osc).unwrap();
        graph.render(10);

        graph.stop(osc).unwrap();
        graph.stop(osc).unwrap();
        assert!(graph.render(100).is_silent());
    }

    #[test]
    fn test_fill_interleaved_handles_mono_and_surround() {
        let mut graph = MixGraph::new(48000);
        let src = graph.add_buffer_source(constant_buffer(1.0, 4), true).unwrap();
        let panner = graph.add_panner(-1.0).unwrap();
        graph.connect(src, Connection::Node(panner)).unwrap();
        graph.connect(panner, Connection::Destination).unwrap();
        graph.start(src).unwrap();

        let mut mono = [9.0_f32; 2];
        graph.fill_interleaved(&mut mono, 1);
        assert_relative_eq!(mono[0], 0.5, epsilon = 1e-6);

        let mut quad = [9.0_f32; 8];
        graph.fill_interleaved(&mut quad, 4);
        assert_relative_eq!(quad[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(quad[1], 0.0, epsilon = 1e-6);
        assert_eq!(quad[2], 0.0);
        assert_eq!(quad[3], 0.0);
    }
}
