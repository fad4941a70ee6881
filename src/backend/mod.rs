//! Platform audio output
//!
//! The engine needs very little from the platform: an output context that
//! can hold buffer-backed sources, oscillators, panners and gains, wire
//! them into a mix ending at the device, and tear everything down again.
//! Both backends keep their nodes in a [`MixGraph`]; they differ in who
//! pulls frames out of it (a test or file render vs. the device callback).

use crate::dsp::NoiseBuffer;
use crate::error::Result;
use crate::graph::{Connection, MixGraph, NodeId, NodeKind};

#[cfg(feature = "cpal-output")]
mod device;
mod offline;

#[cfg(feature = "cpal-output")]
pub use device::{CpalBackend, CpalContext};
pub use offline::{
    BackendProbe, ContextId, ContextSummary, FaultPlan, OfflineBackend, OfflineContext,
    ProbeEvent,
};

/// Opens output contexts
pub trait AudioBackend {
    type Context: OutputContext;

    /// Short name for logs
    fn name(&self) -> &str;

    /// Allocate a fresh output context
    ///
    /// # Errors
    /// * `AudioUnavailable` - If the platform refuses to provide output
    fn open(&mut self) -> Result<Self::Context>;
}

/// One live output context and its audio graph
pub trait OutputContext {
    /// Device sample rate
    fn sample_rate(&self) -> u32;

    /// Run `f` against the graph
    ///
    /// # Errors
    /// * `GraphError` - If the context is closed
    fn with_graph<R>(&mut self, f: impl FnOnce(&mut MixGraph) -> Result<R>) -> Result<R>;

    /// Read-only view of the graph; `None` once closed
    fn inspect<R>(&self, f: impl FnOnce(&MixGraph) -> R) -> Option<R>;

    /// Stop all sources and release the device; idempotent
    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;

    fn create_buffer_source(&mut self, buffer: NoiseBuffer, looping: bool) -> Result<NodeId> {
        self.with_graph(|g| g.add_buffer_source(buffer, looping))
    }

    fn create_oscillator(&mut self, frequency: f64) -> Result<NodeId> {
        self.with_graph(|g| g.add_oscillator(frequency))
    }

    fn create_panner(&mut self, pan: f32) -> Result<NodeId> {
        self.with_graph(|g| g.add_panner(pan))
    }

    fn create_gain(&mut self, gain: f32) -> Result<NodeId> {
        self.with_graph(|g| g.add_gain(gain))
    }

    fn connect(&mut self, from: NodeId, to: Connection) -> Result<()> {
        self.with_graph(|g| g.connect(from, to))
    }

    fn start(&mut self, node: NodeId) -> Result<()> {
        self.with_graph(|g| g.start(node))
    }

    fn stop(&mut self, node: NodeId) -> Result<()> {
        self.with_graph(|g| g.stop(node))
    }

    fn disconnect(&mut self, node: NodeId) -> Result<()> {
        self.with_graph(|g| g.disconnect(node))
    }

    /// Drop a node and every connection touching it
    fn remove(&mut self, node: NodeId) -> Result<()> {
        self.with_graph(|g| g.remove(node))
    }

    fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.inspect(|g| g.kind(node)).flatten()
    }

    /// Oscillator frequency as configured
    fn frequency(&self, node: NodeId) -> Option<f64> {
        self.inspect(|g| g.frequency(node)).flatten()
    }

    fn pan(&self, node: NodeId) -> Option<f32> {
        self.inspect(|g| g.pan(node)).flatten()
    }

    fn gain(&self, node: NodeId) -> Option<f32> {
        self.inspect(|g| g.gain(node)).flatten()
    }
}
