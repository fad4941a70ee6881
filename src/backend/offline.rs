//! Offline output backend
//!
//! Renders on demand instead of on a device clock. Contexts it opens stay
//! visible through a [`BackendProbe`], which is how tests check that no
//! graph outlives its session. A [`FaultPlan`] makes the backend refuse
//! contexts or fail individual node operations.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::{AudioBackend, OutputContext};
use crate::engine::AudioBuffer;
use crate::error::{LullError, Result};
use crate::graph::{Connection, GraphEvent, GraphObserver, MixGraph, NodeId, NodeKind};

/// Identifies one context opened by an [`OfflineBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Failures to inject
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Refuse to open contexts (no device, permission denied, ...)
    pub refuse_open: bool,
    /// Fail `stop` on nodes of this kind
    pub fail_stop: Option<NodeKind>,
    /// Fail `disconnect` on nodes of this kind
    pub fail_disconnect: Option<NodeKind>,
}

/// A graph event tagged with its context
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeEvent {
    pub context: ContextId,
    pub event: GraphEvent,
}

/// Point-in-time view of one context
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSummary {
    pub id: ContextId,
    pub closed: bool,
    pub live_nodes: usize,
    pub running_nodes: usize,
    pub connected_nodes: usize,
}

impl ContextSummary {
    /// Whether anything in this context can reach the output
    pub fn is_audible(&self) -> bool {
        !self.closed && self.connected_nodes > 0
    }
}

/// Graph events kept in the probe log; older ones are dropped first
pub const EVENT_LOG_CAPACITY: usize = 4096;

/// Closed contexts kept for inspection; older ones are forgotten when the
/// next context opens
pub const CLOSED_CONTEXT_HISTORY: usize = 32;

struct ContextRecord {
    id: ContextId,
    graph: Arc<Mutex<MixGraph>>,
}

impl ContextRecord {
    fn is_closed(&self) -> bool {
        self.graph.lock().map(|g| g.is_closed()).unwrap_or(true)
    }
}

/// Nodes wired to the output per context, and the most contexts that were
/// ever audible together
#[derive(Default)]
struct AudibleTracker {
    sinks: HashMap<ContextId, HashSet<NodeId>>,
    max: usize,
}

impl AudibleTracker {
    fn record(&mut self, context: ContextId, event: &GraphEvent) {
        match event {
            GraphEvent::Connected {
                from,
                to: Connection::Destination,
            } => {
                self.sinks.entry(context).or_default().insert(*from);
            }
            GraphEvent::Disconnected(node) | GraphEvent::Removed(node) => {
                if let Some(sinks) = self.sinks.get_mut(&context) {
                    sinks.remove(node);
                }
            }
            GraphEvent::Closed => {
                self.sinks.remove(&context);
            }
            _ => {}
        }
        let audible = self.sinks.values().filter(|s| !s.is_empty()).count();
        self.max = self.max.max(audible);
    }
}

#[derive(Default)]
struct ProbeInner {
    contexts: Mutex<Vec<ContextRecord>>,
    events: Mutex<VecDeque<ProbeEvent>>,
    audible: Mutex<AudibleTracker>,
    opened: AtomicUsize,
    refused: AtomicUsize,
}

/// Shared view over what an [`OfflineBackend`] has opened
///
/// Open contexts are always visible. Only the last
/// [`CLOSED_CONTEXT_HISTORY`] closed contexts and the last
/// [`EVENT_LOG_CAPACITY`] events are retained, so a long-lived backend
/// stays bounded in memory.
#[derive(Clone, Default)]
pub struct BackendProbe {
    inner: Arc<ProbeInner>,
}

impl fmt::Debug for BackendProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendProbe")
            .field("opened", &self.opened_contexts())
            .field("refused", &self.refused_opens())
            .finish()
    }
}

impl BackendProbe {
    /// Number of contexts ever opened
    pub fn opened_contexts(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    /// Number of open attempts that were refused
    pub fn refused_opens(&self) -> usize {
        self.inner.refused.load(Ordering::SeqCst)
    }

    /// Contexts not yet closed
    pub fn open_contexts(&self) -> usize {
        self.summaries().iter().filter(|s| !s.closed).count()
    }

    /// Contexts with at least one node connected to the output
    pub fn audible_contexts(&self) -> usize {
        self.summaries().iter().filter(|s| s.is_audible()).count()
    }

    /// Nodes still producing signal across all contexts
    pub fn running_nodes(&self) -> usize {
        self.summaries().iter().map(|s| s.running_nodes).sum()
    }

    /// Summaries of open and recently closed contexts, oldest first
    pub fn summaries(&self) -> Vec<ContextSummary> {
        let contexts = match self.inner.contexts.lock() {
            Ok(contexts) => contexts,
            Err(_) => return Vec::new(),
        };
        contexts
            .iter()
            .filter_map(|record| {
                let graph = record.graph.lock().ok()?;
                Some(ContextSummary {
                    id: record.id,
                    closed: graph.is_closed(),
                    live_nodes: graph.live_nodes().len(),
                    running_nodes: graph.running_nodes().len(),
                    connected_nodes: graph.connected_to_destination().len(),
                })
            })
            .collect()
    }

    pub fn summary(&self, id: ContextId) -> Option<ContextSummary> {
        self.summaries().into_iter().find(|s| s.id == id)
    }

    /// Retained graph events, oldest first
    pub fn events(&self) -> Vec<ProbeEvent> {
        self.inner
            .events
            .lock()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Largest number of contexts that were wired to the output at the same
    /// moment, over the whole life of the backend
    pub fn max_concurrently_audible_contexts(&self) -> usize {
        self.inner.audible.lock().map(|a| a.max).unwrap_or(0)
    }

    fn register(&self, id: ContextId, graph: Arc<Mutex<MixGraph>>) {
        self.inner.opened.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut contexts) = self.inner.contexts.lock() {
            contexts.push(ContextRecord { id, graph });
            let closed = contexts.iter().filter(|c| c.is_closed()).count();
            let mut excess = closed.saturating_sub(CLOSED_CONTEXT_HISTORY);
            contexts.retain(|c| {
                if excess > 0 && c.is_closed() {
                    excess -= 1;
                    false
                } else {
                    true
                }
            });
        }
    }
}

/// Forwards a context's graph events into the probe
struct ProbeObserver {
    context: ContextId,
    inner: Arc<ProbeInner>,
}

impl GraphObserver for ProbeObserver {
    fn on_event(&mut self, event: &GraphEvent) {
        if let Ok(mut audible) = self.inner.audible.lock() {
            audible.record(self.context, event);
        }
        if let Ok(mut events) = self.inner.events.lock() {
            if events.len() == EVENT_LOG_CAPACITY {
                events.pop_front();
            }
            events.push_back(ProbeEvent {
                context: self.context,
                event: event.clone(),
            });
        }
    }
}

// ============================================================================
// Backend
// ============================================================================

/// In-memory backend rendering on demand
#[derive(Debug, Clone)]
pub struct OfflineBackend {
    sample_rate: u32,
    faults: FaultPlan,
    probe: BackendProbe,
    next_context: u64,
}

impl OfflineBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            faults: FaultPlan::default(),
            probe: BackendProbe::default(),
            next_context: 0,
        }
    }

    /// A backend whose device never opens
    pub fn unavailable(sample_rate: u32) -> Self {
        Self::new(sample_rate).with_faults(FaultPlan {
            refuse_open: true,
            ..FaultPlan::default()
        })
    }

    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }

    /// Change the faults applied to contexts opened from now on
    pub fn set_faults(&mut self, faults: FaultPlan) {
        self.faults = faults;
    }

    pub fn probe(&self) -> BackendProbe {
        self.probe.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioBackend for OfflineBackend {
    type Context = OfflineContext;

    fn name(&self) -> &str {
        "offline"
    }

    fn open(&mut self) -> Result<OfflineContext> {
        if self.faults.refuse_open {
            self.probe.inner.refused.fetch_add(1, Ordering::SeqCst);
            return Err(LullError::unavailable("offline backend configured to refuse output"));
        }
        if self.sample_rate == 0 {
            return Err(LullError::unavailable("sample rate must be positive"));
        }

        let id = ContextId(self.next_context);
        self.next_context += 1;

        let mut graph = MixGraph::new(self.sample_rate);
        graph.set_observer(Box::new(ProbeObserver {
            context: id,
            inner: self.probe.inner.clone(),
        }));
        let graph = Arc::new(Mutex::new(graph));
        self.probe.register(id, graph.clone());

        debug!(context = %id, sample_rate = self.sample_rate, "opened offline context");
        Ok(OfflineContext {
            id,
            graph,
            faults: self.faults.clone(),
            sample_rate: self.sample_rate,
            closed: false,
        })
    }
}

// ============================================================================
// Context
// ============================================================================

/// Output context of an [`OfflineBackend`]; closes itself when dropped
pub struct OfflineContext {
    id: ContextId,
    graph: Arc<Mutex<MixGraph>>,
    faults: FaultPlan,
    sample_rate: u32,
    closed: bool,
}

impl fmt::Debug for OfflineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineContext")
            .field("id", &self.id)
            .field("sample_rate", &self.sample_rate)
            .field("closed", &self.closed)
            .finish()
    }
}

impl OfflineContext {
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Pull `frames` stereo frames from the mix
    pub fn render(&mut self, frames: usize) -> Result<AudioBuffer> {
        self.with_graph(|g| Ok(g.render(frames)))
    }

    fn injected(&self, node: NodeId, fault: Option<NodeKind>, op: &str) -> Result<()> {
        match (fault, self.kind(node)) {
            (Some(faulty), Some(kind)) if faulty == kind => Err(LullError::graph(format!(
                "injected failure: cannot {} {} {}",
                op, kind, node
            ))),
            _ => Ok(()),
        }
    }
}

impl OutputContext for OfflineContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn with_graph<R>(&mut self, f: impl FnOnce(&mut MixGraph) -> Result<R>) -> Result<R> {
        if self.closed {
            return Err(LullError::graph(format!("{} is closed", self.id)));
        }
        let mut graph = self
            .graph
            .lock()
            .map_err(|_| LullError::graph("graph lock poisoned"))?;
        f(&mut *graph)
    }

    fn inspect<R>(&self, f: impl FnOnce(&MixGraph) -> R) -> Option<R> {
        if self.closed {
            return None;
        }
        let graph = self.graph.lock().ok()?;
        Some(f(&*graph))
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut graph = self
            .graph
            .lock()
            .map_err(|_| LullError::graph("graph lock poisoned"))?;
        graph.close();
        debug!(context = %self.id, "closed offline context");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn stop(&mut self, node: NodeId) -> Result<()> {
        self.injected(node, self.faults.fail_stop, "stop")?;
        self.with_graph(|g| g.stop(node))
    }

    fn disconnect(&mut self, node: NodeId) -> Result<()> {
        self.injected(node, self.faults.fail_disconnect, "disconnect")?;
        self.with_graph(|g| g.disconnect(node))
    }
}

impl Drop for OfflineContext {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(context = %self.id, error = %e, "failed to close offline context on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_open_is_audio_unavailable() {
        let mut backend = OfflineBackend::unavailable(48000);
        let err = backend.open().unwrap_err();
        assert_eq!(err.error_code(), "AUDIO_UNAVAILABLE");
        assert_eq!(backend.probe().refused_opens(), 1);
        assert_eq!(backend.probe().opened_contexts(), 0);
    }

    #[test]
    fn test_contexts_get_distinct_ids() {
        let mut backend = OfflineBackend::new(48000);
        let a = backend.open().unwrap();
        let b = backend.open().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(backend.probe().open_contexts(), 2);
    }

    #[test]
    fn test_drop_closes_context() {
        let mut backend = OfflineBackend::new(48000);
        let probe = backend.probe();
        {
            let mut ctx = backend.open().unwrap();
            let osc = ctx.create_oscillator(220.0).unwrap();
            ctx.connect(osc, Connection::Destination).unwrap();
            ctx.start(osc).unwrap();
            assert_eq!(probe.audible_contexts(), 1);
            assert_eq!(probe.running_nodes(), 1);
        }
        assert_eq!(probe.open_contexts(), 0);
        assert_eq!(probe.audible_contexts(), 0);
        assert_eq!(probe.running_nodes(), 0);
    }

    #[test]
    fn test_closed_context_rejects_operations() {
        let mut backend = OfflineBackend::new(48000);
        let mut ctx = backend.open().unwrap();
        let osc = ctx.create_oscillator(220.0).unwrap();
        ctx.close().unwrap();
        ctx.close().unwrap();
        assert!(ctx.is_closed());
        assert!(ctx.start(osc).is_err());
        assert!(ctx.create_gain(1.0).is_err());
        assert_eq!(ctx.frequency(osc), None);
    }

    #[test]
    fn test_injected_stop_failure() {
        let mut backend = OfflineBackend::new(48000).with_faults(FaultPlan {
            fail_stop: Some(NodeKind::Oscillator),
            ..FaultPlan::default()
        });
        let mut ctx = backend.open().unwrap();
        let osc = ctx.create_oscillator(220.0).unwrap();
        ctx.start(osc).unwrap();
        assert!(ctx.stop(osc).is_err());
        ctx.close().unwrap();
        assert_eq!(backend.probe().running_nodes(), 0);
    }

    #[test]
    fn test_max_concurrently_audible_replay() {
        let mut backend = OfflineBackend::new(48000);
        let probe = backend.probe();

        let mut a = backend.open().unwrap();
        let osc_a = a.create_oscillator(100.0).unwrap();
        a.connect(osc_a, Connection::Destination).unwrap();
        a.close().unwrap();

        let mut b = backend.open().unwrap();
        let osc_b = b.create_oscillator(200.0).unwrap();
        b.connect(osc_b, Connection::Destination).unwrap();
        assert_eq!(probe.max_concurrently_audible_contexts(), 1);

        let mut c = backend.open().unwrap();
        let osc_c = c.create_oscillator(300.0).unwrap();
        c.connect(osc_c, Connection::Destination).unwrap();
        assert_eq!(probe.max_concurrently_audible_contexts(), 2);
    }

    #[test]
    fn test_removed_sink_is_no_longer_audible() {
        let mut backend = OfflineBackend::new(48000);
        let probe = backend.probe();
        let mut ctx = backend.open().unwrap();
        let osc = ctx.create_oscillator(100.0).unwrap();
        ctx.connect(osc, Connection::Destination).unwrap();
        assert_eq!(probe.audible_contexts(), 1);

        ctx.remove(osc).unwrap();
        assert_eq!(probe.audible_contexts(), 0);
        assert_eq!(ctx.kind(osc), None);
        assert!(probe.events().iter().any(|e| e.event == GraphEvent::Removed(osc)));

        // A second context is the only audible one
        let mut other = backend.open().unwrap();
        let osc = other.create_oscillator(200.0).unwrap();
        other.connect(osc, Connection::Destination).unwrap();
        assert_eq!(probe.max_concurrently_audible_contexts(), 1);
    }

    #[test]
    fn test_probe_retention_is_bounded() {
        let mut backend = OfflineBackend::new(48000);
        let probe = backend.probe();

        for i in 0..200 {
            let mut ctx = backend.open().unwrap();
            let osc = ctx.create_oscillator(100.0 + i as f64).unwrap();
            ctx.connect(osc, Connection::Destination).unwrap();
            ctx.start(osc).unwrap();
            for _ in 0..20 {
                ctx.stop(osc).unwrap();
                ctx.start(osc).unwrap();
            }
        }

        assert_eq!(probe.opened_contexts(), 200);
        // History is trimmed when a context opens, so the last close adds one
        assert_eq!(probe.summaries().len(), CLOSED_CONTEXT_HISTORY + 1);
        assert_eq!(probe.events().len(), EVENT_LOG_CAPACITY);
        assert_eq!(probe.max_concurrently_audible_contexts(), 1);

        // The newest context is kept, and the log ends with its close
        let last = probe.summaries().pop().unwrap();
        assert_eq!(last.id, ContextId(199));
        assert_eq!(probe.events().last().unwrap().event, GraphEvent::Closed);
    }

    #[test]
    fn test_render_produces_stereo() {
        let mut backend = OfflineBackend::new(48000);
        let mut ctx = backend.open().unwrap();
        let osc = ctx.create_oscillator(440.0).unwrap();
        ctx.connect(osc, Connection::Destination).unwrap();
        ctx.start(osc).unwrap();

        let buffer = ctx.render(480).unwrap();
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.len(), 480);
        assert!(!buffer.is_silent());
    }
}
