use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::debug;

use crate::{
    analysis::{AnalyserCore, SoftwareAnalyser},
    Analyser, Result, VisualiserError,
};

/// Identifies a node inside a host audio graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// A node that can be patched into the host audio graph.
pub trait AudioNode {
    fn id(&self) -> NodeId;

    /// Routes this node's output into `destination`.
    fn connect(&mut self, destination: NodeId) -> Result<()>;

    /// Removes a route previously created with [`AudioNode::connect`].
    fn disconnect(&mut self, destination: NodeId) -> Result<()>;

    /// Whether the node can take part in graph routing at all. Hosts wrapping
    /// a handle that cannot be patched (a muted element, a closed stream)
    /// report `false` and are rejected at construction.
    fn is_connectable(&self) -> bool {
        true
    }

    /// Drops whatever the host keeps for this node once its owner is done
    /// with it. Routes touching the node are removed as well.
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Audio context the visualiser taps into. Only used while wiring.
pub trait PlaybackContext {
    /// Endpoint that renders audible output, if the context has one.
    fn destination(&self) -> Option<NodeId>;

    /// Builds a fresh analyser owned by this context.
    fn create_analyser(&mut self) -> Result<Box<dyn Analyser>>;
}

/// Signal handed to the visualiser at construction.
pub enum SourceNode {
    /// A raw audio-producing node; an analyser is derived for it.
    Audio(Box<dyn AudioNode>),
    /// A node that already performs analysis and is used directly.
    Analyser(Box<dyn Analyser>),
}

impl SourceNode {
    pub fn id(&self) -> NodeId {
        match self {
            SourceNode::Audio(node) => node.id(),
            SourceNode::Analyser(analyser) => analyser.id(),
        }
    }

    pub fn is_connectable(&self) -> bool {
        match self {
            SourceNode::Audio(node) => node.is_connectable(),
            SourceNode::Analyser(analyser) => analyser.is_connectable(),
        }
    }
}

impl fmt::Debug for SourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            SourceNode::Audio(_) => "Audio",
            SourceNode::Analyser(_) => "Analyser",
        };
        f.debug_struct("SourceNode")
            .field("kind", &kind)
            .field("id", &self.id())
            .finish()
    }
}

/// In-process audio graph used by headless hosts and tests.
///
/// Sources push blocks of samples with [`SoftwareGraph::push_samples`]; the
/// graph forwards them along recorded connections to any analyser they reach
/// and counts how many samples arrive at the destination. State lives behind
/// a mutex so a capture thread may feed the graph while another thread drives
/// the visualiser.
#[derive(Clone)]
pub struct SoftwareGraph {
    sample_rate: u32,
    destination: NodeId,
    shared: SharedGraph,
}

pub(crate) type SharedGraph = Arc<Mutex<GraphState>>;

#[derive(Default)]
pub(crate) struct GraphState {
    next_id: u64,
    nodes: HashSet<NodeId>,
    edges: HashSet<(NodeId, NodeId)>,
    analysers: HashMap<NodeId, Arc<Mutex<AnalyserCore>>>,
    destination_samples: usize,
}

impl GraphState {
    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id);
        id
    }
}

impl SoftwareGraph {
    /// Creates a graph using the default 48 kHz sample rate.
    pub fn new() -> Self {
        Self::with_sample_rate(48_000)
    }

    pub fn with_sample_rate(sample_rate: u32) -> Self {
        let mut state = GraphState::default();
        let destination = state.allocate();
        Self {
            sample_rate,
            destination,
            shared: Arc::new(Mutex::new(state)),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Creates a plain source node.
    pub fn create_source(&self) -> Result<SoftwareSource> {
        let id = lock_graph(&self.shared)?.allocate();
        Ok(SoftwareSource {
            id,
            graph: self.shared.clone(),
        })
    }

    /// Creates an analyser node registered with this graph.
    pub fn create_software_analyser(&self) -> Result<SoftwareAnalyser> {
        let core = Arc::new(Mutex::new(AnalyserCore::new()));
        let id = {
            let mut state = lock_graph(&self.shared)?;
            let id = state.allocate();
            state.analysers.insert(id, core.clone());
            id
        };
        Ok(SoftwareAnalyser::new(id, core, self.shared.clone()))
    }

    /// Delivers a block of samples emitted by `source` to every analyser it
    /// reaches and to the destination.
    pub fn push_samples(&self, source: NodeId, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let targets = {
            let mut state = lock_graph(&self.shared)?;
            if !state.nodes.contains(&source) {
                return Err(VisualiserError::msg(format!("{source} is not part of the graph")));
            }

            let mut visited = HashSet::new();
            let mut pending = vec![source];
            let mut targets = Vec::new();
            let mut reached_destination = false;
            while let Some(node) = pending.pop() {
                if !visited.insert(node) {
                    continue;
                }
                if node == self.destination {
                    reached_destination = true;
                }
                if let Some(core) = state.analysers.get(&node) {
                    targets.push(core.clone());
                }
                pending.extend(
                    state
                        .edges
                        .iter()
                        .filter(|(from, _)| *from == node)
                        .map(|(_, to)| *to),
                );
            }

            if reached_destination {
                state.destination_samples += samples.len();
            }
            targets
        };

        for core in targets {
            core.lock()
                .map_err(|_| VisualiserError::msg("analyser state has been poisoned"))?
                .push_samples(samples);
        }
        Ok(())
    }

    /// Total number of samples that have reached the destination so far.
    pub fn destination_samples(&self) -> Result<usize> {
        Ok(lock_graph(&self.shared)?.destination_samples)
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> Result<bool> {
        Ok(lock_graph(&self.shared)?.edges.contains(&(from, to)))
    }

    /// Number of live nodes, destination included.
    pub fn node_count(&self) -> Result<usize> {
        Ok(lock_graph(&self.shared)?.nodes.len())
    }

    pub fn analyser_count(&self) -> Result<usize> {
        Ok(lock_graph(&self.shared)?.analysers.len())
    }
}

impl Default for SoftwareGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackContext for SoftwareGraph {
    fn destination(&self) -> Option<NodeId> {
        Some(self.destination)
    }

    fn create_analyser(&mut self) -> Result<Box<dyn Analyser>> {
        Ok(Box::new(self.create_software_analyser()?))
    }
}

impl fmt::Debug for SoftwareGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareGraph")
            .field("sample_rate", &self.sample_rate)
            .field("destination", &self.destination)
            .finish()
    }
}

/// Plain audio-producing node belonging to a [`SoftwareGraph`].
#[derive(Clone)]
pub struct SoftwareSource {
    id: NodeId,
    graph: SharedGraph,
}

impl AudioNode for SoftwareSource {
    fn id(&self) -> NodeId {
        self.id
    }

    fn connect(&mut self, destination: NodeId) -> Result<()> {
        connect_nodes(&self.graph, self.id, destination)
    }

    fn disconnect(&mut self, destination: NodeId) -> Result<()> {
        disconnect_nodes(&self.graph, self.id, destination)
    }
}

impl fmt::Debug for SoftwareSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareSource").field("id", &self.id).finish()
    }
}

pub(crate) fn connect_nodes(graph: &SharedGraph, from: NodeId, to: NodeId) -> Result<()> {
    let mut state = lock_graph(graph)?;
    if !state.nodes.contains(&to) {
        return Err(VisualiserError::msg(format!("cannot connect {from} to unknown {to}")));
    }
    state.edges.insert((from, to));
    debug!(%from, %to, "connected audio nodes");
    Ok(())
}

pub(crate) fn disconnect_nodes(graph: &SharedGraph, from: NodeId, to: NodeId) -> Result<()> {
    let mut state = lock_graph(graph)?;
    if state.edges.remove(&(from, to)) {
        debug!(%from, %to, "disconnected audio nodes");
        Ok(())
    } else {
        Err(VisualiserError::msg(format!("{from} is not connected to {to}")))
    }
}

pub(crate) fn release_node(graph: &SharedGraph, id: NodeId) -> Result<()> {
    let mut state = lock_graph(graph)?;
    if state.nodes.remove(&id) {
        state.analysers.remove(&id);
        state.edges.retain(|(from, to)| *from != id && *to != id);
        debug!(%id, "released audio node");
    }
    Ok(())
}

fn lock_graph(graph: &SharedGraph) -> Result<MutexGuard<'_, GraphState>> {
    graph
        .lock()
        .map_err(|_| VisualiserError::msg("audio graph has been poisoned"))
}
