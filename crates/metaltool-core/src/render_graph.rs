//! Render graph with topological sort and an optimization pass.
//!
//! Each node represents a render operation (frame source, filter, layer
//! placement, output). Edges represent data dependencies (output of one
//! feeds input of another). The graph is sorted topologically before
//! execution to ensure correct order. Both the GPU and the CPU executors
//! consume the same graph.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use smallvec::SmallVec;

use crate::color::Color;
use crate::frame::PixelBuffer;
use crate::geometry::Size;
use crate::layout::Placement;

/// Unique identifier for a render node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// The type of operation this node performs.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOp {
    /// Load a decoded frame as a premultiplied texture. Without `keep_alpha`
    /// the frame is loaded fully opaque.
    Source { frame_id: u64, keep_alpha: bool },
    /// Gaussian blur of the input.
    Blur { sigma: f32 },
    /// Unsharp-mask sharpening of the input.
    Sharpen { amount: f32 },
    /// Place the input texture in the view, blended over what is below.
    Layer { placement: Placement },
    /// Final target: clear to a color, then draw the input layers in order.
    Output { clear: Color },
}

impl NodeOp {
    /// Filters that leave their input unchanged.
    fn is_noop(&self) -> bool {
        match *self {
            Self::Blur { sigma } => !(sigma.is_finite() && sigma > 0.0),
            Self::Sharpen { amount } => amount == 0.0 || !amount.is_finite(),
            _ => false,
        }
    }
}

/// Frames bound to `Source` nodes for one execution of a graph.
#[derive(Debug, Default, Clone)]
pub struct FrameSet<'a> {
    frames: SmallVec<[(u64, &'a PixelBuffer); 2]>,
}

impl<'a> FrameSet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding one frame.
    pub fn single(frame_id: u64, frame: &'a PixelBuffer) -> Self {
        let mut set = Self::new();
        set.insert(frame_id, frame);
        set
    }

    /// Bind a frame, replacing any frame already bound to the id.
    pub fn insert(&mut self, frame_id: u64, frame: &'a PixelBuffer) {
        self.frames.retain(|(id, _)| *id != frame_id);
        self.frames.push((frame_id, frame));
    }

    pub fn get(&self, frame_id: u64) -> Option<&'a PixelBuffer> {
        self.frames
            .iter()
            .find(|(id, _)| *id == frame_id)
            .map(|(_, frame)| *frame)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// A node in the render graph.
#[derive(Debug, Clone)]
pub struct RenderNode {
    pub id: NodeId,
    pub op: NodeOp,
    /// Input node IDs (data dependencies).
    pub inputs: Vec<NodeId>,
    /// Width and height of the output texture.
    pub output_size: (u32, u32),
}

/// What an optimization pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub removed_filters: usize,
    pub culled_layers: usize,
    pub merged_nodes: usize,
    pub pruned_nodes: usize,
}

impl OptimizeStats {
    /// Total number of nodes or edges eliminated.
    pub fn total(&self) -> usize {
        self.removed_filters + self.culled_layers + self.merged_nodes + self.pruned_nodes
    }
}

/// The complete render graph for one frame.
#[derive(Debug, Default, Clone)]
pub struct RenderGraph {
    nodes: HashMap<NodeId, RenderNode>,
    next_id: u32,
}

impl RenderGraph {
    /// Create a new empty render graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its ID.
    pub fn add_node(&mut self, op: NodeOp, inputs: Vec<NodeId>, output_size: (u32, u32)) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            RenderNode {
                id,
                op,
                inputs,
                output_size,
            },
        );
        id
    }

    /// Get a node by ID.
    pub fn node(&self, id: NodeId) -> Option<&RenderNode> {
        self.nodes.get(&id)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterate over all nodes in unspecified order.
    pub fn nodes(&self) -> impl Iterator<Item = &RenderNode> {
        self.nodes.values()
    }

    /// Perform topological sort (Kahn's algorithm).
    /// Returns nodes in execution order, or None if there's a cycle.
    pub fn topological_sort(&self) -> Option<Vec<NodeId>> {
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

        // Initialize in-degrees
        for (&id, node) in &self.nodes {
            in_degree.entry(id).or_insert(0);
            for &input in &node.inputs {
                *in_degree.entry(id).or_insert(0) += 1;
                dependents.entry(input).or_default().push(id);
            }
        }

        // Start with nodes that have no inputs
        let mut queue: Vec<NodeId> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();
        // Highest id first so `pop` yields the lowest; keeps order deterministic.
        queue.sort_by_key(|id| std::cmp::Reverse(id.0));

        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(id) = queue.pop() {
            result.push(id);
            if let Some(deps) = dependents.get(&id) {
                for &dep in deps {
                    if let Some(deg) = in_degree.get_mut(&dep) {
                        *deg -= 1;
                        if *deg == 0 {
                            queue.push(dep);
                            queue.sort_by_key(|id| std::cmp::Reverse(id.0));
                        }
                    }
                }
            }
        }

        if result.len() == self.nodes.len() {
            Some(result)
        } else {
            None // Cycle or dangling input
        }
    }

    /// Nodes the output depends on (including itself).
    pub fn reachable_from(&self, output: NodeId) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut stack = vec![output];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                if seen.insert(id) {
                    stack.extend(node.inputs.iter().copied());
                }
            }
        }
        seen
    }

    /// Execution order restricted to the nodes the output depends on.
    pub fn execution_order(&self, output: NodeId) -> Option<Vec<NodeId>> {
        if !self.nodes.contains_key(&output) {
            return None;
        }
        let live = self.reachable_from(output);
        let order = self.topological_sort()?;
        Some(order.into_iter().filter(|id| live.contains(id)).collect())
    }

    /// How many times each node is read by the nodes in `order`.
    pub fn consumer_counts(&self, order: &[NodeId]) -> HashMap<NodeId, usize> {
        let mut counts = HashMap::new();
        for id in order {
            if let Some(node) = self.nodes.get(id) {
                for &input in &node.inputs {
                    *counts.entry(input).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// Point every edge that reads `from` at `to` instead.
    fn replace_input(&mut self, from: NodeId, to: NodeId) {
        for node in self.nodes.values_mut() {
            for input in node.inputs.iter_mut() {
                if *input == from {
                    *input = to;
                }
            }
        }
    }

    /// Optimize the graph for the given output without changing its result.
    ///
    /// Removes filters that do nothing, drops layers outside the output,
    /// merges identical nodes and prunes everything the output does not read.
    pub fn optimize(&mut self, output: NodeId) -> OptimizeStats {
        let mut stats = OptimizeStats::default();
        if !self.nodes.contains_key(&output) {
            return stats;
        }

        // No-op filters
        let mut noops: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.op.is_noop() && n.inputs.len() == 1)
            .map(|n| n.id)
            .collect();
        noops.sort();
        for id in noops {
            if let Some(node) = self.nodes.remove(&id) {
                self.replace_input(id, node.inputs[0]);
                stats.removed_filters += 1;
            }
        }

        // Off-screen layers
        if let Some(out) = self.nodes.get(&output) {
            let view = Size::from(out.output_size);
            let culled: Vec<NodeId> = out
                .inputs
                .iter()
                .copied()
                .filter(|id| match self.nodes.get(id).map(|n| &n.op) {
                    Some(NodeOp::Layer { placement, .. }) => !placement.intersects_view(view),
                    _ => false,
                })
                .collect();
            if !culled.is_empty() {
                if let Some(out) = self.nodes.get_mut(&output) {
                    out.inputs.retain(|id| !culled.contains(id));
                }
                stats.culled_layers = culled.len();
            }
        }

        // Identical nodes, until nothing changes
        loop {
            let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
            ids.sort();
            let duplicate = ids.iter().enumerate().find_map(|(i, &a)| {
                ids[i + 1..].iter().copied().find(|&b| {
                    let (na, nb) = (&self.nodes[&a], &self.nodes[&b]);
                    b != output
                        && na.op == nb.op
                        && na.inputs == nb.inputs
                        && na.output_size == nb.output_size
                })
                .map(|b| (a, b))
            });
            match duplicate {
                Some((keep, drop)) => {
                    self.nodes.remove(&drop);
                    self.replace_input(drop, keep);
                    stats.merged_nodes += 1;
                }
                None => break,
            }
        }

        // Unreachable nodes
        let live = self.reachable_from(output);
        let before = self.nodes.len();
        self.nodes.retain(|id, _| live.contains(id));
        stats.pruned_nodes = before - self.nodes.len();

        debug!(?stats, nodes = self.nodes.len(), "render graph optimized");
        stats
    }

    /// Clear the graph for reuse.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.next_id = 0;
    }
}
