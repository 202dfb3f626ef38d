//! Traits that let graph algorithms run over any adjacency representation.
//!
//! - [`GraphBase`] - node count and node iteration
//! - [`Successors`] - forward traversal
//! - [`Predecessors`] - backward traversal

use crate::utils::graph::NodeId;

/// Core graph properties.
pub trait GraphBase {
    /// Returns the number of nodes in the graph.
    fn node_count(&self) -> usize;

    /// Iterates over every node identifier.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Graphs that can enumerate the outgoing neighbours of a node.
pub trait Successors: GraphBase {
    /// Iterates over the direct successors of `node`.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Graphs that can enumerate the incoming neighbours of a node.
pub trait Predecessors: GraphBase {
    /// Iterates over the direct predecessors of `node`.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}
