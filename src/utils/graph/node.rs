//! Node identifiers for [`DirectedGraph`](crate::utils::graph::DirectedGraph).

use std::fmt;

/// A strongly-typed identifier for a node within a directed graph.
///
/// Node IDs are handed out sequentially from 0 by
/// [`DirectedGraph::add_node`](crate::utils::graph::DirectedGraph::add_node), which lets
/// analyses keep per-node data in plain vectors indexed by [`NodeId::index`].
///
/// # Examples
///
/// ```rust
/// use symscope::utils::graph::{DirectedGraph, NodeId};
///
/// let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
/// let entry: NodeId = graph.add_node("entry");
/// assert_eq!(entry.index(), 0);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a `NodeId` from a raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw 0-based index of this node.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_roundtrip() {
        let node = NodeId::new(7);
        assert_eq!(node.index(), 7);
        assert_eq!(NodeId::from(7), node);
        assert_eq!(format!("{node}"), "n7");
        assert_eq!(format!("{node:?}"), "NodeId(7)");
    }

    #[test]
    fn test_node_id_ordering() {
        assert!(NodeId::new(1) < NodeId::new(2));
    }
}
