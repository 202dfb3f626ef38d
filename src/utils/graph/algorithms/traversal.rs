//! Breadth-first traversal.
//!
//! The CFG uses this to compute which blocks are reachable from the entry block,
//! which is how unreachable code after `throw`/`return` is told apart from live code.

use std::collections::VecDeque;

use crate::utils::graph::{NodeId, Successors};

/// Breadth-first iterator yielding each node reachable from the start node once.
pub struct BfsIterator<'g, G: Successors> {
    graph: &'g G,
    queue: VecDeque<NodeId>,
    visited: Vec<bool>,
}

impl<'g, G: Successors> BfsIterator<'g, G> {
    fn new(graph: &'g G, start: NodeId) -> Self {
        let node_count = graph.node_count();
        if start.index() >= node_count {
            return BfsIterator {
                graph,
                queue: VecDeque::new(),
                visited: Vec::new(),
            };
        }

        let mut visited = vec![false; node_count];
        visited[start.index()] = true;

        BfsIterator {
            graph,
            queue: VecDeque::from([start]),
            visited,
        }
    }
}

impl<G: Successors> Iterator for BfsIterator<'_, G> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.pop_front()?;
        for succ in self.graph.successors(node) {
            if !self.visited[succ.index()] {
                self.visited[succ.index()] = true;
                self.queue.push_back(succ);
            }
        }
        Some(node)
    }
}

/// Returns a breadth-first iterator starting at `start`.
///
/// An out-of-range start node yields an empty iterator.
///
/// # Examples
///
/// ```rust
/// use symscope::utils::graph::{algorithms::bfs, DirectedGraph};
///
/// let mut graph: DirectedGraph<char, ()> = DirectedGraph::new();
/// let a = graph.add_node('A');
/// let b = graph.add_node('B');
/// let _unreachable = graph.add_node('C');
/// graph.add_edge(a, b, ())?;
///
/// assert_eq!(bfs(&graph, a).count(), 2);
/// # Ok::<(), symscope::Error>(())
/// ```
pub fn bfs<G: Successors>(graph: &G, start: NodeId) -> BfsIterator<'_, G> {
    BfsIterator::new(graph, start)
}

#[cfg(test)]
mod tests {
    use crate::utils::graph::{algorithms::bfs, DirectedGraph, NodeId};

    #[test]
    fn test_bfs_level_order_with_cycle() {
        let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
        let a = graph.add_node("A");
        let b = graph.add_node("B");
        let c = graph.add_node("C");
        let d = graph.add_node("D");
        graph.add_edge(a, b, ()).unwrap();
        graph.add_edge(a, c, ()).unwrap();
        graph.add_edge(b, d, ()).unwrap();
        graph.add_edge(d, a, ()).unwrap();

        let order: Vec<NodeId> = bfs(&graph, a).collect();
        assert_eq!(order, vec![a, b, c, d]);
    }

    #[test]
    fn test_bfs_invalid_start() {
        let graph: DirectedGraph<(), ()> = DirectedGraph::new();
        assert_eq!(bfs(&graph, NodeId::new(3)).count(), 0);
    }
}
