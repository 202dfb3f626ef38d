//! Directed graph storage and traversal used by the control flow graph.
//!
//! The types here know nothing about basic blocks or branches; the CFG adapter in
//! [`crate::analysis::cfg`] stores its blocks as node payloads and its branch labels as
//! edge payloads.

mod directed;
mod edge;
mod node;
mod traits;

pub mod algorithms;

pub use directed::DirectedGraph;
pub use edge::EdgeId;
pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, Successors};
