//! Control flow graphs of method bodies.
//!
//! This module models the graph shape the symbolic engine walks: a body is a sequence of
//! [`BasicBlock`]s holding root operations, connected by [`Branch`]es, and nested in a
//! tree of [`Region`]s that carry exception-handling and lifetime semantics.
//!
//! # Architecture
//!
//! The blocks are stored in the generic [`crate::utils::graph::DirectedGraph`], with edges
//! labelled by [`CfgEdgeKind`]. Graphs are immutable once built by a
//! [`ControlFlowGraphBuilder`] (or by [`crate::syntax::Lowerer`]) and are shared as
//! `Arc<ControlFlowGraph>`.
//!
//! # Key Components
//!
//! - [`ControlFlowGraph`] - Blocks, regions, and the operation and symbol tables they use
//! - [`ControlFlowGraphBuilder`] - Validating incremental construction
//! - [`Region`] / [`RegionKind`] - The region tree (try, catch, finally, lifetimes)
//! - [`CfgCache`] - Per-compilation memoization of built graphs
//!
//! # Regions and Exceptions
//!
//! A `try { } catch { } finally { }` statement nests as
//! `TryAndFinally { Try { TryAndCatch { Try, Catch.. } }, Finally }`. Branches record the
//! regions they leave and enter and the finally regions that must run on the way.
//! [`ControlFlowGraph::exception_targets`] resolves where an exception raised inside a
//! region is delivered.
//!
//! # Thread Safety
//!
//! [`ControlFlowGraph`] is [`Send`] and [`Sync`]. [`CfgCache`] may be shared between
//! threads; concurrent requests for the same body observe the same graph.

mod block;
mod builder;
mod cache;
mod edge;
mod graph;
pub(crate) mod region;

pub use block::{BasicBlock, BlockKind, Branch, BranchSemantics, ConditionKind};
pub use builder::ControlFlowGraphBuilder;
pub use cache::CfgCache;
pub use edge::CfgEdgeKind;
pub use graph::ControlFlowGraph;
pub use region::{ExceptionTarget, GuardKind, Region, RegionId, RegionKind};

/// Identity of a block: its ordinal in the graph.
pub type BlockId = crate::utils::graph::NodeId;
