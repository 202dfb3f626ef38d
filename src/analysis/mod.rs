//! Control flow and symbolic execution analysis.
//!
//! # Architecture
//!
//! - [`cfg`] - Roslyn-shaped control flow graphs: blocks, branches with semantics,
//!   nested regions, and a per-compilation cache
//! - [`symbolic`] - the path-sensitive symbolic execution engine and its checks
//! - [`driver`] - parallel walks over many bodies
//!
//! Graphs are usually produced by [`crate::syntax::Lowerer`] from a small statement
//! tree, or assembled directly with [`cfg::ControlFlowGraphBuilder`].
//!
//! # Usage
//!
//! ```rust
//! use symscope::{
//!     analysis::symbolic::{ExecutionConfig, SymbolicCheckList, SymbolicExecution},
//!     syntax::{Expression, Lowerer, Statement},
//! };
//!
//! let cfg = Lowerer::new()
//!     .local_int("i")
//!     .lower(&[Statement::assign("i", Expression::int(1))])?;
//! let outcome =
//!     SymbolicExecution::new(&cfg, SymbolicCheckList::default(), ExecutionConfig::default())?
//!         .walk();
//! assert!(outcome.completed);
//! # Ok::<(), symscope::Error>(())
//! ```

pub mod cfg;
pub mod driver;
pub mod symbolic;

pub use cfg::{CfgCache, ControlFlowGraph};
pub use symbolic::{ExecutionConfig, SymbolicExecution, WalkOutcome};
