// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::too_many_arguments)]

//! # symscope
//!
//! A path-sensitive symbolic execution engine for C#-like method bodies. Bodies are
//! lowered into Roslyn-shaped control flow graphs (blocks, branch semantics, nested
//! try/catch/finally and local lifetime regions), which the engine walks path by path
//! while tracking what is known about every value: nullness, boolean truth, numeric
//! ranges, collection emptiness, lock and dispose state. Rules plug into the walk as
//! checks and report findings only when the facts hold on an actual execution path.
//!
//! ## Features
//!
//! - **Roslyn-shaped graphs** - Conditional and fall-through successors, flow
//!   captures, exception regions with finally replay
//! - **Immutable program states** - Cheap forks at branches, structural merging of
//!   equivalent paths
//! - **Bounded walks** - Per-block visit caps, a global step budget, loop widening
//!   and cooperative cancellation
//! - **Pluggable checks** - Pre and post hooks that can refine or prune states
//! - **Parallel driver** - Independent bodies walked on the `rayon` pool, graphs
//!   shared through a per-compilation cache
//!
//! ## Quick Start
//!
//! ```rust
//! use symscope::prelude::*;
//!
//! let lowerer = Lowerer::new().parameter_object("o");
//! let o = lowerer.symbol("o").unwrap();
//! let cfg = lowerer.lower(&[
//!     Statement::If {
//!         condition: Expression::equals(Expression::parameter("o"), Expression::null()),
//!         then: vec![Statement::Return(None)],
//!         otherwise: vec![],
//!     },
//!     Statement::tag("Checked", None),
//! ])?;
//!
//! let recorder = StateRecorder::new("Tag");
//! let recording = recorder.recording();
//! let outcome = SymbolicExecution::new(&cfg, recorder.into(), ExecutionConfig::default())?.walk();
//!
//! assert!(outcome.completed);
//! assert!(recording.borrow().symbol_has("Checked", o, Constraint::NOT_NULL));
//! # Ok::<(), symscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`operation`] - The operation tree and symbol table the graphs are made of
//! - [`syntax`] - A small statement and expression language and its lowering
//! - [`analysis::cfg`] - Control flow graphs, regions and the graph cache
//! - [`analysis::symbolic`] - Constraints, program states, the engine and checks
//! - [`analysis::driver`] - Walking many bodies in parallel
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `debug` for graph construction and walk
//! summaries, `trace` for individual steps. Install any `tracing` subscriber to see
//! them.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use symscope::prelude::*;
///
/// let cfg = Lowerer::new().lower(&[Statement::Return(None)])?;
/// let outcome = SymbolicExecution::new(&cfg, SymbolicCheckList::default(), ExecutionConfig::default())?
///     .walk();
/// assert_eq!(outcome.exit_reach_count(), 1);
/// # Ok::<(), symscope::Error>(())
/// ```
pub mod prelude;

/// Control flow graphs, symbolic execution and the parallel driver.
pub mod analysis;

/// Operations, symbols and the tracked-symbol rules.
///
/// An [`operation::OperationTree`] is the arena every graph block points into; an
/// [`operation::SymbolTable`] describes the locals, parameters, fields, properties
/// and methods those operations reference.
pub mod operation;

/// Statement trees and their lowering into control flow graphs.
pub mod syntax;

/// Generic graph infrastructure.
pub mod utils;

/// `symscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
///
/// # Examples
///
/// ```rust
/// use symscope::{analysis::cfg::ControlFlowGraph, syntax::{Lowerer, Statement}, Result};
///
/// fn lower_empty() -> Result<ControlFlowGraph> {
///     Lowerer::new().lower(&[])
/// }
/// assert!(lower_empty().is_ok());
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `symscope` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust
/// use symscope::{syntax::{Expression, Lowerer, Statement}, Error};
///
/// match Lowerer::new().lower(&[Statement::expression(Expression::name("missing"))]) {
///     Err(Error::InvalidArgument(message)) => assert!(message.contains("missing")),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub use error::Error;
