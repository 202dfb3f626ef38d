//! Symbolic execution over control flow graphs.
//!
//! The engine walks a [`ControlFlowGraph`](crate::analysis::cfg::ControlFlowGraph) path
//! by path, keeping an immutable [`ProgramState`] per path. A state maps operations and
//! tracked symbols to [`SymbolicValue`]s, sets of [`Constraint`]s such as "not null",
//! "true" or "in `[0, 9]`". Conditional branches fork the state and teach each side
//! what the condition implies; states that meet at a block in the same shape are
//! explored once.
//!
//! # Architecture
//!
//! - [`constraints`](Constraint) - constraint domains and members
//! - [`SymbolicValue`] and [`ProgramState`] - the immutable lattice the walk carries
//! - [`SymbolicExecution`] - the worklist walker with finally replay and exceptional
//!   successors
//! - [`SymbolicCheck`] - the hooks rules plug into, folded by [`SymbolicCheckList`]
//! - [`checks`] - the built-in checks
//!
//! # Bounding
//!
//! Walks are finite by construction: a block is entered at most
//! [`ExecutionConfig::max_block_visits`] times on one path and the whole walk may
//! process at most [`ExecutionConfig::max_step_count`] operations. A walk that spends
//! its budget reports itself incomplete.
//!
//! # Examples
//!
//! ```rust
//! use symscope::{
//!     analysis::symbolic::{
//!         checks::StateRecorder, Constraint, ExecutionConfig, SymbolicExecution,
//!     },
//!     syntax::{Expression, Lowerer, Statement},
//! };
//!
//! let lowerer = Lowerer::new().parameter_object("o");
//! let o = lowerer.symbol("o").unwrap();
//! let cfg = lowerer.lower(&[Statement::If {
//!     condition: Expression::equals(Expression::parameter("o"), Expression::null()),
//!     then: vec![Statement::tag("IsNull", None)],
//!     otherwise: vec![Statement::tag("NotNull", None)],
//! }])?;
//!
//! let recorder = StateRecorder::new("Tag");
//! let recording = recorder.recording();
//! let mut execution = SymbolicExecution::new(&cfg, recorder.into(), ExecutionConfig::default())?;
//! execution.walk();
//!
//! let recording = recording.borrow();
//! assert!(recording.symbol_has("IsNull", o, Constraint::NULL));
//! assert!(recording.symbol_has("NotNull", o, Constraint::NOT_NULL));
//! # Ok::<(), symscope::Error>(())
//! ```

mod check;
mod config;
mod constraints;
mod engine;
mod learning;
pub(crate) mod processors;
mod state;
mod value;

pub mod checks;

pub use check::{Diagnostic, DiagnosticSink, SymbolicCheck, SymbolicCheckList, SymbolicContext};
pub use config::{ExecutionConfig, MAX_BLOCK_VISITS, MAX_STEP_COUNT};
pub use constraints::{
    BoolConstraint, CollectionConstraint, Constraint, ConstraintDomain, CustomConstraint,
    DisposableConstraint, LockConstraint, NumberConstraint, ObjectConstraint,
};
pub use engine::{CancellationToken, SymbolicExecution, WalkOutcome};
pub use state::ProgramState;
pub use value::SymbolicValue;
