//! # symscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the symscope library. Import this module to get quick access to the essential
//! types for lowering a body and walking it.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all symscope operations
pub use crate::Error;

/// The result type used throughout symscope
pub use crate::Result;

// ================================================================================================
// Building Graphs
// ================================================================================================

/// Statement trees and their lowering
pub use crate::syntax::{Argument, CatchClause, Expression, Lowerer, Parameter, Statement};

/// Control flow graphs and the per-compilation cache
pub use crate::analysis::cfg::{
    BlockKind, BranchSemantics, CfgCache, ControlFlowGraph, ControlFlowGraphBuilder, RegionKind,
};

/// Operations and symbols
pub use crate::operation::{
    BodyId, CompilationId, OperationId, OperationKind, OperationTree, Symbol, SymbolFlags, SymbolId,
    SymbolKind, SymbolTable, TypeKind,
};

// ================================================================================================
// Symbolic Execution
// ================================================================================================

/// The engine, its configuration and outcome
pub use crate::analysis::symbolic::{
    CancellationToken, ExecutionConfig, SymbolicExecution, WalkOutcome,
};

/// Constraints, values and states
pub use crate::analysis::symbolic::{Constraint, ConstraintDomain, ProgramState, SymbolicValue};

/// The check API
pub use crate::analysis::symbolic::{Diagnostic, SymbolicCheck, SymbolicCheckList, SymbolicContext};

/// Built-in checks
pub use crate::analysis::symbolic::checks::{NullDereference, Recording, StateRecorder};

/// Parallel driver
pub use crate::analysis::driver::{analyze, analyze_all};
