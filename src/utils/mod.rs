//! Utility data structures shared by the analysis modules.

pub mod graph;
