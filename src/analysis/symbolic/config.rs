//! Configuration for the symbolic execution engine.

/// Default global step budget of a walk.
///
/// Every executed operation counts as one step. A walk exceeding the budget is
/// abandoned and reported as incomplete.
pub const MAX_STEP_COUNT: usize = 2000;

/// Default number of times one block may be visited along a single path.
pub const MAX_BLOCK_VISITS: u32 = 2;

/// Configuration for a [`SymbolicExecution`](super::SymbolicExecution) walk.
///
/// Controls the bounds that keep the walk finite and a few semantic switches.
///
/// # Examples
///
/// ```rust
/// use symscope::analysis::symbolic::{ExecutionConfig, MAX_STEP_COUNT};
///
/// let config = ExecutionConfig::new().with_max_step_count(500);
/// assert_eq!(config.max_step_count, 500);
/// assert_eq!(ExecutionConfig::default().max_step_count, MAX_STEP_COUNT);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Global step budget (default: [`MAX_STEP_COUNT`]).
    pub max_step_count: usize,

    /// Maximum visits of one block along a path (default: [`MAX_BLOCK_VISITS`]).
    ///
    /// Loops are unrolled at most this many times before the path is dropped.
    pub max_block_visits: u32,

    /// Forget the values of locals when control leaves their scope (default: false).
    ///
    /// Enabling this merges more paths that differ only in dead locals, at the cost
    /// of losing values that are read again through captured closures.
    pub forget_locals_on_scope_exit: bool,

    /// Widen numeric ranges of loop counters on revisits (default: true).
    ///
    /// Without widening a counting loop is only bounded by the visit cap, and the
    /// states leaving it carry the ranges of the first iterations.
    pub widen_loop_ranges: bool,

    /// Name of the method whose invocations [`StateRecorder`](super::checks::StateRecorder)
    /// snapshots (default: `"Tag"`).
    pub tag_method: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_step_count: MAX_STEP_COUNT,
            max_block_visits: MAX_BLOCK_VISITS,
            forget_locals_on_scope_exit: false,
            widen_loop_ranges: true,
            tag_method: "Tag".to_string(),
        }
    }
}

impl ExecutionConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for large bodies where the default budget is too
    /// tight.
    ///
    /// This configuration uses:
    /// - Ten times the default step budget
    /// - Three visits per block
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            max_step_count: MAX_STEP_COUNT * 10,
            max_block_visits: 3,
            ..Self::default()
        }
    }

    /// Creates a configuration for quick, shallow walks.
    ///
    /// This configuration uses:
    /// - A quarter of the default step budget
    /// - One visit per block, so loop bodies run once
    /// - Locals forgotten when they go out of scope
    #[must_use]
    pub fn fast() -> Self {
        Self {
            max_step_count: MAX_STEP_COUNT / 4,
            max_block_visits: 1,
            forget_locals_on_scope_exit: true,
            ..Self::default()
        }
    }

    /// Sets the global step budget.
    #[must_use]
    pub fn with_max_step_count(mut self, steps: usize) -> Self {
        self.max_step_count = steps;
        self
    }

    /// Sets the per-path visit cap of a block.
    #[must_use]
    pub fn with_max_block_visits(mut self, visits: u32) -> Self {
        self.max_block_visits = visits;
        self
    }

    /// Enables or disables forgetting locals that leave their scope.
    #[must_use]
    pub fn with_forget_locals_on_scope_exit(mut self, enabled: bool) -> Self {
        self.forget_locals_on_scope_exit = enabled;
        self
    }

    /// Enables or disables loop range widening.
    #[must_use]
    pub fn with_widen_loop_ranges(mut self, enabled: bool) -> Self {
        self.widen_loop_ranges = enabled;
        self
    }

    /// Sets the marker method name used by the state recorder.
    #[must_use]
    pub fn with_tag_method(mut self, name: impl Into<String>) -> Self {
        self.tag_method = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let fast = ExecutionConfig::fast();
        assert_eq!(fast.max_block_visits, 1);
        assert!(fast.forget_locals_on_scope_exit);

        let thorough = ExecutionConfig::thorough();
        assert!(thorough.max_step_count > ExecutionConfig::default().max_step_count);
        assert_eq!(thorough.tag_method, "Tag");
    }

    #[test]
    fn test_builders() {
        let config = ExecutionConfig::new()
            .with_max_block_visits(5)
            .with_widen_loop_ranges(false)
            .with_tag_method("Mark");
        assert_eq!(config.max_block_visits, 5);
        assert!(!config.widen_loop_ranges);
        assert_eq!(config.tag_method, "Mark");
    }
}
