//! Parallel analysis of many bodies.
//!
//! Every body is walked independently: a walk owns its check list and states, and
//! only the graphs (read-only, shared through [`Arc`]) and the cancellation flag are
//! visible to more than one worker. Walks are distributed over the `rayon` pool.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    analysis::{
        cfg::{CfgCache, ControlFlowGraph},
        symbolic::{CancellationToken, ExecutionConfig, SymbolicCheckList, SymbolicExecution, WalkOutcome},
    },
    operation::{BodyId, CompilationId},
    Result,
};

/// Walks one graph with a fresh check list.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidArgument`] if the graph or configuration cannot be
/// walked.
pub fn analyze(
    cfg: &ControlFlowGraph,
    checks: SymbolicCheckList,
    config: &ExecutionConfig,
    cancellation: &CancellationToken,
) -> Result<WalkOutcome> {
    let mut execution = SymbolicExecution::new(cfg, checks, config.clone())?;
    let outcome = execution.walk_with_cancellation(cancellation);
    debug!(
        root = ?cfg.root(),
        completed = outcome.completed,
        steps = outcome.steps,
        diagnostics = outcome.diagnostics.len(),
        "walk finished"
    );
    Ok(outcome)
}

/// Walks every graph in parallel, returning the outcomes in input order.
///
/// `make_checks` is called once per graph so that no check state leaks from one walk
/// into another. Cancelling `cancellation` stops the walks still running; they report
/// themselves cancelled.
///
/// # Errors
///
/// Returns the first error raised while preparing a walk.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use symscope::{
///     analysis::{
///         driver::analyze_all,
///         symbolic::{checks::NullDereference, CancellationToken, ExecutionConfig},
///     },
///     syntax::{Expression, Lowerer, Statement},
/// };
///
/// let bodies = [Expression::null(), Expression::string("text")]
///     .into_iter()
///     .map(|value| {
///         Lowerer::new().local_object("o").lower(&[
///             Statement::assign("o", value),
///             Statement::expression(Expression::call_on(Expression::local("o"), "ToString", vec![])),
///         ])
///     })
///     .map(|cfg| cfg.map(Arc::new))
///     .collect::<Result<Vec<_>, _>>()?;
///
/// let outcomes = analyze_all(
///     &bodies,
///     || NullDereference::new().into(),
///     &ExecutionConfig::default(),
///     &CancellationToken::new(),
/// )?;
/// assert_eq!(outcomes[0].diagnostics.len(), 1);
/// assert!(outcomes[1].diagnostics.is_empty());
/// # Ok::<(), symscope::Error>(())
/// ```
pub fn analyze_all<F>(
    cfgs: &[Arc<ControlFlowGraph>],
    make_checks: F,
    config: &ExecutionConfig,
    cancellation: &CancellationToken,
) -> Result<Vec<WalkOutcome>>
where
    F: Fn() -> SymbolicCheckList + Sync,
{
    info!(bodies = cfgs.len(), "analyzing bodies");
    let outcomes = cfgs
        .par_iter()
        .map(|cfg| analyze(cfg, make_checks(), config, cancellation))
        .collect::<Result<Vec<_>>>()?;

    let diagnostics: usize = outcomes.iter().map(|outcome| outcome.diagnostics.len()).sum();
    let incomplete = outcomes.iter().filter(|outcome| !outcome.completed).count();
    info!(bodies = cfgs.len(), diagnostics, incomplete, "analysis finished");
    Ok(outcomes)
}

/// A body to analyze through a [`CfgCache`].
pub struct Body<B> {
    /// The compilation the body belongs to.
    pub compilation: CompilationId,
    /// The body's identity within the compilation, the cache key.
    pub id: BodyId,
    /// Builds the graph on a cache miss.
    pub build: B,
}

/// Resolves every body through `cache` and walks the graphs in parallel.
///
/// Bodies already in the cache are not lowered again. Outcomes are returned in input
/// order.
///
/// # Errors
///
/// Returns the first error raised while building a graph or preparing a walk.
pub fn analyze_cached<B, F>(
    cache: &CfgCache,
    bodies: Vec<Body<B>>,
    make_checks: F,
    config: &ExecutionConfig,
    cancellation: &CancellationToken,
) -> Result<Vec<WalkOutcome>>
where
    B: FnOnce() -> Result<ControlFlowGraph> + Send,
    F: Fn() -> SymbolicCheckList + Sync,
{
    let cfgs = bodies
        .into_par_iter()
        .map(|body| cache.get_or_build(body.compilation, body.id, body.build))
        .collect::<Result<Vec<_>>>()?;
    analyze_all(&cfgs, make_checks, config, cancellation)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        analysis::symbolic::checks::NullDereference,
        syntax::{Expression, Lowerer, Statement},
    };

    fn dereference(value: Expression) -> Result<ControlFlowGraph> {
        Lowerer::new().local_object("o").lower(&[
            Statement::assign("o", value),
            Statement::expression(Expression::call_on(Expression::local("o"), "ToString", vec![])),
        ])
    }

    #[test]
    fn test_outcomes_keep_input_order() {
        let cfgs: Vec<_> = (0..16)
            .map(|index| {
                let value = if index % 2 == 0 {
                    Expression::null()
                } else {
                    Expression::string("value")
                };
                dereference(value).map(Arc::new)
            })
            .collect::<Result<_>>()
            .unwrap();

        let outcomes = analyze_all(
            &cfgs,
            || NullDereference::new().into(),
            &ExecutionConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(outcomes.len(), 16);
        for (index, outcome) in outcomes.iter().enumerate() {
            assert!(outcome.completed);
            assert_eq!(outcome.diagnostics.len(), usize::from(index % 2 == 0));
        }
    }

    #[test]
    fn test_each_walk_gets_fresh_checks() {
        let cfgs: Vec<_> = (0..5)
            .map(|_| dereference(Expression::null()).map(Arc::new))
            .collect::<Result<_>>()
            .unwrap();
        let created = AtomicUsize::new(0);

        analyze_all(
            &cfgs,
            || {
                created.fetch_add(1, Ordering::Relaxed);
                SymbolicCheckList::default()
            },
            &ExecutionConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(created.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_cancelled_before_start() {
        let cfgs = vec![Arc::new(dereference(Expression::null()).unwrap())];
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let outcomes = analyze_all(
            &cfgs,
            || NullDereference::new().into(),
            &ExecutionConfig::default(),
            &cancellation,
        )
        .unwrap();

        assert!(outcomes[0].cancelled);
        assert!(!outcomes[0].completed);
        assert!(outcomes[0].diagnostics.is_empty());
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let cfgs = vec![Arc::new(dereference(Expression::null()).unwrap())];
        let config = ExecutionConfig::default().with_max_block_visits(0);

        let result = analyze_all(&cfgs, SymbolicCheckList::default, &config, &CancellationToken::new());

        assert!(result.is_err());
    }

    #[test]
    fn test_cached_bodies_are_built_once() {
        let cache = CfgCache::new();
        let counter = AtomicUsize::new(0);
        let builds = &counter;
        let body = move |id: u64| Body {
            compilation: CompilationId(7),
            id: BodyId(id),
            build: move || {
                builds.fetch_add(1, Ordering::Relaxed);
                dereference(Expression::null())
            },
        };

        for _ in 0..2 {
            let outcomes = analyze_cached(
                &cache,
                vec![body(0), body(1)],
                || NullDereference::new().into(),
                &ExecutionConfig::default(),
                &CancellationToken::new(),
            )
            .unwrap();
            assert_eq!(outcomes.len(), 2);
            assert!(outcomes.iter().all(|outcome| outcome.diagnostics.len() == 1));
        }

        assert_eq!(counter.load(Ordering::Relaxed), 2);
        assert_eq!(cache.len(), 2);
    }
}
