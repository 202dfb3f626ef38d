//! Per-compilation cache of control flow graphs.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::{
    analysis::cfg::ControlFlowGraph,
    operation::{BodyId, CompilationId},
    Result,
};

/// Memoizes the graph built for each `(compilation, body)` pair.
///
/// Rules running over the same body share one graph instead of lowering it again. The
/// key includes the compilation, so a body re-analyzed after an edit (a new
/// compilation) gets a fresh graph. Within a compilation bodies are told apart by
/// their [`BodyId`], never by their root operation. The cache is safe to share across
/// threads.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use symscope::{
///     analysis::cfg::{BlockKind, BranchSemantics, CfgCache, ControlFlowGraphBuilder},
///     operation::{BodyId, CompilationId, OperationTree, SymbolTable},
/// };
///
/// let cache = CfgCache::new();
/// let build = || {
///     let mut builder = ControlFlowGraphBuilder::new();
///     let entry = builder.add_block(BlockKind::Entry);
///     let exit = builder.add_block(BlockKind::Exit);
///     builder.set_fall_through(entry, Some(exit), BranchSemantics::Regular)?;
///     builder.build(Arc::new(OperationTree::new()), Arc::new(SymbolTable::new()))
/// };
///
/// let first = cache.get_or_build(CompilationId(1), BodyId(10), build)?;
/// let second = cache.get_or_build(CompilationId(1), BodyId(10), build)?;
/// let sibling = cache.get_or_build(CompilationId(1), BodyId(11), build)?;
/// assert!(Arc::ptr_eq(&first, &second));
/// assert!(!Arc::ptr_eq(&first, &sibling));
/// # Ok::<(), symscope::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct CfgCache {
    graphs: DashMap<(CompilationId, BodyId), Arc<ControlFlowGraph>>,
}

impl CfgCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        CfgCache {
            graphs: DashMap::new(),
        }
    }

    /// Returns the cached graph of `body`, building it with `build` on first request.
    ///
    /// The graph is built outside the map's locks. When two threads race on the same
    /// key, both observe the graph that was stored first.
    ///
    /// # Errors
    ///
    /// Returns the error of `build`; nothing is cached in that case.
    pub fn get_or_build<F>(
        &self,
        compilation: CompilationId,
        body: BodyId,
        build: F,
    ) -> Result<Arc<ControlFlowGraph>>
    where
        F: FnOnce() -> Result<ControlFlowGraph>,
    {
        let key = (compilation, body);
        if let Some(cached) = self.graphs.get(&key) {
            debug!(compilation = compilation.0, %body, "control flow graph cache hit");
            return Ok(Arc::clone(cached.value()));
        }

        debug!(compilation = compilation.0, %body, "building control flow graph");
        let built = Arc::new(build()?);
        let stored = self.graphs.entry(key).or_insert(built);
        Ok(Arc::clone(stored.value()))
    }

    /// Returns the cached graph of `body`, if any.
    #[must_use]
    pub fn get(&self, compilation: CompilationId, body: BodyId) -> Option<Arc<ControlFlowGraph>> {
        self.graphs
            .get(&(compilation, body))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Drops every graph of `compilation`.
    pub fn remove_compilation(&self, compilation: CompilationId) {
        self.graphs.retain(|(owner, _), _| *owner != compilation);
    }

    /// Drops every graph.
    pub fn clear(&self) {
        self.graphs.clear();
    }

    /// Returns the number of cached graphs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test::trivial_cfg;

    #[test]
    fn test_cache_builds_once_per_key() {
        let cache = CfgCache::new();
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            trivial_cfg()
        };

        let first = cache
            .get_or_build(CompilationId(1), BodyId(3), build)
            .unwrap();
        let again = cache
            .get_or_build(CompilationId(1), BodyId(3), build)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        let other = cache
            .get_or_build(CompilationId(2), BodyId(3), build)
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_same_shaped_bodies_get_their_own_graphs() {
        let cache = CfgCache::new();
        let first = cache
            .get_or_build(CompilationId(1), BodyId(20), trivial_cfg)
            .unwrap();
        let second = cache
            .get_or_build(CompilationId(1), BodyId(21), trivial_cfg)
            .unwrap();

        assert_eq!(first.root(), second.root());
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 2);
        assert!(cache
            .get(CompilationId(1), BodyId(21))
            .is_some_and(|cached| Arc::ptr_eq(&cached, &second)));
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let cache = CfgCache::new();
        let result = cache.get_or_build(CompilationId(1), BodyId(0), || {
            Err(malformed_error!("broken"))
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_compilation() {
        let cache = CfgCache::new();
        for compilation in [1, 1, 2] {
            let body = BodyId(cache.len() as u64);
            cache
                .get_or_build(CompilationId(compilation), body, trivial_cfg)
                .unwrap();
        }
        cache.remove_compilation(CompilationId(1));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(CompilationId(2), BodyId(2)).is_some());
        cache.clear();
        assert!(cache.is_empty());
    }
}
