//! The control flow graph adapter.

use std::{collections::HashMap, fmt::Write, sync::Arc};

use crate::{
    analysis::cfg::{
        region::{exception_targets, region_chain},
        BasicBlock, BlockId, BranchSemantics, CfgEdgeKind, ExceptionTarget, Region, RegionId,
        RegionKind,
    },
    operation::{CompilationId, Operation, OperationId, OperationTree, Symbol, SymbolId, SymbolTable},
    utils::graph::{DirectedGraph, EdgeId},
};

/// Control flow graph of one method body, lambda or local function.
///
/// Blocks are stored in a [`DirectedGraph`] whose edges carry a [`CfgEdgeKind`]; the
/// region tree, the operation tree and the symbol table the blocks refer to are owned
/// alongside. Graphs are immutable once built and are shared through
/// `Arc<ControlFlowGraph>`, typically via a [`CfgCache`](super::CfgCache).
///
/// # Examples
///
/// ```rust
/// use symscope::syntax::{Expression, Lowerer, Statement};
///
/// let cfg = Lowerer::new().parameter_bool("condition").lower(&[
///     Statement::If {
///         condition: Expression::parameter("condition"),
///         then: vec![Statement::Return(None)],
///         otherwise: vec![],
///     },
/// ])?;
///
/// let entry = cfg.entry_block();
/// assert!(cfg.block(entry).is_some());
/// assert!(cfg.reachable_blocks().any(|(id, _)| id == cfg.exit_block()));
/// # Ok::<(), symscope::Error>(())
/// ```
#[derive(Debug)]
pub struct ControlFlowGraph {
    graph: DirectedGraph<BasicBlock, CfgEdgeKind>,
    regions: Vec<Region>,
    entry: BlockId,
    exit: BlockId,
    operations: Arc<OperationTree>,
    symbols: Arc<SymbolTable>,
    compilation: CompilationId,
    root: Option<OperationId>,
    local_functions: HashMap<SymbolId, Arc<ControlFlowGraph>>,
    anonymous_functions: HashMap<OperationId, Arc<ControlFlowGraph>>,
}

impl ControlFlowGraph {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        graph: DirectedGraph<BasicBlock, CfgEdgeKind>,
        regions: Vec<Region>,
        entry: BlockId,
        exit: BlockId,
        operations: Arc<OperationTree>,
        symbols: Arc<SymbolTable>,
        compilation: CompilationId,
        root: Option<OperationId>,
        local_functions: HashMap<SymbolId, Arc<ControlFlowGraph>>,
        anonymous_functions: HashMap<OperationId, Arc<ControlFlowGraph>>,
    ) -> Self {
        ControlFlowGraph {
            graph,
            regions,
            entry,
            exit,
            operations,
            symbols,
            compilation,
            root,
            local_functions,
            anonymous_functions,
        }
    }

    /// Returns the entry block.
    #[must_use]
    pub fn entry_block(&self) -> BlockId {
        self.entry
    }

    /// Returns the exit block.
    #[must_use]
    pub fn exit_block(&self) -> BlockId {
        self.exit
    }

    /// Returns the block for `id`.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.graph.node(id)
    }

    /// Iterates over all blocks in ordinal order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> + '_ {
        self.graph.nodes()
    }

    /// Iterates over the blocks reachable from the entry block.
    pub fn reachable_blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> + '_ {
        self.blocks().filter(|(_, block)| block.is_reachable)
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Iterates over the successors of `block`, including exceptional ones.
    pub fn successors(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.graph.successors(block)
    }

    /// Iterates over the predecessors of `block`, including exceptional ones.
    pub fn predecessors(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.graph.predecessors(block)
    }

    /// Iterates over `(edge, target, kind)` for the outgoing edges of `block`.
    pub fn outgoing_edges(
        &self,
        block: BlockId,
    ) -> impl Iterator<Item = (EdgeId, BlockId, CfgEdgeKind)> + '_ {
        self.graph
            .outgoing_edges(block)
            .map(|(edge, target, kind)| (edge, target, *kind))
    }

    /// Returns the underlying graph.
    #[must_use]
    pub fn graph(&self) -> &DirectedGraph<BasicBlock, CfgEdgeKind> {
        &self.graph
    }

    /// Returns the region for `id`.
    #[must_use]
    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id.index())
    }

    /// Iterates over all regions, root first.
    pub fn regions(&self) -> impl Iterator<Item = &Region> + '_ {
        self.regions.iter()
    }

    /// Returns the regions enclosing `block`, innermost first and ending with the root.
    #[must_use]
    pub fn enclosing_regions(&self, block: BlockId) -> Vec<RegionId> {
        match self.block(block) {
            Some(block) => self.region_chain(block.region),
            None => Vec::new(),
        }
    }

    /// Returns `region` followed by its ancestors.
    #[must_use]
    pub fn region_chain(&self, region: RegionId) -> Vec<RegionId> {
        region_chain(&self.regions, region)
    }

    /// Returns the innermost region of `kind` enclosing `block`.
    #[must_use]
    pub fn enclosing_region_of_kind(&self, block: BlockId, kind: RegionKind) -> Option<&Region> {
        self.enclosing_regions(block)
            .into_iter()
            .filter_map(|id| self.region(id))
            .find(|region| region.kind == kind)
    }

    /// Returns `true` if some region of `kind` encloses `block`.
    #[must_use]
    pub fn is_in_region_kind(&self, block: BlockId, kind: RegionKind) -> bool {
        self.enclosing_region_of_kind(block, kind).is_some()
    }

    /// Returns `true` if `block` lies inside `region`.
    #[must_use]
    pub fn region_contains(&self, region: RegionId, block: BlockId) -> bool {
        self.enclosing_regions(block).contains(&region)
    }

    /// Returns the nested region of `parent` with the given kind.
    #[must_use]
    pub fn nested_region_of_kind(&self, parent: RegionId, kind: RegionKind) -> Option<&Region> {
        self.region(parent)?
            .nested
            .iter()
            .filter_map(|id| self.region(*id))
            .find(|region| region.kind == kind)
    }

    /// Returns where an exception raised inside `from` is delivered.
    ///
    /// Regions are searched outward. The catch handlers of the innermost enclosing
    /// `try` are all candidates since the exception type is not known; the search
    /// stops at a catch-all handler or at the first enclosing finally region. An
    /// exception no handler stops reaches [`ExceptionTarget::Exit`].
    #[must_use]
    pub fn exception_targets(&self, from: RegionId) -> Vec<ExceptionTarget> {
        exception_targets(&self.regions, from)
    }

    /// Returns the block control enters for an exception target.
    #[must_use]
    pub fn exception_target_block(&self, target: ExceptionTarget) -> Option<BlockId> {
        match target {
            ExceptionTarget::Catch(region) | ExceptionTarget::Finally(region) => {
                self.region(region).map(|r| r.first_block)
            }
            ExceptionTarget::Exit => Some(self.exit),
        }
    }

    /// Returns the blocks inside `region` that end it through structured exception
    /// handling (the ends of a finally region).
    #[must_use]
    pub fn region_exits(&self, region: RegionId) -> Vec<BlockId> {
        self.blocks()
            .filter(|(id, block)| {
                block.fall_through.as_ref().is_some_and(|branch| {
                    branch.semantics == BranchSemantics::StructuredExceptionHandling
                }) && self.region_contains(region, *id)
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Returns the operation tree the blocks refer to.
    #[must_use]
    pub fn operations(&self) -> &Arc<OperationTree> {
        &self.operations
    }

    /// Returns the symbol table the operations refer to.
    #[must_use]
    pub fn symbols(&self) -> &Arc<SymbolTable> {
        &self.symbols
    }

    /// Returns the operation for `id`.
    #[must_use]
    pub fn operation(&self, id: OperationId) -> Option<&Operation> {
        self.operations.get(id)
    }

    /// Returns the symbol for `id`.
    #[must_use]
    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    /// Returns the compilation this graph was built for.
    #[must_use]
    pub fn compilation(&self) -> CompilationId {
        self.compilation
    }

    /// Returns the body operation this graph was built from.
    #[must_use]
    pub fn root(&self) -> Option<OperationId> {
        self.root
    }

    /// Returns the graph of a local function declared in this body.
    #[must_use]
    pub fn local_function_cfg(&self, symbol: SymbolId) -> Option<&Arc<ControlFlowGraph>> {
        self.local_functions.get(&symbol)
    }

    /// Returns the graph of a lambda created by `operation`.
    #[must_use]
    pub fn anonymous_function_cfg(&self, operation: OperationId) -> Option<&Arc<ControlFlowGraph>> {
        self.anonymous_functions.get(&operation)
    }

    /// Iterates over the graphs of every local function and lambda declared directly
    /// in this body.
    pub fn nested_graphs(&self) -> impl Iterator<Item = &Arc<ControlFlowGraph>> + '_ {
        self.local_functions
            .values()
            .chain(self.anonymous_functions.values())
    }

    /// Renders the graph in Graphviz DOT format.
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();
        let _ = writeln!(dot, "digraph \"{}\" {{", title.unwrap_or("cfg"));
        let _ = writeln!(dot, "    node [shape=box, fontname=\"monospace\"];");
        for (id, block) in self.blocks() {
            let mut label = format!("B{} ({})", block.ordinal, block.kind);
            for operation in &block.operations {
                let text = self
                    .operation(*operation)
                    .map_or_else(String::new, |op| match &op.syntax {
                        Some(syntax) => syntax.to_string(),
                        None => op.kind.name().to_string(),
                    });
                let _ = write!(label, "\\l{}", text.replace('"', "\\\""));
            }
            let style = if block.is_reachable { "solid" } else { "dashed" };
            let _ = writeln!(dot, "    {} [label=\"{}\\l\", style={}];", id.index(), label, style);
        }
        for (edge, kind) in self.graph.edges() {
            if let Some((source, target)) = self.graph.edge_endpoints(edge) {
                let _ = writeln!(
                    dot,
                    "    {} -> {} [label=\"{}\"];",
                    source.index(),
                    target.index(),
                    kind
                );
            }
        }
        dot.push_str("}\n");
        dot
    }
}
