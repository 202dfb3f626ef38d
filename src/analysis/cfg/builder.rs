//! Construction of control flow graphs.

use std::{collections::HashMap, sync::Arc};

use crate::{
    analysis::cfg::{
        BasicBlock, BlockId, BlockKind, Branch, BranchSemantics, CfgEdgeKind, ConditionKind,
        ControlFlowGraph, ExceptionTarget, GuardKind, Region, RegionId, RegionKind,
    },
    analysis::cfg::region::{exception_targets, finally_of_try, region_chain},
    operation::{CaptureId, CompilationId, OperationId, OperationTree, SymbolId, SymbolTable},
    utils::graph::{algorithms::bfs, DirectedGraph, NodeId},
    Result,
};

#[derive(Debug)]
struct PendingRegion {
    kind: RegionKind,
    parent: Option<RegionId>,
    nested: Vec<RegionId>,
    first_block: Option<BlockId>,
    last_block: Option<BlockId>,
    locals: Vec<SymbolId>,
    captures: Vec<CaptureId>,
    local_functions: Vec<SymbolId>,
    catch_type: Option<Arc<str>>,
    guard: Option<GuardKind>,
}

impl PendingRegion {
    fn new(kind: RegionKind, parent: Option<RegionId>) -> Self {
        PendingRegion {
            kind,
            parent,
            nested: Vec::new(),
            first_block: None,
            last_block: None,
            locals: Vec::new(),
            captures: Vec::new(),
            local_functions: Vec::new(),
            catch_type: None,
            guard: None,
        }
    }
}

/// Incremental builder for a [`ControlFlowGraph`].
///
/// This is the surface a host compiler front-end drives: blocks are appended in
/// ordinal order, regions are opened and closed around the blocks they contain, and
/// branches may name blocks that are appended later. [`build`](Self::build) validates
/// the shape, derives the regions each branch leaves and enters (and thus the finally
/// regions it runs), computes the labelled edges and marks unreachable blocks.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use symscope::{
///     analysis::cfg::{BlockKind, BranchSemantics, ControlFlowGraphBuilder},
///     operation::{OperationTree, SymbolTable},
/// };
///
/// let mut builder = ControlFlowGraphBuilder::new();
/// let entry = builder.add_block(BlockKind::Entry);
/// let body = builder.add_block(BlockKind::Block);
/// let exit = builder.add_block(BlockKind::Exit);
/// builder.set_fall_through(entry, Some(body), BranchSemantics::Regular)?;
/// builder.set_fall_through(body, Some(exit), BranchSemantics::Return)?;
///
/// let cfg = builder.build(Arc::new(OperationTree::new()), Arc::new(SymbolTable::new()))?;
/// assert_eq!(cfg.block_count(), 3);
/// assert_eq!(cfg.predecessors(exit).collect::<Vec<_>>(), vec![body]);
/// # Ok::<(), symscope::Error>(())
/// ```
#[derive(Debug)]
pub struct ControlFlowGraphBuilder {
    compilation: CompilationId,
    root: Option<OperationId>,
    blocks: Vec<BasicBlock>,
    regions: Vec<PendingRegion>,
    open: Vec<RegionId>,
    local_functions: Vec<(SymbolId, ControlFlowGraphBuilder)>,
    anonymous_functions: Vec<(OperationId, ControlFlowGraphBuilder)>,
}

impl Default for ControlFlowGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlFlowGraphBuilder {
    /// Creates a builder with only the root region open.
    #[must_use]
    pub fn new() -> Self {
        ControlFlowGraphBuilder {
            compilation: CompilationId::default(),
            root: None,
            blocks: Vec::new(),
            regions: vec![PendingRegion::new(RegionKind::Root, None)],
            open: vec![RegionId::ROOT],
            local_functions: Vec::new(),
            anonymous_functions: Vec::new(),
        }
    }

    /// Sets the compilation the graph belongs to.
    #[must_use]
    pub fn compilation(mut self, compilation: CompilationId) -> Self {
        self.compilation = compilation;
        self
    }

    /// Sets the body operation the graph is built from.
    pub fn set_root(&mut self, root: OperationId) {
        self.root = Some(root);
    }

    /// Appends a block inside the innermost open region.
    pub fn add_block(&mut self, kind: BlockKind) -> BlockId {
        let id = NodeId::new(self.blocks.len());
        let region = self.current_region();
        self.blocks.push(BasicBlock::new(id.index(), kind, region));
        for open in &self.open {
            let pending = &mut self.regions[open.index()];
            pending.first_block.get_or_insert(id);
            pending.last_block = Some(id);
        }
        id
    }

    /// Returns the innermost open region.
    #[must_use]
    pub fn current_region(&self) -> RegionId {
        self.open.last().copied().unwrap_or(RegionId::ROOT)
    }

    /// Opens a region nested in the innermost open region.
    pub fn begin_region(&mut self, kind: RegionKind) -> RegionId {
        let parent = self.current_region();
        let id = RegionId(self.regions.len());
        self.regions.push(PendingRegion::new(kind, Some(parent)));
        self.regions[parent.index()].nested.push(id);
        self.open.push(id);
        id
    }

    /// Closes `region`, which must be the innermost open region and contain a block.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if regions are closed out of order or the
    /// region is empty.
    pub fn end_region(&mut self, region: RegionId) -> Result<()> {
        if region == RegionId::ROOT || self.open.last() != Some(&region) {
            return Err(malformed_error!(
                "region {} closed out of order (open: {:?})",
                region.index(),
                self.open
            ));
        }
        if self.regions[region.index()].first_block.is_none() {
            return Err(malformed_error!("region {} contains no block", region.index()));
        }
        self.open.pop();
        Ok(())
    }

    /// Sets the caught type of a catch region; `None` catches everything.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the region does not exist.
    pub fn set_catch_type(&mut self, region: RegionId, catch_type: Option<Arc<str>>) -> Result<()> {
        self.pending_region(region)?.catch_type = catch_type;
        Ok(())
    }

    /// Records the statement a `TryAndFinally` region implements.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the region does not exist.
    pub fn set_guard(&mut self, region: RegionId, guard: GuardKind) -> Result<()> {
        self.pending_region(region)?.guard = Some(guard);
        Ok(())
    }

    /// Declares a local whose lifetime is the innermost open region.
    pub fn add_local(&mut self, symbol: SymbolId) {
        let region = self.current_region();
        self.regions[region.index()].locals.push(symbol);
    }

    /// Declares a flow capture whose lifetime is the innermost open region.
    pub fn add_capture(&mut self, capture: CaptureId) {
        let region = self.current_region();
        self.regions[region.index()].captures.push(capture);
    }

    /// Declares a local function in the innermost open region, with its own graph.
    pub fn add_local_function(&mut self, symbol: SymbolId, body: ControlFlowGraphBuilder) {
        let region = self.current_region();
        self.regions[region.index()].local_functions.push(symbol);
        self.local_functions.push((symbol, body));
    }

    /// Attaches the graph of the lambda created by `operation`.
    pub fn add_anonymous_function(&mut self, operation: OperationId, body: ControlFlowGraphBuilder) {
        self.anonymous_functions.push((operation, body));
    }

    /// Appends a root operation to `block`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the block does not exist.
    pub fn add_operation(&mut self, block: BlockId, operation: OperationId) -> Result<()> {
        self.pending_block(block)?.operations.push(operation);
        Ok(())
    }

    /// Returns `true` if `block` holds no operation and no branch value yet.
    #[must_use]
    pub fn is_block_empty(&self, block: BlockId) -> bool {
        self.blocks
            .get(block.index())
            .is_some_and(|b| b.operations.is_empty() && b.branch_value.is_none())
    }

    /// Sets the value a block branches on, throws or returns.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the block does not exist.
    pub fn set_branch_value(&mut self, block: BlockId, value: OperationId) -> Result<()> {
        self.pending_block(block)?.branch_value = Some(value);
        Ok(())
    }

    /// Sets the conditional successor of `block`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the block does not exist or
    /// `condition_kind` is [`ConditionKind::None`].
    pub fn set_conditional(
        &mut self,
        block: BlockId,
        destination: BlockId,
        condition_kind: ConditionKind,
    ) -> Result<()> {
        if condition_kind == ConditionKind::None {
            return Err(malformed_error!(
                "conditional branch of block {} needs a condition kind",
                block
            ));
        }
        let pending = self.pending_block(block)?;
        pending.condition_kind = condition_kind;
        pending.conditional = Some(Branch::new(
            block,
            Some(destination),
            BranchSemantics::Regular,
            true,
        ));
        Ok(())
    }

    /// Sets the fall-through successor of `block`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the block does not exist.
    pub fn set_fall_through(
        &mut self,
        block: BlockId,
        destination: Option<BlockId>,
        semantics: BranchSemantics,
    ) -> Result<()> {
        self.pending_block(block)?.fall_through =
            Some(Branch::new(block, destination, semantics, false));
        Ok(())
    }

    /// Returns `true` if `block` already has a fall-through branch.
    #[must_use]
    pub fn has_fall_through(&self, block: BlockId) -> bool {
        self.blocks
            .get(block.index())
            .is_some_and(|b| b.fall_through.is_some())
    }

    /// Validates the graph and produces the immutable [`ControlFlowGraph`].
    ///
    /// Nested graphs of local functions and lambdas are built with the same operation
    /// tree and symbol table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if there is not exactly one entry and one
    /// exit block, a region is still open, a block other than the exit lacks a
    /// fall-through branch, a conditional block lacks its branch value, or a branch
    /// targets a block that does not exist.
    pub fn build(
        self,
        operations: Arc<OperationTree>,
        symbols: Arc<SymbolTable>,
    ) -> Result<ControlFlowGraph> {
        let ControlFlowGraphBuilder {
            compilation,
            root,
            mut blocks,
            regions: pending_regions,
            open,
            local_functions,
            anonymous_functions,
        } = self;

        let entry = unique_block(&blocks, BlockKind::Entry)?;
        let exit = unique_block(&blocks, BlockKind::Exit)?;
        if open.len() > 1 {
            return Err(malformed_error!(
                "regions {:?} were not closed",
                &open[1..].iter().map(|r| r.index()).collect::<Vec<_>>()
            ));
        }

        let regions = pending_regions
            .into_iter()
            .enumerate()
            .map(|(index, pending)| Region {
                id: RegionId(index),
                kind: pending.kind,
                parent: pending.parent,
                nested: pending.nested,
                first_block: pending.first_block.unwrap_or(entry),
                last_block: pending.last_block.unwrap_or(exit),
                locals: pending.locals,
                captures: pending.captures,
                local_functions: pending.local_functions,
                catch_type: pending.catch_type,
                guard: pending.guard,
            })
            .collect::<Vec<_>>();

        let block_count = blocks.len();
        let block_regions: Vec<RegionId> = blocks.iter().map(|b| b.region).collect();
        for block in &mut blocks {
            if block.kind != BlockKind::Exit && block.fall_through.is_none() {
                return Err(malformed_error!("block {} has no fall-through branch", block.ordinal));
            }
            if block.conditional.is_some() && block.branch_value.is_none() {
                return Err(malformed_error!(
                    "conditional block {} has no branch value",
                    block.ordinal
                ));
            }
            let source_chain = region_chain(&regions, block.region);
            for branch in block.conditional.iter_mut().chain(block.fall_through.iter_mut()) {
                let Some(destination) = branch.destination else {
                    continue;
                };
                if destination.index() >= block_count {
                    return Err(malformed_error!(
                        "block {} branches to missing block {}",
                        branch.source,
                        destination
                    ));
                }
                let target_chain = region_chain(&regions, block_regions[destination.index()]);
                branch.leaving_regions = source_chain
                    .iter()
                    .copied()
                    .filter(|r| !target_chain.contains(r))
                    .collect();
                branch.entering_regions = target_chain
                    .iter()
                    .rev()
                    .copied()
                    .filter(|r| !source_chain.contains(r))
                    .collect();
                branch.finally_regions = branch
                    .leaving_regions
                    .iter()
                    .filter_map(|left| finally_of_try(&regions, *left))
                    .collect();
            }
        }

        let edges = derive_edges(&blocks, &regions, exit);
        let mut graph = DirectedGraph::with_capacity(blocks.len(), edges.len());
        for block in blocks {
            graph.add_node(block);
        }
        for (source, target, kind) in edges {
            graph.add_edge(source, target, kind)?;
        }

        let reachable: Vec<BlockId> = bfs(&graph, entry).collect();
        for id in reachable {
            if let Some(block) = graph.node_mut(id) {
                block.is_reachable = true;
            }
        }

        let mut local_function_graphs = HashMap::new();
        for (symbol, body) in local_functions {
            let nested = body
                .compilation(compilation)
                .build(Arc::clone(&operations), Arc::clone(&symbols))?;
            local_function_graphs.insert(symbol, Arc::new(nested));
        }
        let mut anonymous_function_graphs = HashMap::new();
        for (operation, body) in anonymous_functions {
            let nested = body
                .compilation(compilation)
                .build(Arc::clone(&operations), Arc::clone(&symbols))?;
            anonymous_function_graphs.insert(operation, Arc::new(nested));
        }

        Ok(ControlFlowGraph::from_parts(
            graph,
            regions,
            entry,
            exit,
            operations,
            symbols,
            compilation,
            root,
            local_function_graphs,
            anonymous_function_graphs,
        ))
    }

    fn pending_block(&mut self, block: BlockId) -> Result<&mut BasicBlock> {
        let count = self.blocks.len();
        self.blocks
            .get_mut(block.index())
            .ok_or_else(|| malformed_error!("block {} does not exist ({} blocks)", block, count))
    }

    fn pending_region(&mut self, region: RegionId) -> Result<&mut PendingRegion> {
        self.regions
            .get_mut(region.index())
            .ok_or_else(|| malformed_error!("region {} does not exist", region.index()))
    }
}

fn unique_block(blocks: &[BasicBlock], kind: BlockKind) -> Result<BlockId> {
    let mut found = blocks.iter().filter(|block| block.kind == kind);
    match (found.next(), found.next()) {
        (Some(block), None) => Ok(NodeId::new(block.ordinal)),
        (None, _) => Err(malformed_error!(
            "graph has no {} block",
            kind.as_ref().to_lowercase()
        )),
        (Some(_), Some(_)) => Err(malformed_error!("graph has more than one {} block", kind)),
    }
}

fn derive_edges(
    blocks: &[BasicBlock],
    regions: &[Region],
    exit: BlockId,
) -> Vec<(BlockId, BlockId, CfgEdgeKind)> {
    let contains = |region: RegionId, block: &BasicBlock| {
        region_chain(regions, block.region).contains(&region)
    };
    let finally_exits = |region: RegionId| -> Vec<BlockId> {
        blocks
            .iter()
            .filter(|block| {
                contains(region, block)
                    && block.fall_through.as_ref().is_some_and(|branch| {
                        branch.semantics == BranchSemantics::StructuredExceptionHandling
                    })
            })
            .map(|block| NodeId::new(block.ordinal))
            .collect()
    };

    let mut edges = Vec::new();
    for block in blocks {
        let source = NodeId::new(block.ordinal);
        let (conditional_kind, fall_through_kind) = match block.condition_kind {
            ConditionKind::None => (CfgEdgeKind::Regular, CfgEdgeKind::Regular),
            ConditionKind::WhenTrue => (CfgEdgeKind::ConditionalTrue, CfgEdgeKind::ConditionalFalse),
            ConditionKind::WhenFalse => (CfgEdgeKind::ConditionalFalse, CfgEdgeKind::ConditionalTrue),
        };
        let labelled = block
            .conditional
            .iter()
            .map(|branch| (branch, conditional_kind))
            .chain(block.fall_through.iter().map(|branch| (branch, fall_through_kind)));

        for (branch, kind) in labelled {
            if branch.semantics.is_exceptional() {
                for target in exception_entries(regions, block.region, exit) {
                    edges.push((source, target, CfgEdgeKind::Error));
                }
                continue;
            }
            let Some(destination) = branch.destination else {
                continue;
            };
            if branch.finally_regions.is_empty() {
                edges.push((source, destination, kind));
                continue;
            }
            let mut previous: Vec<BlockId> = vec![source];
            let mut edge_kind = CfgEdgeKind::FinallyEntry;
            for finally in &branch.finally_regions {
                let first = regions[finally.index()].first_block;
                for from in &previous {
                    edges.push((*from, first, edge_kind));
                }
                previous = finally_exits(*finally);
                edge_kind = CfgEdgeKind::EndFinally;
            }
            for from in previous {
                edges.push((from, destination, CfgEdgeKind::EndFinally));
            }
        }

        // Any operation inside a protected region may throw.
        let protected = regions
            .iter()
            .any(|region| region.kind == RegionKind::Try && contains(region.id, block));
        if protected && !block.operations.is_empty() {
            for target in exception_entries(regions, block.region, exit) {
                if target != exit {
                    edges.push((source, target, CfgEdgeKind::Error));
                }
            }
        }
    }
    edges
}

fn exception_entries(regions: &[Region], from: RegionId, exit: BlockId) -> Vec<BlockId> {
    exception_targets(regions, from)
        .into_iter()
        .map(|target| match target {
            ExceptionTarget::Catch(region) | ExceptionTarget::Finally(region) => {
                regions[region.index()].first_block
            }
            ExceptionTarget::Exit => exit,
        })
        .collect()
}
