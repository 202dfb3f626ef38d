//! Regions of the control flow graph.

use std::sync::Arc;

use strum::{AsRefStr, Display, EnumIter};

use crate::{
    analysis::cfg::BlockId,
    operation::{CaptureId, SymbolId},
};

/// Identity of a region within one graph. The root region is always `RegionId(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(pub(crate) usize);

impl RegionId {
    /// The region enclosing the whole body.
    pub const ROOT: RegionId = RegionId(0);

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// The kind of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
pub enum RegionKind {
    /// The whole body.
    Root,
    /// Scope of locals or flow captures.
    LocalLifetime,
    /// Protected part of a `try` statement.
    Try,
    /// Exception filter (`when` clause).
    Filter,
    /// Catch handler.
    Catch,
    /// A filter together with its handler.
    FilterAndHandler,
    /// A try region followed by its catch handlers.
    TryAndCatch,
    /// Finally handler.
    Finally,
    /// A try region followed by its finally handler.
    TryAndFinally,
}

/// The statement a `TryAndFinally` region was lowered from, when it is not a plain
/// `try` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
pub enum GuardKind {
    /// `lock (target) { }`
    Lock,
    /// `using (resource) { }`
    Using,
}

/// A nested range of blocks with shared exception-handling or lifetime semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Identity of the region.
    pub id: RegionId,
    /// Kind of the region.
    pub kind: RegionKind,
    /// Enclosing region, `None` for the root.
    pub parent: Option<RegionId>,
    /// Directly nested regions in order.
    pub nested: Vec<RegionId>,
    /// First block inside the region.
    pub first_block: BlockId,
    /// Last block inside the region.
    pub last_block: BlockId,
    /// Locals whose lifetime is this region.
    pub locals: Vec<SymbolId>,
    /// Flow captures whose lifetime is this region.
    pub captures: Vec<CaptureId>,
    /// Local functions declared in this region.
    pub local_functions: Vec<SymbolId>,
    /// For catch regions, the caught type; `None` catches everything.
    pub catch_type: Option<Arc<str>>,
    /// The statement a `TryAndFinally` region implements.
    pub guard: Option<GuardKind>,
}

impl Region {
    /// Returns `true` for catch handlers that catch any exception.
    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        self.kind == RegionKind::Catch && self.catch_type.is_none()
    }
}

/// Where an exception raised inside a region goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionTarget {
    /// A catch (or filter-and-handler) region of an enclosing `try`.
    Catch(RegionId),
    /// The finally region of an enclosing `try`; the exception keeps propagating
    /// once the region completes.
    Finally(RegionId),
    /// No handler: the exception leaves the body.
    Exit,
}

/// Returns `region` followed by its ancestors.
pub(crate) fn region_chain(regions: &[Region], region: RegionId) -> Vec<RegionId> {
    let mut chain = Vec::new();
    let mut current = Some(region);
    while let Some(id) = current {
        chain.push(id);
        current = regions.get(id.index()).and_then(|r| r.parent);
    }
    chain
}

/// Returns the finally region guarding `region` when it is the try part of a
/// try/finally.
pub(crate) fn finally_of_try(regions: &[Region], region: RegionId) -> Option<RegionId> {
    let try_region = regions.get(region.index())?;
    if try_region.kind != RegionKind::Try {
        return None;
    }
    let parent = regions.get(try_region.parent?.index())?;
    if parent.kind != RegionKind::TryAndFinally {
        return None;
    }
    parent
        .nested
        .iter()
        .copied()
        .find(|nested| regions.get(nested.index()).is_some_and(|r| r.kind == RegionKind::Finally))
}

/// Searches outward from `from` for the handlers of an exception raised there.
///
/// All catch handlers of the innermost enclosing `try` are candidates since the
/// exception type is unknown; the search stops at a catch-all handler or the first
/// finally region. Without a stopping handler the exception reaches
/// [`ExceptionTarget::Exit`].
pub(crate) fn exception_targets(regions: &[Region], from: RegionId) -> Vec<ExceptionTarget> {
    let mut targets = Vec::new();
    for id in region_chain(regions, from) {
        let Some(region) = regions.get(id.index()) else {
            break;
        };
        if region.kind != RegionKind::Try {
            continue;
        }
        let Some(parent) = region.parent.and_then(|p| regions.get(p.index())) else {
            continue;
        };
        match parent.kind {
            RegionKind::TryAndCatch => {
                let mut catch_all = false;
                for handler in parent.nested.iter().filter_map(|h| regions.get(h.index())) {
                    if matches!(handler.kind, RegionKind::Catch | RegionKind::FilterAndHandler) {
                        catch_all |= handler.is_catch_all();
                        targets.push(ExceptionTarget::Catch(handler.id));
                    }
                }
                if catch_all {
                    return targets;
                }
            }
            RegionKind::TryAndFinally => {
                if let Some(finally) = finally_of_try(regions, id) {
                    targets.push(ExceptionTarget::Finally(finally));
                    return targets;
                }
            }
            _ => {}
        }
    }
    targets.push(ExceptionTarget::Exit);
    targets
}
