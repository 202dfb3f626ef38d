//! Immutable program states.

use std::{
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::{
    analysis::{
        cfg::BlockId,
        symbolic::{Constraint, SymbolicValue},
    },
    operation::{CaptureId, OperationId, OperationKind, OperationTree, SymbolId},
};

/// Everything the engine knows at one point of one path.
///
/// A state maps operations and tracked symbols to [`SymbolicValue`]s, remembers which
/// operation each flow capture holds, and counts how often each block was entered on
/// the path. All maps live behind an [`Arc`] and are copied on write, so forking a
/// state at a branch is a pointer copy.
///
/// Equality and hashing ignore the visit counts: two states that differ only in how
/// often a loop body ran are the same state, which is what lets the engine stop
/// exploring a loop once it stops producing anything new. An absent key means the
/// value is unknown; empty values are never stored.
///
/// # Examples
///
/// ```rust
/// use symscope::{
///     analysis::symbolic::{Constraint, ProgramState},
///     operation::SymbolId,
/// };
///
/// let symbol = SymbolId::new(0);
/// let state = ProgramState::empty().set_symbol_constraint(symbol, Constraint::NULL);
///
/// assert!(state.symbol_value(symbol).is_some_and(|v| v.has_constraint(Constraint::NULL)));
/// assert!(ProgramState::empty().symbol_value(symbol).is_none());
/// assert_ne!(state, ProgramState::empty());
/// ```
#[derive(Clone, Default)]
pub struct ProgramState {
    operations: Arc<BTreeMap<OperationId, SymbolicValue>>,
    symbols: Arc<BTreeMap<SymbolId, SymbolicValue>>,
    captures: Arc<BTreeMap<CaptureId, OperationId>>,
    visits: Arc<BTreeMap<BlockId, u32>>,
}

/// Returns `map` with `key` set to `value` (or removed for `None`), sharing the map
/// when nothing changes.
fn updated<K, V>(map: &Arc<BTreeMap<K, V>>, key: K, value: Option<V>) -> Arc<BTreeMap<K, V>>
where
    K: Ord + Clone,
    V: Clone + PartialEq,
{
    if map.get(&key) == value.as_ref() {
        return Arc::clone(map);
    }
    let mut copy = (**map).clone();
    match value {
        Some(value) => copy.insert(key, value),
        None => copy.remove(&key),
    };
    Arc::new(copy)
}

impl ProgramState {
    /// The state the walk starts from: nothing is known.
    #[must_use]
    pub fn empty() -> Self {
        ProgramState::default()
    }

    /// Returns the value of `operation` itself, without capture resolution.
    #[must_use]
    pub fn operation_value(&self, operation: OperationId) -> Option<&SymbolicValue> {
        self.operations.get(&operation)
    }

    /// Returns the value of `operation` after resolving flow capture references.
    #[must_use]
    pub fn value(&self, tree: &OperationTree, operation: OperationId) -> Option<&SymbolicValue> {
        self.operation_value(self.resolve_capture(tree, operation))
    }

    /// Returns a state where `operation` has `value`. An empty value forgets it.
    #[must_use]
    pub fn set_operation_value(&self, operation: OperationId, value: SymbolicValue) -> Self {
        let value = (!value.is_empty()).then_some(value);
        ProgramState {
            operations: updated(&self.operations, operation, value),
            ..self.clone()
        }
    }

    /// Returns a state where the value of `operation` is unknown.
    #[must_use]
    pub fn remove_operation_value(&self, operation: OperationId) -> Self {
        ProgramState {
            operations: updated(&self.operations, operation, None),
            ..self.clone()
        }
    }

    /// Returns a state where the value of `operation` additionally holds `constraint`.
    #[must_use]
    pub fn set_operation_constraint(&self, operation: OperationId, constraint: Constraint) -> Self {
        let value = self
            .operation_value(operation)
            .cloned()
            .unwrap_or_default()
            .with_constraint(constraint);
        self.set_operation_value(operation, value)
    }

    /// Returns the value of a tracked symbol.
    #[must_use]
    pub fn symbol_value(&self, symbol: SymbolId) -> Option<&SymbolicValue> {
        self.symbols.get(&symbol)
    }

    /// Returns a state where `symbol` has `value`. An empty value forgets it.
    #[must_use]
    pub fn set_symbol_value(&self, symbol: SymbolId, value: SymbolicValue) -> Self {
        let value = (!value.is_empty()).then_some(value);
        ProgramState {
            symbols: updated(&self.symbols, symbol, value),
            ..self.clone()
        }
    }

    /// Returns a state where the value of `symbol` is unknown.
    #[must_use]
    pub fn remove_symbol_value(&self, symbol: SymbolId) -> Self {
        ProgramState {
            symbols: updated(&self.symbols, symbol, None),
            ..self.clone()
        }
    }

    /// Returns a state where the value of `symbol` additionally holds `constraint`.
    #[must_use]
    pub fn set_symbol_constraint(&self, symbol: SymbolId, constraint: Constraint) -> Self {
        let value = self
            .symbol_value(symbol)
            .cloned()
            .unwrap_or_default()
            .with_constraint(constraint);
        self.set_symbol_value(symbol, value)
    }

    /// Returns a state where every symbol of `symbols` is unknown.
    #[must_use]
    pub fn forget_symbols<I>(&self, symbols: I) -> Self
    where
        I: IntoIterator<Item = SymbolId>,
    {
        symbols
            .into_iter()
            .fold(self.clone(), |state, symbol| state.remove_symbol_value(symbol))
    }

    /// Returns the operation a flow capture holds.
    #[must_use]
    pub fn capture(&self, capture: CaptureId) -> Option<OperationId> {
        self.captures.get(&capture).copied()
    }

    /// Returns a state where `capture` holds `operation`.
    #[must_use]
    pub fn set_capture(&self, capture: CaptureId, operation: OperationId) -> Self {
        ProgramState {
            captures: updated(&self.captures, capture, Some(operation)),
            ..self.clone()
        }
    }

    /// Returns a state where every capture of `captures` is released.
    #[must_use]
    pub fn forget_captures<I>(&self, captures: I) -> Self
    where
        I: IntoIterator<Item = CaptureId>,
    {
        captures.into_iter().fold(self.clone(), |state, capture| ProgramState {
            captures: updated(&state.captures, capture, None),
            ..state
        })
    }

    /// Follows a flow capture reference to the operation the capture holds.
    ///
    /// Any other operation, and a reference to a capture this path never stored,
    /// resolves to itself.
    #[must_use]
    pub fn resolve_capture(&self, tree: &OperationTree, operation: OperationId) -> OperationId {
        match tree.kind(operation) {
            Some(OperationKind::FlowCaptureReference { capture }) => {
                self.capture(*capture).unwrap_or(operation)
            }
            _ => operation,
        }
    }

    /// Returns a state with every operation value dropped except those of operations
    /// held by a flow capture.
    ///
    /// Operation values only matter within the block that computed them; captured
    /// operations are read again from later blocks.
    #[must_use]
    pub fn reset_operations(&self) -> Self {
        let kept: BTreeMap<OperationId, SymbolicValue> = self
            .captures
            .values()
            .filter_map(|operation| {
                self.operations
                    .get(operation)
                    .map(|value| (*operation, value.clone()))
            })
            .collect();
        if kept.len() == self.operations.len() {
            return self.clone();
        }
        ProgramState {
            operations: Arc::new(kept),
            ..self.clone()
        }
    }

    /// Returns how often `block` was entered on this path.
    #[must_use]
    pub fn visit_count(&self, block: BlockId) -> u32 {
        self.visits.get(&block).copied().unwrap_or(0)
    }

    /// Returns a state with one more visit of `block`.
    #[must_use]
    pub fn add_visit(&self, block: BlockId) -> Self {
        let count = self.visit_count(block).saturating_add(1);
        ProgramState {
            visits: updated(&self.visits, block, Some(count)),
            ..self.clone()
        }
    }

    /// Iterates over the known operation values.
    pub fn operations(&self) -> impl Iterator<Item = (OperationId, &SymbolicValue)> + '_ {
        self.operations.iter().map(|(id, value)| (*id, value))
    }

    /// Iterates over the known symbol values.
    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &SymbolicValue)> + '_ {
        self.symbols.iter().map(|(id, value)| (*id, value))
    }

    /// Iterates over the live flow captures.
    pub fn captures(&self) -> impl Iterator<Item = (CaptureId, OperationId)> + '_ {
        self.captures.iter().map(|(capture, op)| (*capture, *op))
    }

    /// Returns `true` if nothing is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.symbols.is_empty() && self.captures.is_empty()
    }
}

impl PartialEq for ProgramState {
    fn eq(&self, other: &Self) -> bool {
        self.operations == other.operations
            && self.symbols == other.symbols
            && self.captures == other.captures
    }
}

impl Eq for ProgramState {}

impl Hash for ProgramState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.operations.hash(state);
        self.symbols.hash(state);
        self.captures.hash(state);
    }
}

impl fmt::Display for ProgramState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("Empty");
        }
        if !self.symbols.is_empty() {
            writeln!(f, "Symbols:")?;
            for (symbol, value) in self.symbols() {
                writeln!(f, "{symbol:?}: {value}")?;
            }
        }
        if !self.operations.is_empty() {
            writeln!(f, "Operations:")?;
            for (operation, value) in self.operations() {
                writeln!(f, "{operation}: {value}")?;
            }
        }
        if !self.captures.is_empty() {
            writeln!(f, "Captures:")?;
            for (capture, operation) in self.captures() {
                writeln!(f, "{capture}: {operation}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ProgramState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramState")
            .field("operations", &self.operations)
            .field("symbols", &self.symbols)
            .field("captures", &self.captures)
            .field("visits", &self.visits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::{
        operation::{LiteralValue, TypeKind},
        utils::graph::NodeId,
    };

    #[test]
    fn test_visits_do_not_affect_identity() {
        let block = NodeId::new(1);
        let state = ProgramState::empty().set_symbol_constraint(SymbolId::new(0), Constraint::TRUE);
        let visited = state.add_visit(block).add_visit(block);

        assert_eq!(visited.visit_count(block), 2);
        assert_eq!(state.visit_count(block), 0);
        assert_eq!(visited, state);

        let mut set = HashSet::new();
        set.insert(state);
        assert!(!set.insert(visited));
    }

    #[test]
    fn test_empty_values_are_not_stored() {
        let op = OperationId::new(0);
        let state = ProgramState::empty().set_operation_value(op, SymbolicValue::empty());
        assert_eq!(state, ProgramState::empty());
        assert!(state.operation_value(op).is_none());
    }

    #[test]
    fn test_unchanged_update_shares_maps() {
        let symbol = SymbolId::new(1);
        let state = ProgramState::empty().set_symbol_constraint(symbol, Constraint::NULL);
        let again = state.set_symbol_constraint(symbol, Constraint::NULL);
        assert!(Arc::ptr_eq(&state.symbols, &again.symbols));

        let removed = state.remove_symbol_value(symbol);
        assert!(!Arc::ptr_eq(&state.symbols, &removed.symbols));
        assert!(Arc::ptr_eq(&removed.symbols, &removed.remove_symbol_value(symbol).symbols));
    }

    #[test]
    fn test_set_constraint_keeps_other_domains() {
        let symbol = SymbolId::new(3);
        let state = ProgramState::empty()
            .set_symbol_constraint(symbol, Constraint::NOT_NULL)
            .set_symbol_constraint(symbol, Constraint::TRUE);
        let value = state.symbol_value(symbol).unwrap();
        assert!(value.has_constraint(Constraint::NOT_NULL));
        assert!(value.has_constraint(Constraint::TRUE));

        let forgotten = state.forget_symbols([symbol]);
        assert!(forgotten.symbol_value(symbol).is_none());
        assert!(state.symbol_value(symbol).is_some());
    }

    #[test]
    fn test_reset_keeps_captured_operations() {
        let mut tree = OperationTree::new();
        let literal = tree
            .add(OperationKind::Literal(LiteralValue::Bool(true)), TypeKind::Value, None)
            .unwrap();
        let other = tree
            .add(OperationKind::Literal(LiteralValue::Null), TypeKind::Reference, None)
            .unwrap();
        let reference = tree
            .add(
                OperationKind::FlowCaptureReference {
                    capture: CaptureId(0),
                },
                TypeKind::Value,
                None,
            )
            .unwrap();

        let state = ProgramState::empty()
            .set_operation_constraint(literal, Constraint::TRUE)
            .set_operation_constraint(other, Constraint::NULL)
            .set_capture(CaptureId(0), literal)
            .reset_operations();

        assert!(state.operation_value(other).is_none());
        assert_eq!(state.resolve_capture(&tree, reference), literal);
        assert!(state
            .value(&tree, reference)
            .is_some_and(|v| v.has_constraint(Constraint::TRUE)));

        let released = state.forget_captures([CaptureId(0)]);
        assert_eq!(released.resolve_capture(&tree, reference), reference);
    }

    #[test]
    fn test_display() {
        assert_eq!(ProgramState::empty().to_string(), "Empty");
        let state = ProgramState::empty().set_operation_constraint(OperationId::new(4), Constraint::NULL);
        assert_eq!(state.to_string(), "Operations:\n#4: Null\n");
    }
}
