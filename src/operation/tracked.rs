//! Tracked symbol resolution.

use crate::operation::{OperationId, OperationKind, OperationTree, SymbolId, SymbolTable};

/// Returns the symbol whose value the engine follows for `operation`, if any.
///
/// Locals and parameters are always tracked. Fields and properties are tracked only
/// when they are reached through an explicit `this` receiver (`this.field`) or are
/// static. An instance member with no receiver operation is not tracked, and neither
/// are members of any other receiver, since two receivers would share one value.
///
/// Flow capture references are not resolved here; callers resolve them through the
/// [`ProgramState`](crate::analysis::symbolic::ProgramState) first.
///
/// # Examples
///
/// ```rust
/// use symscope::operation::{
///     tracked_symbol, OperationKind, OperationTree, Symbol, SymbolKind, SymbolTable, TypeKind,
/// };
///
/// let mut symbols = SymbolTable::new();
/// let field = symbols.add(Symbol::new("_value", SymbolKind::Field, TypeKind::Reference));
///
/// let mut tree = OperationTree::new();
/// let this = tree.add(OperationKind::InstanceReference, TypeKind::Reference, None)?;
/// let access = tree.add(
///     OperationKind::FieldReference { field, instance: Some(this) },
///     TypeKind::Reference,
///     None,
/// )?;
///
/// assert_eq!(tracked_symbol(&tree, &symbols, access), Some(field));
/// # Ok::<(), symscope::Error>(())
/// ```
#[must_use]
pub fn tracked_symbol(
    tree: &OperationTree,
    symbols: &SymbolTable,
    operation: OperationId,
) -> Option<SymbolId> {
    match tree.kind(operation)? {
        OperationKind::LocalReference(symbol) | OperationKind::ParameterReference(symbol) => {
            Some(*symbol)
        }
        OperationKind::FieldReference {
            field: member,
            instance,
        }
        | OperationKind::PropertyReference {
            property: member,
            instance,
        } => match instance {
            None => symbols
                .get(*member)
                .filter(|symbol| symbol.is_static())
                .map(|_| *member),
            Some(receiver) => {
                matches!(tree.kind(*receiver), Some(OperationKind::InstanceReference))
                    .then_some(*member)
            }
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{Symbol, SymbolFlags, SymbolKind, TypeKind};

    #[test]
    fn test_member_on_foreign_receiver_is_not_tracked() {
        let mut symbols = SymbolTable::new();
        let other = symbols.add(Symbol::new("other", SymbolKind::Parameter, TypeKind::Reference));
        let property = symbols.add(Symbol::new("Name", SymbolKind::Property, TypeKind::Reference));
        let counter = symbols.add(
            Symbol::new("Counter", SymbolKind::Field, TypeKind::Value)
                .with_flags(SymbolFlags::STATIC),
        );
        let instance_field = symbols.add(Symbol::new("_x", SymbolKind::Field, TypeKind::Value));

        let mut tree = OperationTree::new();
        let receiver = tree
            .add(OperationKind::ParameterReference(other), TypeKind::Reference, None)
            .unwrap();
        let foreign = tree
            .add(
                OperationKind::PropertyReference {
                    property,
                    instance: Some(receiver),
                },
                TypeKind::Reference,
                None,
            )
            .unwrap();
        let static_access = tree
            .add(
                OperationKind::FieldReference {
                    field: counter,
                    instance: None,
                },
                TypeKind::Value,
                None,
            )
            .unwrap();
        let unqualified_instance = tree
            .add(
                OperationKind::FieldReference {
                    field: instance_field,
                    instance: None,
                },
                TypeKind::Value,
                None,
            )
            .unwrap();

        assert_eq!(tracked_symbol(&tree, &symbols, receiver), Some(other));
        assert_eq!(tracked_symbol(&tree, &symbols, foreign), None);
        assert_eq!(tracked_symbol(&tree, &symbols, static_access), Some(counter));
        assert_eq!(tracked_symbol(&tree, &symbols, unqualified_instance), None);
    }
}
