//! Object, array and delegate creation.

use crate::{
    analysis::symbolic::{Constraint, ProgramState, SymbolicContext},
    operation::{LiteralValue, OperationId, OperationKind},
};

pub(super) fn object_creation(
    context: &SymbolicContext<'_>,
    operation: OperationId,
    arguments: &[OperationId],
    initializer: &[OperationId],
    is_collection: bool,
) -> ProgramState {
    let state = context
        .state()
        .set_operation_constraint(operation, Constraint::NOT_NULL);
    if !is_collection {
        return state;
    }
    if !initializer.is_empty() {
        state.set_operation_constraint(operation, Constraint::NOT_EMPTY)
    } else if arguments.is_empty() || arguments.iter().all(|a| is_numeric_argument(context, *a)) {
        // `new List<T>()` and `new List<T>(capacity)` start out empty.
        state.set_operation_constraint(operation, Constraint::EMPTY)
    } else {
        state
    }
}

pub(super) fn array_creation(
    context: &SymbolicContext<'_>,
    operation: OperationId,
    dimensions: &[OperationId],
    initializer: &[OperationId],
) -> ProgramState {
    let state = context
        .state()
        .set_operation_constraint(operation, Constraint::NOT_NULL);
    let zero_sized = dimensions.iter().any(|dimension| {
        context
            .value_of(*dimension)
            .and_then(|value| value.number())
            .and_then(|number| number.single_value())
            == Some(0)
    });
    if !initializer.is_empty() {
        state.set_operation_constraint(operation, Constraint::NOT_EMPTY)
    } else if zero_sized {
        state.set_operation_constraint(operation, Constraint::EMPTY)
    } else {
        state
    }
}

fn is_numeric_argument(context: &SymbolicContext<'_>, argument: OperationId) -> bool {
    let tree = context.cfg().operations();
    let value = match tree.kind(argument) {
        Some(OperationKind::Argument { value, .. }) => *value,
        _ => argument,
    };
    matches!(
        tree.kind(value),
        Some(OperationKind::Literal(LiteralValue::Integer(_)))
    ) || context
        .value_of(value)
        .is_some_and(|value| value.number().is_some())
}
