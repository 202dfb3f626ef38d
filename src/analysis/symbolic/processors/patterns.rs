//! Conversions and type tests.

use crate::{
    analysis::symbolic::{
        processors::value_of, Constraint, ObjectConstraint, ProgramState, SymbolicContext,
    },
    operation::{OperationId, TypeKind},
};

pub(super) fn conversion(
    context: &SymbolicContext<'_>,
    operation: OperationId,
    operand: OperationId,
) -> ProgramState {
    context
        .state()
        .set_operation_value(operation, value_of(context, operand))
}

pub(super) fn is_null(
    context: &SymbolicContext<'_>,
    operation: OperationId,
    operand: OperationId,
) -> ProgramState {
    let result = match value_of(context, operand).object() {
        Some(ObjectConstraint::Null) => Some(true),
        Some(ObjectConstraint::NotNull) => Some(false),
        None => operand_type(context, operand)
            .filter(|ty| !ty.can_be_null())
            .map(|_| false),
    };
    match result {
        Some(value) => context
            .state()
            .set_operation_constraint(operation, Constraint::from_bool(value)),
        None => context.state().clone(),
    }
}

pub(super) fn is_type(
    context: &SymbolicContext<'_>,
    operation: OperationId,
    operand: OperationId,
    matches_any_non_null: bool,
) -> ProgramState {
    let result = match value_of(context, operand).object() {
        Some(ObjectConstraint::Null) => Some(false),
        Some(ObjectConstraint::NotNull) if matches_any_non_null => Some(true),
        _ => None,
    };
    match result {
        Some(value) => context
            .state()
            .set_operation_constraint(operation, Constraint::from_bool(value)),
        None => context.state().clone(),
    }
}

fn operand_type(context: &SymbolicContext<'_>, operand: OperationId) -> Option<TypeKind> {
    context.cfg().operation(operand).map(|operation| operation.ty)
}
