//! Literals, symbol reads, assignments and flow captures.

use crate::{
    analysis::symbolic::{
        processors::{constrain_symbol, store_symbol, value_of},
        Constraint, NumberConstraint, ProgramState, SymbolicContext, SymbolicValue,
    },
    operation::{CaptureId, LiteralValue, OperationId, OperationKind},
};

pub(super) fn literal(
    context: &SymbolicContext<'_>,
    operation: OperationId,
    literal: &LiteralValue,
) -> ProgramState {
    let constraint = match literal {
        LiteralValue::Null => Constraint::NULL,
        LiteralValue::Bool(value) => Constraint::from_bool(*value),
        LiteralValue::Integer(value) => Constraint::Number(NumberConstraint::single(*value)),
        LiteralValue::String(_) => Constraint::NOT_NULL,
    };
    context.state().set_operation_constraint(operation, constraint)
}

/// Reads of locals, parameters and members. Tracked symbols hand their value to the
/// reference; member access through another receiver proves that receiver non-null.
pub(super) fn member_reference(context: &SymbolicContext<'_>, operation: OperationId) -> ProgramState {
    let mut state = context.state().clone();
    let receiver = match context.operation_kind() {
        Some(
            OperationKind::FieldReference { instance, .. }
            | OperationKind::PropertyReference { instance, .. }
            | OperationKind::EventReference { instance, .. },
        ) => *instance,
        _ => None,
    };
    if let Some(receiver) = receiver {
        state = dereference(context, state, receiver);
    }
    match context.tracked_symbol(operation) {
        Some(symbol) => {
            let value = state.symbol_value(symbol).cloned().unwrap_or_default();
            state.set_operation_value(operation, value)
        }
        None => state,
    }
}

/// Marks a dereferenced receiver non-null.
pub(super) fn dereference(
    context: &SymbolicContext<'_>,
    state: ProgramState,
    receiver: OperationId,
) -> ProgramState {
    match context.tracked_symbol(receiver) {
        Some(symbol) => constrain_symbol(&state, context.cfg().symbols(), symbol, Constraint::NOT_NULL),
        None => state,
    }
}

pub(super) fn assignment(
    context: &SymbolicContext<'_>,
    operation: OperationId,
    target: OperationId,
    value: OperationId,
) -> ProgramState {
    let assigned = value_of(context, value);
    let state = match context.tracked_symbol(target) {
        Some(symbol) => store_symbol(context.state(), context.cfg().symbols(), symbol, assigned.clone()),
        None => context.state().clone(),
    };
    state
        .set_operation_value(target, assigned.clone())
        .set_operation_value(operation, assigned)
}

pub(super) fn flow_capture(
    context: &SymbolicContext<'_>,
    operation: OperationId,
    capture: CaptureId,
    value: OperationId,
) -> ProgramState {
    let tree = context.cfg().operations();
    let captured = context.state().resolve_capture(tree, value);
    let captured_value = value_of(context, value);
    context
        .state()
        .set_capture(capture, captured)
        .set_operation_value(captured, captured_value.clone())
        .set_operation_value(operation, captured_value)
}

pub(super) fn flow_capture_reference(
    context: &SymbolicContext<'_>,
    operation: OperationId,
) -> ProgramState {
    let value: SymbolicValue = match context.tracked_symbol(operation) {
        Some(symbol) => context
            .state()
            .symbol_value(symbol)
            .cloned()
            .unwrap_or_default(),
        None => value_of(context, operation),
    };
    context.state().set_operation_value(operation, value)
}
