//! Invocations and their arguments.

use crate::{
    analysis::symbolic::{
        processors::{constrain_symbol, references::dereference, value_of},
        Constraint, ProgramState, SymbolicContext,
    },
    operation::{ArgumentFlags, OperationId, OperationKind, SymbolId, WellKnownMethod},
};

pub(super) fn invocation(
    context: &SymbolicContext<'_>,
    method: SymbolId,
    instance: Option<OperationId>,
    arguments: &[OperationId],
) -> ProgramState {
    let mut state = context.state().clone();
    if let Some(receiver) = instance {
        state = dereference(context, state, receiver);
    }

    let symbols = context.cfg().symbols();
    let well_known = symbols.get(method).and_then(|symbol| symbol.well_known);
    let (subject, constraint) = match well_known {
        Some(WellKnownMethod::MonitorEnter) => (first_argument(context, arguments), Constraint::LOCK_HELD),
        Some(WellKnownMethod::MonitorExit) => {
            (first_argument(context, arguments), Constraint::LOCK_RELEASED)
        }
        Some(WellKnownMethod::Dispose) => (instance, Constraint::DISPOSED),
        None => return state,
    };
    match subject.and_then(|subject| context.tracked_symbol(subject)) {
        Some(symbol) => constrain_symbol(&state, symbols, symbol, constraint),
        None => state,
    }
}

/// Returns the value passed as the first argument.
fn first_argument(context: &SymbolicContext<'_>, arguments: &[OperationId]) -> Option<OperationId> {
    let argument = *arguments.first()?;
    match context.cfg().operations().kind(argument)? {
        OperationKind::Argument { value, .. } => Some(*value),
        _ => Some(argument),
    }
}

/// Arguments pass their value through. A `ref` or `out` argument lets the callee
/// overwrite the variable, so its value is forgotten.
pub(super) fn argument(
    context: &SymbolicContext<'_>,
    operation: OperationId,
    value: OperationId,
    flags: ArgumentFlags,
) -> ProgramState {
    let mut state = context
        .state()
        .set_operation_value(operation, value_of(context, value));
    if let Some(symbol) = context.tracked_symbol(value) {
        if flags.intersects(ArgumentFlags::REF | ArgumentFlags::OUT) {
            state = state.remove_symbol_value(symbol);
        }
        if flags.contains(ArgumentFlags::NOT_NULL) {
            state = constrain_symbol(&state, context.cfg().symbols(), symbol, Constraint::NOT_NULL);
        }
    }
    state
}
