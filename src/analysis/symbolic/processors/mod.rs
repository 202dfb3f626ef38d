//! Built-in operation semantics.
//!
//! [`process`] applies the effect of one operation to the program state: what value the
//! operation produces and what it teaches about the symbols it touches. The semantics
//! are split by operation family:
//!
//! - `references` - literals, symbol reads, assignments, flow captures, dereferences
//! - `arithmetic` - binary and unary operators, compound assignment, increments
//! - `patterns` - conversions, `is null` and `is Type` tests
//! - `invocation` - calls, arguments and well-known methods
//! - `creation` - object, array and delegate creation
//!
//! Operations without built-in semantics leave the state unchanged.

mod arithmetic;
mod creation;
mod invocation;
mod patterns;
mod references;

use crate::{
    analysis::symbolic::{
        Constraint, ConstraintDomain, ExecutionConfig, ProgramState, SymbolicContext, SymbolicValue,
    },
    operation::{OperationId, OperationKind, SymbolId, SymbolTable},
};

/// Applies the built-in semantics of the context's operation.
pub(crate) fn process(context: &SymbolicContext<'_>, config: &ExecutionConfig) -> ProgramState {
    let Some(operation) = context.operation() else {
        return context.state().clone();
    };
    let Some(kind) = context.operation_kind() else {
        return context.state().clone();
    };

    match kind {
        OperationKind::Literal(literal) => references::literal(context, operation, literal),
        OperationKind::LocalReference(_)
        | OperationKind::ParameterReference(_)
        | OperationKind::FieldReference { .. }
        | OperationKind::PropertyReference { .. }
        | OperationKind::EventReference { .. } => references::member_reference(context, operation),
        OperationKind::InstanceReference | OperationKind::CaughtException => context
            .state()
            .set_operation_constraint(operation, Constraint::NOT_NULL),
        OperationKind::ArrayElementReference { array, .. } => {
            references::dereference(context, context.state().clone(), *array)
        }
        OperationKind::SimpleAssignment { target, value } => {
            references::assignment(context, operation, *target, *value)
        }
        OperationKind::FlowCapture { capture, value } => {
            references::flow_capture(context, operation, *capture, *value)
        }
        OperationKind::FlowCaptureReference { .. } => {
            references::flow_capture_reference(context, operation)
        }
        OperationKind::CompoundAssignment {
            operator,
            target,
            value,
        } => arithmetic::compound_assignment(context, operation, *operator, *target, *value),
        OperationKind::Increment {
            target,
            is_decrement,
            is_postfix,
        } => arithmetic::increment(context, operation, *target, *is_decrement, *is_postfix),
        OperationKind::Binary {
            operator,
            left,
            right,
            user_defined: false,
        } => arithmetic::binary(context, config, operation, *operator, *left, *right),
        OperationKind::Unary {
            operator,
            operand,
            user_defined: false,
        } => arithmetic::unary(context, operation, *operator, *operand),
        OperationKind::Conversion {
            operand,
            user_defined: false,
        } => patterns::conversion(context, operation, *operand),
        OperationKind::IsNull { operand } => patterns::is_null(context, operation, *operand),
        OperationKind::IsType {
            operand,
            matches_any_non_null,
            ..
        } => patterns::is_type(context, operation, *operand, *matches_any_non_null),
        OperationKind::Invocation {
            method,
            instance,
            arguments,
        } => invocation::invocation(context, *method, *instance, arguments),
        OperationKind::Argument { value, flags } => {
            invocation::argument(context, operation, *value, *flags)
        }
        OperationKind::ObjectCreation {
            arguments,
            initializer,
            is_collection,
            ..
        } => creation::object_creation(context, operation, arguments, initializer, *is_collection),
        OperationKind::ArrayCreation {
            dimensions,
            initializer,
        } => creation::array_creation(context, operation, dimensions, initializer),
        OperationKind::AnonymousFunction { .. } => context
            .state()
            .set_operation_constraint(operation, Constraint::NOT_NULL),
        OperationKind::Binary { .. }
        | OperationKind::Unary { .. }
        | OperationKind::Conversion { .. }
        | OperationKind::MethodBody { .. }
        | OperationKind::Invalid { .. }
        | OperationKind::Other { .. } => context.state().clone(),
    }
}

/// Returns `true` for the operations after which the object-created hook runs.
pub(crate) fn is_creation(kind: &OperationKind) -> bool {
    matches!(
        kind,
        OperationKind::ObjectCreation { .. }
            | OperationKind::ArrayCreation { .. }
            | OperationKind::AnonymousFunction { .. }
    )
}

/// Returns the value of `operation`, empty when unknown.
pub(crate) fn value_of(context: &SymbolicContext<'_>, operation: OperationId) -> SymbolicValue {
    context.value_of(operation).cloned().unwrap_or_default()
}

/// Stores `value` for a tracked symbol, dropping the Object domain for symbols that
/// cannot be null.
pub(crate) fn store_symbol(
    state: &ProgramState,
    symbols: &SymbolTable,
    symbol: SymbolId,
    value: SymbolicValue,
) -> ProgramState {
    let nullable = symbols.get(symbol).map_or(true, |s| s.can_be_null());
    let value = if nullable {
        value
    } else {
        value.without_domain(ConstraintDomain::Object)
    };
    state.set_symbol_value(symbol, value)
}

/// Adds `constraint` to a tracked symbol unless its type rules the domain out.
pub(crate) fn constrain_symbol(
    state: &ProgramState,
    symbols: &SymbolTable,
    symbol: SymbolId,
    constraint: Constraint,
) -> ProgramState {
    let excluded = constraint.domain() == ConstraintDomain::Object
        && symbols.get(symbol).is_some_and(|s| !s.can_be_null());
    if excluded {
        state.clone()
    } else {
        state.set_symbol_constraint(symbol, constraint)
    }
}
