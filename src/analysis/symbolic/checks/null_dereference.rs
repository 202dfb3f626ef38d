//! Null dereference detection.

use crate::{
    analysis::symbolic::{Constraint, Diagnostic, ProgramState, SymbolicCheck, SymbolicContext},
    operation::{OperationId, OperationKind},
};

/// Rule identifier of [`NullDereference`] diagnostics.
pub const NULL_DEREFERENCE_RULE: &str = "S2259";

/// Reports member access, instance calls and element access on a receiver that is
/// null on the current path.
///
/// The built-in semantics mark a dereferenced receiver not null afterwards, so a path
/// reports the first dereference of a null value only. Findings are dropped when the
/// walk is incomplete.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDereference;

impl NullDereference {
    /// Creates the check.
    #[must_use]
    pub fn new() -> Self {
        NullDereference
    }

    fn receiver(context: &SymbolicContext<'_>, kind: &OperationKind) -> Option<OperationId> {
        match kind {
            OperationKind::Invocation {
                method,
                instance: Some(instance),
                ..
            } => {
                let is_static = context
                    .cfg()
                    .symbol(*method)
                    .is_some_and(|symbol| symbol.is_static());
                (!is_static).then_some(*instance)
            }
            OperationKind::FieldReference {
                instance: Some(instance),
                ..
            }
            | OperationKind::PropertyReference {
                instance: Some(instance),
                ..
            }
            | OperationKind::EventReference {
                instance: Some(instance),
                ..
            } => Some(*instance),
            OperationKind::ArrayElementReference { array, .. } => Some(*array),
            _ => None,
        }
    }
}

impl SymbolicCheck for NullDereference {
    fn pre_process(&mut self, context: &SymbolicContext<'_>) -> Option<ProgramState> {
        let state = context.state().clone();
        let (Some(operation), Some(kind)) = (context.operation(), context.operation_kind()) else {
            return Some(state);
        };
        let Some(receiver) = Self::receiver(context, kind) else {
            return Some(state);
        };
        if context.has_constraint(receiver, Constraint::NULL) {
            let name = context
                .syntax(receiver)
                .map_or_else(|| receiver.to_string(), |syntax| syntax.to_string());
            tracing::trace!(%operation, receiver = %name, "null dereference");
            context.report(
                Diagnostic::new(
                    NULL_DEREFERENCE_RULE,
                    format!("'{name}' is null on at least one execution path."),
                )
                .at(operation, context.syntax(operation)),
            );
        }
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::symbolic::{ExecutionConfig, SymbolicExecution},
        syntax::{Expression, Lowerer, Statement},
    };

    #[test]
    fn test_reports_dereference_of_null_local() {
        let cfg = Lowerer::new()
            .local_object("o")
            .lower(&[
                Statement::assign("o", Expression::null()),
                Statement::expression(Expression::call_on(Expression::local("o"), "ToString", vec![])),
            ])
            .unwrap();

        let mut execution =
            SymbolicExecution::new(&cfg, NullDereference.into(), ExecutionConfig::default()).unwrap();
        let outcome = execution.walk();

        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(&*outcome.diagnostics[0].rule, NULL_DEREFERENCE_RULE);
        assert_eq!(
            outcome.diagnostics[0].message,
            "'o' is null on at least one execution path."
        );
    }

    #[test]
    fn test_checked_receiver_is_not_reported() {
        let cfg = Lowerer::new()
            .parameter_object("o")
            .lower(&[Statement::If {
                condition: Expression::not_equals(Expression::parameter("o"), Expression::null()),
                then: vec![Statement::expression(Expression::call_on(
                    Expression::parameter("o"),
                    "ToString",
                    vec![],
                ))],
                otherwise: vec![],
            }])
            .unwrap();

        let mut execution =
            SymbolicExecution::new(&cfg, NullDereference.into(), ExecutionConfig::default()).unwrap();
        let outcome = execution.walk();

        assert!(outcome.completed);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_incomplete_walk_drops_findings() {
        let cfg = Lowerer::new()
            .local_object("o")
            .lower(&[
                Statement::assign("o", Expression::null()),
                Statement::expression(Expression::call_on(Expression::local("o"), "ToString", vec![])),
                Statement::assign("o", Expression::null()),
                Statement::assign("o", Expression::null()),
            ])
            .unwrap();

        let config = ExecutionConfig::default().with_max_step_count(6);
        let mut execution = SymbolicExecution::new(&cfg, NullDereference.into(), config).unwrap();
        let outcome = execution.walk();

        assert!(!outcome.completed);
        assert!(outcome.diagnostics.is_empty());
    }
}
