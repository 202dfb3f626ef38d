//! Constraint learning on conditional branches.
//!
//! When the walk follows one side of a conditional branch, the branch value is known to
//! be `true` or `false` on that side. This module pushes that fact back onto the
//! tracked symbols the condition was computed from: `x == null` teaches `x` is null on
//! one side and not null on the other, `i < 10` narrows the range of `i`, `!flag`
//! teaches `flag` the opposite truth value. A fact that contradicts what the state
//! already knows proves the side unreachable.

use crate::{
    analysis::symbolic::{
        processors::constrain_symbol, Constraint, ConstraintDomain, NumberConstraint,
        ProgramState, SymbolicContext,
    },
    operation::{
        tracked_symbol, BinaryOperator, OperationId, OperationKind, OperationTree, SymbolId,
        SymbolTable, UnaryOperator,
    },
};

/// Returns the state on the side of a branch where `condition` evaluated to `value`,
/// or `None` if that side cannot be reached.
pub(crate) fn learn_branch(
    context: &SymbolicContext<'_>,
    condition: OperationId,
    value: bool,
) -> Option<ProgramState> {
    let learner = Learner {
        tree: context.cfg().operations(),
        symbols: context.cfg().symbols(),
    };
    let resolved = context.state().resolve_capture(learner.tree, condition);
    let state = context
        .state()
        .set_operation_constraint(resolved, Constraint::from_bool(value));
    learner.learn(state, resolved, value)
}

struct Learner<'a> {
    tree: &'a OperationTree,
    symbols: &'a SymbolTable,
}

impl Learner<'_> {
    fn learn(&self, state: ProgramState, operation: OperationId, value: bool) -> Option<ProgramState> {
        let operation = state.resolve_capture(self.tree, operation);
        if let Some(symbol) = tracked_symbol(self.tree, self.symbols, operation) {
            return self.constrain(state, symbol, Constraint::from_bool(value));
        }
        let Some(kind) = self.tree.kind(operation) else {
            return Some(state);
        };
        match kind {
            OperationKind::Conversion {
                operand,
                user_defined: false,
            } => self.learn(state, *operand, value),
            OperationKind::Unary {
                operator: UnaryOperator::Not,
                operand,
                user_defined: false,
            } => self.learn(state, *operand, !value),
            OperationKind::IsNull { operand } => {
                let constraint = if value {
                    Constraint::NULL
                } else {
                    Constraint::NOT_NULL
                };
                self.learn_object(state, *operand, constraint)
            }
            OperationKind::IsType {
                operand,
                matches_any_non_null,
                ..
            } => {
                if value {
                    self.learn_object(state, *operand, Constraint::NOT_NULL)
                } else if *matches_any_non_null {
                    self.learn_object(state, *operand, Constraint::NULL)
                } else {
                    Some(state)
                }
            }
            OperationKind::Binary {
                operator,
                left,
                right,
                user_defined: false,
            } => self.learn_binary(state, *operator, *left, *right, value),
            _ => Some(state),
        }
    }

    fn learn_binary(
        &self,
        state: ProgramState,
        operator: BinaryOperator,
        left: OperationId,
        right: OperationId,
        value: bool,
    ) -> Option<ProgramState> {
        match operator {
            BinaryOperator::And if value => {
                let state = self.learn(state, left, true)?;
                self.learn(state, right, true)
            }
            BinaryOperator::Or if !value => {
                let state = self.learn(state, left, false)?;
                self.learn(state, right, false)
            }
            BinaryOperator::Equals | BinaryOperator::NotEquals => {
                let equal = (operator == BinaryOperator::Equals) == value;
                let state = self.learn_equality(state, left, right, equal)?;
                self.learn_equality(state, right, left, equal)
            }
            _ if operator.is_relational() => {
                let effective = if value {
                    Some(operator)
                } else {
                    operator.negate()
                };
                let Some(effective) = effective else {
                    return Some(state);
                };
                let right_number = state.value(self.tree, right).and_then(|v| v.number());
                let left_number = state.value(self.tree, left).and_then(|v| v.number());
                let state = self.learn_range(state, left, effective, right_number)?;
                self.learn_range(state, right, effective.flip(), left_number)
            }
            _ => Some(state),
        }
    }

    /// Learns about `operand` from `operand == other` (or `!=` when `equal` is false).
    fn learn_equality(
        &self,
        state: ProgramState,
        operand: OperationId,
        other: OperationId,
        equal: bool,
    ) -> Option<ProgramState> {
        let Some(other_value) = state.value(self.tree, other).cloned() else {
            return Some(state);
        };
        if other_value.has_constraint(Constraint::NULL) {
            let constraint = if equal {
                Constraint::NULL
            } else {
                Constraint::NOT_NULL
            };
            return self.learn_object(state, operand, constraint);
        }
        if equal && other_value.has_constraint(Constraint::NOT_NULL) {
            return self.learn_object(state, operand, Constraint::NOT_NULL);
        }
        if let Some(flag) = other_value.bool() {
            return self.learn(state, operand, flag == equal);
        }
        match other_value.number() {
            Some(number) if equal => {
                self.learn_range(state, operand, BinaryOperator::Equals, Some(number))
            }
            _ => Some(state),
        }
    }

    fn learn_object(
        &self,
        state: ProgramState,
        operand: OperationId,
        constraint: Constraint,
    ) -> Option<ProgramState> {
        let operand = state.resolve_capture(self.tree, operand);
        if let Some(OperationKind::Conversion {
            operand: inner,
            user_defined: false,
        }) = self.tree.kind(operand)
        {
            return self.learn_object(state, *inner, constraint);
        }
        if let Some(known) = state.operation_value(operand).and_then(|v| v.object()) {
            if Constraint::Object(known) != constraint {
                return None;
            }
        }
        match tracked_symbol(self.tree, self.symbols, operand) {
            Some(symbol) => self.constrain(state, symbol, constraint),
            None => Some(state),
        }
    }

    fn learn_range(
        &self,
        state: ProgramState,
        operand: OperationId,
        operator: BinaryOperator,
        other: Option<NumberConstraint>,
    ) -> Option<ProgramState> {
        let Some(other) = other else {
            return Some(state);
        };
        let operand = state.resolve_capture(self.tree, operand);
        let Some(symbol) = tracked_symbol(self.tree, self.symbols, operand) else {
            return Some(state);
        };
        let bound = match operator {
            BinaryOperator::LessThan => {
                NumberConstraint::from(None, other.upper().and_then(|max| max.checked_sub(1)))
            }
            BinaryOperator::LessThanOrEqual => NumberConstraint::from(None, other.upper()),
            BinaryOperator::GreaterThan => {
                NumberConstraint::from(other.lower().and_then(|min| min.checked_add(1)), None)
            }
            BinaryOperator::GreaterThanOrEqual => NumberConstraint::from(other.lower(), None),
            BinaryOperator::Equals => Some(other),
            _ => None,
        };
        let Some(bound) = bound else {
            return Some(state);
        };

        let current = state.symbol_value(symbol).cloned().unwrap_or_default();
        match NumberConstraint::intersect(current.number().as_ref(), &bound)? {
            Some(number) => Some(state.set_symbol_value(
                symbol,
                current.with_constraint(Constraint::Number(number)),
            )),
            None => Some(state.set_symbol_value(symbol, current.without_domain(ConstraintDomain::Number))),
        }
    }

    /// Adds `constraint` to `symbol`, failing if the symbol already holds another
    /// member of the same domain.
    fn constrain(
        &self,
        state: ProgramState,
        symbol: SymbolId,
        constraint: Constraint,
    ) -> Option<ProgramState> {
        let nullable = self.symbols.get(symbol).map_or(true, |s| s.can_be_null());
        if constraint.domain() == ConstraintDomain::Object && !nullable {
            return (constraint != Constraint::NULL).then_some(state);
        }
        if let Some(existing) = state
            .symbol_value(symbol)
            .and_then(|value| value.constraint(constraint.domain()))
        {
            if existing != constraint {
                return None;
            }
        }
        Some(constrain_symbol(&state, self.symbols, symbol, constraint))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        analysis::symbolic::{Constraint, ExecutionConfig, SymbolicValue},
        operation::TypeKind,
        syntax::{Expression, Lowerer, Statement},
        test::walk_recorded,
    };

    fn split(condition: Expression) -> Vec<Statement> {
        vec![Statement::If {
            condition,
            then: vec![Statement::tag("Then", None)],
            otherwise: vec![Statement::tag("Else", None)],
        }]
    }

    #[test]
    fn test_type_check_learns_not_null() {
        for matches_any_non_null in [false, true] {
            let lowerer = Lowerer::new().parameter_object("o");
            let o = lowerer.symbol("o").unwrap();
            let cfg = lowerer
                .lower(&split(Expression::is_type(
                    Expression::parameter("o"),
                    "String",
                    matches_any_non_null,
                )))
                .unwrap();

            let (outcome, recorder) = walk_recorded(&cfg, ExecutionConfig::default());
            assert!(outcome.completed);
            let recording = recorder.recording();
            let recording = recording.borrow();
            assert!(recording.symbol_has("Then", o, Constraint::NOT_NULL));
            assert_eq!(recording.symbol_has("Else", o, Constraint::NULL), matches_any_non_null);
            assert!(!recording.symbol_has("Else", o, Constraint::NOT_NULL));
        }
    }

    #[test]
    fn test_conversion_passes_learning_through() {
        let lowerer = Lowerer::new().parameter_bool("flag").parameter_object("o");
        let flag = lowerer.symbol("flag").unwrap();
        let o = lowerer.symbol("o").unwrap();
        let cfg = lowerer
            .lower(&[
                Statement::If {
                    condition: Expression::convert(Expression::parameter("flag"), "Boolean", TypeKind::Value),
                    then: vec![Statement::tag("FlagSet", None)],
                    otherwise: vec![Statement::tag("FlagClear", None)],
                },
                Statement::If {
                    condition: Expression::equals(
                        Expression::convert(Expression::parameter("o"), "Object", TypeKind::Reference),
                        Expression::null(),
                    ),
                    then: vec![Statement::tag("Null", None)],
                    otherwise: vec![Statement::tag("NotNull", None)],
                },
            ])
            .unwrap();

        let (outcome, recorder) = walk_recorded(&cfg, ExecutionConfig::default());
        assert!(outcome.completed);
        let recording = recorder.recording();
        let recording = recording.borrow();
        assert!(recording.symbol_has("FlagSet", flag, Constraint::TRUE));
        assert!(recording.symbol_has("FlagClear", flag, Constraint::FALSE));
        assert!(recording.symbol_has("Null", o, Constraint::NULL));
        assert!(recording.symbol_has("NotNull", o, Constraint::NOT_NULL));
    }

    #[test]
    fn test_negation_flips_the_learned_value() {
        let lowerer = Lowerer::new().parameter_bool("flag");
        let flag = lowerer.symbol("flag").unwrap();
        let cfg = lowerer
            .lower(&split(Expression::not(Expression::parameter("flag"))))
            .unwrap();

        let (outcome, recorder) = walk_recorded(&cfg, ExecutionConfig::default());
        assert!(outcome.completed);
        let recording = recorder.recording();
        let recording = recording.borrow();
        assert!(recording.symbol_has("Then", flag, Constraint::FALSE));
        assert!(recording.symbol_has("Else", flag, Constraint::TRUE));
    }

    #[test]
    fn test_false_relational_learns_the_negated_bound() {
        let lowerer = Lowerer::new().parameter_int("i");
        let i = lowerer.symbol("i").unwrap();
        let cfg = lowerer
            .lower(&split(Expression::less_than(Expression::parameter("i"), Expression::int(10))))
            .unwrap();

        let (outcome, recorder) = walk_recorded(&cfg, ExecutionConfig::default());
        assert!(outcome.completed);
        let recording = recorder.recording();
        let recording = recording.borrow();
        let range = |name: &str| {
            let states = recording.states(name);
            assert_eq!(states.len(), 1);
            states[0].symbol_value(i).and_then(SymbolicValue::number)
        };
        let below = range("Then").unwrap();
        assert_eq!((below.lower(), below.upper()), (None, Some(9)));
        let at_least = range("Else").unwrap();
        assert_eq!((at_least.lower(), at_least.upper()), (Some(10), None));
    }

    #[test]
    fn test_contradiction_prunes_the_branch() {
        let cfg = Lowerer::new()
            .parameter_object("o")
            .lower(&[Statement::If {
                condition: Expression::equals(Expression::parameter("o"), Expression::null()),
                then: vec![Statement::If {
                    condition: Expression::not_equals(Expression::parameter("o"), Expression::null()),
                    then: vec![Statement::tag("Never", None)],
                    otherwise: vec![Statement::tag("Always", None)],
                }],
                otherwise: vec![],
            }])
            .unwrap();

        let (outcome, recorder) = walk_recorded(&cfg, ExecutionConfig::default());
        assert!(outcome.completed);
        assert_eq!(recorder.recording().borrow().tag_names(), vec!["Always"]);
    }
}
