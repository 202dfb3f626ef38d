//! Binary and unary operators, compound assignments and increments.

use crate::{
    analysis::symbolic::{
        processors::{store_symbol, value_of},
        Constraint, ConstraintDomain, ExecutionConfig, NumberConstraint, ObjectConstraint,
        ProgramState, SymbolicContext, SymbolicValue,
    },
    operation::{BinaryOperator, OperationId, UnaryOperator},
};

pub(super) fn binary(
    context: &SymbolicContext<'_>,
    config: &ExecutionConfig,
    operation: OperationId,
    operator: BinaryOperator,
    left: OperationId,
    right: OperationId,
) -> ProgramState {
    let mut state = context.state().clone();
    let mut left_value = value_of(context, left);
    let mut right_value = value_of(context, right);

    // A loop condition seen again: its counters are widened so the loop can be left.
    if operator.is_relational() && config.widen_loop_ranges && context.visit_count() > 1 {
        for (side, value) in [(left, &mut left_value), (right, &mut right_value)] {
            if let Some(symbol) = context.tracked_symbol(side) {
                if let Some(current) = state.symbol_value(symbol) {
                    let widened = current.without_domain(ConstraintDomain::Number);
                    state = state.set_symbol_value(symbol, widened);
                    *value = value.without_domain(ConstraintDomain::Number);
                }
            }
        }
    }

    let result = evaluate_binary(operator, &left_value, &right_value);
    match result {
        Some(constraint) => state.set_operation_constraint(operation, constraint),
        None => state,
    }
}

fn evaluate_binary(
    operator: BinaryOperator,
    left: &SymbolicValue,
    right: &SymbolicValue,
) -> Option<Constraint> {
    if operator.is_equality() {
        if let Some(equal) = null_equality(left, right) {
            return Some(Constraint::from_bool(equal == (operator == BinaryOperator::Equals)));
        }
    }
    if let (Some(l), Some(r)) = (left.bool(), right.bool()) {
        let result = match operator {
            BinaryOperator::Equals => l == r,
            BinaryOperator::NotEquals => l != r,
            BinaryOperator::And => l && r,
            BinaryOperator::Or => l || r,
            BinaryOperator::ExclusiveOr => l ^ r,
            _ => return None,
        };
        return Some(Constraint::from_bool(result));
    }
    match (operator, left.bool(), right.bool()) {
        (BinaryOperator::And, Some(false), _) | (BinaryOperator::And, _, Some(false)) => {
            return Some(Constraint::FALSE)
        }
        (BinaryOperator::Or, Some(true), _) | (BinaryOperator::Or, _, Some(true)) => {
            return Some(Constraint::TRUE)
        }
        _ => {}
    }
    let (l, r) = (left.number()?, right.number()?);
    if operator.is_equality() || operator.is_relational() {
        return evaluate_relational(operator, &l, &r).map(Constraint::from_bool);
    }
    calculate(operator, &l, &r).map(Constraint::Number)
}

/// Compares two values when at least one is `null`.
fn null_equality(left: &SymbolicValue, right: &SymbolicValue) -> Option<bool> {
    match (left.object()?, right.object()?) {
        (ObjectConstraint::Null, ObjectConstraint::Null) => Some(true),
        (ObjectConstraint::Null, ObjectConstraint::NotNull)
        | (ObjectConstraint::NotNull, ObjectConstraint::Null) => Some(false),
        (ObjectConstraint::NotNull, ObjectConstraint::NotNull) => None,
    }
}

/// Evaluates a comparison of two ranges when every pair of values agrees.
pub(crate) fn evaluate_relational(
    operator: BinaryOperator,
    left: &NumberConstraint,
    right: &NumberConstraint,
) -> Option<bool> {
    let below = |a: &NumberConstraint, b: &NumberConstraint, strict: bool| match (a.upper(), b.lower()) {
        (Some(high), Some(low)) => {
            if strict {
                high < low
            } else {
                high <= low
            }
        }
        _ => false,
    };
    let decide = |holds: bool, fails: bool| {
        if holds {
            Some(true)
        } else if fails {
            Some(false)
        } else {
            None
        }
    };
    match operator {
        BinaryOperator::LessThan => decide(below(left, right, true), below(right, left, false)),
        BinaryOperator::LessThanOrEqual => decide(below(left, right, false), below(right, left, true)),
        BinaryOperator::GreaterThan => decide(below(right, left, true), below(left, right, false)),
        BinaryOperator::GreaterThanOrEqual => {
            decide(below(right, left, false), below(left, right, true))
        }
        BinaryOperator::Equals | BinaryOperator::NotEquals => {
            let equal = match (left.single_value(), right.single_value()) {
                (Some(l), Some(r)) if l == r => Some(true),
                _ if !left.overlaps(right) => Some(false),
                _ => None,
            };
            equal.map(|equal| equal == (operator == BinaryOperator::Equals))
        }
        _ => None,
    }
}

fn calculate(
    operator: BinaryOperator,
    left: &NumberConstraint,
    right: &NumberConstraint,
) -> Option<NumberConstraint> {
    match operator {
        BinaryOperator::Add => left.add(right),
        BinaryOperator::Subtract => left.subtract(right),
        BinaryOperator::Multiply => left.multiply(right),
        BinaryOperator::Divide => left.divide(right),
        BinaryOperator::Remainder => left.remainder(right),
        BinaryOperator::And => left.bitwise_and(right),
        BinaryOperator::Or => left.bitwise_or(right),
        BinaryOperator::ExclusiveOr => left.exclusive_or(right),
        _ => None,
    }
}

pub(super) fn unary(
    context: &SymbolicContext<'_>,
    operation: OperationId,
    operator: UnaryOperator,
    operand: OperationId,
) -> ProgramState {
    let value = value_of(context, operand);
    let result = match operator {
        UnaryOperator::Not => value.bool().map(|b| Constraint::from_bool(!b)),
        UnaryOperator::Plus => value.number().map(Constraint::Number),
        UnaryOperator::Minus => value.number().and_then(|n| n.negate()).map(Constraint::Number),
        UnaryOperator::BitwiseNegation => value
            .number()
            .and_then(|n| n.negate())
            .and_then(|n| n.subtract(&NumberConstraint::single(1)))
            .map(Constraint::Number),
    };
    match result {
        Some(constraint) => context.state().set_operation_constraint(operation, constraint),
        None => context.state().clone(),
    }
}

pub(super) fn compound_assignment(
    context: &SymbolicContext<'_>,
    operation: OperationId,
    operator: BinaryOperator,
    target: OperationId,
    value: OperationId,
) -> ProgramState {
    let current = value_of(context, target);
    let operand = value_of(context, value);
    let result = evaluate_binary(operator, &current, &operand);
    let updated = current
        .without_domain(ConstraintDomain::Number)
        .without_domain(ConstraintDomain::Bool);
    let updated = match result {
        Some(constraint) => updated.with_constraint(constraint),
        None => updated,
    };
    write_back(context, operation, target, updated)
}

pub(super) fn increment(
    context: &SymbolicContext<'_>,
    operation: OperationId,
    target: OperationId,
    is_decrement: bool,
    is_postfix: bool,
) -> ProgramState {
    let current = value_of(context, target);
    let one = NumberConstraint::single(1);
    let next = current.number().and_then(|number| {
        if is_decrement {
            number.subtract(&one)
        } else {
            number.add(&one)
        }
    });
    let updated = match next {
        Some(number) => current.with_constraint(Constraint::Number(number)),
        None => current.without_domain(ConstraintDomain::Number),
    };
    let state = write_back(context, operation, target, updated);
    if is_postfix {
        state.set_operation_value(operation, current)
    } else {
        state
    }
}

fn write_back(
    context: &SymbolicContext<'_>,
    operation: OperationId,
    target: OperationId,
    value: SymbolicValue,
) -> ProgramState {
    let state = match context.tracked_symbol(target) {
        Some(symbol) => store_symbol(context.state(), context.cfg().symbols(), symbol, value.clone()),
        None => context.state().clone(),
    };
    state
        .set_operation_value(target, value.clone())
        .set_operation_value(operation, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(min: Option<i128>, max: Option<i128>) -> NumberConstraint {
        NumberConstraint::from(min, max).unwrap()
    }

    #[test]
    fn test_relational_over_ranges() {
        let low = range(Some(0), Some(9));
        let ten = NumberConstraint::single(10);
        assert_eq!(evaluate_relational(BinaryOperator::LessThan, &low, &ten), Some(true));
        assert_eq!(evaluate_relational(BinaryOperator::GreaterThanOrEqual, &low, &ten), Some(false));
        assert_eq!(evaluate_relational(BinaryOperator::LessThanOrEqual, &ten, &ten), Some(true));
        assert_eq!(evaluate_relational(BinaryOperator::LessThan, &ten, &ten), Some(false));

        let open = range(Some(5), None);
        assert_eq!(evaluate_relational(BinaryOperator::LessThan, &open, &ten), None);
        assert_eq!(evaluate_relational(BinaryOperator::Equals, &low, &ten), Some(false));
        assert_eq!(evaluate_relational(BinaryOperator::NotEquals, &ten, &ten), Some(false));
    }

    #[test]
    fn test_null_equality() {
        let null = SymbolicValue::null();
        let not_null = SymbolicValue::not_null();
        assert_eq!(
            evaluate_binary(BinaryOperator::Equals, &null, &null),
            Some(Constraint::TRUE)
        );
        assert_eq!(
            evaluate_binary(BinaryOperator::NotEquals, &not_null, &null),
            Some(Constraint::TRUE)
        );
        assert_eq!(evaluate_binary(BinaryOperator::Equals, &not_null, &not_null), None);
        assert_eq!(evaluate_binary(BinaryOperator::Equals, &SymbolicValue::empty(), &null), None);
    }

    #[test]
    fn test_bool_operators() {
        let t = SymbolicValue::from_constraint(Constraint::TRUE);
        let f = SymbolicValue::from_constraint(Constraint::FALSE);
        let unknown = SymbolicValue::empty();
        assert_eq!(evaluate_binary(BinaryOperator::ExclusiveOr, &t, &f), Some(Constraint::TRUE));
        assert_eq!(evaluate_binary(BinaryOperator::And, &unknown, &f), Some(Constraint::FALSE));
        assert_eq!(evaluate_binary(BinaryOperator::Or, &t, &unknown), Some(Constraint::TRUE));
        assert_eq!(evaluate_binary(BinaryOperator::Or, &f, &unknown), None);
    }

    #[test]
    fn test_arithmetic() {
        let two = SymbolicValue::from_constraint(Constraint::Number(NumberConstraint::single(2)));
        let three = SymbolicValue::from_constraint(Constraint::Number(NumberConstraint::single(3)));
        assert_eq!(
            evaluate_binary(BinaryOperator::Multiply, &two, &three),
            Some(Constraint::Number(NumberConstraint::single(6)))
        );
        assert_eq!(
            evaluate_binary(BinaryOperator::Subtract, &two, &three),
            Some(Constraint::Number(NumberConstraint::single(-1)))
        );
    }
}
