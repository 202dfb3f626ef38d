//! Numeric range constraint.

use std::{cmp::Ordering, fmt};

/// A closed integer range `[min, max]` where either bound may be unbounded.
///
/// A range with both bounds unbounded carries no information and is therefore never a
/// constraint: [`NumberConstraint::from`] returns `None` for it. Arithmetic saturates to
/// unbounded when a bound would overflow `i128`.
///
/// # Examples
///
/// ```rust
/// use symscope::analysis::symbolic::NumberConstraint;
///
/// let small = NumberConstraint::from(Some(0), Some(9)).unwrap();
/// assert!(small.contains(5));
/// assert!(!small.is_single_value());
/// assert!(NumberConstraint::from(None, None).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NumberConstraint {
    min: Option<i128>,
    max: Option<i128>,
}

impl NumberConstraint {
    /// Creates a range, swapping the bounds if they are reversed.
    ///
    /// Returns `None` when both bounds are unbounded.
    #[must_use]
    pub fn from(min: Option<i128>, max: Option<i128>) -> Option<Self> {
        match (min, max) {
            (None, None) => None,
            (Some(low), Some(high)) if low > high => Some(NumberConstraint {
                min: Some(high),
                max: Some(low),
            }),
            _ => Some(NumberConstraint { min, max }),
        }
    }

    /// Creates the range holding exactly `value`.
    #[must_use]
    pub const fn single(value: i128) -> Self {
        NumberConstraint {
            min: Some(value),
            max: Some(value),
        }
    }

    /// Lower bound, `None` when unbounded.
    #[must_use]
    pub const fn lower(&self) -> Option<i128> {
        self.min
    }

    /// Upper bound, `None` when unbounded.
    #[must_use]
    pub const fn upper(&self) -> Option<i128> {
        self.max
    }

    /// Returns the value if the range holds exactly one.
    #[must_use]
    pub fn single_value(&self) -> Option<i128> {
        match (self.min, self.max) {
            (Some(low), Some(high)) if low == high => Some(low),
            _ => None,
        }
    }

    /// Returns `true` if the range holds exactly one value.
    #[must_use]
    pub fn is_single_value(&self) -> bool {
        self.single_value().is_some()
    }

    /// Returns `true` if `value` lies within the range.
    #[must_use]
    pub fn contains(&self, value: i128) -> bool {
        self.min.map_or(true, |low| low <= value) && self.max.map_or(true, |high| value <= high)
    }

    /// Returns `true` if the two ranges share at least one value.
    #[must_use]
    pub fn overlaps(&self, other: &NumberConstraint) -> bool {
        let low = max_bound(self.min, other.min);
        let high = min_bound(self.max, other.max);
        match (low, high) {
            (Some(low), Some(high)) => low <= high,
            _ => true,
        }
    }

    /// Returns the values present in both ranges.
    ///
    /// The outer `None` means the ranges are disjoint; the inner `None` means the
    /// intersection is unbounded on both sides.
    #[must_use]
    pub fn intersect(range: Option<&NumberConstraint>, other: &NumberConstraint) -> Option<Option<Self>> {
        let Some(range) = range else {
            return Some(Some(*other));
        };
        if !range.overlaps(other) {
            return None;
        }
        Some(NumberConstraint::from(
            max_bound(range.min, other.min),
            min_bound(range.max, other.max),
        ))
    }

    /// Compares two ranges when every value of one relates the same way to every
    /// value of the other.
    #[must_use]
    pub fn compare(&self, other: &NumberConstraint) -> Option<Ordering> {
        if let (Some(left), Some(right)) = (self.single_value(), other.single_value()) {
            return Some(left.cmp(&right));
        }
        if matches!((self.max, other.min), (Some(high), Some(low)) if high < low) {
            return Some(Ordering::Less);
        }
        if matches!((self.min, other.max), (Some(low), Some(high)) if low > high) {
            return Some(Ordering::Greater);
        }
        None
    }

    /// `self + other`.
    #[must_use]
    pub fn add(&self, other: &NumberConstraint) -> Option<Self> {
        NumberConstraint::from(
            combine(self.min, other.min, i128::checked_add),
            combine(self.max, other.max, i128::checked_add),
        )
    }

    /// `self - other`.
    #[must_use]
    pub fn subtract(&self, other: &NumberConstraint) -> Option<Self> {
        NumberConstraint::from(
            combine(self.min, other.max, i128::checked_sub),
            combine(self.max, other.min, i128::checked_sub),
        )
    }

    /// `-self`.
    #[must_use]
    pub fn negate(&self) -> Option<Self> {
        NumberConstraint::from(
            self.max.and_then(i128::checked_neg),
            self.min.and_then(i128::checked_neg),
        )
    }

    /// `self * other`. Only fully bounded ranges produce a result.
    #[must_use]
    pub fn multiply(&self, other: &NumberConstraint) -> Option<Self> {
        let (Some(a), Some(b), Some(c), Some(d)) = (self.min, self.max, other.min, other.max) else {
            return self.sign_product(other);
        };
        let products = [a.checked_mul(c), a.checked_mul(d), b.checked_mul(c), b.checked_mul(d)];
        if products.iter().any(Option::is_none) {
            return None;
        }
        let values = products.iter().flatten().copied();
        NumberConstraint::from(values.clone().min(), values.max())
    }

    /// `self / other`. Division by a range containing zero yields no information.
    #[must_use]
    pub fn divide(&self, other: &NumberConstraint) -> Option<Self> {
        let divisor = other.single_value().filter(|value| *value != 0)?;
        let divide = |bound: Option<i128>| bound.and_then(|value| value.checked_div(divisor));
        if divisor > 0 {
            NumberConstraint::from(divide(self.min), divide(self.max))
        } else {
            NumberConstraint::from(divide(self.max), divide(self.min))
        }
    }

    /// `self % other`. The result is bounded by the divisor's magnitude.
    #[must_use]
    pub fn remainder(&self, other: &NumberConstraint) -> Option<Self> {
        if let (Some(left), Some(right)) = (self.single_value(), other.single_value()) {
            return (right != 0)
                .then(|| left.checked_rem(right))
                .flatten()
                .map(NumberConstraint::single);
        }
        let magnitude = match (other.min, other.max) {
            (Some(low), Some(high)) => low.unsigned_abs().max(high.unsigned_abs()),
            _ => return self.non_negative().then_some(NumberConstraint { min: Some(0), max: None }),
        };
        let limit = i128::try_from(magnitude).ok()?.checked_sub(1)?;
        if self.non_negative() {
            NumberConstraint::from(Some(0), Some(limit))
        } else {
            NumberConstraint::from(Some(-limit), Some(limit))
        }
    }

    /// `self & other` for single values and non-negative ranges.
    #[must_use]
    pub fn bitwise_and(&self, other: &NumberConstraint) -> Option<Self> {
        if let (Some(left), Some(right)) = (self.single_value(), other.single_value()) {
            return Some(NumberConstraint::single(left & right));
        }
        if self.non_negative() || other.non_negative() {
            let high = match (self.non_negative(), other.non_negative()) {
                (true, true) => min_bound(self.max, other.max),
                (true, false) => self.max,
                _ => other.max,
            };
            return NumberConstraint::from(Some(0), high);
        }
        None
    }

    /// `self | other` for single values and non-negative ranges.
    #[must_use]
    pub fn bitwise_or(&self, other: &NumberConstraint) -> Option<Self> {
        if let (Some(left), Some(right)) = (self.single_value(), other.single_value()) {
            return Some(NumberConstraint::single(left | right));
        }
        if self.non_negative() && other.non_negative() {
            return NumberConstraint::from(max_bound(self.min, other.min), None);
        }
        None
    }

    /// `self ^ other` for single values.
    #[must_use]
    pub fn exclusive_or(&self, other: &NumberConstraint) -> Option<Self> {
        match (self.single_value(), other.single_value()) {
            (Some(left), Some(right)) => Some(NumberConstraint::single(left ^ right)),
            _ if self.non_negative() && other.non_negative() => {
                NumberConstraint::from(Some(0), None)
            }
            _ => None,
        }
    }

    fn non_negative(&self) -> bool {
        self.min.is_some_and(|low| low >= 0)
    }

    fn sign_product(&self, other: &NumberConstraint) -> Option<Self> {
        if self.non_negative() && other.non_negative() {
            let low = match (self.min, other.min) {
                (Some(a), Some(b)) => a.checked_mul(b),
                _ => Some(0),
            };
            return NumberConstraint::from(low, None);
        }
        None
    }
}

fn combine(left: Option<i128>, right: Option<i128>, op: fn(i128, i128) -> Option<i128>) -> Option<i128> {
    op(left?, right?)
}

fn max_bound(left: Option<i128>, right: Option<i128>) -> Option<i128> {
    match (left, right) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (value, None) | (None, value) => value,
    }
}

fn min_bound(left: Option<i128>, right: Option<i128>) -> Option<i128> {
    match (left, right) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (value, None) | (None, value) => value,
    }
}

impl fmt::Display for NumberConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.single_value(), self.min, self.max) {
            (Some(value), _, _) => write!(f, "Number {value}"),
            (None, Some(low), None) => write!(f, "Number from {low}"),
            (None, None, Some(high)) => write!(f, "Number up to {high}"),
            (None, low, high) => write!(
                f,
                "Number from {} to {}",
                low.map_or_else(|| "-inf".to_string(), |v| v.to_string()),
                high.map_or_else(|| "inf".to_string(), |v| v.to_string())
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::test::{number_member, number_range};

    fn range(min: Option<i128>, max: Option<i128>) -> NumberConstraint {
        NumberConstraint::from(min, max).unwrap()
    }

    #[test]
    fn test_from_normalizes() {
        assert_eq!(range(Some(5), Some(1)), range(Some(1), Some(5)));
        assert_eq!(NumberConstraint::from(None, None), None);
        assert_eq!(NumberConstraint::single(3).single_value(), Some(3));
    }

    #[test]
    fn test_bounds_on_owned_values() {
        let owned = range(Some(9), Some(2));
        assert_eq!(owned.lower(), Some(2));
        assert_eq!(owned.upper(), Some(9));
        let bounded_above = Some(range(None, Some(4)));
        assert_eq!(bounded_above.and_then(|range| range.upper()), Some(4));
        assert_eq!(bounded_above.and_then(|range| range.lower()), None);
    }

    #[test]
    fn test_arithmetic() {
        let zero_to_nine = range(Some(0), Some(9));
        let one = NumberConstraint::single(1);
        assert_eq!(zero_to_nine.add(&one), Some(range(Some(1), Some(10))));
        assert_eq!(zero_to_nine.subtract(&one), Some(range(Some(-1), Some(8))));
        assert_eq!(range(None, Some(9)).add(&one), Some(range(None, Some(10))));
        assert_eq!(zero_to_nine.negate(), Some(range(Some(-9), Some(0))));
        assert_eq!(
            zero_to_nine.multiply(&NumberConstraint::single(-2)),
            Some(range(Some(-18), Some(0)))
        );
        assert_eq!(zero_to_nine.divide(&NumberConstraint::single(0)), None);
        assert_eq!(
            range(Some(0), None).remainder(&NumberConstraint::single(4)),
            Some(range(Some(0), Some(3)))
        );
    }

    #[test]
    fn test_overflow_widens() {
        let max = NumberConstraint::single(i128::MAX);
        assert_eq!(max.add(&NumberConstraint::single(1)), None);
        assert_eq!(
            range(Some(0), Some(i128::MAX)).add(&NumberConstraint::single(1)),
            Some(range(Some(1), None))
        );
    }

    #[test]
    fn test_compare_and_intersect() {
        let low = range(Some(0), Some(4));
        let high = range(Some(5), Some(9));
        assert_eq!(low.compare(&high), Some(Ordering::Less));
        assert_eq!(high.compare(&low), Some(Ordering::Greater));
        assert_eq!(low.compare(&range(Some(3), Some(7))), None);
        assert_eq!(NumberConstraint::intersect(Some(&low), &high), None);
        assert_eq!(
            NumberConstraint::intersect(Some(&low), &range(Some(2), None)),
            Some(Some(range(Some(2), Some(4))))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(NumberConstraint::single(4).to_string(), "Number 4");
        assert_eq!(range(Some(10), None).to_string(), "Number from 10");
        assert_eq!(range(Some(1), Some(2)).to_string(), "Number from 1 to 2");
    }

    proptest! {
        #[test]
        fn test_intersection_is_symmetric(left in number_range(), right in number_range()) {
            prop_assert_eq!(
                NumberConstraint::intersect(Some(&left), &right),
                NumberConstraint::intersect(Some(&right), &left)
            );
            prop_assert_eq!(
                left.overlaps(&right),
                NumberConstraint::intersect(Some(&left), &right).is_some()
            );
        }

        #[test]
        fn test_arithmetic_keeps_members((range, value) in number_member(), delta in -1000i128..1000) {
            let shifted = range.add(&NumberConstraint::single(delta));
            prop_assert!(shifted.map_or(true, |shifted| shifted.contains(value + delta)));
            let negated = range.negate();
            prop_assert!(negated.map_or(true, |negated| negated.contains(-value)));
        }

        #[test]
        fn test_compare_holds_for_every_member(
            (left, left_value) in number_member(),
            (right, right_value) in number_member(),
        ) {
            match left.compare(&right) {
                Some(Ordering::Less) => prop_assert!(left_value < right_value),
                Some(Ordering::Greater) => prop_assert!(left_value > right_value),
                Some(Ordering::Equal) => prop_assert_eq!(left_value, right_value),
                None => {}
            }
        }
    }
}
