//! Symbolic values.

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::analysis::symbolic::constraints::{
    BoolConstraint, Constraint, ConstraintDomain, NumberConstraint, ObjectConstraint,
};

/// An immutable set of constraints, at most one per domain.
///
/// Values have no identity: two values are equal when they hold the same
/// constraints, which is what lets the engine recognise program states it has already
/// explored. Updates return a new value and leave the original untouched; clones share
/// the underlying map.
///
/// # Examples
///
/// ```rust
/// use symscope::analysis::symbolic::{Constraint, SymbolicValue};
///
/// let value = SymbolicValue::empty().with_constraint(Constraint::TRUE);
/// let flipped = value.with_constraint(Constraint::FALSE);
///
/// assert!(value.has_constraint(Constraint::TRUE));
/// assert!(flipped.has_constraint(Constraint::FALSE));
/// assert!(!flipped.has_constraint(Constraint::TRUE));
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolicValue {
    constraints: Arc<BTreeMap<ConstraintDomain, Constraint>>,
}

impl SymbolicValue {
    /// Returns the value without any constraint.
    #[must_use]
    pub fn empty() -> Self {
        SymbolicValue::default()
    }

    /// Returns a value holding only `constraint`.
    #[must_use]
    pub fn from_constraint(constraint: Constraint) -> Self {
        SymbolicValue::empty().with_constraint(constraint)
    }

    /// The value known to be `null`.
    #[must_use]
    pub fn null() -> Self {
        SymbolicValue::from_constraint(Constraint::NULL)
    }

    /// The value known to be non-null.
    #[must_use]
    pub fn not_null() -> Self {
        SymbolicValue::from_constraint(Constraint::NOT_NULL)
    }

    /// Returns a copy with `constraint` in its domain slot, replacing any previous
    /// member of that domain.
    #[must_use]
    pub fn with_constraint(&self, constraint: Constraint) -> Self {
        if self.constraints.get(&constraint.domain()) == Some(&constraint) {
            return self.clone();
        }
        let mut constraints = (*self.constraints).clone();
        constraints.insert(constraint.domain(), constraint);
        SymbolicValue {
            constraints: Arc::new(constraints),
        }
    }

    /// Returns a copy without `constraint`. Other members of its domain are kept.
    #[must_use]
    pub fn without_constraint(&self, constraint: Constraint) -> Self {
        if self.has_constraint(constraint) {
            self.without_domain(constraint.domain())
        } else {
            self.clone()
        }
    }

    /// Returns a copy without any member of `domain`.
    #[must_use]
    pub fn without_domain(&self, domain: ConstraintDomain) -> Self {
        if !self.constraints.contains_key(&domain) {
            return self.clone();
        }
        let mut constraints = (*self.constraints).clone();
        constraints.remove(&domain);
        SymbolicValue {
            constraints: Arc::new(constraints),
        }
    }

    /// Returns `true` if exactly this constraint holds.
    #[must_use]
    pub fn has_constraint(&self, constraint: Constraint) -> bool {
        self.constraints.get(&constraint.domain()) == Some(&constraint)
    }

    /// Returns `true` if any member of `domain` holds.
    #[must_use]
    pub fn has_domain(&self, domain: ConstraintDomain) -> bool {
        self.constraints.contains_key(&domain)
    }

    /// Returns the member of `domain`, if any.
    #[must_use]
    pub fn constraint(&self, domain: ConstraintDomain) -> Option<Constraint> {
        self.constraints.get(&domain).copied()
    }

    /// Returns the Bool member, if any.
    #[must_use]
    pub fn bool(&self) -> Option<bool> {
        match self.constraint(ConstraintDomain::Bool) {
            Some(Constraint::Bool(value)) => Some(value == BoolConstraint::True),
            _ => None,
        }
    }

    /// Returns the Object member, if any.
    #[must_use]
    pub fn object(&self) -> Option<ObjectConstraint> {
        match self.constraint(ConstraintDomain::Object) {
            Some(Constraint::Object(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns the Number member, if any.
    #[must_use]
    pub fn number(&self) -> Option<NumberConstraint> {
        match self.constraint(ConstraintDomain::Number) {
            Some(Constraint::Number(value)) => Some(value),
            _ => None,
        }
    }

    /// Iterates over the constraints in domain order.
    pub fn constraints(&self) -> impl Iterator<Item = Constraint> + '_ {
        self.constraints.values().copied()
    }

    /// Returns `true` if no constraint holds.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

impl fmt::Display for SymbolicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("No constraints");
        }
        let mut first = true;
        for constraint in self.constraints() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{constraint}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for SymbolicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolicValue({self})")
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::analysis::symbolic::constraints::CustomConstraint;

    const FIRST: Constraint = Constraint::Custom(CustomConstraint::new("Dummy", "First"));

    fn any_constraint() -> impl Strategy<Value = Constraint> {
        prop_oneof![
            Just(Constraint::TRUE),
            Just(Constraint::FALSE),
            Just(Constraint::NULL),
            Just(Constraint::NOT_NULL),
            Just(Constraint::EMPTY),
            Just(Constraint::NOT_EMPTY),
            Just(Constraint::LOCK_HELD),
            Just(Constraint::DISPOSED),
            Just(FIRST),
            (any::<i32>(), any::<i32>()).prop_filter_map("bounded", |(a, b)| {
                Constraint::number(Some(i128::from(a)), Some(i128::from(b)))
            }),
        ]
    }

    proptest! {
        #[test]
        fn test_at_most_one_constraint_per_domain(sequence in prop::collection::vec(any_constraint(), 0..24)) {
            let mut value = SymbolicValue::empty();
            for constraint in &sequence {
                value = value.with_constraint(*constraint);
                prop_assert!(value.has_constraint(*constraint));
            }
            let domains: Vec<_> = value.constraints().map(|c| c.domain()).collect();
            let mut unique = domains.clone();
            unique.dedup();
            prop_assert_eq!(domains, unique);
        }

        #[test]
        fn test_add_is_idempotent(constraint in any_constraint(), base in prop::collection::vec(any_constraint(), 0..6)) {
            let value = base.iter().fold(SymbolicValue::empty(), |v, c| v.with_constraint(*c));
            let once = value.with_constraint(constraint);
            prop_assert_eq!(once.with_constraint(constraint), once);
        }
    }

    #[test]
    fn test_remove_only_matching_member() {
        let value = SymbolicValue::empty()
            .with_constraint(Constraint::TRUE)
            .with_constraint(Constraint::NOT_NULL);

        assert_eq!(value.without_constraint(Constraint::FALSE), value);
        let removed = value.without_constraint(Constraint::TRUE);
        assert!(!removed.has_domain(ConstraintDomain::Bool));
        assert!(removed.has_constraint(Constraint::NOT_NULL));
        assert!(value.has_constraint(Constraint::TRUE));
    }

    #[test]
    fn test_equality_by_content() {
        let left = SymbolicValue::empty()
            .with_constraint(Constraint::NULL)
            .with_constraint(FIRST);
        let right = SymbolicValue::from_constraint(FIRST).with_constraint(Constraint::NULL);
        assert_eq!(left, right);
        assert_ne!(left, SymbolicValue::null());
        assert_eq!(left.to_string(), "Null, First");
        assert_eq!(SymbolicValue::empty().to_string(), "No constraints");
    }

    #[test]
    fn test_typed_accessors() {
        let value = SymbolicValue::from_constraint(Constraint::FALSE)
            .with_constraint(Constraint::number(Some(1), None).unwrap());
        assert_eq!(value.bool(), Some(false));
        assert_eq!(value.object(), None);
        assert_eq!(value.number().and_then(|n| n.lower()), Some(1));
    }
}
