//! Constraint domains.
//!
//! A [`Constraint`] is a fact about a value. Every constraint belongs to exactly one
//! [`ConstraintDomain`]; members of one domain exclude each other, so a
//! [`SymbolicValue`](crate::analysis::symbolic::SymbolicValue) holds at most one
//! constraint per domain.
//!
//! | Domain | Members |
//! |---|---|
//! | `Bool` | `True`, `False` |
//! | `Object` | `Null`, `NotNull` |
//! | `Number` | a range `[min, max]` |
//! | `Collection` | `Empty`, `NotEmpty` |
//! | `Lock` | `Held`, `Released` |
//! | `Disposable` | `Disposed` |
//! | `Custom(name)` | members declared by a check |

mod number;

pub use number::NumberConstraint;

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use strum::{AsRefStr, Display, EnumIter};

/// Boolean truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, EnumIter)]
pub enum BoolConstraint {
    /// The value is `true`.
    True,
    /// The value is `false`.
    False,
}

impl BoolConstraint {
    /// Converts a Rust `bool`.
    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        if value {
            BoolConstraint::True
        } else {
            BoolConstraint::False
        }
    }

    /// Returns the represented `bool`.
    #[must_use]
    pub const fn as_bool(self) -> bool {
        matches!(self, BoolConstraint::True)
    }
}

/// Nullability of references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, EnumIter)]
pub enum ObjectConstraint {
    /// The reference is `null`.
    Null,
    /// The reference is not `null`.
    NotNull,
}

/// Emptiness of collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, EnumIter)]
pub enum CollectionConstraint {
    /// The collection has no elements.
    Empty,
    /// The collection has at least one element.
    NotEmpty,
}

/// Monitor ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, EnumIter)]
pub enum LockConstraint {
    /// The current thread holds the lock.
    Held,
    /// The lock was released.
    Released,
}

/// Disposal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, EnumIter)]
pub enum DisposableConstraint {
    /// `Dispose` was called on the value.
    Disposed,
}

/// A constraint declared by a check for its own bookkeeping.
///
/// Custom constraints of the same `domain` exclude each other. Two members are the
/// same constraint when their domain and name match; `opposite` does not take part in
/// comparisons.
#[derive(Debug, Clone, Copy)]
pub struct CustomConstraint {
    /// Name of the domain.
    pub domain: &'static str,
    /// Name of the member.
    pub name: &'static str,
    /// Member holding exactly when this one does not, if the domain has two members.
    pub opposite: Option<&'static str>,
}

impl CustomConstraint {
    /// Declares a member of a custom domain.
    #[must_use]
    pub const fn new(domain: &'static str, name: &'static str) -> Self {
        CustomConstraint {
            domain,
            name,
            opposite: None,
        }
    }

    /// Declares the opposite member of a two-member domain.
    #[must_use]
    pub const fn with_opposite(mut self, opposite: &'static str) -> Self {
        self.opposite = Some(opposite);
        self
    }
}

impl PartialEq for CustomConstraint {
    fn eq(&self, other: &Self) -> bool {
        self.domain == other.domain && self.name == other.name
    }
}

impl Eq for CustomConstraint {}

impl Hash for CustomConstraint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.domain.hash(state);
        self.name.hash(state);
    }
}

impl PartialOrd for CustomConstraint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CustomConstraint {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.domain, self.name).cmp(&(other.domain, other.name))
    }
}

/// The domain a constraint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintDomain {
    /// [`BoolConstraint`]
    Bool,
    /// [`ObjectConstraint`]
    Object,
    /// [`NumberConstraint`]
    Number,
    /// [`CollectionConstraint`]
    Collection,
    /// [`LockConstraint`]
    Lock,
    /// [`DisposableConstraint`]
    Disposable,
    /// [`CustomConstraint`] with the given domain name.
    Custom(&'static str),
}

impl fmt::Display for ConstraintDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintDomain::Bool => f.write_str("Bool"),
            ConstraintDomain::Object => f.write_str("Object"),
            ConstraintDomain::Number => f.write_str("Number"),
            ConstraintDomain::Collection => f.write_str("Collection"),
            ConstraintDomain::Lock => f.write_str("Lock"),
            ConstraintDomain::Disposable => f.write_str("Disposable"),
            ConstraintDomain::Custom(name) => f.write_str(name),
        }
    }
}

/// A fact about a value.
///
/// # Examples
///
/// ```rust
/// use symscope::analysis::symbolic::{Constraint, ConstraintDomain};
///
/// assert_eq!(Constraint::TRUE.domain(), ConstraintDomain::Bool);
/// assert_eq!(Constraint::TRUE.apply_opposite(true), Some(Constraint::FALSE));
/// assert_eq!(Constraint::NULL.apply_opposite(true), Some(Constraint::NOT_NULL));
/// // "not null" does not tell which non-null value the opposite branch saw
/// assert_eq!(Constraint::NOT_NULL.apply_opposite(true), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Constraint {
    /// Boolean truth.
    Bool(BoolConstraint),
    /// Nullability.
    Object(ObjectConstraint),
    /// Numeric range.
    Number(NumberConstraint),
    /// Collection emptiness.
    Collection(CollectionConstraint),
    /// Monitor ownership.
    Lock(LockConstraint),
    /// Disposal state.
    Disposable(DisposableConstraint),
    /// Check-specific fact.
    Custom(CustomConstraint),
}

impl Constraint {
    /// `Bool.True`
    pub const TRUE: Constraint = Constraint::Bool(BoolConstraint::True);
    /// `Bool.False`
    pub const FALSE: Constraint = Constraint::Bool(BoolConstraint::False);
    /// `Object.Null`
    pub const NULL: Constraint = Constraint::Object(ObjectConstraint::Null);
    /// `Object.NotNull`
    pub const NOT_NULL: Constraint = Constraint::Object(ObjectConstraint::NotNull);
    /// `Collection.Empty`
    pub const EMPTY: Constraint = Constraint::Collection(CollectionConstraint::Empty);
    /// `Collection.NotEmpty`
    pub const NOT_EMPTY: Constraint = Constraint::Collection(CollectionConstraint::NotEmpty);
    /// `Lock.Held`
    pub const LOCK_HELD: Constraint = Constraint::Lock(LockConstraint::Held);
    /// `Lock.Released`
    pub const LOCK_RELEASED: Constraint = Constraint::Lock(LockConstraint::Released);
    /// `Disposable.Disposed`
    pub const DISPOSED: Constraint = Constraint::Disposable(DisposableConstraint::Disposed);

    /// Converts a Rust `bool` into a Bool constraint.
    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        Constraint::Bool(BoolConstraint::from_bool(value))
    }

    /// Creates a numeric range constraint; `None` when both bounds are unbounded.
    #[must_use]
    pub fn number(min: Option<i128>, max: Option<i128>) -> Option<Self> {
        NumberConstraint::from(min, max).map(Constraint::Number)
    }

    /// Returns the domain of this constraint.
    #[must_use]
    pub const fn domain(&self) -> ConstraintDomain {
        match self {
            Constraint::Bool(_) => ConstraintDomain::Bool,
            Constraint::Object(_) => ConstraintDomain::Object,
            Constraint::Number(_) => ConstraintDomain::Number,
            Constraint::Collection(_) => ConstraintDomain::Collection,
            Constraint::Lock(_) => ConstraintDomain::Lock,
            Constraint::Disposable(_) => ConstraintDomain::Disposable,
            Constraint::Custom(custom) => ConstraintDomain::Custom(custom.domain),
        }
    }

    /// Returns the constraint to learn on the other side of a branch.
    ///
    /// With `use_opposite == false` the constraint itself is returned. Otherwise the
    /// member that holds exactly when this one does not is returned, or `None` when the
    /// domain cannot name it (`NotNull`, ranges, `Disposed`, single-member custom
    /// domains).
    #[must_use]
    pub fn apply_opposite(self, use_opposite: bool) -> Option<Constraint> {
        if !use_opposite {
            return Some(self);
        }
        match self {
            Constraint::Bool(value) => Some(Constraint::from_bool(!value.as_bool())),
            Constraint::Object(ObjectConstraint::Null) => Some(Constraint::NOT_NULL),
            Constraint::Object(ObjectConstraint::NotNull)
            | Constraint::Number(_)
            | Constraint::Disposable(_) => None,
            Constraint::Collection(CollectionConstraint::Empty) => Some(Constraint::NOT_EMPTY),
            Constraint::Collection(CollectionConstraint::NotEmpty) => Some(Constraint::EMPTY),
            Constraint::Lock(LockConstraint::Held) => Some(Constraint::LOCK_RELEASED),
            Constraint::Lock(LockConstraint::Released) => Some(Constraint::LOCK_HELD),
            Constraint::Custom(custom) => custom.opposite.map(|name| {
                Constraint::Custom(CustomConstraint {
                    domain: custom.domain,
                    name,
                    opposite: Some(custom.name),
                })
            }),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Bool(value) => write!(f, "{value}"),
            Constraint::Object(value) => write!(f, "{value}"),
            Constraint::Number(value) => write!(f, "{value}"),
            Constraint::Collection(value) => write!(f, "{value}"),
            Constraint::Lock(LockConstraint::Held) => f.write_str("LockHeld"),
            Constraint::Lock(LockConstraint::Released) => f.write_str("LockReleased"),
            Constraint::Disposable(value) => write!(f, "{value}"),
            Constraint::Custom(custom) => f.write_str(custom.name),
        }
    }
}

impl From<BoolConstraint> for Constraint {
    fn from(value: BoolConstraint) -> Self {
        Constraint::Bool(value)
    }
}

impl From<ObjectConstraint> for Constraint {
    fn from(value: ObjectConstraint) -> Self {
        Constraint::Object(value)
    }
}

impl From<NumberConstraint> for Constraint {
    fn from(value: NumberConstraint) -> Self {
        Constraint::Number(value)
    }
}

impl From<CustomConstraint> for Constraint {
    fn from(value: CustomConstraint) -> Self {
        Constraint::Custom(value)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::analysis::symbolic::SymbolicValue;

    const FIRST: CustomConstraint = CustomConstraint::new("Dummy", "First").with_opposite("Second");

    #[test]
    fn test_bool_opposite_is_involution() {
        for member in BoolConstraint::iter() {
            let constraint = Constraint::Bool(member);
            let opposite = constraint.apply_opposite(true).unwrap();
            assert_ne!(opposite, constraint);
            assert_eq!(opposite.apply_opposite(true), Some(constraint));
            assert_eq!(constraint.apply_opposite(false), Some(constraint));
        }
    }

    #[test]
    fn test_lossy_opposites() {
        assert_eq!(Constraint::NOT_NULL.apply_opposite(true), None);
        assert_eq!(Constraint::DISPOSED.apply_opposite(true), None);
        assert_eq!(
            Constraint::number(Some(0), Some(1)).unwrap().apply_opposite(true),
            None
        );
        assert_eq!(Constraint::EMPTY.apply_opposite(true), Some(Constraint::NOT_EMPTY));
        assert_eq!(
            Constraint::LOCK_HELD.apply_opposite(true),
            Some(Constraint::LOCK_RELEASED)
        );
    }

    #[test]
    fn test_custom_domain() {
        let first = Constraint::Custom(FIRST);
        let second = first.apply_opposite(true).unwrap();
        assert_eq!(first.domain(), ConstraintDomain::Custom("Dummy"));
        assert_eq!(second.domain(), first.domain());
        assert_eq!(second.to_string(), "Second");
        assert_eq!(second.apply_opposite(true), Some(first));
        assert_eq!(
            Constraint::Custom(CustomConstraint::new("Other", "Only")).apply_opposite(true),
            None
        );
    }

    #[test]
    fn test_custom_identity_ignores_opposite() {
        let plain = Constraint::Custom(CustomConstraint::new("Dummy", "First"));
        let flipped_back = Constraint::Custom(FIRST)
            .apply_opposite(true)
            .and_then(|second| second.apply_opposite(true))
            .unwrap();
        assert_eq!(flipped_back, plain);
        assert_eq!(
            Constraint::Custom(CustomConstraint::new("Dummy", "Second").with_opposite("First"))
                .apply_opposite(true),
            Some(plain)
        );
        assert_ne!(plain, Constraint::Custom(CustomConstraint::new("Dummy", "Second")));

        let value = SymbolicValue::empty().with_constraint(flipped_back);
        assert!(value.has_constraint(plain));
    }

    #[test]
    fn test_display() {
        assert_eq!(Constraint::TRUE.to_string(), "True");
        assert_eq!(Constraint::NOT_NULL.to_string(), "NotNull");
        assert_eq!(Constraint::LOCK_HELD.to_string(), "LockHeld");
        assert_eq!(ConstraintDomain::Custom("Dummy").to_string(), "Dummy");
    }
}
