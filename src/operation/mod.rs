//! Operation trees produced by the host compiler.
//!
//! An [`OperationTree`] is an arena of [`Operation`]s addressed by [`OperationId`].
//! Each operation has a kind with typed child references, an optional parent, the
//! [`TypeKind`] of the value it produces and an optional snippet of source text used in
//! diagnostics. Control flow constructs do not appear here: loops, branches, `try` and
//! `return` are expressed by the blocks and branches of the
//! [`ControlFlowGraph`](crate::analysis::cfg::ControlFlowGraph) that references these
//! operations.
//!
//! # Key Components
//!
//! - [`OperationTree`] - arena with parent links and execution-order traversal
//! - [`OperationKind`] - the closed set of operation shapes the engine understands
//! - [`SymbolTable`] - symbols referenced by the operations
//! - [`tracked_symbol`] - which operations denote a symbol the engine follows

mod symbol;
mod tracked;

pub use symbol::{Symbol, SymbolFlags, SymbolId, SymbolKind, SymbolTable, WellKnownMethod};
pub use tracked::tracked_symbol;

use std::{fmt, sync::Arc};

use bitflags::bitflags;
use strum::{AsRefStr, Display, EnumIter};

use crate::Result;

/// Identity of an operation within one [`OperationTree`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId(pub(crate) u32);

impl OperationId {
    /// Creates an operation identifier from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        OperationId(index)
    }

    /// Returns the raw index into the owning tree.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperationId({})", self.0)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a compiler-introduced flow capture.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct CaptureId(pub u32);

impl fmt::Display for CaptureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capture{}", self.0)
    }
}

/// Identity of a compilation (the host's semantic model).
///
/// Two syntactically identical method bodies in different compilations have
/// different symbol identities, so everything cached per operation tree is keyed by
/// this as well.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct CompilationId(pub u64);

/// Identity of a body (method, accessor, lambda) within its compilation.
///
/// Operation identifiers restart at zero in every tree, so they cannot tell two bodies
/// apart; hosts hand out one of these per declaring member instead.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct BodyId(pub u64);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body{}", self.0)
    }
}

/// Coarse classification of a value's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, AsRefStr, EnumIter)]
pub enum TypeKind {
    /// The type is not known.
    #[default]
    Unknown,
    /// A reference type such as a class, interface, delegate or string.
    Reference,
    /// A non-nullable value type such as `int` or `bool`.
    Value,
    /// `Nullable<T>` over a value type.
    NullableValue,
}

impl TypeKind {
    /// Returns `true` if a value of this type can be `null`.
    #[must_use]
    pub const fn can_be_null(self) -> bool {
        !matches!(self, TypeKind::Value)
    }
}

/// A compile-time constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    /// `null`
    Null,
    /// `true` or `false`
    Bool(bool),
    /// An integral constant.
    Integer(i128),
    /// A string constant.
    String(Arc<str>),
}

/// Binary operators that survive lowering.
///
/// Short-circuiting `&&`, `||` and `??` never appear here: they are lowered into
/// branches and flow captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
pub enum BinaryOperator {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Remainder,
    /// `&`
    And,
    /// `|`
    Or,
    /// `^`
    ExclusiveOr,
    /// `==`
    Equals,
    /// `!=`
    NotEquals,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
}

impl BinaryOperator {
    /// Returns `true` for `==` and `!=`.
    #[must_use]
    pub const fn is_equality(self) -> bool {
        matches!(self, BinaryOperator::Equals | BinaryOperator::NotEquals)
    }

    /// Returns `true` for `<`, `<=`, `>` and `>=`.
    #[must_use]
    pub const fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOperator::LessThan
                | BinaryOperator::LessThanOrEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanOrEqual
        )
    }

    /// Returns the operator that holds exactly when `self` does not.
    #[must_use]
    pub const fn negate(self) -> Option<Self> {
        match self {
            BinaryOperator::Equals => Some(BinaryOperator::NotEquals),
            BinaryOperator::NotEquals => Some(BinaryOperator::Equals),
            BinaryOperator::LessThan => Some(BinaryOperator::GreaterThanOrEqual),
            BinaryOperator::LessThanOrEqual => Some(BinaryOperator::GreaterThan),
            BinaryOperator::GreaterThan => Some(BinaryOperator::LessThanOrEqual),
            BinaryOperator::GreaterThanOrEqual => Some(BinaryOperator::LessThan),
            _ => None,
        }
    }

    /// Returns the operator with its operands swapped (`a < b` is `b > a`).
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            BinaryOperator::LessThan => BinaryOperator::GreaterThan,
            BinaryOperator::LessThanOrEqual => BinaryOperator::GreaterThanOrEqual,
            BinaryOperator::GreaterThan => BinaryOperator::LessThan,
            BinaryOperator::GreaterThanOrEqual => BinaryOperator::LessThanOrEqual,
            other => other,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
pub enum UnaryOperator {
    /// `!`
    Not,
    /// `-`
    Minus,
    /// `+`
    Plus,
    /// `~`
    BitwiseNegation,
}

bitflags! {
    /// How an argument is passed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ArgumentFlags: u8 {
        /// `ref` argument: the callee may overwrite the variable.
        const REF = 0x01;
        /// `out` argument: the callee always overwrites the variable.
        const OUT = 0x02;
        /// `in` argument: passed by read-only reference.
        const IN = 0x04;
        /// The parameter is annotated `[NotNull]` or `[ValidatedNotNull]`: the value is
        /// known to be non-null once the call returns.
        const NOT_NULL = 0x08;
    }
}

/// The shape of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    /// A constant.
    Literal(LiteralValue),
    /// Read or write of a local variable.
    LocalReference(SymbolId),
    /// Read or write of a parameter.
    ParameterReference(SymbolId),
    /// `this` / `Me`.
    InstanceReference,
    /// Field access. `instance` is `None` for static fields.
    FieldReference {
        /// The field.
        field: SymbolId,
        /// The receiver.
        instance: Option<OperationId>,
    },
    /// Property access. `instance` is `None` for static properties.
    PropertyReference {
        /// The property.
        property: SymbolId,
        /// The receiver.
        instance: Option<OperationId>,
    },
    /// Event access.
    EventReference {
        /// The event.
        event: SymbolId,
        /// The receiver.
        instance: Option<OperationId>,
    },
    /// `array[indices]`.
    ArrayElementReference {
        /// The array.
        array: OperationId,
        /// Index expressions.
        indices: Vec<OperationId>,
    },
    /// `target = value`.
    SimpleAssignment {
        /// Written reference.
        target: OperationId,
        /// Assigned value.
        value: OperationId,
    },
    /// `target op= value`.
    CompoundAssignment {
        /// Arithmetic operator.
        operator: BinaryOperator,
        /// Written reference.
        target: OperationId,
        /// Right operand.
        value: OperationId,
    },
    /// `++target`, `target--` and friends.
    Increment {
        /// Written reference.
        target: OperationId,
        /// `true` for `--`.
        is_decrement: bool,
        /// `true` for `target++`, whose result is the old value.
        is_postfix: bool,
    },
    /// Binary operator application.
    Binary {
        /// The operator.
        operator: BinaryOperator,
        /// Left operand.
        left: OperationId,
        /// Right operand.
        right: OperationId,
        /// `true` when the operator resolves to a user-defined method.
        user_defined: bool,
    },
    /// Unary operator application.
    Unary {
        /// The operator.
        operator: UnaryOperator,
        /// Operand.
        operand: OperationId,
        /// `true` when the operator resolves to a user-defined method.
        user_defined: bool,
    },
    /// Implicit or explicit conversion.
    Conversion {
        /// Converted value.
        operand: OperationId,
        /// `true` when the conversion calls a user-defined operator.
        user_defined: bool,
    },
    /// Compiler-generated `operand is null` test.
    IsNull {
        /// Tested value.
        operand: OperationId,
    },
    /// `operand is Type`.
    IsType {
        /// Tested value.
        operand: OperationId,
        /// Name of the tested type.
        type_name: Arc<str>,
        /// `true` when every non-null value of the operand's static type matches.
        matches_any_non_null: bool,
    },
    /// Method invocation.
    Invocation {
        /// Invoked method.
        method: SymbolId,
        /// Receiver, `None` for static calls.
        instance: Option<OperationId>,
        /// Argument operations (each an [`OperationKind::Argument`]).
        arguments: Vec<OperationId>,
    },
    /// A single argument of an invocation or creation.
    Argument {
        /// Passed value.
        value: OperationId,
        /// Passing mode.
        flags: ArgumentFlags,
    },
    /// `new T(arguments) { initializer }`.
    ObjectCreation {
        /// Name of the created type.
        type_name: Arc<str>,
        /// Constructor arguments.
        arguments: Vec<OperationId>,
        /// Collection or object initializer elements.
        initializer: Vec<OperationId>,
        /// `true` when the created type is a collection.
        is_collection: bool,
    },
    /// `new T[dimensions] { initializer }`.
    ArrayCreation {
        /// Dimension sizes.
        dimensions: Vec<OperationId>,
        /// Initializer elements.
        initializer: Vec<OperationId>,
    },
    /// A lambda or anonymous method. Its body is a separate control flow graph.
    AnonymousFunction {
        /// Symbol of the lambda.
        symbol: SymbolId,
    },
    /// Stores `value` into a flow capture.
    FlowCapture {
        /// Target capture.
        capture: CaptureId,
        /// Captured value.
        value: OperationId,
    },
    /// Reads a flow capture.
    FlowCaptureReference {
        /// Source capture.
        capture: CaptureId,
    },
    /// The exception caught by the enclosing catch handler.
    CaughtException,
    /// Root of a method, lambda or local function body.
    MethodBody {
        /// Top-level operations of the body.
        operations: Vec<OperationId>,
    },
    /// Syntax the host could not bind.
    Invalid {
        /// Child operations.
        children: Vec<OperationId>,
    },
    /// Any other operation. The engine passes it through unchanged.
    Other {
        /// Host name of the operation kind.
        name: Arc<str>,
        /// Child operations.
        children: Vec<OperationId>,
    },
}

impl OperationKind {
    /// Returns the direct children in evaluation order.
    #[must_use]
    pub fn children(&self) -> Vec<OperationId> {
        match self {
            OperationKind::Literal(_)
            | OperationKind::LocalReference(_)
            | OperationKind::ParameterReference(_)
            | OperationKind::InstanceReference
            | OperationKind::AnonymousFunction { .. }
            | OperationKind::FlowCaptureReference { .. }
            | OperationKind::CaughtException => Vec::new(),
            OperationKind::FieldReference { instance, .. }
            | OperationKind::PropertyReference { instance, .. }
            | OperationKind::EventReference { instance, .. } => instance.iter().copied().collect(),
            OperationKind::ArrayElementReference { array, indices } => {
                std::iter::once(*array).chain(indices.iter().copied()).collect()
            }
            OperationKind::SimpleAssignment { target, value }
            | OperationKind::CompoundAssignment { target, value, .. } => vec![*target, *value],
            OperationKind::Increment { target, .. } => vec![*target],
            OperationKind::Binary { left, right, .. } => vec![*left, *right],
            OperationKind::Unary { operand, .. }
            | OperationKind::Conversion { operand, .. }
            | OperationKind::IsNull { operand }
            | OperationKind::IsType { operand, .. } => vec![*operand],
            OperationKind::Invocation {
                instance,
                arguments,
                ..
            } => instance.iter().chain(arguments.iter()).copied().collect(),
            OperationKind::Argument { value, .. } | OperationKind::FlowCapture { value, .. } => {
                vec![*value]
            }
            OperationKind::ObjectCreation {
                arguments,
                initializer,
                ..
            } => arguments.iter().chain(initializer.iter()).copied().collect(),
            OperationKind::ArrayCreation {
                dimensions,
                initializer,
            } => dimensions.iter().chain(initializer.iter()).copied().collect(),
            OperationKind::MethodBody { operations } => operations.clone(),
            OperationKind::Invalid { children } | OperationKind::Other { children, .. } => {
                children.clone()
            }
        }
    }

    /// Returns a short name of the operation kind for logs.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            OperationKind::Literal(_) => "Literal",
            OperationKind::LocalReference(_) => "LocalReference",
            OperationKind::ParameterReference(_) => "ParameterReference",
            OperationKind::InstanceReference => "InstanceReference",
            OperationKind::FieldReference { .. } => "FieldReference",
            OperationKind::PropertyReference { .. } => "PropertyReference",
            OperationKind::EventReference { .. } => "EventReference",
            OperationKind::ArrayElementReference { .. } => "ArrayElementReference",
            OperationKind::SimpleAssignment { .. } => "SimpleAssignment",
            OperationKind::CompoundAssignment { .. } => "CompoundAssignment",
            OperationKind::Increment { .. } => "Increment",
            OperationKind::Binary { .. } => "Binary",
            OperationKind::Unary { .. } => "Unary",
            OperationKind::Conversion { .. } => "Conversion",
            OperationKind::IsNull { .. } => "IsNull",
            OperationKind::IsType { .. } => "IsType",
            OperationKind::Invocation { .. } => "Invocation",
            OperationKind::Argument { .. } => "Argument",
            OperationKind::ObjectCreation { .. } => "ObjectCreation",
            OperationKind::ArrayCreation { .. } => "ArrayCreation",
            OperationKind::AnonymousFunction { .. } => "AnonymousFunction",
            OperationKind::FlowCapture { .. } => "FlowCapture",
            OperationKind::FlowCaptureReference { .. } => "FlowCaptureReference",
            OperationKind::CaughtException => "CaughtException",
            OperationKind::MethodBody { .. } => "MethodBody",
            OperationKind::Invalid { .. } => "Invalid",
            OperationKind::Other { name, .. } => name,
        }
    }
}

/// A node of the operation tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Shape and children.
    pub kind: OperationKind,
    /// Type of the produced value.
    pub ty: TypeKind,
    /// Enclosing operation, `None` for roots.
    pub parent: Option<OperationId>,
    /// Source text, for diagnostics.
    pub syntax: Option<Arc<str>>,
}

/// Arena holding every operation of a method body and its nested functions.
#[derive(Debug, Clone, Default)]
pub struct OperationTree {
    operations: Vec<Operation>,
}

impl OperationTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        OperationTree::default()
    }

    /// Adds an operation whose children were added before it.
    ///
    /// The children's parent links are pointed at the new operation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a child does not exist or already has a
    /// parent.
    pub fn add(
        &mut self,
        kind: OperationKind,
        ty: TypeKind,
        syntax: Option<Arc<str>>,
    ) -> Result<OperationId> {
        #[allow(clippy::cast_possible_truncation)]
        let id = OperationId(self.operations.len() as u32);
        let children = kind.children();
        for child in &children {
            match self.operations.get(child.index()) {
                None => {
                    return Err(malformed_error!(
                        "{} operation {} references missing child {}",
                        kind.name(),
                        id,
                        child
                    ))
                }
                Some(existing) if existing.parent.is_some() => {
                    return Err(malformed_error!(
                        "operation {} is already a child of {:?}",
                        child,
                        existing.parent
                    ))
                }
                Some(_) => {}
            }
        }
        for child in children {
            self.operations[child.index()].parent = Some(id);
        }

        self.operations.push(Operation {
            kind,
            ty,
            parent: None,
            syntax,
        });
        Ok(id)
    }

    /// Returns the operation for `id`.
    #[must_use]
    pub fn get(&self, id: OperationId) -> Option<&Operation> {
        self.operations.get(id.index())
    }

    /// Returns the kind of `id`, if the operation exists.
    #[must_use]
    pub fn kind(&self, id: OperationId) -> Option<&OperationKind> {
        self.get(id).map(|operation| &operation.kind)
    }

    /// Returns the number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` if the tree holds no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the operations of the subtree rooted at `root` in execution order.
    ///
    /// Children run before their parent, left to right, which is the order in which
    /// the runtime evaluates them. Nested function bodies are not entered.
    #[must_use]
    pub fn execution_order(&self, root: OperationId) -> Vec<OperationId> {
        let mut order = Vec::new();
        if self.get(root).is_none() {
            return order;
        }

        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            if let Some(operation) = self.get(id) {
                for child in operation.kind.children().into_iter().rev() {
                    stack.push((child, false));
                }
            }
        }
        order
    }

    /// Returns `id` with any enclosing conversions and arguments stripped from its
    /// parent chain, i.e. the first ancestor that is neither.
    #[must_use]
    pub fn consumer(&self, id: OperationId) -> Option<OperationId> {
        let mut parent = self.get(id)?.parent;
        while let Some(current) = parent {
            match self.kind(current) {
                Some(OperationKind::Conversion { .. } | OperationKind::Argument { .. }) => {
                    parent = self.get(current)?.parent;
                }
                _ => return Some(current),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(tree: &mut OperationTree, value: i128) -> OperationId {
        tree.add(
            OperationKind::Literal(LiteralValue::Integer(value)),
            TypeKind::Value,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_execution_order_is_post_order() {
        let mut tree = OperationTree::new();
        let one = literal(&mut tree, 1);
        let two = literal(&mut tree, 2);
        let sum = tree
            .add(
                OperationKind::Binary {
                    operator: BinaryOperator::Add,
                    left: one,
                    right: two,
                    user_defined: false,
                },
                TypeKind::Value,
                Some("1 + 2".into()),
            )
            .unwrap();

        assert_eq!(tree.execution_order(sum), vec![one, two, sum]);
        assert_eq!(tree.get(one).unwrap().parent, Some(sum));
        assert_eq!(tree.get(sum).unwrap().parent, None);
    }

    #[test]
    fn test_add_rejects_missing_child() {
        let mut tree = OperationTree::new();
        let result = tree.add(
            OperationKind::Conversion {
                operand: OperationId::new(3),
                user_defined: false,
            },
            TypeKind::Unknown,
            None,
        );
        assert!(matches!(result, Err(crate::Error::Malformed { .. })));
    }

    #[test]
    fn test_add_rejects_shared_child() {
        let mut tree = OperationTree::new();
        let one = literal(&mut tree, 1);
        tree.add(
            OperationKind::Conversion {
                operand: one,
                user_defined: false,
            },
            TypeKind::Value,
            None,
        )
        .unwrap();
        let second = tree.add(
            OperationKind::Conversion {
                operand: one,
                user_defined: false,
            },
            TypeKind::Value,
            None,
        );
        assert!(second.is_err());
    }

    #[test]
    fn test_operator_negation() {
        assert_eq!(
            BinaryOperator::LessThan.negate(),
            Some(BinaryOperator::GreaterThanOrEqual)
        );
        assert_eq!(BinaryOperator::Add.negate(), None);
        assert_eq!(BinaryOperator::LessThan.flip(), BinaryOperator::GreaterThan);
        assert!(BinaryOperator::NotEquals.is_equality());
        assert!(!TypeKind::Value.can_be_null());
        assert!(TypeKind::NullableValue.can_be_null());
    }
}
