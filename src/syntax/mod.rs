//! Structured method bodies and their lowering into control flow graphs.
//!
//! The engine consumes control flow graphs the way a compiler front-end produces
//! them. This module is a small front-end of that kind: [`Statement`] and
//! [`Expression`] describe a C#-like body, and the [`Lowerer`] turns it into an
//! [`OperationTree`](crate::operation::OperationTree) plus a region-annotated
//! [`ControlFlowGraph`](crate::analysis::cfg::ControlFlowGraph):
//!
//! - `&&`, `||`, `??` and `?:` become branches, with flow captures carrying values
//!   across blocks
//! - `lock` and `using` become try/finally regions calling `Monitor.Enter` /
//!   `Monitor.Exit` and `Dispose`
//! - `{ }` scopes, `for` loops and statements holding flow captures become
//!   local-lifetime regions
//! - lambdas and local functions get graphs of their own
//!
//! # Examples
//!
//! ```rust
//! use symscope::syntax::{Expression, Lowerer, Statement};
//!
//! let cfg = Lowerer::new().local_int("i").lower(&[
//!     Statement::assign("i", Expression::int(0)),
//!     Statement::While {
//!         condition: Expression::less_than(Expression::local("i"), Expression::int(10)),
//!         body: vec![Statement::expression(Expression::increment(Expression::local("i")))],
//!     },
//! ])?;
//!
//! assert!(cfg.block_count() > 3);
//! # Ok::<(), symscope::Error>(())
//! ```

mod lower;

pub use lower::Lowerer;

use std::{fmt, sync::Arc};

use crate::operation::{ArgumentFlags, BinaryOperator, LiteralValue, TypeKind, UnaryOperator};

/// An expression of a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// A constant.
    Literal(LiteralValue),
    /// A local, parameter, or member of the current type, by name.
    Name(Arc<str>),
    /// `this`
    This,
    /// `instance.name`: a field or property of another object.
    Member {
        /// The receiver.
        instance: Box<Expression>,
        /// Member name.
        name: Arc<str>,
    },
    /// `array[indices]`
    ElementAccess {
        /// The array.
        array: Box<Expression>,
        /// Index expressions.
        indices: Vec<Expression>,
    },
    /// `target = value`
    Assign {
        /// Assigned reference.
        target: Box<Expression>,
        /// Assigned value.
        value: Box<Expression>,
    },
    /// `target op= value`
    CompoundAssign {
        /// Arithmetic operator.
        operator: BinaryOperator,
        /// Assigned reference.
        target: Box<Expression>,
        /// Right operand.
        value: Box<Expression>,
    },
    /// `++target`, `target--` and friends.
    Increment {
        /// Assigned reference.
        target: Box<Expression>,
        /// `true` for `--`.
        is_decrement: bool,
        /// `true` for the postfix forms.
        is_postfix: bool,
    },
    /// Binary operator without short-circuit.
    Binary {
        /// The operator.
        operator: BinaryOperator,
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
    },
    /// Unary operator.
    Unary {
        /// The operator.
        operator: UnaryOperator,
        /// Operand.
        operand: Box<Expression>,
    },
    /// `left && right`
    LogicalAnd(Box<Expression>, Box<Expression>),
    /// `left || right`
    LogicalOr(Box<Expression>, Box<Expression>),
    /// `left ?? right`
    Coalesce(Box<Expression>, Box<Expression>),
    /// `condition ? when_true : when_false`
    Conditional {
        /// The condition.
        condition: Box<Expression>,
        /// Value when the condition holds.
        when_true: Box<Expression>,
        /// Value otherwise.
        when_false: Box<Expression>,
    },
    /// `operand is null`
    IsNull(Box<Expression>),
    /// `operand is Type`
    IsType {
        /// Tested value.
        operand: Box<Expression>,
        /// Tested type.
        type_name: Arc<str>,
        /// `true` when every non-null value of the operand's type matches.
        matches_any_non_null: bool,
    },
    /// `(Type)operand`
    Conversion {
        /// Converted value.
        operand: Box<Expression>,
        /// Target type name.
        type_name: Arc<str>,
        /// Kind of the target type.
        ty: TypeKind,
        /// `true` for user-defined conversion operators.
        user_defined: bool,
    },
    /// `instance.method(arguments)`, or a static or local function call when
    /// `instance` is `None`.
    Call {
        /// Receiver.
        instance: Option<Box<Expression>>,
        /// Method name.
        method: Arc<str>,
        /// Arguments.
        arguments: Vec<Argument>,
    },
    /// `new Type(arguments) { initializer }`
    New {
        /// Created type.
        type_name: Arc<str>,
        /// Constructor arguments.
        arguments: Vec<Argument>,
        /// Collection or object initializer elements.
        initializer: Vec<Expression>,
        /// `true` for collection types.
        is_collection: bool,
    },
    /// `new T[dimensions] { initializer }`
    NewArray {
        /// Dimension sizes.
        dimensions: Vec<Expression>,
        /// Initializer elements.
        initializer: Vec<Expression>,
    },
    /// `(parameters) => { body }`
    Lambda {
        /// Parameters.
        parameters: Vec<Parameter>,
        /// Body.
        body: Vec<Statement>,
    },
}

/// An argument of a call or object creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    /// Passed value.
    pub value: Expression,
    /// Passing mode.
    pub flags: ArgumentFlags,
}

impl Argument {
    /// A by-value argument.
    #[must_use]
    pub fn value(value: Expression) -> Self {
        Argument {
            value,
            flags: ArgumentFlags::empty(),
        }
    }

    /// A `ref` argument.
    #[must_use]
    pub fn by_ref(value: Expression) -> Self {
        Argument {
            value,
            flags: ArgumentFlags::REF,
        }
    }

    /// An `out` argument.
    #[must_use]
    pub fn out(value: Expression) -> Self {
        Argument {
            value,
            flags: ArgumentFlags::OUT,
        }
    }

    /// Returns this argument with `flags` added.
    #[must_use]
    pub fn with_flags(mut self, flags: ArgumentFlags) -> Self {
        self.flags |= flags;
        self
    }
}

/// A parameter of a lambda or local function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Name.
    pub name: Arc<str>,
    /// Type kind.
    pub ty: TypeKind,
}

impl Parameter {
    /// Creates a parameter.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, ty: TypeKind) -> Self {
        Parameter {
            name: name.into(),
            ty,
        }
    }
}

/// A `catch` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchClause {
    /// Caught type, `None` catches everything.
    pub type_name: Option<Arc<str>>,
    /// Name of the exception variable.
    pub variable: Option<Arc<str>>,
    /// Handler body.
    pub body: Vec<Statement>,
}

impl CatchClause {
    /// `catch { body }`
    #[must_use]
    pub fn all(body: Vec<Statement>) -> Self {
        CatchClause {
            type_name: None,
            variable: None,
            body,
        }
    }

    /// `catch (Type) { body }`
    #[must_use]
    pub fn of(type_name: impl Into<Arc<str>>, body: Vec<Statement>) -> Self {
        CatchClause {
            type_name: Some(type_name.into()),
            variable: None,
            body,
        }
    }

    /// Names the exception variable.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<Arc<str>>) -> Self {
        self.variable = Some(name.into());
        self
    }
}

/// A statement of a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// An expression evaluated for its effects.
    Expression(Expression),
    /// `Type name = value;` declaring a local of the enclosing scope.
    Declare {
        /// Local name.
        name: Arc<str>,
        /// Type kind of the local.
        ty: TypeKind,
        /// Initial value.
        value: Option<Expression>,
    },
    /// `{ statements }`, a scope of its own.
    Block(Vec<Statement>),
    /// `if (condition) then else otherwise`
    If {
        /// The condition.
        condition: Expression,
        /// Statements when the condition holds.
        then: Vec<Statement>,
        /// Statements otherwise.
        otherwise: Vec<Statement>,
    },
    /// `while (condition) body`
    While {
        /// The condition.
        condition: Expression,
        /// Loop body.
        body: Vec<Statement>,
    },
    /// `do body while (condition);`
    DoWhile {
        /// Loop body.
        body: Vec<Statement>,
        /// The condition.
        condition: Expression,
    },
    /// `for (initializer; condition; step) body`
    For {
        /// Initializer statements, scoped to the loop.
        initializer: Vec<Statement>,
        /// The condition, `None` loops forever.
        condition: Option<Expression>,
        /// Step expressions.
        step: Vec<Expression>,
        /// Loop body.
        body: Vec<Statement>,
    },
    /// `return value;`
    Return(Option<Expression>),
    /// `throw value;`, or `throw;` inside a catch clause when `None`.
    Throw(Option<Expression>),
    /// `try { body } catch ... finally { }`
    Try {
        /// Protected statements.
        body: Vec<Statement>,
        /// Catch clauses in order.
        catches: Vec<CatchClause>,
        /// Finally statements.
        finally: Option<Vec<Statement>>,
    },
    /// `lock (target) { body }`
    Lock {
        /// Locked object.
        target: Expression,
        /// Guarded statements.
        body: Vec<Statement>,
    },
    /// `using (var variable = resource) { body }`
    Using {
        /// Name of the declared resource local, if any.
        variable: Option<Arc<str>>,
        /// The resource.
        resource: Expression,
        /// Guarded statements.
        body: Vec<Statement>,
    },
    /// `break;`
    Break,
    /// `continue;`
    Continue,
    /// A call that never returns, such as `Environment.FailFast`.
    Terminate,
    /// A local function declaration.
    LocalFunction {
        /// Function name.
        name: Arc<str>,
        /// Parameters.
        parameters: Vec<Parameter>,
        /// Body.
        body: Vec<Statement>,
    },
}

impl Expression {
    /// `null`
    #[must_use]
    pub fn null() -> Self {
        Expression::Literal(LiteralValue::Null)
    }

    /// `true` or `false`
    #[must_use]
    pub fn bool(value: bool) -> Self {
        Expression::Literal(LiteralValue::Bool(value))
    }

    /// An integer constant.
    #[must_use]
    pub fn int(value: i128) -> Self {
        Expression::Literal(LiteralValue::Integer(value))
    }

    /// A string constant.
    #[must_use]
    pub fn string(value: impl Into<Arc<str>>) -> Self {
        Expression::Literal(LiteralValue::String(value.into()))
    }

    /// A reference by name.
    #[must_use]
    pub fn name(name: impl Into<Arc<str>>) -> Self {
        Expression::Name(name.into())
    }

    /// A local by name.
    #[must_use]
    pub fn local(name: impl Into<Arc<str>>) -> Self {
        Expression::name(name)
    }

    /// A parameter by name.
    #[must_use]
    pub fn parameter(name: impl Into<Arc<str>>) -> Self {
        Expression::name(name)
    }

    /// `instance.name`
    #[must_use]
    pub fn member(instance: Expression, name: impl Into<Arc<str>>) -> Self {
        Expression::Member {
            instance: Box::new(instance),
            name: name.into(),
        }
    }

    /// `array[index]`
    #[must_use]
    pub fn element(array: Expression, index: Expression) -> Self {
        Expression::ElementAccess {
            array: Box::new(array),
            indices: vec![index],
        }
    }

    /// `target = value`
    #[must_use]
    pub fn assign(target: Expression, value: Expression) -> Self {
        Expression::Assign {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    /// `target op= value`
    #[must_use]
    pub fn compound(operator: BinaryOperator, target: Expression, value: Expression) -> Self {
        Expression::CompoundAssign {
            operator,
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    /// `target++`
    #[must_use]
    pub fn increment(target: Expression) -> Self {
        Expression::Increment {
            target: Box::new(target),
            is_decrement: false,
            is_postfix: true,
        }
    }

    /// `target--`
    #[must_use]
    pub fn decrement(target: Expression) -> Self {
        Expression::Increment {
            target: Box::new(target),
            is_decrement: true,
            is_postfix: true,
        }
    }

    /// A binary operator application.
    #[must_use]
    pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `left == right`
    #[must_use]
    pub fn equals(left: Expression, right: Expression) -> Self {
        Expression::binary(BinaryOperator::Equals, left, right)
    }

    /// `left != right`
    #[must_use]
    pub fn not_equals(left: Expression, right: Expression) -> Self {
        Expression::binary(BinaryOperator::NotEquals, left, right)
    }

    /// `left < right`
    #[must_use]
    pub fn less_than(left: Expression, right: Expression) -> Self {
        Expression::binary(BinaryOperator::LessThan, left, right)
    }

    /// `left > right`
    #[must_use]
    pub fn greater_than(left: Expression, right: Expression) -> Self {
        Expression::binary(BinaryOperator::GreaterThan, left, right)
    }

    /// `left + right`
    #[must_use]
    pub fn add(left: Expression, right: Expression) -> Self {
        Expression::binary(BinaryOperator::Add, left, right)
    }

    /// `!operand`
    #[must_use]
    pub fn not(operand: Expression) -> Self {
        Expression::Unary {
            operator: UnaryOperator::Not,
            operand: Box::new(operand),
        }
    }

    /// `-operand`
    #[must_use]
    pub fn negate(operand: Expression) -> Self {
        Expression::Unary {
            operator: UnaryOperator::Minus,
            operand: Box::new(operand),
        }
    }

    /// `left && right`
    #[must_use]
    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::LogicalAnd(Box::new(left), Box::new(right))
    }

    /// `left || right`
    #[must_use]
    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::LogicalOr(Box::new(left), Box::new(right))
    }

    /// `left ?? right`
    #[must_use]
    pub fn coalesce(left: Expression, right: Expression) -> Self {
        Expression::Coalesce(Box::new(left), Box::new(right))
    }

    /// `condition ? when_true : when_false`
    #[must_use]
    pub fn conditional(condition: Expression, when_true: Expression, when_false: Expression) -> Self {
        Expression::Conditional {
            condition: Box::new(condition),
            when_true: Box::new(when_true),
            when_false: Box::new(when_false),
        }
    }

    /// `operand is null`
    #[must_use]
    pub fn is_null(operand: Expression) -> Self {
        Expression::IsNull(Box::new(operand))
    }

    /// `operand is Type`
    #[must_use]
    pub fn is_type(operand: Expression, type_name: impl Into<Arc<str>>, matches_any_non_null: bool) -> Self {
        Expression::IsType {
            operand: Box::new(operand),
            type_name: type_name.into(),
            matches_any_non_null,
        }
    }

    /// A built-in conversion to a type of kind `ty`.
    #[must_use]
    pub fn convert(operand: Expression, type_name: impl Into<Arc<str>>, ty: TypeKind) -> Self {
        Expression::Conversion {
            operand: Box::new(operand),
            type_name: type_name.into(),
            ty,
            user_defined: false,
        }
    }

    /// A static or local function call with by-value arguments.
    #[must_use]
    pub fn call(method: impl Into<Arc<str>>, arguments: Vec<Expression>) -> Self {
        Expression::Call {
            instance: None,
            method: method.into(),
            arguments: arguments.into_iter().map(Argument::value).collect(),
        }
    }

    /// An instance call with by-value arguments.
    #[must_use]
    pub fn call_on(instance: Expression, method: impl Into<Arc<str>>, arguments: Vec<Expression>) -> Self {
        Expression::Call {
            instance: Some(Box::new(instance)),
            method: method.into(),
            arguments: arguments.into_iter().map(Argument::value).collect(),
        }
    }

    /// `new Type()`
    #[must_use]
    pub fn new_object(type_name: impl Into<Arc<str>>) -> Self {
        Expression::New {
            type_name: type_name.into(),
            arguments: Vec::new(),
            initializer: Vec::new(),
            is_collection: false,
        }
    }

    /// `new Collection<T> { initializer }`
    #[must_use]
    pub fn new_collection(type_name: impl Into<Arc<str>>, initializer: Vec<Expression>) -> Self {
        Expression::New {
            type_name: type_name.into(),
            arguments: Vec::new(),
            initializer,
            is_collection: true,
        }
    }

    /// `(parameters) => { body }`
    #[must_use]
    pub fn lambda(parameters: Vec<Parameter>, body: Vec<Statement>) -> Self {
        Expression::Lambda { parameters, body }
    }

    /// Returns the direct subexpressions, not entering lambda bodies.
    #[must_use]
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Literal(_) | Expression::Name(_) | Expression::This | Expression::Lambda { .. } => {
                Vec::new()
            }
            Expression::Member { instance, .. } => vec![instance],
            Expression::ElementAccess { array, indices } => {
                std::iter::once(&**array).chain(indices.iter()).collect()
            }
            Expression::Assign { target, value } | Expression::CompoundAssign { target, value, .. } => {
                vec![target, value]
            }
            Expression::Increment { target, .. } => vec![target],
            Expression::Binary { left, right, .. }
            | Expression::LogicalAnd(left, right)
            | Expression::LogicalOr(left, right)
            | Expression::Coalesce(left, right) => vec![left, right],
            Expression::Unary { operand, .. }
            | Expression::IsNull(operand)
            | Expression::IsType { operand, .. }
            | Expression::Conversion { operand, .. } => vec![operand],
            Expression::Conditional {
                condition,
                when_true,
                when_false,
            } => vec![condition, when_true, when_false],
            Expression::Call {
                instance, arguments, ..
            } => instance
                .iter()
                .map(|instance| &**instance)
                .chain(arguments.iter().map(|argument| &argument.value))
                .collect(),
            Expression::New {
                arguments,
                initializer,
                ..
            } => arguments
                .iter()
                .map(|argument| &argument.value)
                .chain(initializer.iter())
                .collect(),
            Expression::NewArray {
                dimensions,
                initializer,
            } => dimensions.iter().chain(initializer.iter()).collect(),
        }
    }

    /// Returns `true` if lowering the expression introduces branches.
    #[must_use]
    pub fn has_control_flow(&self) -> bool {
        matches!(
            self,
            Expression::LogicalAnd(..)
                | Expression::LogicalOr(..)
                | Expression::Coalesce(..)
                | Expression::Conditional { .. }
        ) || self.children().into_iter().any(Expression::has_control_flow)
    }
}

impl Statement {
    /// An expression statement.
    #[must_use]
    pub fn expression(expression: Expression) -> Self {
        Statement::Expression(expression)
    }

    /// `name = value;`
    #[must_use]
    pub fn assign(name: impl Into<Arc<str>>, value: Expression) -> Self {
        Statement::Expression(Expression::assign(Expression::name(name), value))
    }

    /// `Type name = value;`
    #[must_use]
    pub fn declare(name: impl Into<Arc<str>>, ty: TypeKind, value: Option<Expression>) -> Self {
        Statement::Declare {
            name: name.into(),
            ty,
            value,
        }
    }

    /// `Tag("name", value);`, the marker call recorded by
    /// [`StateRecorder`](crate::analysis::symbolic::checks::StateRecorder).
    #[must_use]
    pub fn tag(name: impl Into<Arc<str>>, value: Option<Expression>) -> Self {
        Statement::marker("Tag", name, value)
    }

    /// `method("name", value);` for a marker method of another name.
    #[must_use]
    pub fn marker(
        method: impl Into<Arc<str>>,
        name: impl Into<Arc<str>>,
        value: Option<Expression>,
    ) -> Self {
        let arguments = std::iter::once(Expression::string(name)).chain(value).collect();
        Statement::Expression(Expression::call(method, arguments))
    }

    /// `try { body } finally { finally }`
    #[must_use]
    pub fn try_finally(body: Vec<Statement>, finally: Vec<Statement>) -> Self {
        Statement::Try {
            body,
            catches: Vec::new(),
            finally: Some(finally),
        }
    }

    /// `try { body } catch ...`
    #[must_use]
    pub fn try_catch(body: Vec<Statement>, catches: Vec<CatchClause>) -> Self {
        Statement::Try {
            body,
            catches,
            finally: None,
        }
    }
}

fn binary_text(operator: BinaryOperator) -> &'static str {
    match operator {
        BinaryOperator::Add => "+",
        BinaryOperator::Subtract => "-",
        BinaryOperator::Multiply => "*",
        BinaryOperator::Divide => "/",
        BinaryOperator::Remainder => "%",
        BinaryOperator::And => "&",
        BinaryOperator::Or => "|",
        BinaryOperator::ExclusiveOr => "^",
        BinaryOperator::Equals => "==",
        BinaryOperator::NotEquals => "!=",
        BinaryOperator::LessThan => "<",
        BinaryOperator::LessThanOrEqual => "<=",
        BinaryOperator::GreaterThan => ">",
        BinaryOperator::GreaterThanOrEqual => ">=",
    }
}

fn unary_text(operator: UnaryOperator) -> &'static str {
    match operator {
        UnaryOperator::Not => "!",
        UnaryOperator::Minus => "-",
        UnaryOperator::Plus => "+",
        UnaryOperator::BitwiseNegation => "~",
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flags.contains(ArgumentFlags::REF) {
            f.write_str("ref ")?;
        } else if self.flags.contains(ArgumentFlags::OUT) {
            f.write_str("out ")?;
        }
        write!(f, "{}", self.value)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Renders the expression as C# source text.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(LiteralValue::Null) => f.write_str("null"),
            Expression::Literal(LiteralValue::Bool(value)) => write!(f, "{value}"),
            Expression::Literal(LiteralValue::Integer(value)) => write!(f, "{value}"),
            Expression::Literal(LiteralValue::String(value)) => write!(f, "\"{value}\""),
            Expression::Name(name) => f.write_str(name),
            Expression::This => f.write_str("this"),
            Expression::Member { instance, name } => write!(f, "{instance}.{name}"),
            Expression::ElementAccess { array, indices } => {
                write!(f, "{array}[")?;
                write_list(f, indices)?;
                f.write_str("]")
            }
            Expression::Assign { target, value } => write!(f, "{target} = {value}"),
            Expression::CompoundAssign {
                operator,
                target,
                value,
            } => write!(f, "{target} {}= {value}", binary_text(*operator)),
            Expression::Increment {
                target,
                is_decrement,
                is_postfix,
            } => {
                let symbol = if *is_decrement { "--" } else { "++" };
                if *is_postfix {
                    write!(f, "{target}{symbol}")
                } else {
                    write!(f, "{symbol}{target}")
                }
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => write!(f, "{left} {} {right}", binary_text(*operator)),
            Expression::Unary { operator, operand } => write!(f, "{}{operand}", unary_text(*operator)),
            Expression::LogicalAnd(left, right) => write!(f, "{left} && {right}"),
            Expression::LogicalOr(left, right) => write!(f, "{left} || {right}"),
            Expression::Coalesce(left, right) => write!(f, "{left} ?? {right}"),
            Expression::Conditional {
                condition,
                when_true,
                when_false,
            } => write!(f, "{condition} ? {when_true} : {when_false}"),
            Expression::IsNull(operand) => write!(f, "{operand} is null"),
            Expression::IsType {
                operand, type_name, ..
            } => write!(f, "{operand} is {type_name}"),
            Expression::Conversion {
                operand, type_name, ..
            } => write!(f, "({type_name}){operand}"),
            Expression::Call {
                instance,
                method,
                arguments,
            } => {
                if let Some(instance) = instance {
                    write!(f, "{instance}.")?;
                }
                write!(f, "{method}(")?;
                write_list(f, arguments)?;
                f.write_str(")")
            }
            Expression::New {
                type_name,
                arguments,
                initializer,
                ..
            } => {
                write!(f, "new {type_name}(")?;
                write_list(f, arguments)?;
                f.write_str(")")?;
                if !initializer.is_empty() {
                    f.write_str(" { ")?;
                    write_list(f, initializer)?;
                    f.write_str(" }")?;
                }
                Ok(())
            }
            Expression::NewArray {
                dimensions,
                initializer,
            } => {
                f.write_str("new[")?;
                write_list(f, dimensions)?;
                f.write_str("]")?;
                if !initializer.is_empty() {
                    f.write_str(" { ")?;
                    write_list(f, initializer)?;
                    f.write_str(" }")?;
                }
                Ok(())
            }
            Expression::Lambda { parameters, .. } => {
                f.write_str("(")?;
                write_list(f, parameters)?;
                f.write_str(") => { ... }")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_text() {
        let call = Expression::call_on(
            Expression::local("o"),
            "Equals",
            vec![Expression::add(Expression::int(1), Expression::local("i"))],
        );
        assert_eq!(call.to_string(), "o.Equals(1 + i)");
        assert_eq!(
            Expression::coalesce(Expression::local("a"), Expression::string("b")).to_string(),
            "a ?? \"b\""
        );
        let argument = Argument::by_ref(Expression::local("x"));
        assert_eq!(argument.to_string(), "ref x");
    }

    #[test]
    fn test_control_flow_detection() {
        let plain = Expression::equals(Expression::local("a"), Expression::null());
        assert!(!plain.has_control_flow());

        let nested = Expression::assign(
            Expression::local("b"),
            Expression::not(Expression::and(Expression::local("x"), Expression::local("y"))),
        );
        assert!(nested.has_control_flow());

        let lambda = Expression::lambda(
            vec![],
            vec![Statement::expression(Expression::or(Expression::bool(true), Expression::bool(false)))],
        );
        assert!(!lambda.has_control_flow());
    }

    #[test]
    fn test_marker_statement() {
        let Statement::Expression(Expression::Call {
            instance,
            method,
            arguments,
        }) = Statement::tag("Here", Some(Expression::local("x")))
        else {
            panic!("expected a call");
        };
        assert!(instance.is_none());
        assert_eq!(&*method, "Tag");
        assert_eq!(arguments.len(), 2);
        assert_eq!(arguments[0].value, Expression::string("Here"));
    }
}
