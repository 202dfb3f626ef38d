//! Lowering of structured bodies into control flow graphs.

use std::{collections::HashMap, sync::Arc};

use crate::{
    analysis::cfg::{
        BlockId, BlockKind, BranchSemantics, ConditionKind, ControlFlowGraph,
        ControlFlowGraphBuilder, GuardKind, RegionId, RegionKind,
    },
    operation::{
        ArgumentFlags, BinaryOperator, CaptureId, CompilationId, LiteralValue, OperationId,
        OperationKind, OperationTree, Symbol, SymbolFlags, SymbolId, SymbolKind, SymbolTable,
        TypeKind, UnaryOperator, WellKnownMethod,
    },
    syntax::{Argument, CatchClause, Expression, Parameter, Statement},
    Error, Result,
};

/// Turns [`Statement`]s into a [`ControlFlowGraph`].
///
/// The lowerer owns the symbol table of the body. Parameters, locals, members of the
/// containing type and methods are declared up front with the builder methods; names
/// used by the body are resolved against them. Methods that were not declared are
/// created on first use (static when called without a receiver), and so are members
/// accessed on another object.
///
/// Three methods are always known:
/// - `Monitor.Enter` and `Monitor.Exit`, used by `lock`
/// - `Dispose`, used by `using`
/// - `Tag`, the marker method of
///   [`StateRecorder`](crate::analysis::symbolic::checks::StateRecorder), which never
///   throws
///
/// # Examples
///
/// ```rust
/// use symscope::{
///     analysis::cfg::{GuardKind, RegionKind},
///     syntax::{Expression, Lowerer, Statement},
/// };
///
/// let cfg = Lowerer::new().parameter_object("gate").lower(&[Statement::Lock {
///     target: Expression::parameter("gate"),
///     body: vec![Statement::tag("Locked", None)],
/// }])?;
///
/// let guarded = cfg
///     .regions()
///     .find(|region| region.kind == RegionKind::TryAndFinally)
///     .unwrap();
/// assert_eq!(guarded.guard, Some(GuardKind::Lock));
/// # Ok::<(), symscope::Error>(())
/// ```
#[derive(Debug)]
pub struct Lowerer {
    compilation: CompilationId,
    symbols: SymbolTable,
    scope: Vec<(Arc<str>, SymbolId)>,
    locals: Vec<SymbolId>,
    methods: HashMap<Arc<str>, SymbolId>,
    members: HashMap<Arc<str>, SymbolId>,
}

impl Default for Lowerer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lowerer {
    /// Creates a lowerer with the built-in methods declared.
    #[must_use]
    pub fn new() -> Self {
        let lowerer = Lowerer {
            compilation: CompilationId::default(),
            symbols: SymbolTable::new(),
            scope: Vec::new(),
            locals: Vec::new(),
            methods: HashMap::new(),
            members: HashMap::new(),
        };
        lowerer
            .method(
                Symbol::new("Monitor.Enter", SymbolKind::Method, TypeKind::Value)
                    .with_flags(SymbolFlags::STATIC)
                    .with_well_known(WellKnownMethod::MonitorEnter),
            )
            .method(
                Symbol::new("Monitor.Exit", SymbolKind::Method, TypeKind::Value)
                    .with_flags(SymbolFlags::STATIC)
                    .with_well_known(WellKnownMethod::MonitorExit),
            )
            .method(
                Symbol::new("Dispose", SymbolKind::Method, TypeKind::Value)
                    .with_well_known(WellKnownMethod::Dispose),
            )
            .marker_method("Tag")
    }

    /// Sets the compilation the graph belongs to.
    #[must_use]
    pub fn compilation(mut self, compilation: CompilationId) -> Self {
        self.compilation = compilation;
        self
    }

    /// Declares a parameter.
    #[must_use]
    pub fn parameter(mut self, name: impl Into<Arc<str>>, ty: TypeKind) -> Self {
        let name = name.into();
        let symbol = self
            .symbols
            .add(Symbol::new(Arc::clone(&name), SymbolKind::Parameter, ty));
        self.scope.push((name, symbol));
        self
    }

    /// Declares a `bool` parameter.
    #[must_use]
    pub fn parameter_bool(self, name: impl Into<Arc<str>>) -> Self {
        self.parameter(name, TypeKind::Value)
    }

    /// Declares an `int` parameter.
    #[must_use]
    pub fn parameter_int(self, name: impl Into<Arc<str>>) -> Self {
        self.parameter(name, TypeKind::Value)
    }

    /// Declares a parameter of a reference type.
    #[must_use]
    pub fn parameter_object(self, name: impl Into<Arc<str>>) -> Self {
        self.parameter(name, TypeKind::Reference)
    }

    /// Declares a local living for the whole body.
    #[must_use]
    pub fn local(mut self, name: impl Into<Arc<str>>, ty: TypeKind) -> Self {
        let name = name.into();
        let symbol = self
            .symbols
            .add(Symbol::new(Arc::clone(&name), SymbolKind::Local, ty));
        self.scope.push((name, symbol));
        self.locals.push(symbol);
        self
    }

    /// Declares a `bool` local.
    #[must_use]
    pub fn local_bool(self, name: impl Into<Arc<str>>) -> Self {
        self.local(name, TypeKind::Value)
    }

    /// Declares an `int` local.
    #[must_use]
    pub fn local_int(self, name: impl Into<Arc<str>>) -> Self {
        self.local(name, TypeKind::Value)
    }

    /// Declares a local of a reference type.
    #[must_use]
    pub fn local_object(self, name: impl Into<Arc<str>>) -> Self {
        self.local(name, TypeKind::Reference)
    }

    /// Declares an instance field of the containing type.
    #[must_use]
    pub fn field(self, name: impl Into<Arc<str>>, ty: TypeKind) -> Self {
        self.member(Symbol::new(name, SymbolKind::Field, ty))
    }

    /// Declares a static field of the containing type.
    #[must_use]
    pub fn static_field(self, name: impl Into<Arc<str>>, ty: TypeKind) -> Self {
        self.member(Symbol::new(name, SymbolKind::Field, ty).with_flags(SymbolFlags::STATIC))
    }

    /// Declares an instance property of the containing type.
    #[must_use]
    pub fn property(self, name: impl Into<Arc<str>>, ty: TypeKind) -> Self {
        self.member(Symbol::new(name, SymbolKind::Property, ty))
    }

    fn member(mut self, symbol: Symbol) -> Self {
        let name = Arc::clone(&symbol.name);
        let id = self.symbols.add(symbol);
        self.members.insert(name, id);
        self
    }

    /// Declares a method, replacing any earlier method of the same name.
    #[must_use]
    pub fn method(mut self, symbol: Symbol) -> Self {
        let name = Arc::clone(&symbol.name);
        let id = self.symbols.add(symbol);
        self.methods.insert(name, id);
        self
    }

    /// Declares a static marker method that never throws.
    #[must_use]
    pub fn marker_method(self, name: impl Into<Arc<str>>) -> Self {
        self.method(
            Symbol::new(name, SymbolKind::Method, TypeKind::Value)
                .with_flags(SymbolFlags::STATIC | SymbolFlags::NO_THROW),
        )
    }

    /// Returns the symbol declared under `name`: a parameter or local first, then a
    /// member, then a method.
    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<SymbolId> {
        self.scope
            .iter()
            .rev()
            .find(|(declared, _)| &**declared == name)
            .map(|(_, symbol)| *symbol)
            .or_else(|| self.members.get(name).copied())
            .or_else(|| self.methods.get(name).copied())
    }

    /// Returns the symbols declared so far.
    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Lowers `body` into a graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for names that are not declared and for
    /// `break` or `continue` outside of a loop, [`Error::NotSupported`] for constructs
    /// the lowering does not model, and [`Error::Malformed`] if the resulting graph is
    /// inconsistent.
    pub fn lower(self, body: &[Statement]) -> Result<ControlFlowGraph> {
        let Lowerer {
            compilation,
            symbols,
            scope,
            locals,
            methods,
            members,
        } = self;
        let mut shared = Shared {
            tree: OperationTree::new(),
            symbols,
            methods,
            members,
            next_capture: 0,
        };

        let mut function = FunctionLowering::new(&mut shared, scope);
        for local in locals {
            function.builder.add_local(local);
        }
        function.statements(body)?;
        let builder = function.finish()?.compilation(compilation);

        let Shared { tree, symbols, .. } = shared;
        let operations = tree.len();
        let cfg = builder.build(Arc::new(tree), Arc::new(symbols))?;
        tracing::debug!(
            blocks = cfg.block_count(),
            operations,
            "lowered method body"
        );
        Ok(cfg)
    }
}

/// State shared by a body and the functions nested in it.
struct Shared {
    tree: OperationTree,
    symbols: SymbolTable,
    methods: HashMap<Arc<str>, SymbolId>,
    members: HashMap<Arc<str>, SymbolId>,
    next_capture: u32,
}

#[derive(Debug, Clone, Copy)]
struct Label(usize);

#[derive(Debug, Clone, Copy)]
enum Target {
    Block(BlockId),
    Label(Label),
    Exit,
    Nowhere,
}

#[derive(Debug, Clone, Copy)]
struct LoopLabels {
    exit: Label,
    next: Label,
}

/// Lowering of one graph: a method body, lambda or local function.
///
/// Blocks are appended as statements are lowered. The block receiving operations is
/// the tail; a sealed tail already has its conditional branch and only takes the
/// fall-through to the next block. Branches to labels are recorded and resolved once
/// every label is placed.
struct FunctionLowering<'s> {
    shared: &'s mut Shared,
    builder: ControlFlowGraphBuilder,
    scopes: Vec<Vec<(Arc<str>, SymbolId)>>,
    labels: Vec<Option<BlockId>>,
    tail: Option<BlockId>,
    sealed: bool,
    jumps: Vec<(BlockId, Target, BranchSemantics)>,
    conditionals: Vec<(BlockId, Label, ConditionKind)>,
    loops: Vec<LoopLabels>,
    roots: Vec<OperationId>,
}

impl<'s> FunctionLowering<'s> {
    fn new(shared: &'s mut Shared, scope: Vec<(Arc<str>, SymbolId)>) -> Self {
        let mut builder = ControlFlowGraphBuilder::new();
        let entry = builder.add_block(BlockKind::Entry);
        let mut lowering = FunctionLowering {
            shared,
            builder,
            scopes: vec![scope],
            labels: Vec::new(),
            tail: Some(entry),
            sealed: true,
            jumps: Vec::new(),
            conditionals: Vec::new(),
            loops: Vec::new(),
            roots: Vec::new(),
        };
        lowering.start_block();
        lowering
    }

    fn finish(mut self) -> Result<ControlFlowGraphBuilder> {
        let exit = self.builder.add_block(BlockKind::Exit);
        if let Some(tail) = self.tail.take() {
            self.jumps.push((tail, Target::Exit, BranchSemantics::Regular));
        }

        for (block, target, semantics) in std::mem::take(&mut self.jumps) {
            let destination = match target {
                Target::Block(destination) => Some(destination),
                Target::Label(label) => Some(self.resolve(label)?),
                Target::Exit => Some(exit),
                Target::Nowhere => None,
            };
            self.builder.set_fall_through(block, destination, semantics)?;
        }
        for (block, label, kind) in std::mem::take(&mut self.conditionals) {
            let destination = self.resolve(label)?;
            self.builder.set_conditional(block, destination, kind)?;
        }

        let body = self.shared.tree.add(
            OperationKind::MethodBody {
                operations: std::mem::take(&mut self.roots),
            },
            TypeKind::Unknown,
            None,
        )?;
        self.builder.set_root(body);
        Ok(self.builder)
    }

    // Blocks and labels

    fn start_block(&mut self) -> BlockId {
        let block = self.builder.add_block(BlockKind::Block);
        if let Some(previous) = self.tail.replace(block) {
            self.jumps
                .push((previous, Target::Block(block), BranchSemantics::Regular));
        }
        self.sealed = false;
        block
    }

    fn writable_block(&mut self) -> BlockId {
        match self.tail {
            Some(block) if !self.sealed => block,
            _ => self.start_block(),
        }
    }

    fn append(&mut self, operation: OperationId) -> Result<()> {
        let block = self.writable_block();
        self.builder.add_operation(block, operation)?;
        self.roots.push(operation);
        Ok(())
    }

    fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    fn place(&mut self, label: Label) {
        let block = self.start_block();
        if let Some(slot) = self.labels.get_mut(label.0) {
            *slot = Some(block);
        }
    }

    fn resolve(&self, label: Label) -> Result<BlockId> {
        self.labels
            .get(label.0)
            .copied()
            .flatten()
            .ok_or_else(|| malformed_error!("label {} was never placed", label.0))
    }

    /// Ends the tail with an unconditional branch. Code lowered afterwards starts an
    /// unreachable block.
    fn jump(&mut self, target: Target, semantics: BranchSemantics) {
        if let Some(tail) = self.tail.take() {
            self.jumps.push((tail, target, semantics));
        }
        self.sealed = false;
    }

    fn branch_if(&mut self, value: OperationId, jump_when: bool, target: Label) -> Result<()> {
        let block = self.writable_block();
        self.builder.set_branch_value(block, value)?;
        let kind = if jump_when {
            ConditionKind::WhenTrue
        } else {
            ConditionKind::WhenFalse
        };
        self.conditionals.push((block, target, kind));
        self.sealed = true;
        Ok(())
    }

    // Regions

    fn open(&mut self, kind: RegionKind) -> RegionId {
        let region = self.builder.begin_region(kind);
        self.start_block();
        region
    }

    fn close(&mut self, region: RegionId) -> Result<()> {
        self.builder.end_region(region)?;
        self.sealed = true;
        Ok(())
    }

    // Symbols

    fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(declared, _)| &**declared == name)
            .map(|(_, symbol)| *symbol)
    }

    fn declare(&mut self, name: &Arc<str>, kind: SymbolKind, ty: TypeKind) -> SymbolId {
        let symbol = self
            .shared
            .symbols
            .add(Symbol::new(Arc::clone(name), kind, ty));
        if let Some(scope) = self.scopes.last_mut() {
            scope.push((Arc::clone(name), symbol));
        }
        if kind == SymbolKind::Local {
            self.builder.add_local(symbol);
        }
        symbol
    }

    fn method_symbol(&mut self, name: &Arc<str>, is_static: bool) -> SymbolId {
        if let Some(symbol) = self.shared.methods.get(name) {
            return *symbol;
        }
        let mut symbol = Symbol::new(Arc::clone(name), SymbolKind::Method, TypeKind::Unknown);
        if is_static {
            symbol = symbol.with_flags(SymbolFlags::STATIC);
        }
        let id = self.shared.symbols.add(symbol);
        self.shared.methods.insert(Arc::clone(name), id);
        id
    }

    fn member_symbol(&mut self, name: &Arc<str>) -> SymbolId {
        if let Some(symbol) = self.shared.members.get(name) {
            return *symbol;
        }
        let id = self.shared.symbols.add(Symbol::new(
            Arc::clone(name),
            SymbolKind::Property,
            TypeKind::Unknown,
        ));
        self.shared.members.insert(Arc::clone(name), id);
        id
    }

    fn symbol(&self, id: SymbolId) -> Result<&Symbol> {
        self.shared
            .symbols
            .get(id)
            .ok_or_else(|| malformed_error!("symbol {:?} does not exist", id))
    }

    // Statements

    fn statements(&mut self, statements: &[Statement]) -> Result<()> {
        for statement in statements {
            self.statement(statement)?;
        }
        Ok(())
    }

    /// Lowers `statements` in a scope of their own. Scopes declaring locals get a
    /// local-lifetime region.
    fn scoped(&mut self, statements: &[Statement]) -> Result<()> {
        let declares = statements.iter().any(|statement| {
            matches!(
                statement,
                Statement::Declare { .. } | Statement::LocalFunction { .. }
            )
        });
        self.scopes.push(Vec::new());
        let region = declares.then(|| self.open(RegionKind::LocalLifetime));
        let lowered = self.statements(statements);
        self.scopes.pop();
        lowered?;
        if let Some(region) = region {
            self.close(region)?;
        }
        Ok(())
    }

    fn statement(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Expression(expression) => self.expression_statement(expression),
            Statement::Declare { name, ty, value } => {
                let symbol = self.declare(name, SymbolKind::Local, *ty);
                let Some(initializer) = value else {
                    return Ok(());
                };
                let text = format!("{name} = {initializer}");
                self.with_captures(initializer.has_control_flow(), |lowering| {
                    let target =
                        lowering.add(OperationKind::LocalReference(symbol), *ty, Arc::clone(name))?;
                    let value = lowering.value(initializer)?;
                    let assignment =
                        lowering.add(OperationKind::SimpleAssignment { target, value }, *ty, text)?;
                    lowering.append(assignment)
                })
            }
            Statement::Block(statements) => self.scoped(statements),
            Statement::If {
                condition,
                then,
                otherwise,
            } => {
                let otherwise_label = self.new_label();
                let end = self.new_label();
                self.condition(condition, false, otherwise_label)?;
                self.scoped(then)?;
                self.jump(Target::Label(end), BranchSemantics::Regular);
                self.place(otherwise_label);
                self.scoped(otherwise)?;
                self.place(end);
                Ok(())
            }
            Statement::While { condition, body } => {
                let head = self.new_label();
                let exit = self.new_label();
                self.place(head);
                self.condition(condition, false, exit)?;
                self.loop_body(body, exit, head)?;
                self.jump(Target::Label(head), BranchSemantics::Regular);
                self.place(exit);
                Ok(())
            }
            Statement::DoWhile { body, condition } => {
                let top = self.new_label();
                let next = self.new_label();
                let exit = self.new_label();
                self.place(top);
                self.loop_body(body, exit, next)?;
                self.place(next);
                self.condition(condition, true, top)?;
                self.place(exit);
                Ok(())
            }
            Statement::For {
                initializer,
                condition,
                step,
                body,
            } => self.for_statement(initializer, condition.as_ref(), step, body),
            Statement::Return(value) => {
                let value = value.as_ref().map(|value| self.value(value)).transpose()?;
                let block = self.writable_block();
                if let Some(value) = value {
                    self.builder.set_branch_value(block, value)?;
                }
                self.jump(Target::Exit, BranchSemantics::Return);
                Ok(())
            }
            Statement::Throw(Some(value)) => {
                let value = self.value(value)?;
                let block = self.writable_block();
                self.builder.set_branch_value(block, value)?;
                self.jump(Target::Nowhere, BranchSemantics::Throw);
                Ok(())
            }
            Statement::Throw(None) => {
                self.writable_block();
                self.jump(Target::Nowhere, BranchSemantics::Rethrow);
                Ok(())
            }
            Statement::Try {
                body,
                catches,
                finally,
            } => self.try_statement(body, catches, finally.as_deref()),
            Statement::Lock { target, body } => self.lock_statement(target, body),
            Statement::Using {
                variable,
                resource,
                body,
            } => self.using_statement(variable.as_ref(), resource, body),
            Statement::Break => {
                let labels = self.enclosing_loop("break")?;
                self.jump(Target::Label(labels.exit), BranchSemantics::Regular);
                Ok(())
            }
            Statement::Continue => {
                let labels = self.enclosing_loop("continue")?;
                self.jump(Target::Label(labels.next), BranchSemantics::Regular);
                Ok(())
            }
            Statement::Terminate => {
                self.writable_block();
                self.jump(Target::Nowhere, BranchSemantics::ProgramTermination);
                Ok(())
            }
            Statement::LocalFunction {
                name,
                parameters,
                body,
            } => {
                let symbol = self.declare(name, SymbolKind::LocalFunction, TypeKind::Unknown);
                let nested = self.nested(parameters, body)?;
                self.builder.add_local_function(symbol, nested);
                Ok(())
            }
        }
    }

    fn expression_statement(&mut self, expression: &Expression) -> Result<()> {
        self.with_captures(expression.has_control_flow(), |lowering| {
            let operation = lowering.value(expression)?;
            lowering.append(operation)
        })
    }

    /// Runs `lower` inside a local-lifetime region when the lowered code introduces
    /// flow captures.
    fn with_captures<F>(&mut self, has_control_flow: bool, lower: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        if !has_control_flow {
            return lower(self);
        }
        let region = self.open(RegionKind::LocalLifetime);
        lower(self)?;
        self.close(region)
    }

    fn enclosing_loop(&self, keyword: &str) -> Result<LoopLabels> {
        self.loops
            .last()
            .copied()
            .ok_or_else(|| Error::InvalidArgument(format!("'{keyword}' outside of a loop")))
    }

    fn loop_body(&mut self, body: &[Statement], exit: Label, next: Label) -> Result<()> {
        self.loops.push(LoopLabels { exit, next });
        let lowered = self.scoped(body);
        self.loops.pop();
        lowered
    }

    fn for_statement(
        &mut self,
        initializer: &[Statement],
        condition: Option<&Expression>,
        step: &[Expression],
        body: &[Statement],
    ) -> Result<()> {
        self.scopes.push(Vec::new());
        let region = self.open(RegionKind::LocalLifetime);
        self.statements(initializer)?;

        let head = self.new_label();
        let next = self.new_label();
        let exit = self.new_label();
        self.place(head);
        if let Some(condition) = condition {
            self.condition(condition, false, exit)?;
        }
        self.loop_body(body, exit, next)?;
        self.place(next);
        for expression in step {
            self.expression_statement(expression)?;
        }
        self.jump(Target::Label(head), BranchSemantics::Regular);
        self.place(exit);

        self.scopes.pop();
        self.close(region)
    }

    fn try_statement(
        &mut self,
        body: &[Statement],
        catches: &[CatchClause],
        finally: Option<&[Statement]>,
    ) -> Result<()> {
        if catches.is_empty() && finally.is_none() {
            return self.scoped(body);
        }

        let end = self.new_label();
        let guarded = finally.map(|_| self.builder.begin_region(RegionKind::TryAndFinally));
        if catches.is_empty() {
            self.protected(body, end)?;
        } else if guarded.is_some() {
            let protected = self.builder.begin_region(RegionKind::Try);
            self.try_catch(body, catches, end)?;
            self.close(protected)?;
        } else {
            self.try_catch(body, catches, end)?;
        }

        if let (Some(region), Some(finally)) = (guarded, finally) {
            self.finally_region(|lowering| lowering.scoped(finally))?;
            self.close(region)?;
        }
        self.place(end);
        Ok(())
    }

    /// Lowers `body` as a try region that continues at `end`.
    fn protected(&mut self, body: &[Statement], end: Label) -> Result<()> {
        let region = self.open(RegionKind::Try);
        self.scoped(body)?;
        self.jump(Target::Label(end), BranchSemantics::Regular);
        self.close(region)
    }

    fn try_catch(&mut self, body: &[Statement], catches: &[CatchClause], end: Label) -> Result<()> {
        let pair = self.builder.begin_region(RegionKind::TryAndCatch);
        self.protected(body, end)?;
        for clause in catches {
            let region = self.open(RegionKind::Catch);
            self.builder
                .set_catch_type(region, clause.type_name.clone())?;
            self.scopes.push(Vec::new());
            if let Some(variable) = &clause.variable {
                let symbol = self.declare(variable, SymbolKind::Local, TypeKind::Reference);
                let target = self.add(
                    OperationKind::LocalReference(symbol),
                    TypeKind::Reference,
                    Arc::clone(variable),
                )?;
                let value = self.add(OperationKind::CaughtException, TypeKind::Reference, "catch")?;
                let assignment = self.add(
                    OperationKind::SimpleAssignment { target, value },
                    TypeKind::Reference,
                    format!("{variable} = catch"),
                )?;
                self.append(assignment)?;
            }
            let lowered = self.scoped(&clause.body);
            self.scopes.pop();
            lowered?;
            self.jump(Target::Label(end), BranchSemantics::Regular);
            self.close(region)?;
        }
        self.close(pair)
    }

    /// Lowers a finally region whose content is produced by `lower`.
    fn finally_region<F>(&mut self, lower: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let region = self.open(RegionKind::Finally);
        lower(self)?;
        self.jump(Target::Nowhere, BranchSemantics::StructuredExceptionHandling);
        self.close(region)
    }

    fn lock_statement(&mut self, target: &Expression, body: &[Statement]) -> Result<()> {
        let lifetime = self.open(RegionKind::LocalLifetime);
        let value = self.value(target)?;
        let ty = self.type_of(value);
        let capture = self.new_capture();
        self.capture(capture, value)?;

        let end = self.new_label();
        let region = self.builder.begin_region(RegionKind::TryAndFinally);
        self.builder.set_guard(region, GuardKind::Lock)?;
        let protected = self.open(RegionKind::Try);
        self.monitor_call("Monitor.Enter", capture, ty, target)?;
        self.scoped(body)?;
        self.jump(Target::Label(end), BranchSemantics::Regular);
        self.close(protected)?;
        self.finally_region(|lowering| lowering.monitor_call("Monitor.Exit", capture, ty, target))?;
        self.close(region)?;
        self.place(end);
        self.close(lifetime)
    }

    fn monitor_call(
        &mut self,
        method: &str,
        capture: CaptureId,
        ty: TypeKind,
        target: &Expression,
    ) -> Result<()> {
        let method: Arc<str> = method.into();
        let symbol = self.method_symbol(&method, true);
        let reference = self.capture_reference(capture, ty, target.to_string())?;
        let argument = self.add(
            OperationKind::Argument {
                value: reference,
                flags: ArgumentFlags::empty(),
            },
            ty,
            target.to_string(),
        )?;
        let call = self.add(
            OperationKind::Invocation {
                method: symbol,
                instance: None,
                arguments: vec![argument],
            },
            TypeKind::Value,
            format!("{method}({target})"),
        )?;
        self.append(call)
    }

    fn using_statement(
        &mut self,
        variable: Option<&Arc<str>>,
        resource: &Expression,
        body: &[Statement],
    ) -> Result<()> {
        self.scopes.push(Vec::new());
        let lifetime = self.open(RegionKind::LocalLifetime);
        let value = self.value(resource)?;
        let ty = self.type_of(value);

        let holder = match variable {
            Some(name) => {
                let symbol = self.declare(name, SymbolKind::Local, ty);
                let target = self.add(OperationKind::LocalReference(symbol), ty, Arc::clone(name))?;
                let assignment = self.add(
                    OperationKind::SimpleAssignment { target, value },
                    ty,
                    format!("{name} = {resource}"),
                )?;
                self.append(assignment)?;
                ResourceHolder::Local(symbol, Arc::clone(name))
            }
            None => {
                let capture = self.new_capture();
                self.capture(capture, value)?;
                ResourceHolder::Capture(capture, resource.to_string())
            }
        };

        let end = self.new_label();
        let region = self.builder.begin_region(RegionKind::TryAndFinally);
        self.builder.set_guard(region, GuardKind::Using)?;
        self.protected(body, end)?;
        self.finally_region(|lowering| lowering.dispose(&holder, ty))?;
        self.close(region)?;
        self.place(end);

        self.scopes.pop();
        self.close(lifetime)
    }

    /// `if (resource != null) resource.Dispose();`
    fn dispose(&mut self, holder: &ResourceHolder, ty: TypeKind) -> Result<()> {
        let skip = self.new_label();
        let resource = self.holder_reference(holder, ty)?;
        let null = self.add(
            OperationKind::Literal(LiteralValue::Null),
            TypeKind::Reference,
            "null",
        )?;
        let name = holder.text();
        let test = self.add(
            OperationKind::Binary {
                operator: BinaryOperator::NotEquals,
                left: resource,
                right: null,
                user_defined: false,
            },
            TypeKind::Value,
            format!("{name} != null"),
        )?;
        self.branch_if(test, false, skip)?;

        let dispose = self.method_symbol(&Arc::from("Dispose"), false);
        let receiver = self.holder_reference(holder, ty)?;
        let call = self.add(
            OperationKind::Invocation {
                method: dispose,
                instance: Some(receiver),
                arguments: Vec::new(),
            },
            TypeKind::Value,
            format!("{name}.Dispose()"),
        )?;
        self.append(call)?;
        self.place(skip);
        Ok(())
    }

    fn holder_reference(&mut self, holder: &ResourceHolder, ty: TypeKind) -> Result<OperationId> {
        match holder {
            ResourceHolder::Local(symbol, name) => {
                self.add(OperationKind::LocalReference(*symbol), ty, Arc::clone(name))
            }
            ResourceHolder::Capture(capture, text) => {
                self.capture_reference(*capture, ty, text.as_str())
            }
        }
    }

    /// Lowers a lambda or local function body into a builder of its own.
    fn nested(&mut self, parameters: &[Parameter], body: &[Statement]) -> Result<ControlFlowGraphBuilder> {
        let mut scope: Vec<(Arc<str>, SymbolId)> = self.scopes.iter().flatten().cloned().collect();
        for parameter in parameters {
            let symbol = self.shared.symbols.add(Symbol::new(
                Arc::clone(&parameter.name),
                SymbolKind::Parameter,
                parameter.ty,
            ));
            scope.push((Arc::clone(&parameter.name), symbol));
        }
        let mut nested = FunctionLowering::new(&mut *self.shared, scope);
        nested.statements(body)?;
        nested.finish()
    }

    // Conditions

    /// Lowers `condition` as branches: control reaches `target` when the condition
    /// equals `jump_when` and falls through otherwise.
    fn condition(&mut self, condition: &Expression, jump_when: bool, target: Label) -> Result<()> {
        match condition {
            Expression::LogicalAnd(left, right) if jump_when => {
                let skip = self.new_label();
                self.condition(left, false, skip)?;
                self.condition(right, true, target)?;
                self.place(skip);
                Ok(())
            }
            Expression::LogicalAnd(left, right) => {
                self.condition(left, false, target)?;
                self.condition(right, false, target)
            }
            Expression::LogicalOr(left, right) if jump_when => {
                self.condition(left, true, target)?;
                self.condition(right, true, target)
            }
            Expression::LogicalOr(left, right) => {
                let skip = self.new_label();
                self.condition(left, true, skip)?;
                self.condition(right, false, target)?;
                self.place(skip);
                Ok(())
            }
            Expression::Unary {
                operator: UnaryOperator::Not,
                operand,
            } => self.condition(operand, !jump_when, target),
            Expression::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                let otherwise = self.new_label();
                let end = self.new_label();
                self.condition(condition, false, otherwise)?;
                self.condition(when_true, jump_when, target)?;
                self.jump(Target::Label(end), BranchSemantics::Regular);
                self.place(otherwise);
                self.condition(when_false, jump_when, target)?;
                self.place(end);
                Ok(())
            }
            _ => {
                let value = self.value(condition)?;
                self.branch_if(value, jump_when, target)
            }
        }
    }

    // Expressions

    fn add(
        &mut self,
        kind: OperationKind,
        ty: TypeKind,
        syntax: impl Into<Arc<str>>,
    ) -> Result<OperationId> {
        self.shared.tree.add(kind, ty, Some(syntax.into()))
    }

    fn type_of(&self, operation: OperationId) -> TypeKind {
        self.shared
            .tree
            .get(operation)
            .map_or(TypeKind::Unknown, |operation| operation.ty)
    }

    fn new_capture(&mut self) -> CaptureId {
        let capture = CaptureId(self.shared.next_capture);
        self.shared.next_capture += 1;
        self.builder.add_capture(capture);
        capture
    }

    fn capture(&mut self, capture: CaptureId, value: OperationId) -> Result<()> {
        let ty = self.type_of(value);
        let syntax = self
            .shared
            .tree
            .get(value)
            .and_then(|operation| operation.syntax.clone())
            .unwrap_or_else(|| capture.to_string().into());
        let operation = self.add(OperationKind::FlowCapture { capture, value }, ty, syntax)?;
        self.append(operation)
    }

    fn capture_reference(
        &mut self,
        capture: CaptureId,
        ty: TypeKind,
        syntax: impl Into<Arc<str>>,
    ) -> Result<OperationId> {
        self.add(OperationKind::FlowCaptureReference { capture }, ty, syntax)
    }

    /// Lowers `expressions` left to right. A value with side effects that is
    /// followed by branching code is captured so it is computed before the branch.
    fn operands(&mut self, expressions: &[&Expression]) -> Result<Vec<OperationId>> {
        let mut values = Vec::with_capacity(expressions.len());
        for (index, expression) in expressions.iter().enumerate() {
            let mut value = self.value(expression)?;
            let branches_later = expressions[index + 1..]
                .iter()
                .any(|later| later.has_control_flow());
            if branches_later && self.has_side_effects(value) {
                value = self.spill(value, expression.to_string())?;
            }
            values.push(value);
        }
        Ok(values)
    }

    /// Moves `value` into a fresh capture and returns a reference to it.
    fn spill(&mut self, value: OperationId, text: String) -> Result<OperationId> {
        let ty = self.type_of(value);
        let capture = self.new_capture();
        self.capture(capture, value)?;
        self.capture_reference(capture, ty, text)
    }

    fn has_side_effects(&self, operation: OperationId) -> bool {
        matches!(
            self.shared.tree.kind(operation),
            Some(
                OperationKind::Invocation { .. }
                    | OperationKind::ObjectCreation { .. }
                    | OperationKind::ArrayCreation { .. }
                    | OperationKind::SimpleAssignment { .. }
                    | OperationKind::CompoundAssignment { .. }
                    | OperationKind::Increment { .. }
            )
        )
    }

    fn arguments(&mut self, arguments: &[Argument]) -> Result<Vec<OperationId>> {
        let expressions: Vec<&Expression> = arguments.iter().map(|argument| &argument.value).collect();
        let values = self.operands(&expressions)?;
        values
            .into_iter()
            .zip(arguments)
            .map(|(value, argument)| {
                let ty = self.type_of(value);
                self.add(
                    OperationKind::Argument {
                        value,
                        flags: argument.flags,
                    },
                    ty,
                    argument.to_string(),
                )
            })
            .collect()
    }

    fn value(&mut self, expression: &Expression) -> Result<OperationId> {
        let text = expression.to_string();
        match expression {
            Expression::Literal(literal) => {
                let ty = match literal {
                    LiteralValue::Null | LiteralValue::String(_) => TypeKind::Reference,
                    LiteralValue::Bool(_) | LiteralValue::Integer(_) => TypeKind::Value,
                };
                self.add(OperationKind::Literal(literal.clone()), ty, text)
            }
            Expression::Name(name) => self.name(name),
            Expression::This => self.add(OperationKind::InstanceReference, TypeKind::Reference, text),
            Expression::Member { instance, name } => {
                let receiver = self.value(instance)?;
                let member = self.member_symbol(name);
                self.member_reference(member, Some(receiver), text)
            }
            Expression::ElementAccess { array, indices } => {
                let mut all = vec![&**array];
                all.extend(indices.iter());
                let mut values = self.operands(&all)?;
                let array = values.remove(0);
                self.add(
                    OperationKind::ArrayElementReference {
                        array,
                        indices: values,
                    },
                    TypeKind::Unknown,
                    text,
                )
            }
            Expression::Assign { target, value } => {
                let target = self.value(target)?;
                let value = self.value(value)?;
                let ty = self.type_of(target);
                self.add(OperationKind::SimpleAssignment { target, value }, ty, text)
            }
            Expression::CompoundAssign {
                operator,
                target,
                value,
            } => {
                let target = self.value(target)?;
                let value = self.value(value)?;
                let ty = self.type_of(target);
                self.add(
                    OperationKind::CompoundAssignment {
                        operator: *operator,
                        target,
                        value,
                    },
                    ty,
                    text,
                )
            }
            Expression::Increment {
                target,
                is_decrement,
                is_postfix,
            } => {
                let target = self.value(target)?;
                let ty = self.type_of(target);
                self.add(
                    OperationKind::Increment {
                        target,
                        is_decrement: *is_decrement,
                        is_postfix: *is_postfix,
                    },
                    ty,
                    text,
                )
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let values = self.operands(&[&**left, &**right])?;
                let ty = if operator.is_equality() || operator.is_relational() {
                    TypeKind::Value
                } else {
                    self.type_of(values[0])
                };
                self.add(
                    OperationKind::Binary {
                        operator: *operator,
                        left: values[0],
                        right: values[1],
                        user_defined: false,
                    },
                    ty,
                    text,
                )
            }
            Expression::Unary { operator, operand } => {
                let operand = self.value(operand)?;
                let ty = match operator {
                    UnaryOperator::Not => TypeKind::Value,
                    _ => self.type_of(operand),
                };
                self.add(
                    OperationKind::Unary {
                        operator: *operator,
                        operand,
                        user_defined: false,
                    },
                    ty,
                    text,
                )
            }
            Expression::LogicalAnd(left, right) => self.logical(left, right, false, text),
            Expression::LogicalOr(left, right) => self.logical(left, right, true, text),
            Expression::Coalesce(left, right) => self.coalesce(left, right, text),
            Expression::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                let result = self.new_capture();
                let otherwise = self.new_label();
                let end = self.new_label();
                self.condition(condition, false, otherwise)?;
                let value = self.value(when_true)?;
                let ty = self.type_of(value);
                self.capture(result, value)?;
                self.jump(Target::Label(end), BranchSemantics::Regular);
                self.place(otherwise);
                let value = self.value(when_false)?;
                self.capture(result, value)?;
                self.place(end);
                self.capture_reference(result, ty, text)
            }
            Expression::IsNull(operand) => {
                let operand = self.value(operand)?;
                self.add(OperationKind::IsNull { operand }, TypeKind::Value, text)
            }
            Expression::IsType {
                operand,
                type_name,
                matches_any_non_null,
            } => {
                let operand = self.value(operand)?;
                self.add(
                    OperationKind::IsType {
                        operand,
                        type_name: Arc::clone(type_name),
                        matches_any_non_null: *matches_any_non_null,
                    },
                    TypeKind::Value,
                    text,
                )
            }
            Expression::Conversion {
                operand,
                ty,
                user_defined,
                ..
            } => {
                let operand = self.value(operand)?;
                self.add(
                    OperationKind::Conversion {
                        operand,
                        user_defined: *user_defined,
                    },
                    *ty,
                    text,
                )
            }
            Expression::Call {
                instance,
                method,
                arguments,
            } => self.call(instance.as_deref(), method, arguments, text),
            Expression::New {
                type_name,
                arguments,
                initializer,
                is_collection,
            } => {
                let arguments = self.arguments(arguments)?;
                let initializer: Vec<&Expression> = initializer.iter().collect();
                let initializer = self.operands(&initializer)?;
                self.add(
                    OperationKind::ObjectCreation {
                        type_name: Arc::clone(type_name),
                        arguments,
                        initializer,
                        is_collection: *is_collection,
                    },
                    TypeKind::Reference,
                    text,
                )
            }
            Expression::NewArray {
                dimensions,
                initializer,
            } => {
                let count = dimensions.len();
                let all: Vec<&Expression> = dimensions.iter().chain(initializer.iter()).collect();
                let mut dimensions = self.operands(&all)?;
                let initializer = dimensions.split_off(count);
                self.add(
                    OperationKind::ArrayCreation {
                        dimensions,
                        initializer,
                    },
                    TypeKind::Reference,
                    text,
                )
            }
            Expression::Lambda { parameters, body } => {
                let symbol = self.shared.symbols.add(
                    Symbol::new("lambda", SymbolKind::AnonymousFunction, TypeKind::Reference)
                        .with_flags(SymbolFlags::IMPLICIT),
                );
                let operation = self.add(
                    OperationKind::AnonymousFunction { symbol },
                    TypeKind::Reference,
                    text,
                )?;
                let nested = self.nested(parameters, body)?;
                self.builder.add_anonymous_function(operation, nested);
                Ok(operation)
            }
        }
    }

    fn name(&mut self, name: &Arc<str>) -> Result<OperationId> {
        if let Some(symbol) = self.lookup(name) {
            let symbol = self.symbol(symbol).map(|s| (symbol, s.kind, s.ty))?;
            return match symbol {
                (id, SymbolKind::Local, ty) => {
                    self.add(OperationKind::LocalReference(id), ty, Arc::clone(name))
                }
                (id, SymbolKind::Parameter, ty) => {
                    self.add(OperationKind::ParameterReference(id), ty, Arc::clone(name))
                }
                (_, kind, _) => Err(Error::NotSupported(format!(
                    "{kind} '{name}' used as a value"
                ))),
            };
        }
        let Some(member) = self.shared.members.get(name).copied() else {
            return Err(Error::InvalidArgument(format!("unknown name '{name}'")));
        };
        let receiver = if self.symbol(member)?.is_static() {
            None
        } else {
            Some(self.add(OperationKind::InstanceReference, TypeKind::Reference, "this")?)
        };
        self.member_reference(member, receiver, name.to_string())
    }

    fn member_reference(
        &mut self,
        member: SymbolId,
        instance: Option<OperationId>,
        text: String,
    ) -> Result<OperationId> {
        let (kind, ty) = {
            let symbol = self.symbol(member)?;
            (symbol.kind, symbol.ty)
        };
        let operation = match kind {
            SymbolKind::Field => OperationKind::FieldReference {
                field: member,
                instance,
            },
            SymbolKind::Event => OperationKind::EventReference {
                event: member,
                instance,
            },
            _ => OperationKind::PropertyReference {
                property: member,
                instance,
            },
        };
        self.add(operation, ty, text)
    }

    fn call(
        &mut self,
        instance: Option<&Expression>,
        method: &Arc<str>,
        arguments: &[Argument],
        text: String,
    ) -> Result<OperationId> {
        let local_function = instance
            .is_none()
            .then(|| self.lookup(method))
            .flatten()
            .filter(|symbol| {
                self.shared
                    .symbols
                    .get(*symbol)
                    .is_some_and(|symbol| symbol.kind == SymbolKind::LocalFunction)
            });
        let symbol = match local_function {
            Some(symbol) => symbol,
            None => self.method_symbol(method, instance.is_none()),
        };

        let receiver = match instance {
            Some(instance) => {
                let receiver = self.value(instance)?;
                let branches_later = arguments
                    .iter()
                    .any(|argument| argument.value.has_control_flow());
                if branches_later && self.has_side_effects(receiver) {
                    Some(self.spill(receiver, instance.to_string())?)
                } else {
                    Some(receiver)
                }
            }
            None => None,
        };
        let arguments = self.arguments(arguments)?;
        let ty = self.symbol(symbol)?.ty;
        self.add(
            OperationKind::Invocation {
                method: symbol,
                instance: receiver,
                arguments,
            },
            ty,
            text,
        )
    }

    /// `left && right` or `left || right` as a value.
    fn logical(
        &mut self,
        left: &Expression,
        right: &Expression,
        is_or: bool,
        text: String,
    ) -> Result<OperationId> {
        let result = self.new_capture();
        let short_circuit = self.new_label();
        let end = self.new_label();
        self.condition(left, is_or, short_circuit)?;
        let value = self.value(right)?;
        self.capture(result, value)?;
        self.jump(Target::Label(end), BranchSemantics::Regular);
        self.place(short_circuit);
        let constant = self.add(
            OperationKind::Literal(LiteralValue::Bool(is_or)),
            TypeKind::Value,
            if is_or { "true" } else { "false" },
        )?;
        self.capture(result, constant)?;
        self.place(end);
        self.capture_reference(result, TypeKind::Value, text)
    }

    /// `left ?? right` as a value.
    fn coalesce(&mut self, left: &Expression, right: &Expression, text: String) -> Result<OperationId> {
        let tested = self.new_capture();
        let result = self.new_capture();
        let when_null = self.new_label();
        let end = self.new_label();

        let value = self.value(left)?;
        let ty = self.type_of(value);
        let left_text = left.to_string();
        self.capture(tested, value)?;
        let reference = self.capture_reference(tested, ty, left_text.as_str())?;
        let test = self.add(
            OperationKind::IsNull { operand: reference },
            TypeKind::Value,
            format!("{left_text} is null"),
        )?;
        self.branch_if(test, true, when_null)?;

        let reference = self.capture_reference(tested, ty, left_text.as_str())?;
        self.capture(result, reference)?;
        self.jump(Target::Label(end), BranchSemantics::Regular);
        self.place(when_null);
        let value = self.value(right)?;
        self.capture(result, value)?;
        self.place(end);
        self.capture_reference(result, ty, text)
    }
}

/// Where a `using` statement keeps its resource.
enum ResourceHolder {
    Local(SymbolId, Arc<str>),
    Capture(CaptureId, String),
}

impl ResourceHolder {
    fn text(&self) -> String {
        match self {
            ResourceHolder::Local(_, name) => name.to_string(),
            ResourceHolder::Capture(_, text) => text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::CatchClause;

    fn region_kinds(cfg: &ControlFlowGraph) -> Vec<RegionKind> {
        cfg.regions().map(|region| region.kind).collect()
    }

    #[test]
    fn test_if_else_branches_on_condition() {
        let cfg = Lowerer::new()
            .parameter_bool("condition")
            .local_int("x")
            .lower(&[Statement::If {
                condition: Expression::parameter("condition"),
                then: vec![Statement::assign("x", Expression::int(1))],
                otherwise: vec![Statement::assign("x", Expression::int(2))],
            }])
            .unwrap();

        let conditional: Vec<_> = cfg
            .blocks()
            .filter(|(_, block)| block.conditional.is_some())
            .collect();
        assert_eq!(conditional.len(), 1);
        assert_eq!(conditional[0].1.condition_kind, ConditionKind::WhenFalse);
        assert!(conditional[0].1.branch_value.is_some());
        assert_eq!(cfg.successors(cfg.entry_block()).count(), 1);
        assert!(cfg.block(cfg.exit_block()).unwrap().is_reachable);
    }

    #[test]
    fn test_short_circuit_condition_has_no_captures() {
        let cfg = Lowerer::new()
            .parameter_bool("a")
            .parameter_bool("b")
            .lower(&[Statement::If {
                condition: Expression::and(Expression::parameter("a"), Expression::parameter("b")),
                then: vec![Statement::Return(None)],
                otherwise: vec![],
            }])
            .unwrap();

        let conditionals = cfg
            .blocks()
            .filter(|(_, block)| block.conditional.is_some())
            .count();
        assert_eq!(conditionals, 2);
        assert!(cfg.regions().all(|region| region.captures.is_empty()));
    }

    #[test]
    fn test_coalesce_value_uses_flow_captures() {
        let cfg = Lowerer::new()
            .parameter_object("a")
            .local_object("s")
            .lower(&[Statement::assign(
                "s",
                Expression::coalesce(Expression::parameter("a"), Expression::string("default")),
            )])
            .unwrap();

        let lifetime = cfg
            .regions()
            .find(|region| region.kind == RegionKind::LocalLifetime)
            .unwrap();
        assert_eq!(lifetime.captures.len(), 2);
        let tests_null = (0..cfg.operations().len()).any(|index| {
            matches!(
                cfg.operations().kind(OperationId::new(index as u32)),
                Some(OperationKind::IsNull { .. })
            )
        });
        assert!(tests_null);
    }

    #[test]
    fn test_try_catch_finally_nesting() {
        let cfg = Lowerer::new()
            .lower(&[Statement::Try {
                body: vec![Statement::expression(Expression::call("Work", vec![]))],
                catches: vec![CatchClause::of("IOException", vec![]).with_variable("e")],
                finally: Some(vec![Statement::tag("Finally", None)]),
            }])
            .unwrap();

        let outer = cfg
            .regions()
            .find(|region| region.kind == RegionKind::TryAndFinally)
            .unwrap();
        let nested: Vec<_> = outer
            .nested
            .iter()
            .map(|id| cfg.region(*id).unwrap().kind)
            .collect();
        assert_eq!(nested, vec![RegionKind::Try, RegionKind::Finally]);
        assert!(outer.guard.is_none());

        let protected = cfg.region(outer.nested[0]).unwrap();
        let pair = cfg.region(protected.nested[0]).unwrap();
        assert_eq!(pair.kind, RegionKind::TryAndCatch);

        let handler = cfg
            .regions()
            .find(|region| region.kind == RegionKind::Catch)
            .unwrap();
        assert_eq!(handler.catch_type.as_deref(), Some("IOException"));
        assert_eq!(handler.locals.len(), 1);

        let runs_finally = cfg
            .blocks()
            .flat_map(|(_, block)| block.branches())
            .any(|branch| !branch.finally_regions.is_empty());
        assert!(runs_finally);
    }

    #[test]
    fn test_using_declares_guarded_region() {
        let cfg = Lowerer::new()
            .lower(&[Statement::Using {
                variable: Some("stream".into()),
                resource: Expression::new_object("MemoryStream"),
                body: vec![],
            }])
            .unwrap();

        let guarded = cfg
            .regions()
            .find(|region| region.kind == RegionKind::TryAndFinally)
            .unwrap();
        assert_eq!(guarded.guard, Some(GuardKind::Using));
        let dispose = cfg.symbols().find("Dispose", SymbolKind::Method).unwrap();
        let disposes = (0..cfg.operations().len()).any(|index| {
            matches!(
                cfg.operations().kind(OperationId::new(index as u32)),
                Some(OperationKind::Invocation { method, instance: Some(_), .. }) if *method == dispose
            )
        });
        assert!(disposes);
    }

    #[test]
    fn test_loops_and_scopes() {
        let cfg = Lowerer::new()
            .lower(&[Statement::For {
                initializer: vec![Statement::declare("i", TypeKind::Value, Some(Expression::int(0)))],
                condition: Some(Expression::less_than(Expression::local("i"), Expression::int(3))),
                step: vec![Expression::increment(Expression::local("i"))],
                body: vec![Statement::If {
                    condition: Expression::equals(Expression::local("i"), Expression::int(1)),
                    then: vec![Statement::Continue],
                    otherwise: vec![Statement::Break],
                }],
            }])
            .unwrap();

        assert!(region_kinds(&cfg).contains(&RegionKind::LocalLifetime));
        let loop_scope = cfg
            .regions()
            .find(|region| region.kind == RegionKind::LocalLifetime)
            .unwrap();
        assert_eq!(loop_scope.locals.len(), 1);
        assert!(cfg
            .blocks()
            .any(|(id, _)| cfg.predecessors(id).count() >= 2));
    }

    #[test]
    fn test_nested_functions_get_graphs() {
        let cfg = Lowerer::new()
            .local_object("callback")
            .lower(&[
                Statement::LocalFunction {
                    name: "Helper".into(),
                    parameters: vec![Parameter::new("value", TypeKind::Reference)],
                    body: vec![Statement::Return(Some(Expression::parameter("value")))],
                },
                Statement::assign(
                    "callback",
                    Expression::lambda(vec![], vec![Statement::expression(Expression::call(
                        "Helper",
                        vec![Expression::null()],
                    ))]),
                ),
            ])
            .unwrap();

        assert_eq!(cfg.nested_graphs().count(), 2);
        let helper = cfg.symbols().find("Helper", SymbolKind::LocalFunction).unwrap();
        assert!(cfg.local_function_cfg(helper).is_some());
        assert!(cfg.symbols().find("Helper", SymbolKind::Method).is_none());
    }

    #[test]
    fn test_unknown_names_and_stray_jumps_are_rejected() {
        let unknown = Lowerer::new().lower(&[Statement::expression(Expression::local("missing"))]);
        assert!(matches!(unknown, Err(Error::InvalidArgument(_))));

        let stray = Lowerer::new().lower(&[Statement::Break]);
        assert!(matches!(stray, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_symbol_lookup_prefers_locals() {
        let lowerer = Lowerer::new()
            .field("value", TypeKind::Reference)
            .local_object("value");
        let symbol = lowerer.symbol("value").unwrap();
        assert_eq!(lowerer.symbols().get(symbol).unwrap().kind, SymbolKind::Local);
        assert!(lowerer.symbol("Tag").is_some());
        assert!(lowerer.symbol("nothing").is_none());
    }
}
