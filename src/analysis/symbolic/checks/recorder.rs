//! State inspection at labelled points.

use std::{cell::RefCell, rc::Rc, sync::Arc};

use crate::{
    analysis::symbolic::{
        Constraint, ExecutionConfig, ProgramState, SymbolicCheck, SymbolicContext, SymbolicValue,
    },
    operation::{LiteralValue, OperationId, OperationKind, SymbolId},
};

/// The program state at one marker invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSnapshot {
    /// The marker name (first argument of the marker call).
    pub name: Arc<str>,
    /// The state just before the marker call.
    pub state: ProgramState,
    /// The value of the second argument, if any.
    pub value: Option<SymbolicValue>,
}

/// Everything a [`StateRecorder`] saw during one walk.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    /// Marker snapshots in the order the walk reached them.
    pub tags: Vec<TagSnapshot>,
    /// The distinct exit states.
    pub exit_states: Vec<ProgramState>,
    /// Completion flag, set once the walk ended.
    pub completed: Option<bool>,
}

impl Recording {
    /// Returns the marker names in the order they were reached, repeats included.
    #[must_use]
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| &*tag.name).collect()
    }

    /// Iterates over the snapshots of marker `name`.
    pub fn snapshots<'r, 'n>(&'r self, name: &'n str) -> impl Iterator<Item = &'r TagSnapshot> + 'n
    where
        'r: 'n,
    {
        self.tags.iter().filter(move |tag| &*tag.name == name)
    }

    /// Returns the states recorded at marker `name`.
    #[must_use]
    pub fn states(&self, name: &str) -> Vec<&ProgramState> {
        self.snapshots(name).map(|tag| &tag.state).collect()
    }

    /// Returns the values passed to marker `name`, one per snapshot.
    #[must_use]
    pub fn values(&self, name: &str) -> Vec<Option<&SymbolicValue>> {
        self.snapshots(name).map(|tag| tag.value.as_ref()).collect()
    }

    /// Returns `true` if marker `name` was reached and `symbol` holds `constraint` in
    /// every snapshot.
    #[must_use]
    pub fn symbol_has(&self, name: &str, symbol: SymbolId, constraint: Constraint) -> bool {
        let mut snapshots = self.snapshots(name).peekable();
        snapshots.peek().is_some()
            && snapshots.all(|tag| {
                tag.state
                    .symbol_value(symbol)
                    .is_some_and(|value| value.has_constraint(constraint))
            })
    }

    /// Returns `true` if marker `name` was reached and its value holds `constraint`
    /// in every snapshot.
    #[must_use]
    pub fn value_has(&self, name: &str, constraint: Constraint) -> bool {
        let values = self.values(name);
        !values.is_empty()
            && values
                .into_iter()
                .all(|value| value.is_some_and(|value| value.has_constraint(constraint)))
    }
}

/// Records the state at every invocation of a marker method.
///
/// A marker call looks like `Tag("name")` or `Tag("name", value)`: the first argument
/// is a string literal naming the point, the optional second argument is a value whose
/// constraints are recorded alongside the state. The recorder never changes the state.
///
/// The recording is shared through [`recording`](Self::recording) so it can be read
/// after the check list was handed to the walk.
#[derive(Debug, Clone)]
pub struct StateRecorder {
    method: Arc<str>,
    recording: Rc<RefCell<Recording>>,
}

impl StateRecorder {
    /// Creates a recorder for invocations of methods named `method`.
    #[must_use]
    pub fn new(method: impl Into<Arc<str>>) -> Self {
        StateRecorder {
            method: method.into(),
            recording: Rc::default(),
        }
    }

    /// Creates a recorder for the marker method named by `config`.
    #[must_use]
    pub fn from_config(config: &ExecutionConfig) -> Self {
        StateRecorder::new(config.tag_method.as_str())
    }

    /// Returns a handle to the recording.
    #[must_use]
    pub fn recording(&self) -> Rc<RefCell<Recording>> {
        Rc::clone(&self.recording)
    }

    fn marker_name(context: &SymbolicContext<'_>, argument: OperationId) -> Option<Arc<str>> {
        let tree = context.cfg().operations();
        let mut current = argument;
        loop {
            match tree.kind(current)? {
                OperationKind::Argument { value, .. }
                | OperationKind::Conversion { operand: value, .. } => current = *value,
                OperationKind::Literal(LiteralValue::String(name)) => return Some(Arc::clone(name)),
                _ => return None,
            }
        }
    }
}

impl SymbolicCheck for StateRecorder {
    fn pre_process(&mut self, context: &SymbolicContext<'_>) -> Option<ProgramState> {
        if let Some(OperationKind::Invocation {
            method, arguments, ..
        }) = context.operation_kind()
        {
            let is_marker = context
                .cfg()
                .symbol(*method)
                .is_some_and(|symbol| symbol.name == self.method);
            let name = arguments
                .first()
                .and_then(|argument| Self::marker_name(context, *argument));
            if let (true, Some(name)) = (is_marker, name) {
                let value = arguments
                    .get(1)
                    .and_then(|argument| context.value_of(*argument).cloned());
                self.recording.borrow_mut().tags.push(TagSnapshot {
                    name,
                    state: context.state().clone(),
                    value,
                });
            }
        }
        Some(context.state().clone())
    }

    fn exit_reached(&mut self, context: &SymbolicContext<'_>) {
        self.recording
            .borrow_mut()
            .exit_states
            .push(context.state().clone());
    }

    fn execution_completed(&mut self, completed: bool) {
        self.recording.borrow_mut().completed = Some(completed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::symbolic::SymbolicExecution,
        syntax::{Expression, Lowerer, Statement},
    };

    #[test]
    fn test_records_tags_in_order() {
        let lowerer = Lowerer::new().local_bool("flag");
        let flag = lowerer.symbol("flag").unwrap();
        let cfg = lowerer
            .lower(&[
                Statement::tag("Before", None),
                Statement::assign("flag", Expression::bool(true)),
                Statement::tag("After", Some(Expression::local("flag"))),
            ])
            .unwrap();

        let recorder = StateRecorder::new("Tag");
        let recording = recorder.recording();
        let mut execution =
            SymbolicExecution::new(&cfg, recorder.into(), ExecutionConfig::default()).unwrap();
        let outcome = execution.walk();

        let recording = recording.borrow();
        assert_eq!(recording.tag_names(), vec!["Before", "After"]);
        assert!(recording.states("Before")[0].symbol_value(flag).is_none());
        assert!(recording.symbol_has("After", flag, Constraint::TRUE));
        assert!(recording.value_has("After", Constraint::TRUE));
        assert_eq!(recording.exit_states.len(), outcome.exit_reach_count());
        assert_eq!(recording.completed, Some(true));
    }

    #[test]
    fn test_lookups_outlive_the_name() {
        let recording = Recording {
            tags: vec![TagSnapshot {
                name: Arc::from("Point"),
                state: ProgramState::empty(),
                value: None,
            }],
            ..Recording::default()
        };
        let states = {
            let name = String::from("Point");
            recording.states(&name)
        };
        let values = {
            let name = String::from("Point");
            recording.values(&name)
        };
        assert_eq!(states, vec![&ProgramState::empty()]);
        assert_eq!(values, vec![None]);
    }

    #[test]
    fn test_unreached_tag_has_nothing() {
        let recording = Recording::default();
        assert!(!recording.symbol_has("Missing", SymbolId::new(0), Constraint::TRUE));
        assert!(!recording.value_has("Missing", Constraint::TRUE));
    }

    #[test]
    fn test_custom_marker_method() {
        let config = ExecutionConfig::default().with_tag_method("Mark");
        let cfg = Lowerer::new()
            .lower(&[Statement::marker("Mark", "Here", None), Statement::tag("Ignored", None)])
            .unwrap();

        let recorder = StateRecorder::from_config(&config);
        let recording = recorder.recording();
        let mut execution = SymbolicExecution::new(&cfg, recorder.into(), config).unwrap();
        execution.walk();

        assert_eq!(recording.borrow().tag_names(), vec!["Here"]);
    }
}
