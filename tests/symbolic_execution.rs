//! End-to-end walks of lowered bodies.

use std::{
    cell::RefCell,
    rc::Rc,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use pretty_assertions::assert_eq;
use symscope::{
    analysis::{
        driver::{analyze_cached, Body},
        symbolic::{checks::NULL_DEREFERENCE_RULE, MAX_STEP_COUNT},
    },
    prelude::*,
    Result,
};

fn walk(cfg: &ControlFlowGraph, config: ExecutionConfig) -> Result<(WalkOutcome, Rc<RefCell<Recording>>)> {
    let recorder = StateRecorder::from_config(&config);
    let recording = recorder.recording();
    let outcome = SymbolicExecution::new(cfg, recorder.into(), config)?.walk();
    Ok((outcome, recording))
}

fn branch_assigning(when_true: bool, when_false: bool) -> Result<ControlFlowGraph> {
    Lowerer::new().local_bool("value").lower(&[Statement::If {
        condition: Expression::call("Next", vec![]),
        then: vec![Statement::assign("value", Expression::bool(when_true))],
        otherwise: vec![Statement::assign("value", Expression::bool(when_false))],
    }])
}

#[test]
fn equivalent_branches_merge_at_exit() -> Result<()> {
    let (same, _) = walk(&branch_assigning(true, true)?, ExecutionConfig::default())?;
    let (different, _) = walk(&branch_assigning(true, false)?, ExecutionConfig::default())?;

    assert!(same.completed);
    assert!(different.completed);
    assert_eq!(same.exit_reach_count(), 1);
    assert_eq!(different.exit_reach_count(), 2);
    Ok(())
}

#[test]
fn exhausted_step_budget_reports_incomplete_walk() -> Result<()> {
    // Each assignment is three operations: the target, the literal and the assignment.
    let statements: Vec<_> = (0..MAX_STEP_COUNT / 3 + 1)
        .map(|index| Statement::assign("value", Expression::int(index as i128)))
        .collect();
    let cfg = Lowerer::new().local_int("value").lower(&statements)?;

    let (outcome, recording) = walk(&cfg, ExecutionConfig::default())?;

    assert!(!outcome.completed);
    assert!(!outcome.cancelled);
    assert_eq!(outcome.exit_reach_count(), 0);
    assert_eq!(recording.borrow().completed, Some(false));

    let short = Lowerer::new().local_int("value").lower(&statements[..100])?;
    let (outcome, _) = walk(&short, ExecutionConfig::default())?;
    assert!(outcome.completed);
    Ok(())
}

#[test]
fn long_counting_loop_is_walked_in_constant_steps() -> Result<()> {
    let lowerer = Lowerer::new();
    let cfg = lowerer.lower(&[
        Statement::For {
            initializer: vec![Statement::declare("i", TypeKind::Value, Some(Expression::int(0)))],
            condition: Some(Expression::less_than(Expression::local("i"), Expression::int(10_000))),
            step: vec![Expression::increment(Expression::local("i"))],
            body: vec![Statement::tag("Body", None)],
        },
        Statement::tag("After", None),
    ])?;

    let (outcome, recording) = walk(&cfg, ExecutionConfig::default())?;

    assert!(outcome.completed);
    assert!(outcome.steps < 200, "took {} steps", outcome.steps);
    assert!(recording.borrow().tag_names().contains(&"After"));
    Ok(())
}

#[test]
fn nested_finally_regions_run_inner_first() -> Result<()> {
    let cfg = Lowerer::new().lower(&[
        Statement::try_finally(
            vec![Statement::try_finally(
                vec![Statement::tag("Body", None), Statement::Return(None)],
                vec![Statement::tag("Inner", None)],
            )],
            vec![Statement::tag("Outer", None)],
        ),
        Statement::tag("Unreachable", None),
    ])?;

    let (outcome, recording) = walk(&cfg, ExecutionConfig::default())?;

    assert!(outcome.completed);
    assert_eq!(outcome.exit_reach_count(), 1);
    assert_eq!(recording.borrow().tag_names(), vec!["Body", "Inner", "Outer"]);
    Ok(())
}

#[test]
fn conditional_value_flows_through_captures() -> Result<()> {
    let lowerer = Lowerer::new().parameter_bool("flag").local_object("text");
    let text = lowerer.symbol("text").unwrap();
    let cfg = lowerer.lower(&[
        Statement::assign(
            "text",
            Expression::conditional(
                Expression::parameter("flag"),
                Expression::string("yes"),
                Expression::string("no"),
            ),
        ),
        Statement::tag("After", Some(Expression::local("text"))),
    ])?;

    let (outcome, recording) = walk(&cfg, ExecutionConfig::default())?;

    assert!(outcome.completed);
    let recording = recording.borrow();
    assert!(recording.symbol_has("After", text, Constraint::NOT_NULL));
    assert!(recording.value_has("After", Constraint::NOT_NULL));
    Ok(())
}

#[test]
fn locals_are_forgotten_when_their_scope_ends() -> Result<()> {
    let body = [
        Statement::Block(vec![Statement::declare(
            "scoped",
            TypeKind::Value,
            Some(Expression::bool(true)),
        )]),
        Statement::tag("After", None),
    ];

    for (forget, expect_value) in [(false, true), (true, false)] {
        let cfg = Lowerer::new().lower(&body)?;
        let scoped = cfg
            .symbols()
            .find("scoped", SymbolKind::Local)
            .expect("declared local");
        let config = ExecutionConfig::default().with_forget_locals_on_scope_exit(forget);

        let (outcome, recording) = walk(&cfg, config)?;

        assert!(outcome.completed);
        let recording = recording.borrow();
        let states = recording.states("After");
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].symbol_value(scoped).is_some(), expect_value);
    }
    Ok(())
}

#[test]
fn using_disposes_the_resource() -> Result<()> {
    let cfg = Lowerer::new().lower(&[
        Statement::Using {
            variable: Some("resource".into()),
            resource: Expression::new_object("Stream"),
            body: vec![Statement::tag("Inside", None)],
        },
        Statement::tag("After", None),
    ])?;
    let resource = cfg
        .symbols()
        .find("resource", SymbolKind::Local)
        .expect("declared resource");

    let (outcome, recording) = walk(&cfg, ExecutionConfig::default())?;

    assert!(outcome.completed);
    let recording = recording.borrow();
    assert!(recording.symbol_has("Inside", resource, Constraint::NOT_NULL));
    assert!(!recording.symbol_has("Inside", resource, Constraint::DISPOSED));
    assert!(recording.symbol_has("After", resource, Constraint::DISPOSED));
    Ok(())
}

#[test]
fn cancellation_stops_the_walk() -> Result<()> {
    let cfg = branch_assigning(true, false)?;
    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let outcome = SymbolicExecution::new(&cfg, NullDereference::new().into(), ExecutionConfig::default())?
        .walk_with_cancellation(&cancellation);

    assert!(outcome.cancelled);
    assert!(!outcome.completed);
    assert!(matches!(outcome.check_cancelled(), Err(Error::Cancelled)));
    Ok(())
}

fn counted_body<'a>(
    builds: &'a AtomicUsize,
    compilation: u64,
    id: u64,
) -> Body<impl FnOnce() -> Result<ControlFlowGraph> + Send + 'a> {
    Body {
        compilation: CompilationId(compilation),
        id: BodyId(id),
        build: move || {
            builds.fetch_add(1, Ordering::Relaxed);
            branch_assigning(true, false)
        },
    }
}

#[test]
fn cache_shares_graphs_per_compilation() -> Result<()> {
    let cache = CfgCache::new();
    let builds = AtomicUsize::new(0);

    let outcomes = analyze_cached(
        &cache,
        vec![
            counted_body(&builds, 1, 0),
            counted_body(&builds, 1, 0),
            counted_body(&builds, 2, 0),
        ],
        SymbolicCheckList::default,
        &ExecutionConfig::default(),
        &CancellationToken::new(),
    )?;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|outcome| outcome.exit_reach_count() == 2));
    assert_eq!(cache.len(), 2);
    assert!(builds.load(Ordering::Relaxed) >= 2);

    let first = cache.get(CompilationId(1), BodyId(0)).expect("cached graph");
    let again = cache.get_or_build(CompilationId(1), BodyId(0), || branch_assigning(true, true))?;
    assert!(Arc::ptr_eq(&first, &again));

    cache.remove_compilation(CompilationId(1));
    assert_eq!(cache.len(), 1);
    Ok(())
}

#[test]
fn same_shaped_bodies_in_one_compilation_stay_apart() -> Result<()> {
    let cache = CfgCache::new();
    let first = cache.get_or_build(CompilationId(1), BodyId(1), || branch_assigning(true, true))?;
    let second = cache.get_or_build(CompilationId(1), BodyId(2), || branch_assigning(true, false))?;

    // Both trees number their operations from zero.
    assert_eq!(first.root(), second.root());
    assert!(!Arc::ptr_eq(&first, &second));

    let (merged, _) = walk(&first, ExecutionConfig::default())?;
    let (split, _) = walk(&second, ExecutionConfig::default())?;
    assert_eq!(merged.exit_reach_count(), 1);
    assert_eq!(split.exit_reach_count(), 2);
    Ok(())
}

#[test]
fn finally_runs_when_try_throws() -> Result<()> {
    let cfg = Lowerer::new().lower(&[
        Statement::try_finally(
            vec![
                Statement::tag("InTry", None),
                Statement::Throw(Some(Expression::new_object("Exception"))),
            ],
            vec![Statement::tag("InFinally", None)],
        ),
        Statement::tag("Unreachable", None),
    ])?;

    let (outcome, recording) = walk(&cfg, ExecutionConfig::default())?;

    assert!(outcome.completed);
    assert_eq!(recording.borrow().tag_names(), vec!["InTry", "InFinally"]);
    Ok(())
}

#[test]
fn nested_finally_regions_run_on_throw() -> Result<()> {
    let cfg = Lowerer::new().lower(&[Statement::try_finally(
        vec![Statement::try_finally(
            vec![
                Statement::tag("Body", None),
                Statement::Throw(Some(Expression::new_object("Exception"))),
            ],
            vec![Statement::tag("Inner", None)],
        )],
        vec![Statement::tag("Outer", None)],
    )])?;

    let (outcome, recording) = walk(&cfg, ExecutionConfig::default())?;

    assert!(outcome.completed);
    assert_eq!(recording.borrow().tag_names(), vec!["Body", "Inner", "Outer"]);
    Ok(())
}

#[test]
fn null_comparison_splits_the_parameter() -> Result<()> {
    let lowerer = Lowerer::new().parameter_object("arg");
    let arg = lowerer.symbol("arg").expect("declared parameter");
    let cfg = lowerer.lower(&[Statement::If {
        condition: Expression::equals(Expression::parameter("arg"), Expression::null()),
        then: vec![Statement::tag("If", Some(Expression::parameter("arg")))],
        otherwise: vec![Statement::tag("Else", Some(Expression::parameter("arg")))],
    }])?;

    let (outcome, recording) = walk(&cfg, ExecutionConfig::default())?;

    assert!(outcome.completed);
    assert_eq!(outcome.exit_reach_count(), 2);
    let recording = recording.borrow();
    assert!(recording.symbol_has("If", arg, Constraint::NULL));
    assert!(recording.symbol_has("Else", arg, Constraint::NOT_NULL));
    Ok(())
}

#[test]
fn null_dereference_is_reported_once_per_path() -> Result<()> {
    let cfg = Lowerer::new().parameter_object("value").lower(&[
        Statement::If {
            condition: Expression::equals(Expression::parameter("value"), Expression::null()),
            then: vec![Statement::tag("Null", None)],
            otherwise: vec![],
        },
        Statement::expression(Expression::call_on(Expression::parameter("value"), "ToString", vec![])),
        Statement::expression(Expression::call_on(Expression::parameter("value"), "GetHashCode", vec![])),
    ])?;

    let outcome = SymbolicExecution::new(&cfg, NullDereference::new().into(), ExecutionConfig::default())?.walk();

    assert!(outcome.completed);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].rule.as_ref(), NULL_DEREFERENCE_RULE);
    Ok(())
}
