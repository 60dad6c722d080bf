mod common;

use circa::{EvalError, RuntimeErrorKind, TermStatus, WorldConfig, evaluate_branch, initialize_with_config, run_function};
use common::{eval, eval_err, float_of, int_of, rendered, world};

#[test]
fn test_arithmetic_chain() {
    let mut world = world();
    let branch = world.create_branch();
    let a = world.create_int(branch, 6, Some("a")).unwrap();
    let b = world.create_float(branch, 1.5, None).unwrap();
    let product = world.call(branch, "mult", vec![a, b]).unwrap();
    let half = world.call(branch, "div", vec![product, a]).unwrap();

    eval(&mut world, branch);

    assert_eq!(float_of(&world, product), 9.0);
    assert_eq!(float_of(&world, half), 1.5);
}

#[test]
fn test_list_and_filter() {
    let mut world = world();
    let branch = world.create_branch();
    let t = world.builtin_types().clone();
    let items = world
        .create_list(branch, vec![t.make_int(10), t.make_int(20), t.make_int(30)], None)
        .unwrap();
    let mask = world
        .create_list(branch, vec![t.make_bool(true), t.make_bool(false), t.make_bool(true)], None)
        .unwrap();
    let kept = world.call(branch, "filter", vec![items, mask]).unwrap();
    let count = world.call(branch, "length", vec![kept]).unwrap();

    eval(&mut world, branch);

    assert_eq!(rendered(&world, kept), "[10, 30]");
    assert_eq!(world.graph.term(kept).unwrap().declared_type.name, "List<int>");
    assert_eq!(int_of(&world, count), 2);
}

#[test]
fn test_filter_length_mismatch() {
    let mut world = world();
    let branch = world.create_branch();
    let t = world.builtin_types().clone();
    let items = world.create_list(branch, vec![t.make_int(1), t.make_int(2)], None).unwrap();
    let mask = world.create_list(branch, vec![t.make_bool(true)], None).unwrap();
    let kept = world.call(branch, "filter", vec![items, mask]).unwrap();

    match eval_err(&mut world, branch) {
        EvalError::Runtime(err) => {
            assert_eq!(err.kind, RuntimeErrorKind::InputsLengthMismatch { left: 2, right: 1 });
            assert_eq!(err.term, Some(kept));
        }
        other => panic!("expected runtime error, got {:?}", other),
    }
    assert_eq!(world.graph.term(kept).unwrap().status, TermStatus::Errored);
}

#[test]
fn test_if_else_chain() {
    let mut world = world();
    let branch = world.create_branch();
    let x = world.create_int(branch, 7, Some("x")).unwrap();
    let five = world.create_int(branch, 5, None).unwrap();
    let small = world.call(branch, "less_than", vec![x, five]).unwrap();
    let block = world.if_block(branch).unwrap();
    let then = world.add_case(block, Some(small)).unwrap();
    world.create_string(then, "small", None).unwrap();
    let otherwise = world.add_case(block, None).unwrap();
    world.create_string(otherwise, "large", None).unwrap();

    eval(&mut world, branch);

    assert_eq!(rendered(&world, block), "large");
}

#[test]
fn test_rebinding_in_case_is_visible_after_block() {
    let mut world = world();
    let branch = world.create_branch();
    world.create_int(branch, 1, Some("x")).unwrap();
    let flag = world.create_bool(branch, true, Some("flag")).unwrap();
    let block = world.if_block(branch).unwrap();
    let then = world.add_case(block, Some(flag)).unwrap();
    world.create_int(then, 2, Some("x")).unwrap();
    let joins = world.finish_if_block(block).unwrap();

    assert_eq!(joins.len(), 1);
    assert_eq!(world.graph.lookup(branch, "x"), Some(joins[0]));

    let x = world.graph.lookup(branch, "x").unwrap();
    let zero = world.create_int(branch, 0, None).unwrap();
    let y = world.call(branch, "add", vec![x, zero]).unwrap();

    eval(&mut world, branch);
    assert_eq!(int_of(&world, y), 2);

    let t = world.builtin_types().clone();
    world.set_value(flag, t.make_bool(false)).unwrap();
    eval(&mut world, branch);
    assert_eq!(int_of(&world, y), 1);
}

#[test]
fn test_name_bound_in_every_case_is_joined() {
    let mut world = world();
    let branch = world.create_branch();
    let flag = world.create_bool(branch, false, Some("flag")).unwrap();
    let block = world.if_block(branch).unwrap();
    let then = world.add_case(block, Some(flag)).unwrap();
    world.create_string(then, "yes", Some("answer")).unwrap();
    world.create_string(then, "only here", Some("scratch")).unwrap();
    let otherwise = world.add_case(block, None).unwrap();
    world.create_string(otherwise, "no", Some("answer")).unwrap();
    let joins = world.finish_if_block(block).unwrap();

    assert_eq!(joins.len(), 1);
    assert!(world.graph.lookup(branch, "scratch").is_none());
    let answer = world.graph.lookup(branch, "answer").unwrap();

    eval(&mut world, branch);
    assert_eq!(rendered(&world, answer), "no");

    let t = world.builtin_types().clone();
    world.set_value(flag, t.make_bool(true)).unwrap();
    eval(&mut world, branch);
    assert_eq!(rendered(&world, answer), "yes");
}

#[test]
fn test_for_loop_with_index() {
    let mut world = world();
    let branch = world.create_branch();
    let three = world.create_int(branch, 3, None).unwrap();
    let items = world.call(branch, "range", vec![three]).unwrap();
    let (for_term, body) = world.for_loop(branch, items, "x").unwrap();
    let x = world.graph.lookup(body, "x").unwrap();
    let index = world.graph.lookup(body, circa::graph::building::LOOP_INDEX_NAME).unwrap();
    world.call(body, "mult", vec![x, index]).unwrap();

    eval(&mut world, branch);

    assert_eq!(rendered(&world, for_term), "[0, 1, 4]");
}

#[test]
fn test_break_stops_loop() {
    let mut world = world();
    let branch = world.create_branch();
    let t = world.builtin_types().clone();
    let items = world
        .create_list(branch, (1..=4).map(|i| t.make_int(i)).collect(), None)
        .unwrap();
    let three = world.create_int(branch, 3, None).unwrap();
    let (for_term, body) = world.for_loop(branch, items, "x").unwrap();
    let x = world.graph.lookup(body, "x").unwrap();
    let hit = world.call(body, "equals", vec![x, three]).unwrap();
    let block = world.if_block(body).unwrap();
    let case = world.add_case(block, Some(hit)).unwrap();
    world.append_break(case).unwrap();
    world.call(body, "mult", vec![x, x]).unwrap();

    eval(&mut world, branch);

    assert_eq!(rendered(&world, for_term), "[1, 4]");
}

#[test]
fn test_continue_skips_iteration() {
    let mut world = world();
    let branch = world.create_branch();
    let t = world.builtin_types().clone();
    let items = world
        .create_list(branch, (1..=4).map(|i| t.make_int(i)).collect(), None)
        .unwrap();
    let three = world.create_int(branch, 3, None).unwrap();
    let (for_term, body) = world.for_loop(branch, items, "x").unwrap();
    let x = world.graph.lookup(body, "x").unwrap();
    let hit = world.call(body, "equals", vec![x, three]).unwrap();
    let block = world.if_block(body).unwrap();
    let case = world.add_case(block, Some(hit)).unwrap();
    world.append_continue(case).unwrap();
    world.call(body, "mult", vec![x, x]).unwrap();

    eval(&mut world, branch);

    assert_eq!(rendered(&world, for_term), "[1, 4, 16]");
}

#[test]
fn test_break_outside_loop_is_ignored() {
    let mut world = world();
    let branch = world.create_branch();
    world.append_break(branch).unwrap();
    let after = world.create_int(branch, 1, None).unwrap();
    let sum = world.call(branch, "add", vec![after, after]).unwrap();

    eval(&mut world, branch);

    assert_eq!(int_of(&world, sum), 2);
}

/// `abs(x)`: returns early from inside an if-case.
fn define_abs(world: &mut circa::World, branch: circa::BranchId) -> circa::TermId {
    let int = world.builtin_types().int.clone();
    let def = world.define_subroutine(branch, "abs", &[("x", int.clone())], int).unwrap();
    let body = world.subroutine_body(def).unwrap();
    let x = world.graph.lookup(body, "x").unwrap();
    let zero = world.create_int(body, 0, None).unwrap();
    let negative = world.call(body, "less_than", vec![x, zero]).unwrap();
    let block = world.if_block(body).unwrap();
    let case = world.add_case(block, Some(negative)).unwrap();
    let flipped = world.call(case, "sub", vec![zero, x]).unwrap();
    world.append_return(case, Some(flipped)).unwrap();
    world.call(body, "add", vec![x, zero]).unwrap();
    def
}

#[test]
fn test_return_from_nested_case() {
    let mut world = world();
    let branch = world.create_branch();
    define_abs(&mut world, branch);
    let minus_five = world.create_int(branch, -5, None).unwrap();
    let three = world.create_int(branch, 3, None).unwrap();
    let a = world.call(branch, "abs", vec![minus_five]).unwrap();
    let b = world.call(branch, "abs", vec![three]).unwrap();

    eval(&mut world, branch);

    assert_eq!(int_of(&world, a), 5);
    assert_eq!(int_of(&world, b), 3);
}

#[test]
fn test_run_function_from_host() {
    let mut world = world();
    let branch = world.create_branch();
    let def = define_abs(&mut world, branch);
    let mut stack = world.alloc_stack();
    let t = world.builtin_types().clone();

    let out = run_function(&mut world, &mut stack, def, vec![t.make_int(-9)]).unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].as_int(), Some(9));
    assert_eq!(stack.depth(), 0);
    assert!(!stack.has_error());
}

#[test]
fn test_ignore_error_recovers() {
    let mut world = world();
    let branch = world.create_branch();
    let (guard, body) = world.ignore_error(branch).unwrap();
    let message = world.create_string(body, "boom", None).unwrap();
    world.call(body, "raise", vec![message]).unwrap();
    let after = world.create_int(branch, 2, None).unwrap();
    let doubled = world.call(branch, "add", vec![after, after]).unwrap();

    eval(&mut world, branch);

    assert!(world.value_of(guard).unwrap().is_null());
    assert_eq!(world.graph.term(guard).unwrap().status, TermStatus::Done);
    assert_eq!(int_of(&world, doubled), 4);
}

#[test]
fn test_uncaught_raise_sets_stack_error() {
    let mut world = world();
    let branch = world.create_branch();
    let message = world.create_string(branch, "boom", None).unwrap();
    let raise = world.call(branch, "raise", vec![message]).unwrap();
    let mut stack = world.alloc_stack();

    let err = evaluate_branch(&mut world, &mut stack, branch).unwrap_err();

    assert_eq!(err.to_string(), "boom");
    assert!(stack.has_error());
    assert_eq!(stack.error_message(), "boom");
    match stack.error() {
        Some(EvalError::Runtime(err)) => assert_eq!(err.term, Some(raise)),
        other => panic!("unexpected stack error {:?}", other),
    }
}

#[test]
fn test_recursion_overflows_configured_depth() {
    let mut world = initialize_with_config(WorldConfig {
        max_frame_depth: 32,
        ..WorldConfig::default()
    }).unwrap();
    let branch = world.create_branch();
    let int = world.builtin_types().int.clone();
    let def = world.define_subroutine(branch, "forever", &[("n", int.clone())], int).unwrap();
    let body = world.subroutine_body(def).unwrap();
    let n = world.graph.lookup(body, "n").unwrap();
    world.call(body, "forever", vec![n]).unwrap();
    let seed = world.create_int(branch, 1, None).unwrap();
    world.call(branch, "forever", vec![seed]).unwrap();
    let mut stack = world.alloc_stack();

    let err = evaluate_branch(&mut world, &mut stack, branch).unwrap_err();

    match err {
        EvalError::Runtime(err) => assert_eq!(err.kind, RuntimeErrorKind::StackOverflow { depth: 32 }),
        other => panic!("expected stack overflow, got {:?}", other),
    }
    assert_eq!(stack.depth(), 0);
}

#[test]
fn test_changed_detects_new_input() {
    let mut world = world();
    let branch = world.create_branch();
    let x = world.create_int(branch, 1, Some("x")).unwrap();
    let changed = world.call(branch, "changed", vec![x]).unwrap();
    let mut stack = world.alloc_stack();
    let t = world.builtin_types().clone();

    evaluate_branch(&mut world, &mut stack, branch).unwrap();
    assert_eq!(world.value_of(changed).and_then(|v| v.as_bool()), Some(true));
    evaluate_branch(&mut world, &mut stack, branch).unwrap();
    assert_eq!(world.value_of(changed).and_then(|v| v.as_bool()), Some(false));
    world.set_value(x, t.make_int(2)).unwrap();
    evaluate_branch(&mut world, &mut stack, branch).unwrap();
    assert_eq!(world.value_of(changed).and_then(|v| v.as_bool()), Some(true));
}
