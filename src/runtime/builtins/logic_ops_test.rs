use super::TestContext;
use super::logic_ops::{builtin_changed, builtin_concat, builtin_cond, builtin_equals, builtin_unique_id};
use crate::runtime::RuntimeErrorKind;

#[test]
fn equals_compares_numerically() {
    let mut ctx = TestContext::new();
    let t = ctx.registry.builtins().clone();
    let same = builtin_equals(&mut ctx, vec![t.make_int(2), t.make_float(2.0)]).unwrap();
    assert_eq!(same.as_bool(), Some(true));
    let different = builtin_equals(&mut ctx, vec![t.make_string("2"), t.make_int(2)]).unwrap();
    assert_eq!(different.as_bool(), Some(false));
}

#[test]
fn cond_picks_branch() {
    let mut ctx = TestContext::new();
    let t = ctx.registry.builtins().clone();
    let picked = builtin_cond(&mut ctx, vec![t.make_bool(false), t.make_int(1), t.make_int(2)]).unwrap();
    assert_eq!(picked.as_int(), Some(2));
    let picked = builtin_cond(&mut ctx, vec![t.make_bool(true), t.make_int(1), t.make_int(2)]).unwrap();
    assert_eq!(picked.as_int(), Some(1));
}

#[test]
fn assert_and_raise_fail() {
    let mut ctx = TestContext::new();
    let t = ctx.registry.builtins().clone();
    let err = ctx.call("assert", vec![t.make_bool(false)]).unwrap_err();
    assert_eq!(err.kind, RuntimeErrorKind::AssertionFailed);
    assert!(ctx.call("assert", vec![t.make_bool(true)]).unwrap().is_null());

    let err = ctx.call("raise", vec![t.make_string("boom")]).unwrap_err();
    assert_eq!(err.to_string(), "boom");
}

#[test]
fn concat_renders_each_input() {
    let mut ctx = TestContext::new();
    let t = ctx.registry.builtins().clone();
    let s = builtin_concat(&mut ctx, vec![t.make_string("x="), t.make_float(2.0), t.make_bool(true)]).unwrap();
    assert_eq!(s.as_str(), Some("x=2.0true"));
}

#[test]
fn unique_ids_increase() {
    let mut ctx = TestContext::new();
    let first = builtin_unique_id(&mut ctx, vec![]).unwrap().as_int().unwrap();
    let second = builtin_unique_id(&mut ctx, vec![]).unwrap().as_int().unwrap();
    assert!(second > first);
}

#[test]
fn changed_tracks_previous_input() {
    let mut ctx = TestContext::new();
    let t = ctx.registry.builtins().clone();
    ctx.state = Some(t.null());
    let first = builtin_changed(&mut ctx, vec![t.make_int(1)]).unwrap();
    let again = builtin_changed(&mut ctx, vec![t.make_int(1)]).unwrap();
    let moved = builtin_changed(&mut ctx, vec![t.make_int(2)]).unwrap();
    assert_eq!(first.as_bool(), Some(true));
    assert_eq!(again.as_bool(), Some(false));
    assert_eq!(moved.as_bool(), Some(true));
}
