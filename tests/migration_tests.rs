mod common;

use circa::{BranchId, MigrationReport, TermId, World, migrate_stateful_values, runtime::types::TypeRef};
use common::{eval, int_of, world};

/// `state <type_> counter = 0; counter = add(counter, 1)`.
fn counter_script(world: &mut World, type_: TypeRef) -> (BranchId, TermId, TermId) {
    let branch = world.create_branch();
    let t = world.builtin_types().clone();
    let initial = if type_.name == "string" { t.make_string("") } else { t.make_int(0) };
    let state = world.declare_state(branch, "counter", type_, Some(initial)).unwrap();
    let one = world.create_int(branch, 1, None).unwrap();
    let next = world.call_named(branch, "counter", "add", vec![state, one]).unwrap();
    (branch, state, next)
}

#[test]
fn test_state_carries_over_to_identical_code() {
    let mut world = world();
    let int = world.builtin_types().int.clone();
    let (old, _, _) = counter_script(&mut world, int.clone());
    for _ in 0..3 {
        eval(&mut world, old);
    }
    let (new, new_state, new_next) = counter_script(&mut world, int);

    let report = world.reload_branch(old, new);

    assert!(report.unchanged);
    assert_eq!(report.migration.migrated, 1);
    assert_eq!(world.state_of(new_state).and_then(|v| v.as_int()), Some(3));
    eval(&mut world, new);
    assert_eq!(int_of(&world, new_next), 4);
}

#[test]
fn test_incompatible_state_is_discarded() {
    let mut world = world();
    let t = world.builtin_types().clone();
    let (old, _, _) = counter_script(&mut world, t.int.clone());
    eval(&mut world, old);

    let new = world.create_branch();
    let counter = world
        .declare_state(new, "counter", t.string.clone(), Some(t.make_string("fresh")))
        .unwrap();

    let report = migrate_stateful_values(&mut world, old, new);

    assert_eq!(report, MigrationReport { migrated: 0, discarded: 1 });
    assert!(world.state_of(counter).is_none());
    eval(&mut world, new);
    assert_eq!(world.state_of(counter).and_then(|v| v.as_str().map(str::to_string)), Some("fresh".to_string()));
}

#[test]
fn test_changed_code_still_migrates_by_name() {
    let mut world = world();
    let int = world.builtin_types().int.clone();
    let (old, _, _) = counter_script(&mut world, int.clone());
    eval(&mut world, old);
    eval(&mut world, old);

    let new = world.create_branch();
    let t = world.builtin_types().clone();
    let ten = world.create_int(new, 10, Some("step")).unwrap();
    let state = world.declare_state(new, "counter", int, Some(t.make_int(0))).unwrap();
    let next = world.call_named(new, "counter", "add", vec![state, ten]).unwrap();

    let report = world.reload_branch(old, new);

    assert!(!report.unchanged);
    assert_eq!(report.migration.migrated, 1);
    eval(&mut world, new);
    assert_eq!(int_of(&world, next), 12);
}

#[test]
fn test_loop_slots_migrate_with_remapped_refs() {
    let mut world = world();
    let t = world.builtin_types().clone();
    let build = |world: &mut World| {
        let branch = world.create_branch();
        let two = world.create_int(branch, 2, None).unwrap();
        let items = world.call(branch, "range", vec![two]).unwrap();
        let (for_term, body) = world.for_loop(branch, items, "x").unwrap();
        let id = world.declare_state(body, "id", t.int.clone(), None).unwrap();
        let init = world.state_initializer(id).unwrap();
        world.call(init, "unique_id", vec![]).unwrap();
        (branch, for_term)
    };
    let (old, old_loop) = build(&mut world);
    eval(&mut world, old);
    let before = world.value_of(old_loop).map(|v| v.to_string());

    let (new, new_loop) = build(&mut world);
    let report = world.reload_branch(old, new);
    eval(&mut world, new);

    assert!(report.unchanged);
    assert_eq!(report.migration.migrated, 1);
    assert_eq!(world.value_of(new_loop).map(|v| v.to_string()), before);
}
