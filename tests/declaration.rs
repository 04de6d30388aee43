use bytemuck::Zeroable;

use arena_ecs::{Context, ContextError, Entity};

#[derive(Clone, Copy, Zeroable, Debug, PartialEq)]
struct Pos {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Zeroable, Debug, PartialEq)]
struct Vel {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Zeroable, Debug, PartialEq)]
struct Unused(u32);

#[test]
fn archetype_declaration_is_order_insensitive() {
    let mut ctx = Context::new();

    let pos_only = ctx.declare_archetype::<(Pos,)>().unwrap();
    let pos_vel = ctx.declare_archetype::<(Pos, Vel)>().unwrap();
    let vel_only = ctx.declare_archetype::<(Vel,)>().unwrap();

    // Any permutation of the same set resolves to the same archetype.
    let vel_pos = ctx.declare_archetype::<(Vel, Pos)>().unwrap();
    assert_eq!(pos_vel, vel_pos);

    // Distinct sets stay distinct.
    assert_ne!(pos_only, pos_vel);
    assert_ne!(vel_only, pos_vel);
    assert_ne!(pos_only, vel_only);

    // Redeclaring an existing set is idempotent.
    assert_eq!(ctx.declare_archetype::<(Pos,)>().unwrap(), pos_only);
}

#[test]
fn duplicate_components_are_rejected() {
    let mut ctx = Context::new();

    let err = ctx.declare_archetype::<(Pos, Pos)>().unwrap_err();
    assert!(matches!(err, ContextError::DuplicateComponent { .. }));

    let err = ctx.declare_foreach::<(Vel, Vel)>().unwrap_err();
    assert!(matches!(err, ContextError::DuplicateComponent { .. }));
}

#[test]
fn redeclaring_a_foreach_resolves_to_the_same_plan() {
    let mut ctx = Context::new();
    let archetype = ctx.declare_archetype::<(Pos, Vel)>().unwrap();

    let first = ctx.declare_foreach::<(Pos, Vel)>().unwrap();
    let again = ctx.declare_foreach::<(Pos, Vel)>().unwrap();
    // A different order is a different plan (argument order matters).
    let swapped = ctx.declare_foreach::<(Vel, Pos)>().unwrap();
    ctx.setup().unwrap();

    for _ in 0..4 {
        ctx.create(archetype).unwrap();
    }

    let mut visits = (0, 0, 0);
    ctx.foreach(first, |_| visits.0 += 1).unwrap();
    ctx.foreach(again, |_| visits.1 += 1).unwrap();
    ctx.foreach(swapped, |_| visits.2 += 1).unwrap();
    assert_eq!(visits, (4, 4, 4));
}

#[test]
fn lifecycle_phases_are_enforced() {
    let mut ctx = Context::new();
    let archetype = ctx.declare_archetype::<(Pos,)>().unwrap();
    let plan = ctx.declare_foreach::<(Pos,)>().unwrap();

    // Operations before setup.
    assert!(matches!(ctx.create(archetype), Err(ContextError::NotSetUp)));
    assert!(matches!(
        ctx.foreach(plan, |_| {}),
        Err(ContextError::NotSetUp)
    ));

    ctx.setup().unwrap();

    // Declarations (and a second setup) after setup.
    assert!(matches!(
        ctx.declare_archetype::<(Vel,)>(),
        Err(ContextError::AlreadySetUp)
    ));
    assert!(matches!(
        ctx.declare_foreach::<(Pos,)>(),
        Err(ContextError::AlreadySetUp)
    ));
    assert!(matches!(ctx.setup(), Err(ContextError::AlreadySetUp)));

    // Operations are now live.
    let entity = ctx.create(archetype).unwrap();
    assert!(ctx.is_alive(entity));
}

#[test]
fn unknown_ids_and_dead_handles_are_reported() {
    let mut ctx = Context::new();
    let archetype = ctx.declare_archetype::<(Pos,)>().unwrap();
    ctx.setup().unwrap();

    assert!(matches!(
        ctx.create(archetype + 1),
        Err(ContextError::UnknownArchetype { .. })
    ));

    let entity = ctx.create(archetype).unwrap();
    ctx.destroy(entity).unwrap();
    assert!(matches!(ctx.destroy(entity), Err(ContextError::DeadEntity)));
    assert!(matches!(
        ctx.get::<Pos>(entity),
        Err(ContextError::DeadEntity)
    ));
}

#[test]
fn get_returns_none_for_components_outside_the_archetype() {
    let mut ctx = Context::new();
    let archetype = ctx.declare_archetype::<(Pos,)>().unwrap();
    ctx.setup().unwrap();

    let entity = ctx.create(archetype).unwrap();
    assert_eq!(ctx.get::<Vel>(entity).unwrap(), None);
    // A component type no archetype ever declared behaves the same.
    assert_eq!(ctx.get::<Unused>(entity).unwrap(), None);
    assert!(ctx.get::<Pos>(entity).unwrap().is_some());
}

#[test]
fn is_alive_is_total_over_forged_handles() {
    let mut ctx = Context::new();
    let archetype = ctx.declare_archetype::<(Pos,)>().unwrap();
    ctx.setup().unwrap();

    let entity = ctx.create(archetype).unwrap();

    // Out-of-range archetype.
    assert!(!ctx.is_alive(Entity {
        archetype: 40_000,
        generation: 0,
        index: 0,
    }));
    // Never-allocated logical index.
    assert!(!ctx.is_alive(Entity {
        archetype,
        generation: 0,
        index: 999,
    }));
    // Wrong generation.
    assert!(!ctx.is_alive(Entity {
        generation: entity.generation.wrapping_add(1),
        ..entity
    }));
    assert!(ctx.is_alive(entity));
}

#[test]
fn clear_kills_issued_handles_only() {
    let mut ctx = Context::new();
    let archetype = ctx.declare_archetype::<(Pos,)>().unwrap();
    ctx.setup().unwrap();

    let issued: Vec<Entity> = (0..8).map(|_| ctx.create(archetype).unwrap()).collect();

    // A handle for a slot that was never allocated: dead before the clear,
    // and still dead after it (clear does not manufacture liveness state
    // for never-issued indices).
    let never_issued = Entity {
        archetype,
        generation: 0,
        index: 1_000,
    };
    assert!(!ctx.is_alive(never_issued));

    ctx.clear();

    for entity in &issued {
        assert!(!ctx.is_alive(*entity));
    }
    assert!(!ctx.is_alive(never_issued));
    assert_eq!(ctx.alive_count(archetype).unwrap(), 0);

    // Freed slots are reissued in index order with fresh generations.
    let reborn = ctx.create(archetype).unwrap();
    assert_eq!(reborn.index, issued[0].index);
    assert_eq!(reborn.generation, issued[0].generation.wrapping_add(1));
    assert!(ctx.is_alive(reborn));
}
