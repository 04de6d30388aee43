#![allow(dead_code)]

use bytemuck::Zeroable;

use arena_ecs::{ArchetypeId, Context, Foreach};

pub const AGENTS_SMALL: usize = 10_000;
pub const AGENTS_MED: usize = 100_000;

#[derive(Clone, Copy, Zeroable)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Zeroable)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Zeroable)]
pub struct Wealth {
    pub value: f32,
}

pub struct World {
    pub ctx: Context,
    pub movers: ArchetypeId,
    pub traders: ArchetypeId,
    pub kinematics: Foreach<(Position, Velocity)>,
    pub wealth: Foreach<(Wealth,)>,
}

pub fn make_world() -> World {
    let mut ctx = Context::new();
    let movers = ctx.declare_archetype::<(Position, Velocity)>().unwrap();
    let traders = ctx
        .declare_archetype::<(Position, Wealth)>()
        .unwrap();
    let kinematics = ctx.declare_foreach::<(Position, Velocity)>().unwrap();
    let wealth = ctx.declare_foreach::<(Wealth,)>().unwrap();
    ctx.setup().unwrap();
    World {
        ctx,
        movers,
        traders,
        kinematics,
        wealth,
    }
}

pub fn populate(world: &mut World, agents: usize) {
    for i in 0..agents {
        let mover = world.ctx.create(world.movers).unwrap();
        if let Some(vel) = world.ctx.get_mut::<Velocity>(mover).unwrap() {
            vel.x = (i % 7) as f32;
            vel.y = (i % 13) as f32;
        }

        let trader = world.ctx.create(world.traders).unwrap();
        if let Some(wealth) = world.ctx.get_mut::<Wealth>(trader).unwrap() {
            wealth.value = i as f32;
        }
    }
}
