//! # Arena ECS
//!
//! Archetype-based entity–component store optimized for real-time iteration
//! over homogeneous component arrays.
//!
//! ## Design Goals
//! - Contiguous per-component storage, segmented into per-archetype ranges
//! - Entity identity that survives physical relocation
//! - Pre-declared, compiled iteration plans
//! - Structural mutation during iteration through an explicit control handle
//!
//! ## Usage
//! A [`Context`] runs through three phases: declare archetypes and foreach
//! plans, call [`Context::setup`] exactly once, then create, destroy, read,
//! and iterate entities.
//!
//! ```
//! use arena_ecs::prelude::*;
//! use bytemuck::Zeroable;
//!
//! #[derive(Clone, Copy, Zeroable)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Clone, Copy, Zeroable)]
//! struct Velocity { x: f32, y: f32 }
//!
//! # fn main() -> Result<(), arena_ecs::ContextError> {
//! let mut ctx = Context::new();
//! let movers = ctx.declare_archetype::<(Position, Velocity)>()?;
//! let kinematics = ctx.declare_foreach::<(Position, Velocity)>()?;
//! ctx.setup()?;
//!
//! let entity = ctx.create(movers)?;
//! ctx.get_mut::<Velocity>(entity)?.unwrap().x = 1.5;
//!
//! ctx.foreach(kinematics, |(position, velocity)| {
//!     position.x += velocity.x;
//!     position.y += velocity.y;
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Threading
//! A context is single-threaded; callers serialize access externally. The
//! only process-global state is the component type registry.

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::context::Context;

pub use engine::component::{
    component_descriptor, component_id_of, register_component, Component, ComponentDesc,
    ComponentSet,
};

pub use engine::foreach::{ComponentQuery, Control, Foreach};

pub use engine::error::{ContextError, ContextResult, RegistryError, RegistryResult};

pub use engine::types::{ArchetypeId, ComponentId, Entity, Generation, LogicalIndex};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used store types.
///
/// Import with:
/// ```rust
/// use arena_ecs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Component, ComponentQuery, ComponentSet, Context, ContextError, ContextResult, Control,
        Entity, Foreach,
    };
}
