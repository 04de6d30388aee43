//! Core identifiers and fundamental types of the entity store.
//!
//! This module defines the **numeric identifiers, capacities, and the entity
//! handle** shared by every subsystem of the store: the type registry, the
//! component stores, the archetype table, and the iteration planner.
//!
//! ## Design Philosophy
//!
//! The store is designed around:
//!
//! - **Dense storage** — component instances live in contiguous per-type
//!   arrays, subdivided into per-archetype ranges.
//! - **Stable numeric identifiers** — every concept (component, archetype,
//!   foreach plan) is referred to by a small, copyable integer id.
//! - **Index-based cross references** — records reference each other by
//!   integer index, never by pointer, so no cyclic ownership exists.
//!
//! ## Entity Representation
//!
//! An entity is a plain value triple:
//!
//! ```text
//! | archetype (16) | generation (16) | index (32) |
//! ```
//!
//! - **Archetype** selects the entity's component composition.
//! - **Generation** detects stale handles after destruction.
//! - **Index** is the logical slot within the archetype, stable for the
//!   entity's lifetime.
//!
//! The triple is 64 bits total and is freely copied, stored, and compared.

/// Unique identifier for a registered component type.
pub type ComponentId = u16;

/// Unique identifier for an archetype within a [`Context`](crate::Context).
pub type ArchetypeId = u16;

/// Generation counter used to detect stale entity handles.
pub type Generation = u16;

/// Logical slot index within an archetype, stable for an entity's lifetime.
pub type LogicalIndex = u32;

/// Physical slot index within a component store's instance buffer.
pub type PhysicalIndex = u32;

/// Maximum number of component types the registry can assign ids to.
pub const COMPONENT_CAP: usize = ComponentId::MAX as usize;

/// Initial per-store capacity, in instances, allocated by `setup`.
pub const INITIAL_STORE_CAPACITY: u32 = 16;

/// Maximum number of components a single foreach plan may request.
pub const FOREACH_COMPONENT_CAP: usize = 8;

/// Opaque, versioned identifier for an entity.
///
/// ## Purpose
/// `Entity` is a compact handle that uniquely identifies one entity at a
/// point in time. It carries enough information to:
///
/// - route operations to the owning archetype,
/// - index the archetype's identity tables directly,
/// - detect stale handles after the entity is destroyed.
///
/// ## Invariants
/// - Two entities with the same `(archetype, index)` but different
///   generations are distinct; at most one of them is alive.
/// - An entity is alive iff its generation matches the archetype's current
///   generation for its logical index.
///
/// ## Notes
/// `Entity` values are cheap to copy and compare. A caller that serializes
/// them externally must also preserve the archetype ids they refer to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Entity {
    /// Archetype the entity belongs to.
    pub archetype: ArchetypeId,

    /// Generation counter at creation time.
    pub generation: Generation,

    /// Logical slot index within the archetype.
    pub index: LogicalIndex,
}

const _: [(); 8] = [(); std::mem::size_of::<Entity>()];
