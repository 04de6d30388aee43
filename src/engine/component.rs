//! # Component Type Registry
//!
//! This module provides a global registry that assigns stable [`ComponentId`]
//! values to Rust component types and records the layout metadata the stores
//! need to place instances.
//!
//! ## Purpose
//! The registry decouples component type information (`TypeId`, name, size,
//! alignment) from runtime storage, so a [`Context`](crate::Context) can lay
//! out raw per-component buffers without keeping any typed state.
//!
//! ## Design
//! - Components are registered once and assigned a compact `ComponentId` in
//!   `[0, COMPONENT_CAP)`, in first-registration order.
//! - Registration is idempotent and happens implicitly when a component
//!   appears in an archetype or foreach declaration.
//! - Ids are process-stable: every context in the process shares the same
//!   id for the same Rust type.
//!
//! ## Invariants
//! - `ComponentId` values are unique and stable for the lifetime of the
//!   process.
//! - A registered component has `size > 0` and `align <= align_of::<u64>()`.
//! - Ids have a defined total order; archetype keys are canonicalized by
//!   sorting on it.
//!
//! ## Concurrency
//! The registry is protected by an `RwLock` for concurrent reads and
//! serialized writes. It is the only shared state in the crate; everything
//! else is owned by a single `Context`.

use std::{
    any::{type_name, TypeId},
    collections::HashMap,
    mem::{align_of, size_of},
    sync::{OnceLock, RwLock},
};

use crate::engine::error::{RegistryError, RegistryResult};
use crate::engine::types::{ComponentId, COMPONENT_CAP};

/// Marker contract for component types.
///
/// ## Purpose
/// The store relocates instances with raw byte copies and zero-fills fresh
/// slots; it never runs destructors. The bounds encode exactly that:
///
/// - [`Copy`] — the type is trivially copyable and trivially destructible.
/// - [`bytemuck::Zeroable`] — the all-zero bit pattern is a valid instance,
///   making zero-fill a sound default initializer.
///
/// The trait is blanket-implemented; any plain-old-data type qualifies:
///
/// ```
/// use bytemuck::Zeroable;
///
/// #[derive(Clone, Copy, Zeroable)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
/// ```
pub trait Component: Copy + bytemuck::Zeroable + Send + Sync + 'static {}

impl<T: Copy + bytemuck::Zeroable + Send + Sync + 'static> Component for T {}

/// Describes a registered component type.
///
/// ## Fields
/// - `component_id`: the identifier assigned by the registry.
/// - `name`: the Rust type name, for diagnostics.
/// - `type_id`: the runtime `TypeId` of the component.
/// - `size`: `size_of::<T>()` in bytes.
/// - `align`: `align_of::<T>()` in bytes.
///
/// ## Notes
/// `ComponentDesc` is `Copy` and safe to clone freely for reporting.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComponentDesc {
    /// Identifier assigned to this component type.
    pub component_id: ComponentId,

    /// Rust type name for diagnostics.
    pub name: &'static str,

    /// Runtime `TypeId` of the component.
    pub type_id: TypeId,

    /// Size of the component type in bytes.
    pub size: usize,

    /// Alignment of the component type in bytes.
    pub align: usize,
}

impl std::fmt::Display for ComponentDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ComponentDesc {{ id: {}, name: {}, size: {}, align: {} }}",
            self.component_id, self.name, self.size, self.align
        )
    }
}

/// Global mapping between Rust component types and compact id values.
struct TypeRegistry {
    next_id: ComponentId,
    by_type: HashMap<TypeId, ComponentId>,
    by_id: Vec<ComponentDesc>,
}

static REGISTRY: OnceLock<RwLock<TypeRegistry>> = OnceLock::new();

fn type_registry() -> &'static RwLock<TypeRegistry> {
    REGISTRY.get_or_init(|| {
        RwLock::new(TypeRegistry {
            next_id: 0,
            by_type: HashMap::new(),
            by_id: Vec::new(),
        })
    })
}

impl TypeRegistry {
    fn register<T: Component>(&mut self) -> RegistryResult<ComponentId> {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&type_id) {
            return Ok(existing);
        }

        if size_of::<T>() == 0 {
            return Err(RegistryError::ZeroSized {
                name: type_name::<T>(),
            });
        }
        if align_of::<T>() > align_of::<u64>() {
            return Err(RegistryError::UnsupportedAlignment {
                name: type_name::<T>(),
                align: align_of::<T>(),
                max: align_of::<u64>(),
            });
        }

        let id = self.next_id;
        if (id as usize) >= COMPONENT_CAP {
            return Err(RegistryError::CapacityExceeded { cap: COMPONENT_CAP });
        }
        self.next_id = id.wrapping_add(1);

        self.by_type.insert(type_id, id);
        self.by_id.push(ComponentDesc {
            component_id: id,
            name: type_name::<T>(),
            type_id,
            size: size_of::<T>(),
            align: align_of::<T>(),
        });

        Ok(id)
    }
}

/// Registers component type `T` and returns its assigned [`ComponentId`].
///
/// ## Behavior
/// - If `T` is already registered, returns the existing id.
/// - Otherwise allocates the next id and records the type's layout.
///
/// Declarations call this implicitly; calling it directly is only needed
/// when a caller wants to pin id assignment order.
///
/// ## Errors
/// - `ZeroSized` if `size_of::<T>() == 0`.
/// - `UnsupportedAlignment` if `align_of::<T>() > align_of::<u64>()`.
/// - `CapacityExceeded` once the id space is exhausted.
/// - `PoisonedLock` if the registry lock is poisoned.
pub fn register_component<T: Component>() -> RegistryResult<ComponentId> {
    let mut registry = type_registry()
        .write()
        .map_err(|_| RegistryError::PoisonedLock)?;
    registry.register::<T>()
}

/// Returns the [`ComponentId`] for `T`, if `T` was ever registered.
///
/// This is a pure lookup; it never registers.
pub fn component_id_of<T: Component>() -> RegistryResult<Option<ComponentId>> {
    let registry = type_registry()
        .read()
        .map_err(|_| RegistryError::PoisonedLock)?;
    Ok(registry.by_type.get(&TypeId::of::<T>()).copied())
}

/// Returns a copy of the descriptor for `component_id`, if registered.
pub fn component_descriptor(component_id: ComponentId) -> RegistryResult<Option<ComponentDesc>> {
    let registry = type_registry()
        .read()
        .map_err(|_| RegistryError::PoisonedLock)?;
    Ok(registry.by_id.get(component_id as usize).copied())
}

/// A statically known set of component types forming an archetype.
///
/// ## Purpose
/// Lets [`Context::declare_archetype`](crate::Context::declare_archetype)
/// accept the member components as a tuple type parameter. The set is
/// unordered at the semantic level; declaration canonicalizes it by sorted
/// component id, so any permutation of the same tuple resolves to the same
/// archetype.
///
/// Implemented for tuples of 1 to 8 component types.
pub trait ComponentSet {
    /// Registers every member type and returns their ids in tuple order.
    fn register_members() -> RegistryResult<Vec<ComponentId>>;
}

macro_rules! impl_component_set {
    ($($t:ident),+) => {
        impl<$($t: Component),+> ComponentSet for ($($t,)+) {
            fn register_members() -> RegistryResult<Vec<ComponentId>> {
                Ok(vec![$(register_component::<$t>()?),+])
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);
