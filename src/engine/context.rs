//! # Context: Lifecycle, Layout Resolution, and Entity Mutation
//!
//! A [`Context`] owns every table of the store and drives the three-phase
//! lifecycle:
//!
//! 1. **Declaration** — archetypes and foreach plans are declared freely;
//!    component stores are recorded but nothing is allocated.
//! 2. **Setup** — called exactly once. Stores allocate their initial
//!    buffers, every archetype's component refs are resolved to store and
//!    range indices, ranges are carved in archetype-declaration order, and
//!    foreach plans are compiled into flat iteration records.
//! 3. **Operation** — `create`, `destroy`, `clear`, `get`, `is_alive`, and
//!    the iteration drivers are legal; declarations are not. There is no
//!    way back to phase 1.
//!
//! ## Concurrency
//! A context is single-threaded and not reentrant except through the
//! iteration control handle. Callers serialize access externally; the only
//! shared state in the crate is the process-global type registry.
//!
//! ## Pointer stability
//! References returned by `get`/`get_mut` and handed out by the iteration
//! drivers are invalidated by any `create`, `destroy`, or `clear` on the
//! same context. Callers re-fetch after structural mutation; the control
//! handle does so automatically.

use log::debug;

use crate::engine::archetype::{Archetype, ComponentRef};
use crate::engine::component::{component_descriptor, component_id_of, Component, ComponentSet};
use crate::engine::error::{ContextError, ContextResult};
use crate::engine::foreach::{ForeachPlan, IterationRecord};
use crate::engine::storage::{ComponentRange, ComponentStore};
use crate::engine::types::{ArchetypeId, ComponentId, Entity, INITIAL_STORE_CAPACITY};

/// Owner of all entity, component, and iteration state.
///
/// See the [module documentation](self) for the lifecycle contract.
#[derive(Default)]
pub struct Context {
    /// One store per component used by any declared archetype.
    pub(crate) stores: Vec<ComponentStore>,

    /// Declared archetypes, id = index.
    pub(crate) archetypes: Vec<Archetype>,

    /// Shared component-ref table; each archetype owns a sorted run.
    pub(crate) component_refs: Vec<ComponentRef>,

    /// Declared foreach plans, handle index = index.
    pub(crate) foreaches: Vec<ForeachPlan>,

    /// Compiled iteration records of all plans, in plan order.
    pub(crate) records: Vec<IterationRecord>,

    /// Shared pool of component-ref positions referenced by the records.
    pub(crate) position_pool: Vec<u32>,

    /// Set by `setup`; gates declarations against operations.
    pub(crate) ready: bool,
}

impl Context {
    /// Creates an empty context in the declaration phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an archetype made of the component set `S`.
    ///
    /// ## Behavior
    /// - The set is canonicalized by sorted component id: any permutation
    ///   of the same component types resolves to the same archetype id.
    /// - Member components are registered idempotently; their stores are
    ///   recorded (unallocated until `setup`).
    ///
    /// ## Errors
    /// - `AlreadySetUp` after `setup`.
    /// - `DuplicateComponent` if the set lists a component twice.
    /// - `Registry` if component registration fails.
    pub fn declare_archetype<S: ComponentSet>(&mut self) -> ContextResult<ArchetypeId> {
        if self.ready {
            return Err(ContextError::AlreadySetUp);
        }

        let mut ids = S::register_members()?;
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ContextError::DuplicateComponent { component: pair[0] });
        }

        for &component_id in &ids {
            self.ensure_store(component_id)?;
        }

        if let Some(existing) = self.find_archetype(&ids) {
            return Ok(existing);
        }

        if self.archetypes.len() >= ArchetypeId::MAX as usize {
            return Err(ContextError::Internal("archetype id space exhausted"));
        }

        let refs_first = self.component_refs.len() as u32;
        for &component_id in &ids {
            // Store and range indices are resolved during setup.
            self.component_refs.push(ComponentRef {
                component_id,
                store_index: 0,
                range_index: 0,
            });
        }

        let archetype_id = self.archetypes.len() as ArchetypeId;
        self.archetypes
            .push(Archetype::new(refs_first, ids.len() as u32));
        Ok(archetype_id)
    }

    /// Finalizes layout: allocates stores, carves ranges, resolves component
    /// refs, and compiles foreach plans. Call exactly once.
    ///
    /// ## Errors
    /// `AlreadySetUp` on a second call.
    pub fn setup(&mut self) -> ContextResult<()> {
        if self.ready {
            return Err(ContextError::AlreadySetUp);
        }

        for store in &mut self.stores {
            store.allocate_initial(INITIAL_STORE_CAPACITY);
        }

        // Carve ranges archetype-major so each store's range table sits in
        // archetype-declaration order, and resolve the integer
        // cross-references on every component ref.
        for archetype_index in 0..self.archetypes.len() {
            for ref_index in self.archetypes[archetype_index].refs_span() {
                let component_id = self.component_refs[ref_index].component_id;
                let store_index = self
                    .stores
                    .iter()
                    .position(|store| store.component_id == component_id)
                    .ok_or(ContextError::Internal("store missing for declared component"))?;

                let store = &mut self.stores[store_index];
                let range_index = store.ranges.len();
                store.ranges.push(ComponentRange {
                    archetype: archetype_index as ArchetypeId,
                    first: 0,
                    logical_to_physical: Vec::new(),
                });

                let component_ref = &mut self.component_refs[ref_index];
                component_ref.store_index = store_index as u16;
                component_ref.range_index = range_index as u16;
            }
        }

        // Compile every foreach plan against the full archetype table, in
        // archetype-declaration order.
        for plan_index in 0..self.foreaches.len() {
            let records_first = self.records.len() as u32;

            for (archetype_index, archetype) in self.archetypes.iter().enumerate() {
                let refs = &self.component_refs[archetype.refs_span()];
                let positions_first = self.position_pool.len() as u32;
                let mut matched = true;

                for &component_id in &self.foreaches[plan_index].component_ids {
                    match refs.binary_search_by_key(&component_id, |r| r.component_id) {
                        Ok(position) => self.position_pool.push(position as u32),
                        Err(_) => {
                            matched = false;
                            break;
                        }
                    }
                }

                if matched {
                    self.records.push(IterationRecord {
                        archetype: archetype_index as ArchetypeId,
                        positions_first,
                        positions_count: self.foreaches[plan_index].component_ids.len() as u32,
                    });
                } else {
                    self.position_pool.truncate(positions_first as usize);
                }
            }

            let plan = &mut self.foreaches[plan_index];
            plan.records_first = records_first;
            plan.records_count = self.records.len() as u32 - records_first;
        }

        self.ready = true;
        debug!(
            "context ready: {} components, {} archetypes, {} foreach plans, {} iteration records",
            self.stores.len(),
            self.archetypes.len(),
            self.foreaches.len(),
            self.records.len()
        );
        Ok(())
    }

    /// Creates an entity of `archetype` with every component zero-filled.
    ///
    /// ## Behavior
    /// - The logical index is reused FIFO from the archetype's free queue,
    ///   or freshly allocated past the high-water mark.
    /// - One instance is pushed at the tail of each member component's
    ///   range, cascading following ranges aside when they are tight.
    ///
    /// ## Errors
    /// - `NotSetUp` before `setup`.
    /// - `UnknownArchetype` if the id is out of range.
    pub fn create(&mut self, archetype: ArchetypeId) -> ContextResult<Entity> {
        if !self.ready {
            return Err(ContextError::NotSetUp);
        }
        if archetype as usize >= self.archetypes.len() {
            return Err(ContextError::UnknownArchetype {
                archetype,
                archetype_count: self.archetypes.len(),
            });
        }

        let archetype_index = archetype as usize;

        let logical = match self.archetypes[archetype_index].take_free_index() {
            Some(index) => index,
            None => {
                // Fresh high-water slot: every range's identity table grows
                // by one alongside the generation vector.
                let index = self.archetypes[archetype_index].allocate_fresh_index();
                for ref_index in self.archetypes[archetype_index].refs_span() {
                    let r = self.component_refs[ref_index];
                    self.stores[r.store_index as usize].ranges[r.range_index as usize]
                        .logical_to_physical
                        .push(0);
                }
                index
            }
        };

        let Context {
            stores,
            archetypes,
            component_refs,
            ..
        } = self;
        let archetype_record = &archetypes[archetype_index];

        for ref_index in archetype_record.refs_span() {
            let r = component_refs[ref_index];
            let store = &mut stores[r.store_index as usize];
            store.push_back(r.range_index as usize, archetypes);

            let physical =
                store.ranges[r.range_index as usize].first + archetype_record.alive_count;
            store.ranges[r.range_index as usize].logical_to_physical[logical as usize] = physical;
            store.physical_to_logical[physical as usize] = logical;
        }

        let archetype_record = &mut archetypes[archetype_index];
        archetype_record.alive_count += 1;
        Ok(Entity {
            archetype,
            generation: archetype_record.generation[logical as usize],
            index: logical,
        })
    }

    /// Destroys `entity`.
    ///
    /// The entity's instances are swap-removed from every member range, its
    /// logical index is queued for FIFO reuse, and its generation is bumped
    /// so every outstanding copy of the handle is dead.
    ///
    /// ## Errors
    /// - `NotSetUp` before `setup`.
    /// - `DeadEntity` if the handle is stale or forged.
    pub fn destroy(&mut self, entity: Entity) -> ContextResult<()> {
        if !self.ready {
            return Err(ContextError::NotSetUp);
        }
        if !self.is_alive(entity) {
            return Err(ContextError::DeadEntity);
        }
        self.destroy_live(entity);
        Ok(())
    }

    /// Destroys an entity known to be alive. Shared by `destroy` and the
    /// iteration control handle (whose cursor is alive by construction).
    pub(crate) fn destroy_live(&mut self, entity: Entity) {
        let archetype_index = entity.archetype as usize;
        let Context {
            stores,
            archetypes,
            component_refs,
            ..
        } = self;

        let archetype_record = &archetypes[archetype_index];
        let alive = archetype_record.alive_count;
        for ref_index in archetype_record.refs_span() {
            let r = component_refs[ref_index];
            stores[r.store_index as usize].swap_remove(r.range_index as usize, entity.index, alive);
        }

        let archetype_record = &mut archetypes[archetype_index];
        archetype_record.alive_count -= 1;
        archetype_record.retire_index(entity.index);
    }

    /// Destroys every outstanding entity without releasing any memory.
    ///
    /// Populations drop to zero, every allocated logical slot is queued for
    /// reuse in index order, and generations are bumped so all outstanding
    /// handles die. Range offsets and buffer capacities are untouched;
    /// subsequent creates refill the slack left behind.
    pub fn clear(&mut self) {
        for archetype in &mut self.archetypes {
            archetype.reset();
        }
        debug!("context cleared: {} archetypes emptied", self.archetypes.len());
    }

    /// Returns whether `entity` is alive.
    ///
    /// Total over arbitrary handles: forged or stale identifiers, including
    /// ones whose archetype or index was never issued, are simply reported
    /// dead.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.archetypes
            .get(entity.archetype as usize)
            .map_or(false, |archetype| {
                archetype.handle_alive(entity.generation, entity.index)
            })
    }

    /// Current number of live entities of `archetype`.
    ///
    /// ## Errors
    /// `UnknownArchetype` if the id is out of range.
    pub fn alive_count(&self, archetype: ArchetypeId) -> ContextResult<u32> {
        self.archetypes
            .get(archetype as usize)
            .map(|record| record.alive_count)
            .ok_or(ContextError::UnknownArchetype {
                archetype,
                archetype_count: self.archetypes.len(),
            })
    }

    /// Borrows `entity`'s instance of component `C`.
    ///
    /// Returns `Ok(None)` when the entity's archetype does not include `C`.
    /// The borrow is scoped to this call; any structural mutation on the
    /// context invalidates it, so callers re-fetch afterwards.
    ///
    /// ## Errors
    /// - `NotSetUp` before `setup`.
    /// - `DeadEntity` if the handle is stale or forged.
    pub fn get<C: Component>(&self, entity: Entity) -> ContextResult<Option<&C>> {
        match self.locate::<C>(entity)? {
            None => Ok(None),
            Some((store_index, physical)) => {
                let store = &self.stores[store_index];
                debug_assert_eq!(store.instance_size, std::mem::size_of::<C>());
                Ok(Some(unsafe { &*(store.slot_ptr(physical) as *const C) }))
            }
        }
    }

    /// Mutably borrows `entity`'s instance of component `C`.
    ///
    /// Same contract as [`get`](Context::get).
    ///
    /// ## Errors
    /// - `NotSetUp` before `setup`.
    /// - `DeadEntity` if the handle is stale or forged.
    pub fn get_mut<C: Component>(&mut self, entity: Entity) -> ContextResult<Option<&mut C>> {
        match self.locate::<C>(entity)? {
            None => Ok(None),
            Some((store_index, physical)) => {
                let store = &mut self.stores[store_index];
                debug_assert_eq!(store.instance_size, std::mem::size_of::<C>());
                Ok(Some(unsafe { &mut *(store.slot_ptr_mut(physical) as *mut C) }))
            }
        }
    }

    /// Resolves `entity`'s instance of `C` to `(store index, physical
    /// slot)`, or `None` when the archetype lacks `C`.
    fn locate<C: Component>(&self, entity: Entity) -> ContextResult<Option<(usize, u32)>> {
        if !self.ready {
            return Err(ContextError::NotSetUp);
        }
        if !self.is_alive(entity) {
            return Err(ContextError::DeadEntity);
        }

        let Some(component_id) = component_id_of::<C>()? else {
            return Ok(None);
        };

        let archetype = &self.archetypes[entity.archetype as usize];
        let refs = &self.component_refs[archetype.refs_span()];
        let Ok(position) = refs.binary_search_by_key(&component_id, |r| r.component_id) else {
            return Ok(None);
        };

        let r = refs[position];
        let physical = self.stores[r.store_index as usize].ranges[r.range_index as usize]
            .logical_to_physical[entity.index as usize];
        Ok(Some((r.store_index as usize, physical)))
    }

    fn ensure_store(&mut self, component_id: ComponentId) -> ContextResult<()> {
        if self
            .stores
            .iter()
            .any(|store| store.component_id == component_id)
        {
            return Ok(());
        }
        let desc = component_descriptor(component_id)?
            .ok_or(ContextError::Internal("declared component missing from registry"))?;
        self.stores.push(ComponentStore::new(component_id, desc.size));
        Ok(())
    }

    fn find_archetype(&self, sorted_ids: &[ComponentId]) -> Option<ArchetypeId> {
        for (index, archetype) in self.archetypes.iter().enumerate() {
            if archetype.refs_count as usize != sorted_ids.len() {
                continue;
            }
            let refs = &self.component_refs[archetype.refs_span()];
            if refs
                .iter()
                .zip(sorted_ids)
                .all(|(r, &id)| r.component_id == id)
            {
                return Some(index as ArchetypeId);
            }
        }
        None
    }
}
