//! # Foreach Plans and the Iterator Driver
//!
//! A *foreach* is a pre-declared iteration plan over an ordered tuple of
//! component types. Declaration records the tuple; `setup` compiles it into
//! a flat list of per-archetype iteration records, one for every archetype
//! whose component set is a superset of the request. Invocation walks the
//! records, materializes one base pointer per requested component, and
//! calls the user closure once per live slot with references into the
//! contiguous component runs.
//!
//! ## Execution model
//! 1. Records are visited in archetype-declaration order.
//! 2. Within a record, slots are visited in physical order, which is not
//!    stable across destroys (swap-remove relocates the last slot).
//! 3. [`Context::foreach`] permits no structural mutation: the context is
//!    exclusively borrowed for the whole walk and the closure only receives
//!    component references.
//! 4. [`Context::foreach_control`] threads a [`Control`] handle through the
//!    closure instead. The handle re-borrows component data per call and
//!    may destroy the current entity, create entities of any archetype, and
//!    re-enter the walk from the slot after the current one.
//!
//! ## Mutation tracking
//! Structural mutations through a handle bump a shared epoch counter; base
//! pointers cached per iteration record are re-resolved whenever the epoch
//! moved, since a store grow or cascade shift may have relocated the range.
//! The loop bound re-reads the archetype population every step, so a
//! destroyed current slot tightens the walk immediately and entities
//! created into an archetype still being walked are picked up at its tail.
//!
//! ## Safety model
//! Component references handed to closures are derived from raw base
//! pointers into store buffers. Soundness rests on two rules the API shapes
//! enforce: requested components are distinct (duplicate declarations are
//! rejected), so no two references alias; and references returned by
//! [`Control::items`] borrow the handle, so they are dead before any
//! structural mutation through the same handle can run.

use std::cell::Cell;
use std::marker::PhantomData;

use crate::engine::component::Component;
use crate::engine::context::Context;
use crate::engine::error::{ContextError, ContextResult, RegistryResult};
use crate::engine::types::{ArchetypeId, ComponentId, Entity, FOREACH_COMPONENT_CAP};

/// An ordered tuple of component types requested by a foreach.
///
/// Implemented for tuples of 1 to 8 component types. The tuple order is the
/// order component references are passed to the callback.
pub trait ComponentQuery: 'static {
    /// Component references handed to the callback for one slot.
    type Item<'a>;

    /// Number of requested components.
    const LEN: usize;

    /// Registers the requested components, returning ids in tuple order.
    fn register_members() -> RegistryResult<Vec<ComponentId>>;

    /// Materializes the item for slot `j` from per-component base pointers.
    ///
    /// ## Safety
    /// `bases[i]` must point at a live run of at least `j + 1` instances of
    /// the `i`-th requested component, and the runs must not alias.
    unsafe fn item<'a>(bases: &[*mut u8], j: usize) -> Self::Item<'a>;
}

macro_rules! impl_component_query {
    ($len:expr; $($t:ident => $i:tt),+) => {
        impl<$($t: Component),+> ComponentQuery for ($($t,)+) {
            type Item<'a> = ($(&'a mut $t,)+);
            const LEN: usize = $len;

            fn register_members() -> RegistryResult<Vec<ComponentId>> {
                Ok(vec![$(crate::engine::component::register_component::<$t>()?),+])
            }

            unsafe fn item<'a>(bases: &[*mut u8], j: usize) -> Self::Item<'a> {
                ($(unsafe { &mut *(bases[$i] as *mut $t).add(j) },)+)
            }
        }
    };
}

impl_component_query!(1; A => 0);
impl_component_query!(2; A => 0, B => 1);
impl_component_query!(3; A => 0, B => 1, C => 2);
impl_component_query!(4; A => 0, B => 1, C => 2, D => 3);
impl_component_query!(5; A => 0, B => 1, C => 2, D => 3, E => 4);
impl_component_query!(6; A => 0, B => 1, C => 2, D => 3, E => 4, F => 5);
impl_component_query!(7; A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6);
impl_component_query!(8; A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6, H => 7);

/// Handle to a declared foreach plan.
///
/// Obtained from [`Context::declare_foreach`] and passed back to
/// [`Context::foreach`] / [`Context::foreach_control`]. The handle is a thin
/// typed index; it is only meaningful for the context that issued it.
#[derive(Debug)]
pub struct Foreach<Q: ComponentQuery> {
    pub(crate) index: u32,
    _query: PhantomData<fn(Q)>,
}

impl<Q: ComponentQuery> Foreach<Q> {
    pub(crate) fn new(index: u32) -> Self {
        Self {
            index,
            _query: PhantomData,
        }
    }
}

impl<Q: ComponentQuery> Clone for Foreach<Q> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Q: ComponentQuery> Copy for Foreach<Q> {}

/// Declared foreach plan: the requested component list and, after `setup`,
/// the span of compiled iteration records.
pub(crate) struct ForeachPlan {
    /// Requested component ids, in callback-argument order.
    pub(crate) component_ids: Vec<ComponentId>,

    /// First compiled record in the context record table.
    pub(crate) records_first: u32,

    /// Number of compiled records.
    pub(crate) records_count: u32,
}

/// One archetype matched by a foreach plan.
#[derive(Clone, Copy)]
pub(crate) struct IterationRecord {
    /// Matched archetype.
    pub(crate) archetype: ArchetypeId,

    /// Span into the shared position pool: for each requested component,
    /// its offset within the archetype's sorted component-ref list.
    pub(crate) positions_first: u32,

    /// Number of pooled positions (equals the request length).
    pub(crate) positions_count: u32,
}

/// Per-record driver state: cached base pointers and the epoch they were
/// resolved at.
struct Frame {
    bases: [*mut u8; FOREACH_COMPONENT_CAP],
    resolved_epoch: u64,
}

impl Frame {
    fn stale() -> Self {
        Self {
            bases: [std::ptr::null_mut(); FOREACH_COMPONENT_CAP],
            resolved_epoch: u64::MAX,
        }
    }
}

/// Mutation-capable cursor over one slot of a foreach walk.
///
/// ## Purpose
/// `Control` is the object [`Context::foreach_control`] passes to the
/// callback. It identifies the current slot and mediates every access to it,
/// so structural mutation and component access cannot overlap:
/// [`items`](Control::items) borrows the handle mutably, forcing the
/// returned references dead before [`destroy`](Control::destroy) or
/// [`create`](Control::create) can run.
///
/// ## Behavior after mutation
/// - After `destroy`, the driver revisits the current slot index: the
///   swap-remove moved the range's last entity into it, and the loop bound
///   has already tightened.
/// - After any `create`, cached base pointers are stale; the next `items`
///   call transparently re-resolves them.
pub struct Control<'c, Q: ComponentQuery> {
    ctx: *mut Context,
    record_index: u32,
    records_end: u32,
    slot: u32,
    epoch: &'c Cell<u64>,
    frame: &'c mut Frame,
    destroyed: bool,
    _query: PhantomData<fn(Q)>,
}

impl<'c, Q: ComponentQuery> Control<'c, Q> {
    #[inline]
    fn record(&self) -> IterationRecord {
        let ctx = unsafe { &*self.ctx };
        ctx.records[self.record_index as usize]
    }

    /// Identifier of the entity currently under the cursor.
    ///
    /// Derived from the physical slot of the archetype's first component
    /// range. After [`destroy`](Control::destroy) this names the entity the
    /// swap-remove moved into the slot, if any.
    pub fn entity(&self) -> Entity {
        let ctx = unsafe { &*self.ctx };
        let record = self.record();
        let archetype = &ctx.archetypes[record.archetype as usize];
        let first_ref = ctx.component_refs[archetype.refs_first as usize];
        let store = &ctx.stores[first_ref.store_index as usize];
        let physical = store.ranges[first_ref.range_index as usize].first + self.slot;
        let logical = store.physical_to_logical[physical as usize];
        Entity {
            archetype: record.archetype,
            generation: archetype.generation[logical as usize],
            index: logical,
        }
    }

    /// Component references of the current slot, in request order.
    ///
    /// The references borrow the handle and must be dropped before the next
    /// structural mutation through it; re-calling `items` after a mutation
    /// yields fresh, re-resolved references.
    pub fn items(&mut self) -> Q::Item<'_> {
        if self.frame.resolved_epoch != self.epoch.get() {
            let ctx = unsafe { &mut *self.ctx };
            ctx.resolve_bases(self.record(), &mut self.frame.bases);
            self.frame.resolved_epoch = self.epoch.get();
        }
        unsafe { Q::item(&self.frame.bases[..Q::LEN], self.slot as usize) }
    }

    /// Destroys the entity currently under the cursor.
    ///
    /// The driver will revisit the current slot index, now holding the
    /// entity that the swap-remove relocated there. Calling `destroy` again
    /// within the same callback invocation is a no-op.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        let entity = self.entity();
        let ctx = unsafe { &mut *self.ctx };
        ctx.destroy_live(entity);
        self.destroyed = true;
        self.epoch.set(self.epoch.get() + 1);
    }

    /// Creates an entity of `archetype`, which may be any declared
    /// archetype, including the one currently being walked (the new entity
    /// is then visited at the tail of the walk).
    ///
    /// ## Errors
    /// `UnknownArchetype` if the id is out of range.
    pub fn create(&mut self, archetype: ArchetypeId) -> ContextResult<Entity> {
        let ctx = unsafe { &mut *self.ctx };
        let entity = ctx.create(archetype)?;
        self.epoch.set(self.epoch.get() + 1);
        Ok(entity)
    }

    /// Re-enters the walk from the slot after the current one, through the
    /// end of the plan.
    ///
    /// Mutation state is shared with the outer walk: entities destroyed or
    /// created by the nested closure are accounted for when the outer walk
    /// resumes.
    pub fn visit_remaining<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Control<'_, Q>),
    {
        drive::<Q, F>(
            self.ctx,
            self.record_index,
            self.records_end,
            self.slot + 1,
            self.epoch,
            &mut f,
        );
    }
}

/// Walks `records_first..records_end`, entering the first record at
/// `start_slot`. Shared by the top-level control driver and nested
/// re-entry.
fn drive<Q, F>(
    ctx: *mut Context,
    records_first: u32,
    records_end: u32,
    start_slot: u32,
    epoch: &Cell<u64>,
    f: &mut F,
) where
    Q: ComponentQuery,
    F: FnMut(&mut Control<'_, Q>),
{
    let mut first_record = true;
    for record_index in records_first..records_end {
        let archetype = unsafe { &*ctx }.records[record_index as usize].archetype;
        let mut frame = Frame::stale();
        let mut slot = if first_record { start_slot } else { 0 };
        first_record = false;

        loop {
            // Re-read the population every step: destroys tighten the
            // bound, creates into this archetype extend it.
            let alive = unsafe { &*ctx }.archetypes[archetype as usize].alive_count;
            if slot >= alive {
                break;
            }

            let mut control = Control {
                ctx,
                record_index,
                records_end,
                slot,
                epoch,
                frame: &mut frame,
                destroyed: false,
                _query: PhantomData,
            };
            f(&mut control);
            let destroyed = control.destroyed;

            if !destroyed {
                slot += 1;
            }
        }
    }
}

impl Context {
    /// Declares a foreach plan over the ordered component tuple `Q`.
    ///
    /// ## Behavior
    /// - The tuple order is the order component references are passed to
    ///   the iteration callback.
    /// - Declaring the exact same ordered tuple again returns a handle to
    ///   the existing plan.
    /// - Plans are compiled against the declared archetypes during
    ///   [`setup`](Context::setup).
    ///
    /// ## Errors
    /// - `AlreadySetUp` after `setup`.
    /// - `DuplicateComponent` if the tuple lists a component twice.
    /// - `Registry` if component registration fails.
    pub fn declare_foreach<Q: ComponentQuery>(&mut self) -> ContextResult<Foreach<Q>> {
        if self.ready {
            return Err(ContextError::AlreadySetUp);
        }

        let ids = Q::register_members()?;
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ContextError::DuplicateComponent { component: pair[0] });
        }

        if let Some(existing) = self
            .foreaches
            .iter()
            .position(|plan| plan.component_ids == ids)
        {
            return Ok(Foreach::new(existing as u32));
        }

        let index = self.foreaches.len() as u32;
        self.foreaches.push(ForeachPlan {
            component_ids: ids,
            records_first: 0,
            records_count: 0,
        });
        Ok(Foreach::new(index))
    }

    /// Invokes `f` once per live entity whose archetype carries every
    /// component of `Q`, passing mutable references to the entity's
    /// component instances in tuple order.
    ///
    /// No structural mutation is possible during the walk; use
    /// [`foreach_control`](Context::foreach_control) for that.
    ///
    /// ## Errors
    /// - `NotSetUp` before `setup`.
    /// - `UnknownForeach` if the handle does not belong to this context.
    pub fn foreach<Q, F>(&mut self, foreach: Foreach<Q>, mut f: F) -> ContextResult<()>
    where
        Q: ComponentQuery,
        F: FnMut(Q::Item<'_>),
    {
        let (records_first, records_count) = self.plan_span(foreach.index)?;
        let mut bases = [std::ptr::null_mut::<u8>(); FOREACH_COMPONENT_CAP];

        for record_index in records_first..records_first + records_count {
            let record = self.records[record_index as usize];
            let alive = self.archetypes[record.archetype as usize].alive_count;
            if alive == 0 {
                continue;
            }
            self.resolve_bases(record, &mut bases);
            for j in 0..alive as usize {
                f(unsafe { Q::item(&bases[..Q::LEN], j) });
            }
        }
        Ok(())
    }

    /// Invokes `f` once per live entity matched by the plan, passing a
    /// [`Control`] cursor that exposes the current entity and permits
    /// structural mutation mid-walk per the rules documented on `Control`.
    ///
    /// ## Errors
    /// - `NotSetUp` before `setup`.
    /// - `UnknownForeach` if the handle does not belong to this context.
    pub fn foreach_control<Q, F>(&mut self, foreach: Foreach<Q>, mut f: F) -> ContextResult<()>
    where
        Q: ComponentQuery,
        F: FnMut(&mut Control<'_, Q>),
    {
        let (records_first, records_count) = self.plan_span(foreach.index)?;
        let epoch = Cell::new(0u64);
        let ctx: *mut Context = self;
        drive::<Q, F>(
            ctx,
            records_first,
            records_first + records_count,
            0,
            &epoch,
            &mut f,
        );
        Ok(())
    }

    fn plan_span(&self, index: u32) -> ContextResult<(u32, u32)> {
        if !self.ready {
            return Err(ContextError::NotSetUp);
        }
        let plan = self
            .foreaches
            .get(index as usize)
            .ok_or(ContextError::UnknownForeach {
                index,
                foreach_count: self.foreaches.len(),
            })?;
        Ok((plan.records_first, plan.records_count))
    }

    /// Resolves the per-component base pointers of one iteration record.
    pub(crate) fn resolve_bases(&mut self, record: IterationRecord, bases: &mut [*mut u8]) {
        let archetype = &self.archetypes[record.archetype as usize];
        for i in 0..record.positions_count as usize {
            let position = self.position_pool[record.positions_first as usize + i];
            let r = self.component_refs[(archetype.refs_first + position) as usize];
            bases[i] = self.stores[r.store_index as usize].range_base_ptr(r.range_index as usize);
        }
    }
}
