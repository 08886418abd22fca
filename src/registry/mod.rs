//! The authoritative owner of all entities and components in one scene.
//!
//! Entities are bare integer handles; all data lives in per-entity
//! component slots indexed by [`CompTypeId`]. Lifecycle signals fire
//! synchronously inside the mutating call, typed signal before the
//! generic one. Handlers receive ids, not registry references, and must
//! not mutate the same entity and type reentrantly.

mod storage;

pub(crate) use storage::{ComponentEntry, EntityStorage};

use ahash::AHashMap;

use crate::component::Component;
use crate::meta::{self, CompTypeId, ComponentMask};
use crate::query::{Query, View};
use crate::signal::Signal;

/// A handle to one entity in a [`Registry`].
///
/// Holds no data of its own and stays `Copy`; every operation goes back
/// through the registry. Handles are *weak*: once the entity is destroyed,
/// accessors given this handle return `None` or no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity(pub(crate) u32);

impl Entity {
    pub fn index(self) -> u32 {
        self.0
    }
}

pub struct Registry {
    pub(crate) storage: EntityStorage,

    on_create: Signal<Entity>,
    on_destroy: Signal<Entity>,
    /// Fires for any component add, after the typed signal.
    on_add_any: Signal<(Entity, CompTypeId)>,
    on_remove_any: Signal<(Entity, CompTypeId)>,

    table_add: AHashMap<CompTypeId, Signal<Entity>>,
    table_remove: AHashMap<CompTypeId, Signal<Entity>>,
    /// `(new, old)`; fires only once every component of the clone exists.
    table_clone: AHashMap<CompTypeId, Signal<(Entity, Entity)>>,
}

impl Registry {
    pub fn new() -> Registry {
        Self {
            storage: EntityStorage::new(),
            on_create: Signal::new(),
            on_destroy: Signal::new(),
            on_add_any: Signal::new(),
            on_remove_any: Signal::new(),
            table_add: AHashMap::new(),
            table_remove: AHashMap::new(),
            table_clone: AHashMap::new(),
        }
    }

    /// Allocate a fresh entity with no components. Ids of destroyed
    /// entities are reused, most recently destroyed first.
    pub fn create(&mut self) -> Entity {
        let e = self.storage.alloc();
        self.on_create.publish(&e);
        e
    }

    /// Destroy an entity: the destroy signal fires first, then each owned
    /// component gets its remove signals (typed, then generic) and is
    /// dropped, then the id goes back on the free list.
    ///
    /// Destroying a dead entity logs and no-ops.
    pub fn destroy(&mut self, entity: Entity) {
        if !self.storage.is_alive(entity) {
            tracing::warn!("tried to destroy dead entity {:?}", entity);
            return;
        }
        self.on_destroy.publish(&entity);

        let mask = self.storage.get(entity).map(|r| r.mask).unwrap_or_default();
        for id in mask.iter() {
            self.emit_remove_signals(entity, id);
            let record = self.storage.get_mut(entity).unwrap();
            record.components[id.index()] = None;
            record.mask.clear(id);
        }
        self.storage.free(entity);
    }

    /// Attach a component. Idempotent: if the entity already owns one of
    /// this type, `component` is dropped and the existing instance is
    /// returned untouched. Otherwise the add signals fire, typed before
    /// generic.
    ///
    /// Panics if the entity is dead.
    pub fn add<C: Component>(&mut self, entity: Entity, component: C) -> &mut C {
        let id = meta::register::<C>();
        let record = match self.storage.get_mut(entity) {
            Some(it) => it,
            None => {
                tracing::error!(
                    "tried to add {} to dead entity {:?}",
                    std::any::type_name::<C>(),
                    entity
                );
                panic!("add on dead entity {:?}", entity);
            }
        };

        if !record.mask.test(id) {
            record.components[id.index()] = Some(ComponentEntry::new(Box::new(component)));
            record.mask.set(id);
            self.emit_add_signals(entity, id);
        }

        let record = self.storage.get_mut(entity).unwrap();
        let entry = record.components[id.index()].as_mut().unwrap();
        // SAFETY: the slot is keyed by C's type id.
        unsafe {
            entry
                .get_mut()
                .unwrap()
                .downcast_mut()
                .unwrap_unchecked()
        }
    }

    /// Runtime-typed add. Copy-constructs from `source` when that entity
    /// owns the same component type, else default-constructs. Idempotent
    /// like [`Registry::add`].
    ///
    /// The required constructor thunk missing from the metadata is a fatal
    /// misuse and panics.
    pub fn add_dyn(&mut self, entity: Entity, type_id: CompTypeId, source: Option<Entity>) {
        let Some(metadata) = meta::resolve(type_id) else {
            tracing::error!("add_dyn with unknown component type {:?}", type_id);
            panic!("add_dyn with unknown component type {:?}", type_id);
        };
        if !self.storage.is_alive(entity) {
            tracing::error!("tried to add {} to dead entity {:?}", metadata.name, entity);
            panic!("add_dyn on dead entity {:?}", entity);
        }
        if self.has_dyn(entity, type_id) {
            return;
        }

        let source_entry = source
            .filter(|src| self.storage.is_alive(*src))
            .and_then(|src| self.entry(src, type_id));
        let boxed = match source_entry {
            Some(entry) => {
                let Some(clone_fn) = metadata.clone_fn else {
                    tracing::error!(
                        "component type {} has no clone constructor registered",
                        metadata.name
                    );
                    panic!("missing clone constructor for {}", metadata.name);
                };
                let guard = entry.try_read().unwrap_or_else(|_| {
                    panic!(
                        "{:?} had a component of type {} copied while it was mutably borrowed",
                        source, metadata.name
                    )
                });
                clone_fn(&**guard)
            }
            None => {
                let Some(default_fn) = metadata.default_fn else {
                    tracing::error!(
                        "component type {} has no default constructor registered",
                        metadata.name
                    );
                    panic!("missing default constructor for {}", metadata.name);
                };
                default_fn()
            }
        };

        let record = self.storage.get_mut(entity).unwrap();
        record.components[type_id.index()] = Some(ComponentEntry::new(boxed));
        record.mask.set(type_id);
        self.emit_add_signals(entity, type_id);
    }

    /// Clone an entity in two passes: first copy-construct every component
    /// (add signals fire per component), then fire the per-type clone
    /// signals, so clone observers always see the fully-formed target.
    pub fn clone_entity(&mut self, entity: Entity) -> Entity {
        let clone = self.create();
        let mask = self.mask(entity);
        for id in mask.iter() {
            self.add_dyn(clone, id, Some(entity));
        }
        for id in mask.iter() {
            if let Some(signal) = self.table_clone.get(&id) {
                signal.publish(&(clone, entity));
            }
        }
        clone
    }

    /// Detach a component, if present: remove signals fire (typed, then
    /// generic) while the component still exists, then it is dropped and
    /// the mask bit cleared.
    pub fn remove<C: Component>(&mut self, entity: Entity) {
        if let Some(id) = meta::id_of::<C>() {
            self.remove_dyn(entity, id);
        }
    }

    pub fn remove_dyn(&mut self, entity: Entity, type_id: CompTypeId) {
        if !self.has_dyn(entity, type_id) {
            return;
        }
        self.emit_remove_signals(entity, type_id);
        let record = self.storage.get_mut(entity).unwrap();
        record.components[type_id.index()] = None;
        record.mask.clear(type_id);
    }

    /// Fetch components, panicking on a miss. See [`Query`] for what can
    /// be fetched; prefer [`Registry::try_get`] unless absence is a bug.
    pub fn get<'c, Q: Query<'c>>(&'c self, entity: Entity) -> Q::Response {
        match self.try_get::<Q>(entity) {
            Some(response) => response,
            None => {
                tracing::error!(
                    "entity {:?} doesn't have the queried components; going to crash...",
                    entity
                );
                panic!("missing components on {:?}", entity);
            }
        }
    }

    /// Fetch components, `None` on a dead entity or a missing component.
    pub fn try_get<'c, Q: Query<'c>>(&'c self, entity: Entity) -> Option<Q::Response> {
        let record = self.storage.get(entity)?;
        Q::fetch(entity, &record.components)
    }

    pub fn has<C: Component>(&self, entity: Entity) -> bool {
        meta::id_of::<C>().map_or(false, |id| self.has_dyn(entity, id))
    }

    pub fn has_dyn(&self, entity: Entity, type_id: CompTypeId) -> bool {
        self.mask(entity).test(type_id)
    }

    /// Does the entity own every component type in `mask`?
    pub fn has_mask(&self, entity: Entity, mask: ComponentMask) -> bool {
        self.mask(entity).contains(mask)
    }

    /// The entity's component bitmask; empty for dead entities.
    pub fn mask(&self, entity: Entity) -> ComponentMask {
        self.storage
            .get(entity)
            .map(|record| record.mask)
            .unwrap_or(ComponentMask::EMPTY)
    }

    /// A live projection over every entity owning all of `Q`'s required
    /// components, in ascending id order. Registers the queried types.
    pub fn view<'c, Q: Query<'c>>(&'c self) -> View<'c, Q> {
        View::new(self)
    }

    /// Visit each live component of one entity, in type id order.
    ///
    /// Logs and no-ops on a dead entity.
    pub fn each_component(&self, entity: Entity, mut f: impl FnMut(CompTypeId, &dyn Component)) {
        let Some(record) = self.storage.get(entity) else {
            tracing::warn!("each_component on dead entity {:?}", entity);
            return;
        };
        for id in record.mask.iter() {
            let entry = record.components[id.index()].as_ref().unwrap();
            let guard = entry.try_read().unwrap_or_else(|_| {
                panic!(
                    "{:?} had component {:?} visited while it was mutably borrowed",
                    entity, id
                )
            });
            f(id, &**guard);
        }
    }

    /// Every live entity, in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.storage.iter().map(|(e, _)| e)
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.storage.is_alive(entity)
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }

    pub fn reserve_entities(&mut self, additional: usize) {
        self.storage.reserve(additional);
    }

    // --- lifecycle signals ---

    /// Fires after every [`Registry::create`].
    pub fn on_create(&self) -> Signal<Entity> {
        self.on_create.clone()
    }

    /// Fires at the start of every [`Registry::destroy`], before any
    /// component is removed.
    pub fn on_destroy(&self) -> Signal<Entity> {
        self.on_destroy.clone()
    }

    /// Fires when a `C` is added to any entity, before the untyped signal.
    pub fn on_add<C: Component>(&mut self) -> Signal<Entity> {
        let id = meta::register::<C>();
        self.table_add.entry(id).or_default().clone()
    }

    /// Fires when a `C` is removed from any entity (including via
    /// destroy), before the untyped signal.
    pub fn on_remove<C: Component>(&mut self) -> Signal<Entity> {
        let id = meta::register::<C>();
        self.table_remove.entry(id).or_default().clone()
    }

    /// Fires with `(new, old)` for each cloned `C`, after the whole clone
    /// is built.
    pub fn on_clone<C: Component>(&mut self) -> Signal<(Entity, Entity)> {
        let id = meta::register::<C>();
        self.table_clone.entry(id).or_default().clone()
    }

    /// Fires for any component add, with the component's type id.
    pub fn on_add_any(&self) -> Signal<(Entity, CompTypeId)> {
        self.on_add_any.clone()
    }

    pub fn on_remove_any(&self) -> Signal<(Entity, CompTypeId)> {
        self.on_remove_any.clone()
    }

    // --- internals ---

    pub(crate) fn entry(&self, entity: Entity, type_id: CompTypeId) -> Option<&ComponentEntry> {
        self.storage
            .get(entity)
            .and_then(|record| record.components[type_id.index()].as_ref())
    }

    pub(crate) fn entry_mut(
        &mut self,
        entity: Entity,
        type_id: CompTypeId,
    ) -> Option<&mut ComponentEntry> {
        self.storage
            .get_mut(entity)
            .and_then(|record| record.components[type_id.index()].as_mut())
    }

    fn emit_add_signals(&self, entity: Entity, type_id: CompTypeId) {
        if let Some(signal) = self.table_add.get(&type_id) {
            signal.publish(&entity);
        }
        self.on_add_any.publish(&(entity, type_id));
    }

    fn emit_remove_signals(&self, entity: Entity, type_id: CompTypeId) {
        if let Some(signal) = self.table_remove.get(&type_id) {
            signal.publish(&entity);
        }
        self.on_remove_any.publish(&(entity, type_id));
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        // Destroy signals still fire for entities alive at teardown.
        let live: Vec<Entity> = self.entities().collect();
        for entity in live {
            self.destroy(entity);
        }
    }
}
