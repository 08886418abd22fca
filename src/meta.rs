//! Process-wide runtime metadata about component types.
//!
//! Every component type used anywhere in the process gets exactly one
//! [`Metadata`] entry, assigned a small integer [`CompTypeId`] on first
//! registration. The table is append-only; entries are leaked to `'static`
//! so lookups after registration never take a lock on the entry itself.

use std::any::{self, Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{OnceLock, RwLock};

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::component::{CloneFn, Component, DefaultFn, MetaBuilder};

/// Hash key identifying a Rust type at runtime.
///
/// Carries the type's name alongside the `TypeId` so every table keyed
/// by this can name the type in its log output. Two keys made from the
/// same type are always equal; the name rides along for free.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    tid: TypeId,
    type_name: &'static str,
}

impl TypeKey {
    pub fn of<T: 'static>() -> Self {
        Self {
            tid: TypeId::of::<T>(),
            type_name: any::type_name::<T>(),
        }
    }

    pub fn type_name(self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.type_name)
    }
}

/// How many distinct component types one process may register.
///
/// Fixed because each entity indexes its component slots with a bitmask of
/// this width.
pub const MAX_COMPONENT_TYPES: usize = 32;

/// Index of a component type in the process-wide type table.
///
/// Stable for the lifetime of the process once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompTypeId(pub(crate) usize);

impl CompTypeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A fixed-width bitset over [`CompTypeId`]s. Bit `i` set means "owns an
/// instance of component type `i`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComponentMask(u32);

impl ComponentMask {
    pub const EMPTY: ComponentMask = ComponentMask(0);

    pub fn set(&mut self, id: CompTypeId) {
        self.0 |= 1 << id.0;
    }

    pub fn clear(&mut self, id: CompTypeId) {
        self.0 &= !(1 << id.0);
    }

    pub fn test(self, id: CompTypeId) -> bool {
        self.0 & (1 << id.0) != 0
    }

    /// Is every bit of `other` also set in `self`?
    pub fn contains(self, other: ComponentMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// The set bits, in ascending id order.
    pub fn iter(self) -> impl Iterator<Item = CompTypeId> {
        (0..MAX_COMPONENT_TYPES).filter_map(move |i| self.test(CompTypeId(i)).then(|| CompTypeId(i)))
    }
}

/// Everything the engine knows about one component type at runtime.
///
/// The constructor thunks are `None` when the type did not opt into them
/// via its [`MetaBuilder`]; callers that require one treat its absence as
/// a fatal misuse. There is no destructor thunk; dropping the box runs it.
pub struct Metadata {
    pub id: CompTypeId,
    pub tid: TypeKey,
    /// Used for ser/de and anywhere else a human-readable type name is
    /// wanted.
    pub name: &'static str,
    pub default_fn: Option<DefaultFn>,
    pub clone_fn: Option<CloneFn>,

    services: RwLock<BTreeMap<&'static str, Box<dyn Any + Send + Sync>>>,
}

impl Metadata {
    /// Look up a service bound under `name` and cast it to the fn-pointer
    /// type `F`. Returns `None` on a missing binding *or* a signature
    /// mismatch; callers agree on the signature convention keyed by the
    /// service name.
    pub fn service<F: Copy + 'static>(&self, name: &str) -> Option<F> {
        let services = self.services.read().unwrap();
        services.get(name).and_then(|f| f.downcast_ref::<F>()).copied()
    }

    /// Bind a service, replacing any prior binding for the same name.
    pub fn bind_service<F: Send + Sync + 'static>(&self, name: &'static str, f: F) {
        self.services.write().unwrap().insert(name, Box::new(f));
    }

    pub fn has_service(&self, name: &str) -> bool {
        self.services.read().unwrap().contains_key(name)
    }
}

/// Service names the engine itself knows about. The table is open; hosts
/// bind their own names the same way.
pub mod service_names {
    /// `fn(&dyn Component) -> serde_json::Result<serde_json::Value>`
    pub const SERIALIZE: &str = "serialize";
    /// `fn(&mut dyn Component, &serde_json::Value, Entity, &str)`
    pub const DESERIALIZE: &str = "deserialize";
    /// `fn(&mut i32, &mut dyn Component) -> bool`
    pub const INSPECTOR: &str = "inspector";
}

struct MetaRegistry {
    /// Insertion index in this map *is* the `CompTypeId`.
    types: IndexMap<TypeKey, &'static Metadata>,
    by_name: AHashMap<&'static str, &'static Metadata>,
}

fn registry() -> &'static RwLock<MetaRegistry> {
    static REGISTRY: OnceLock<RwLock<MetaRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        RwLock::new(MetaRegistry {
            types: IndexMap::new(),
            by_name: AHashMap::new(),
        })
    })
}

/// Register a component type, returning its id. Idempotent; the entry is
/// built once from [`Component::bind`] on first mention.
///
/// Panics if the table is full; running out of component type ids is a
/// fatal configuration error.
pub fn register<C: Component>() -> CompTypeId {
    let tid = TypeKey::of::<C>();
    {
        let reg = registry().read().unwrap();
        if let Some(meta) = reg.types.get(&tid) {
            return meta.id;
        }
    }

    let mut reg = registry().write().unwrap();
    // Lost a race between the locks?
    if let Some(meta) = reg.types.get(&tid) {
        return meta.id;
    }

    if reg.types.len() >= MAX_COMPONENT_TYPES {
        tracing::error!(
            "cannot register component type {}: all {} component type ids are taken",
            tid.type_name(),
            MAX_COMPONENT_TYPES
        );
        panic!("component type table is full");
    }

    let builder = C::bind(MetaBuilder::new());
    let id = CompTypeId(reg.types.len());
    let name = builder.friendly_name.unwrap_or_else(|| {
        let full = tid.type_name();
        full.rsplit("::").next().unwrap_or(full)
    });
    let meta: &'static Metadata = Box::leak(Box::new(Metadata {
        id,
        tid,
        name,
        default_fn: builder.default_fn,
        clone_fn: builder.clone_fn,
        services: RwLock::new(builder.services),
    }));
    tracing::info!("registered component type {} as {:?}", meta.name, id);

    reg.types.insert(tid, meta);
    if let Some(clobbered) = reg.by_name.insert(meta.name, meta) {
        panic!(
            "component types {} and {} share the friendly name {:?}",
            clobbered.tid.type_name(), tid.type_name(), meta.name
        );
    }
    id
}

/// Id of a type, if it has been registered.
pub fn id_of<C: Component>() -> Option<CompTypeId> {
    let reg = registry().read().unwrap();
    reg.types.get(&TypeKey::of::<C>()).map(|m| m.id)
}

/// Metadata for an id. `None` for ids never handed out.
pub fn resolve(id: CompTypeId) -> Option<&'static Metadata> {
    let reg = registry().read().unwrap();
    reg.types.get_index(id.0).map(|(_, meta)| *meta)
}

pub fn resolve_tid(tid: TypeKey) -> Option<&'static Metadata> {
    let reg = registry().read().unwrap();
    reg.types.get(&tid).copied()
}

/// Metadata by friendly name, the key used in serialized entities.
pub fn resolve_name(name: &str) -> Option<&'static Metadata> {
    let reg = registry().read().unwrap();
    reg.by_name.get(name).copied()
}

pub fn type_count() -> usize {
    registry().read().unwrap().types.len()
}
