//! Plain-data records attachable to [entities](crate::registry::Entity),
//! plus the builder each type uses to describe itself to the
//! [metadata table](crate::meta).

use std::any::Any as StdAny;
use std::collections::BTreeMap;
use std::marker::PhantomData;

use downcast::{downcast, Any};
use serde::{de::DeserializeOwned, Serialize};

use crate::meta::service_names;
use crate::serde::{deserialize_thunk, serialize_thunk, DeserializeFn, SerializeFn};

/// Something attachable to an [`Entity`](crate::registry::Entity).
///
/// Components carry the data; [systems](crate::system::System) carry the
/// behavior. A component type declares its runtime capabilities once, in
/// [`Component::bind`]: whether it can be default-constructed or copied at
/// runtime, its friendly name, and any named services.
pub trait Component: Any {
    /// Declare constructor thunks and services for this component type.
    ///
    /// Called once, the first time the type is mentioned to the metadata
    /// table. See [`MetaBuilder`].
    fn bind(builder: MetaBuilder<Self>) -> MetaBuilder<Self>
    where
        Self: Sized;
}
downcast!(dyn Component);

/// Thunk that builds a boxed component from its `Default` impl.
pub type DefaultFn = fn() -> Box<dyn Component>;
/// Thunk that copy-constructs a boxed component from an existing one.
pub type CloneFn = fn(&dyn Component) -> Box<dyn Component>;

fn default_thunk<C: Component + Default>() -> Box<dyn Component> {
    Box::new(C::default())
}

fn clone_thunk<C: Component + Clone>(source: &dyn Component) -> Box<dyn Component> {
    // SAFETY: thunks are only reachable through the metadata entry of their
    // own type, and storage slots are keyed by type id.
    let source: &C = unsafe { source.downcast_ref().unwrap_unchecked() };
    Box::new(source.clone())
}

/// Builder that describes a component type's runtime capabilities.
///
/// Returned from [`Component::bind`]. Everything is opt-in: a type with no
/// `Default` simply never calls [`MetaBuilder::default_ctor`], and callers
/// that need the thunk treat its absence as a fatal misuse.
#[must_use = "does nothing until returned from Component::bind"]
pub struct MetaBuilder<C: Component + ?Sized> {
    pub(crate) friendly_name: Option<&'static str>,
    pub(crate) default_fn: Option<DefaultFn>,
    pub(crate) clone_fn: Option<CloneFn>,
    pub(crate) services: BTreeMap<&'static str, Box<dyn StdAny + Send + Sync>>,

    phantom: PhantomData<C>,
}

impl<C: Component> MetaBuilder<C> {
    pub(crate) fn new() -> Self {
        Self {
            friendly_name: None,
            default_fn: None,
            clone_fn: None,
            services: BTreeMap::new(),
            phantom: PhantomData,
        }
    }

    /// Let the runtime default-construct this component, for runtime-typed
    /// adds and deserialization.
    pub fn default_ctor(mut self) -> Self
    where
        C: Default,
    {
        self.default_fn = Some(default_thunk::<C>);
        self
    }

    /// Let the runtime copy-construct this component, for entity cloning.
    pub fn clone_ctor(mut self) -> Self
    where
        C: Clone,
    {
        self.clone_fn = Some(clone_thunk::<C>);
        self
    }

    /// Register the JSON ser/de services for this component, making it
    /// part of the entity file format. Implies [`MetaBuilder::default_ctor`]
    /// (deserialization allocates through the default thunk first).
    pub fn serde(self) -> Self
    where
        C: Serialize + DeserializeOwned + Default,
    {
        self.default_ctor()
            .service(service_names::SERIALIZE, serialize_thunk::<C> as SerializeFn)
            .service(
                service_names::DESERIALIZE,
                deserialize_thunk::<C> as DeserializeFn,
            )
    }

    /// Bind an arbitrary named service. Replaces any prior binding for the
    /// same name; callers agree on the signature convention keyed by the
    /// name.
    pub fn service<F: Send + Sync + 'static>(mut self, name: &'static str, f: F) -> Self {
        self.services.insert(name, Box::new(f));
        self
    }

    /// Set the friendly name of this component to something other than the
    /// default (the last segment of [`std::any::type_name`]).
    pub fn named(mut self, name: &'static str) -> Self {
        if let Some(prior) = self.friendly_name {
            tracing::error!(
                "component type {} was named twice, {:?} and then {:?}",
                std::any::type_name::<C>(),
                prior,
                name
            );
            panic!("duplicate friendly name for {}", std::any::type_name::<C>());
        }
        self.friendly_name = Some(name);
        self
    }
}
