//! Get components off of entities directly, and iterate entities by the
//! component types they own.
//!
//! You can query with a `&T` or `&mut T` where `T: Component`, with
//! `Option<Q>` for a query that always "succeeds", and with tuples
//! `(Q1, Q2, ...)` up to 10 query types (nest tuples if you somehow need
//! more). The same `Q` drives both point lookups
//! ([`Registry::try_get`](crate::registry::Registry::try_get)) and
//! [`View`] iteration.

use std::marker::PhantomData;
use std::sync::{RwLockReadGuard, RwLockWriteGuard};

use crate::component::Component;
use crate::meta::{self, ComponentMask};
use crate::registry::{ComponentEntry, Entity, Registry};

/// Trait for things that can be used to access components.
///
/// Returns `Some` when the query succeeds and `None` when it doesn't.
/// The `'c` lifetime is the lifetime of the references to the components.
///
/// The details of this trait are a private implementation detail.
pub trait Query<'c> {
    type Response: 'c;

    #[doc(hidden)]
    fn fetch(entity: Entity, slots: &'c [Option<ComponentEntry>]) -> Option<Self::Response>;

    /// Set the mask bits of the *required* component types. Registers
    /// them as a side effect, so a view is well-formed even before the
    /// first `add`.
    #[doc(hidden)]
    fn accumulate_mask(mask: &mut ComponentMask);
}

impl<'c, C: Component> Query<'c> for &'c C {
    type Response = ReadQueryResponse<'c, C>;

    fn fetch(entity: Entity, slots: &'c [Option<ComponentEntry>]) -> Option<Self::Response> {
        let id = meta::id_of::<C>()?;
        let entry = slots.get(id.index())?.as_ref()?;
        let lock = entry.try_read().unwrap_or_else(|_| {
            panic!(
                "{:?} had a component of type {} read queried when it was mutably borrowed",
                entity,
                std::any::type_name::<C>(),
            )
        });
        Some(ReadQueryResponse(lock, PhantomData))
    }

    fn accumulate_mask(mask: &mut ComponentMask) {
        mask.set(meta::register::<C>());
    }
}

impl<'c, C: Component> Query<'c> for &'c mut C {
    type Response = WriteQueryResponse<'c, C>;

    fn fetch(entity: Entity, slots: &'c [Option<ComponentEntry>]) -> Option<Self::Response> {
        let id = meta::id_of::<C>()?;
        let entry = slots.get(id.index())?.as_ref()?;
        let lock = entry.try_write().unwrap_or_else(|_| {
            panic!(
                "{:?} had a component of type {} write queried when it was borrowed",
                entity,
                std::any::type_name::<C>(),
            )
        });
        Some(WriteQueryResponse(lock, PhantomData))
    }

    fn accumulate_mask(mask: &mut ComponentMask) {
        mask.set(meta::register::<C>());
    }
}

impl<'c, Q: Query<'c>> Query<'c> for Option<Q> {
    type Response = Option<Q::Response>;

    fn fetch(entity: Entity, slots: &'c [Option<ComponentEntry>]) -> Option<Self::Response> {
        Some(Q::fetch(entity, slots))
    }

    fn accumulate_mask(_mask: &mut ComponentMask) {
        // Optional parts never narrow a view.
    }
}

macro_rules! impl_query {
    ($($subquery:ident),*) => {
        #[allow(non_snake_case)]
        impl<'c, $($subquery,)*> Query<'c> for ($($subquery,)*)
            where $($subquery: Query<'c>,)*
        {
            type Response = ($(<$subquery as Query<'c>>::Response,)*);

            fn fetch(entity: Entity, slots: &'c [Option<ComponentEntry>]) -> Option<Self::Response> {
                Some((
                    $($subquery::fetch(entity, slots)?,)*
                ))
            }

            fn accumulate_mask(mask: &mut ComponentMask) {
                $($subquery::accumulate_mask(mask);)*
            }
        }
    };
}

impl_query!(A);
impl_query!(A, B);
impl_query!(A, B, C);
impl_query!(A, B, C, D);
impl_query!(A, B, C, D, E);
impl_query!(A, B, C, D, E, F);
impl_query!(A, B, C, D, E, F, G);
impl_query!(A, B, C, D, E, F, G, H);
impl_query!(A, B, C, D, E, F, G, H, I);
impl_query!(A, B, C, D, E, F, G, H, I, J);

/// Wrapper struct returned when querying `&T`
pub struct ReadQueryResponse<'a, T>(RwLockReadGuard<'a, Box<dyn Component>>, PhantomData<&'a T>);

impl<T: 'static> std::ops::Deref for ReadQueryResponse<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: we checked that this `is` of the wanted type in the fetch method.
        unsafe { self.0.downcast_ref().unwrap_unchecked() }
    }
}

impl<T: 'static> AsRef<T> for ReadQueryResponse<'_, T> {
    fn as_ref(&self) -> &T {
        self
    }
}

/// Wrapper struct returned when querying `&mut T`
pub struct WriteQueryResponse<'a, T>(
    RwLockWriteGuard<'a, Box<dyn Component>>,
    PhantomData<&'a mut T>,
);

impl<T: 'static> std::ops::Deref for WriteQueryResponse<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: we checked that this `is` of the wanted type in the fetch method.
        unsafe { self.0.downcast_ref().unwrap_unchecked() }
    }
}

impl<T: 'static> std::ops::DerefMut for WriteQueryResponse<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: we checked that this `is` of the wanted type in the fetch method.
        unsafe { self.0.downcast_mut().unwrap_unchecked() }
    }
}

/// A live projection over the registry: every live entity whose mask is a
/// superset of `Q`'s required components, in ascending id order.
///
/// The view holds only the mask and a registry reference; each
/// [`View::iter`] pass re-scans, so entities created or destroyed between
/// passes are picked up.
pub struct View<'r, Q> {
    registry: &'r Registry,
    mask: ComponentMask,
    _phantom: PhantomData<Q>,
}

impl<'r, Q: Query<'r>> View<'r, Q> {
    pub(crate) fn new(registry: &'r Registry) -> Self {
        let mut mask = ComponentMask::EMPTY;
        Q::accumulate_mask(&mut mask);
        Self {
            registry,
            mask,
            _phantom: PhantomData,
        }
    }

    /// The required-components mask this view matches against.
    pub fn mask(&self) -> ComponentMask {
        self.mask
    }

    pub fn iter(&self) -> ViewIter<'r, Q> {
        ViewIter {
            registry: self.registry,
            mask: self.mask,
            next: 0,
            _phantom: PhantomData,
        }
    }
}

impl<'r, Q: Query<'r>> IntoIterator for &View<'r, Q> {
    type Item = (Entity, Q::Response);
    type IntoIter = ViewIter<'r, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'r, Q: Query<'r>> IntoIterator for View<'r, Q> {
    type Item = (Entity, Q::Response);
    type IntoIter = ViewIter<'r, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ViewIter<'r, Q> {
    registry: &'r Registry,
    mask: ComponentMask,
    next: u32,
    _phantom: PhantomData<Q>,
}

impl<'r, Q: Query<'r>> Iterator for ViewIter<'r, Q> {
    type Item = (Entity, Q::Response);

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.registry.storage.id_end() {
            let entity = Entity(self.next);
            self.next += 1;

            let Some(record) = self.registry.storage.get(entity) else {
                continue;
            };
            if !record.mask.contains(self.mask) {
                continue;
            }
            if let Some(response) = Q::fetch(entity, &record.components) {
                return Some((entity, response));
            }
        }
        None
    }
}
