//! Component attachment: idempotent adds, removal, and the runtime-typed
//! add with its constructor thunks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arceus::meta;
use arceus::prelude::*;

#[test]
fn add_is_idempotent() {
    let mut registry = Registry::new();
    let e = registry.create();

    let first = registry.add(e, Label::new("x")) as *const Label;
    // The second add drops the new value and hands back the original.
    let second = registry.add(e, Label::new("y")) as *const Label;

    assert_eq!(first, second);
    assert_eq!(registry.get::<&Label>(e).name, "x");
    assert_eq!(registry.mask(e).len(), 1);
}

#[test]
fn remove_then_readd() {
    let mut registry = Registry::new();
    let e = registry.create();
    registry.add(e, Label::new("x"));

    registry.remove::<Label>(e);
    assert!(registry.try_get::<&Label>(e).is_none());
    assert!(registry.mask(e).is_empty());

    registry.add(e, Label::new("z"));
    assert_eq!(registry.get::<&Label>(e).name, "z");
}

#[test]
fn remove_absent_is_a_no_op() {
    let mut registry = Registry::new();
    let e = registry.create();
    registry.remove::<Label>(e);
    assert!(registry.mask(e).is_empty());
}

#[test]
fn mask_tracks_slots() {
    let mut registry = Registry::new();
    let e = registry.create();
    registry.add(e, Label::new("a"));
    registry.add(e, Counter::default());

    let mask = registry.mask(e);
    assert_eq!(mask.len(), 2);

    // Every set bit has a live component behind it.
    let mut visited = 0;
    registry.each_component(e, |id, _| {
        assert!(mask.test(id));
        visited += 1;
    });
    assert_eq!(visited, 2);

    assert!(registry.has::<Label>(e));
    assert!(registry.has::<Counter>(e));
    assert!(registry.has_mask(e, mask));
}

#[test]
fn add_dyn_default_constructs() {
    let mut registry = Registry::new();
    let id = meta::register::<Counter>();

    let e = registry.create();
    registry.add_dyn(e, id, None);
    assert_eq!(registry.get::<&Counter>(e).value, 0);
}

#[test]
fn add_dyn_copies_from_source() {
    let mut registry = Registry::new();
    let id = meta::register::<Counter>();

    let source = registry.create();
    registry.add(source, Counter { value: 17 });

    let e = registry.create();
    registry.add_dyn(e, id, Some(source));
    assert_eq!(registry.get::<&Counter>(e).value, 17);

    // Copies are independent.
    registry.get::<&mut Counter>(e).value = 4;
    assert_eq!(registry.get::<&Counter>(source).value, 17);
}

#[test]
fn add_dyn_ignores_dead_source() {
    let mut registry = Registry::new();
    let id = meta::register::<Counter>();

    let source = registry.create();
    registry.add(source, Counter { value: 17 });
    registry.destroy(source);

    let e = registry.create();
    registry.add_dyn(e, id, Some(source));
    assert_eq!(registry.get::<&Counter>(e).value, 0);
}

#[test]
#[should_panic = "missing default constructor"]
fn add_dyn_without_default_thunk_is_fatal() {
    let mut registry = Registry::new();
    let id = meta::register::<NoThunks>();

    let e = registry.create();
    registry.add_dyn(e, id, None);
}

#[test]
#[should_panic = "missing clone constructor"]
fn add_dyn_without_clone_thunk_is_fatal() {
    let mut registry = Registry::new();
    let id = meta::register::<NoThunks>();

    let source = registry.create();
    registry.add(source, NoThunks);

    let e = registry.create();
    registry.add_dyn(e, id, Some(source));
}

#[test]
fn second_add_drops_the_new_value_once() {
    let drops = Arc::new(AtomicUsize::new(0));

    let mut registry = Registry::new();
    let e = registry.create();
    registry.add(e, Tracked(drops.clone()));
    registry.add(e, Tracked(drops.clone()));

    // Only the rejected duplicate has been dropped so far.
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    registry.destroy(e);
    assert_eq!(drops.load(Ordering::SeqCst), 2);
}

struct Label {
    name: String,
}

impl Label {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
        }
    }
}

impl Component for Label {
    fn bind(builder: MetaBuilder<Self>) -> MetaBuilder<Self>
    where
        Self: Sized,
    {
        builder
    }
}

#[derive(Default, Clone)]
struct Counter {
    value: i32,
}

impl Component for Counter {
    fn bind(builder: MetaBuilder<Self>) -> MetaBuilder<Self>
    where
        Self: Sized,
    {
        builder.default_ctor().clone_ctor()
    }
}

struct NoThunks;

impl Component for NoThunks {
    fn bind(builder: MetaBuilder<Self>) -> MetaBuilder<Self>
    where
        Self: Sized,
    {
        builder
    }
}

struct Tracked(Arc<AtomicUsize>);

impl Drop for Tracked {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl Component for Tracked {
    fn bind(builder: MetaBuilder<Self>) -> MetaBuilder<Self>
    where
        Self: Sized,
    {
        builder
    }
}
