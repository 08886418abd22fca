//! Entity cloning: copy construction, two-pass signal ordering, and
//! clone-of-clone equivalence.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use arceus::prelude::*;
use arceus::serde::serialize_entity;

type Log = Arc<Mutex<Vec<String>>>;

#[test]
fn clones_copy_every_component() {
    let mut registry = Registry::new();
    let original = registry.create();
    registry.add(
        original,
        Body {
            position: Vector2::new(10.0, 20.0),
            mass: 3.5,
        },
    );
    registry.add(original, Nickname("hero".to_owned()));

    let clone = registry.clone_entity(original);
    assert_ne!(clone, original);
    assert_eq!(registry.mask(clone), registry.mask(original));

    let body = registry.get::<&Body>(clone);
    assert_eq!(body.position, Vector2::new(10.0, 20.0));
    assert_eq!(body.mass, 3.5);
    assert_eq!(registry.get::<&Nickname>(clone).0, "hero");

    // The copies are independent of the originals.
    drop(body);
    registry.get::<&mut Body>(clone).mass = 99.0;
    assert_eq!(registry.get::<&Body>(original).mass, 3.5);
}

#[test]
fn clone_signals_fire_after_the_whole_clone_is_built() {
    let log: Log = Default::default();
    let mut registry = Registry::new();

    {
        let log = log.clone();
        registry
            .on_add_any()
            .connect(move |_| log.lock().unwrap().push("add".into()));
    }
    {
        let log = log.clone();
        registry
            .on_clone::<Body>()
            .connect(move |_| log.lock().unwrap().push("clone Body".into()));
    }
    {
        let log = log.clone();
        registry
            .on_clone::<Nickname>()
            .connect(move |_| log.lock().unwrap().push("clone Nickname".into()));
    }

    let original = registry.create();
    registry.add(original, Body::default());
    registry.add(original, Nickname("x".to_owned()));
    log.lock().unwrap().clear();

    registry.clone_entity(original);

    // Both adds land before any clone signal.
    let seen = log.lock().unwrap().clone();
    let first_clone = seen.iter().position(|s| s.starts_with("clone")).unwrap();
    assert_eq!(seen[..first_clone], ["add".to_owned(), "add".to_owned()]);
    assert_eq!(seen.len(), 4);
}

#[test]
fn clone_signal_carries_new_then_old() {
    let seen: Arc<Mutex<Vec<(Entity, Entity)>>> = Default::default();
    let mut registry = Registry::new();
    {
        let seen = seen.clone();
        registry
            .on_clone::<Body>()
            .connect(move |pair| seen.lock().unwrap().push(*pair));
    }

    let original = registry.create();
    registry.add(original, Body::default());
    let clone = registry.clone_entity(original);

    assert_eq!(*seen.lock().unwrap(), vec![(clone, original)]);
}

#[test]
fn clone_of_clone_serializes_identically() {
    let mut registry = Registry::new();
    let original = registry.create();
    registry.add(
        original,
        Body {
            position: Vector2::new(-4.0, 8.5),
            mass: 1.25,
        },
    );
    registry.add(original, Nickname("twin".to_owned()));

    let once = registry.clone_entity(original);
    let twice = registry.clone_entity(once);

    let a = serialize_entity(&registry, original).unwrap();
    let b = serialize_entity(&registry, twice).unwrap();
    assert_eq!(a, b);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Body {
    position: Vector2<f32>,
    mass: f32,
}

impl Component for Body {
    fn bind(builder: MetaBuilder<Self>) -> MetaBuilder<Self>
    where
        Self: Sized,
    {
        builder.clone_ctor().serde()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Nickname(String);

impl Component for Nickname {
    fn bind(builder: MetaBuilder<Self>) -> MetaBuilder<Self>
    where
        Self: Sized,
    {
        builder.clone_ctor().serde()
    }
}
