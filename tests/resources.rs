//! The resource cache: handler routing, cache hits, fatal misses.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arceus::prelude::*;

#[test]
fn loads_through_the_registered_handler() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("text")).unwrap();
    fs::write(dir.path().join("text").join("greeting.txt"), "hello").unwrap();

    let mut resources = Resources::new(dir.path());
    resources.add_handler("text", |path| Ok(fs::read_to_string(path)?));

    let greeting: &String = resources.load("greeting.txt");
    assert_eq!(greeting, "hello");
    assert!(resources.contains::<String>("greeting.txt"));
}

#[test]
fn second_load_hits_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("text")).unwrap();
    fs::write(dir.path().join("text").join("once.txt"), "payload").unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let mut resources = Resources::new(dir.path());
    {
        let calls = calls.clone();
        resources.add_handler("text", move |path| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(fs::read_to_string(path)?)
        });
    }

    let first = resources.load::<String>("once.txt").clone();
    let second = resources.load::<String>("once.txt").clone();
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn same_filename_different_types_are_distinct_entries() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("text")).unwrap();
    fs::create_dir_all(dir.path().join("sizes")).unwrap();
    fs::write(dir.path().join("text").join("thing"), "abc").unwrap();
    fs::write(dir.path().join("sizes").join("thing"), "abc").unwrap();

    let mut resources = Resources::new(dir.path());
    resources.add_handler("text", |path| Ok(fs::read_to_string(path)?));
    resources.add_handler("sizes", |path| Ok(fs::metadata(path)?.len()));

    assert_eq!(resources.load::<String>("thing"), "abc");
    assert_eq!(*resources.load::<u64>("thing"), 3);
}

#[test]
#[should_panic = "no resource handler"]
fn missing_handler_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut resources = Resources::new(dir.path());
    let _ = resources.load::<String>("anything.txt");
}

#[test]
#[should_panic = "failed to load resource"]
fn failing_loader_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut resources = Resources::new(dir.path());
    resources.add_handler("text", |path| Ok(fs::read_to_string(path)?));
    let _ = resources.load::<String>("does-not-exist.txt");
}
