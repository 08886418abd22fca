//! Message bus delivery: post order, exactly-once, one-frame latency.

use arceus::prelude::*;

#[test]
fn delivered_in_post_order() {
    let bus = MessageBus::new();
    bus.post(Numbered(1));
    bus.post(Numbered(2));
    bus.post(Numbered(3));

    let mut seen = Vec::new();
    let count = bus.drain(|msg| {
        if let Ok(n) = msg.downcast_ref::<Numbered>() {
            seen.push(n.0);
        }
    });
    assert_eq!(count, 3);
    assert_eq!(seen, vec![1, 2, 3]);
}

#[test]
fn each_message_delivered_exactly_once() {
    let bus = MessageBus::new();
    bus.post(Numbered(7));

    assert_eq!(bus.drain(|_| {}), 1);
    assert_eq!(bus.drain(|_| {}), 0);
}

#[test]
fn posts_during_drain_wait_for_the_next_drain() {
    let bus = MessageBus::new();
    bus.post(Numbered(1));

    let mut first = Vec::new();
    bus.drain(|msg| {
        let n = msg.downcast_ref::<Numbered>().unwrap();
        first.push(n.0);
        // A publisher never sees its own message in the same drain.
        bus.post(Numbered(n.0 + 10));
    });
    assert_eq!(first, vec![1]);

    let mut second = Vec::new();
    bus.drain(|msg| second.push(msg.downcast_ref::<Numbered>().unwrap().0));
    assert_eq!(second, vec![11]);
}

#[test]
fn posters_share_the_bus() {
    let bus = MessageBus::new();
    let poster = bus.poster();
    let other = poster.clone();

    poster.post(Numbered(1));
    other.post(Numbered(2));
    bus.post(Numbered(3));

    let mut seen = Vec::new();
    bus.drain(|msg| seen.push(msg.downcast_ref::<Numbered>().unwrap().0));
    assert_eq!(seen, vec![1, 2, 3]);
}

#[test]
fn mixed_message_types_keep_their_order() {
    let bus = MessageBus::new();
    bus.post(Numbered(1));
    bus.post(Named("hello".to_owned()));
    bus.post(Numbered(2));

    let mut seen = Vec::new();
    bus.drain(|msg| {
        if let Ok(n) = msg.downcast_ref::<Numbered>() {
            seen.push(format!("num {}", n.0));
        } else if let Ok(s) = msg.downcast_ref::<Named>() {
            seen.push(format!("str {}", s.0));
        }
    });
    assert_eq!(seen, vec!["num 1", "str hello", "num 2"]);
}

struct Numbered(i32);
impl Message for Numbered {}

struct Named(String);
impl Message for Named {}
