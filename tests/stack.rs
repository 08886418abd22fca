//! State stack layering: blocking, overlays, deferred mutation.

use std::sync::{Arc, Mutex};

use arceus::prelude::*;

type Log = Arc<Mutex<Vec<String>>>;

const BASE: StateId = 1;
const PAUSE: StateId = 2;
const HUD: StateId = 3;

fn harness(log: &Log) -> (StateStack, MessageBus) {
    let bus = MessageBus::new();
    let mut stack = StateStack::new(bus.poster());

    for (id, tag) in [(BASE, "base"), (PAUSE, "pause"), (HUD, "hud")] {
        let log = log.clone();
        stack.register(id, move || Box::new(Recorder::new(tag, &log)));
    }
    (stack, bus)
}

fn take(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.lock().unwrap())
}

#[test]
fn mutations_wait_for_the_frame_boundary() {
    let log: Log = Default::default();
    let (mut stack, _bus) = harness(&log);

    stack.push(BASE);
    assert!(stack.is_empty());

    stack.apply_pending();
    assert_eq!(stack.len(), 1);
    assert_eq!(take(&log), vec!["base init"]);
}

#[test]
fn blocking_layers_disable_everything_beneath() {
    let log: Log = Default::default();
    let (mut stack, _bus) = harness(&log);

    stack.push(BASE);
    stack.apply_pending();
    stack.update(Time::ZERO);
    assert_eq!(take(&log), vec!["base init", "base update"]);

    // While the pause layer is on top, the base layer goes quiet.
    stack.push_blocking(PAUSE);
    stack.apply_pending();
    stack.update(Time::ZERO);
    stack.handle_event(&Event::KeyPressed { code: KeyCode::P });
    assert_eq!(take(&log), vec!["pause init", "pause update", "pause event"]);

    // Popping it restores the old active range.
    stack.pop();
    stack.apply_pending();
    stack.update(Time::ZERO);
    assert_eq!(take(&log), vec!["base update"]);
}

#[test]
fn overlays_run_without_blocking_and_render_last() {
    let log: Log = Default::default();
    let (mut stack, _bus) = harness(&log);

    stack.push(BASE);
    stack.push_overlay(HUD);
    stack.apply_pending();

    stack.update(Time::ZERO);
    let mut target = NullTarget;
    stack.render(&mut target);
    assert_eq!(
        take(&log),
        vec![
            "base init",
            "hud init",
            "base update",
            "hud update",
            "base render",
            "hud render",
        ]
    );
}

#[test]
fn plain_pushes_stay_under_the_overlays() {
    let log: Log = Default::default();
    let (mut stack, _bus) = harness(&log);

    stack.push(BASE);
    stack.push_overlay(HUD);
    stack.apply_pending();
    take(&log);

    // A later plain push still lands beneath the overlay.
    stack.push(PAUSE);
    stack.apply_pending();
    stack.update(Time::ZERO);
    assert_eq!(
        take(&log),
        vec!["pause init", "base update", "pause update", "hud update"]
    );
}

#[test]
fn pop_overlay_only_touches_overlays() {
    let log: Log = Default::default();
    let (mut stack, _bus) = harness(&log);

    stack.push(BASE);
    stack.pop_overlay();
    stack.apply_pending();
    assert_eq!(stack.len(), 1);

    stack.push_overlay(HUD);
    stack.apply_pending();
    assert_eq!(stack.len(), 2);

    stack.pop_overlay();
    stack.apply_pending();
    assert_eq!(stack.len(), 1);

    stack.update(Time::ZERO);
    let seen = take(&log);
    assert!(seen.contains(&"base update".to_owned()));
    assert!(!seen.contains(&"hud update".to_owned()));
}

#[test]
fn clear_empties_everything() {
    let log: Log = Default::default();
    let (mut stack, _bus) = harness(&log);

    stack.push(BASE);
    stack.push_blocking(PAUSE);
    stack.push_overlay(HUD);
    stack.apply_pending();
    stack.clear();
    stack.apply_pending();

    assert!(stack.is_empty());
    stack.update(Time::ZERO);

    // And the stack is usable again afterwards.
    stack.push(BASE);
    stack.apply_pending();
    stack.update(Time::ZERO);
    let seen = take(&log);
    assert!(seen.ends_with(&["base init".to_owned(), "base update".to_owned()]));
}

#[test]
fn pushing_an_unregistered_id_is_ignored() {
    let log: Log = Default::default();
    let (mut stack, _bus) = harness(&log);

    stack.push(999);
    stack.apply_pending();
    assert!(stack.is_empty());
}

#[test]
fn states_request_stack_changes_through_the_context() {
    let log: Log = Default::default();
    let bus = MessageBus::new();
    let mut stack = StateStack::new(bus.poster());

    {
        let log = log.clone();
        stack.register(BASE, move || Box::new(Recorder::new("base", &log)));
    }
    {
        let log = log.clone();
        stack.register(PAUSE, move || {
            Box::new(PushOnFirstUpdate::new(Recorder::new("pause", &log), BASE))
        });
    }

    stack.push(PAUSE);
    stack.apply_pending();
    stack.update(Time::ZERO);
    assert_eq!(stack.len(), 1);

    // The push requested mid-update lands at the next boundary.
    stack.apply_pending();
    assert_eq!(stack.len(), 2);
}

#[test]
fn messages_reach_all_active_layers() {
    let log: Log = Default::default();
    let (mut stack, bus) = harness(&log);

    stack.push(BASE);
    stack.push_overlay(HUD);
    stack.apply_pending();
    take(&log);

    bus.post(Ding);
    bus.drain(|msg| stack.handle_message(msg));
    assert_eq!(take(&log), vec!["base message", "hud message"]);
}

// --- scaffolding ---

struct Ding;
impl Message for Ding {}

struct Recorder {
    tag: &'static str,
    log: Log,
}

impl Recorder {
    fn new(tag: &'static str, log: &Log) -> Self {
        Self {
            tag,
            log: log.clone(),
        }
    }

    fn note(&self, what: &str) {
        self.log.lock().unwrap().push(format!("{} {}", self.tag, what));
    }
}

impl State for Recorder {
    fn init(&mut self, _ctx: &mut StateContext) {
        self.note("init");
    }

    fn handle_event(&mut self, _event: &Event, _ctx: &mut StateContext) {
        self.note("event");
    }

    fn handle_message(&mut self, _message: &dyn Message, _ctx: &mut StateContext) {
        self.note("message");
    }

    fn update(&mut self, _ctx: &mut StateContext) {
        self.note("update");
    }

    fn render(&mut self, _target: &mut dyn RenderTarget) {
        self.note("render");
    }
}

struct PushOnFirstUpdate {
    inner: Recorder,
    push: StateId,
    done: bool,
}

impl PushOnFirstUpdate {
    fn new(inner: Recorder, push: StateId) -> Self {
        Self {
            inner,
            push,
            done: false,
        }
    }
}

impl State for PushOnFirstUpdate {
    fn handle_event(&mut self, event: &Event, ctx: &mut StateContext) {
        self.inner.handle_event(event, ctx);
    }

    fn handle_message(&mut self, message: &dyn Message, ctx: &mut StateContext) {
        self.inner.handle_message(message, ctx);
    }

    fn update(&mut self, ctx: &mut StateContext) {
        self.inner.update(ctx);
        if !self.done {
            ctx.push(self.push);
            self.done = true;
        }
    }

    fn render(&mut self, target: &mut dyn RenderTarget) {
        self.inner.render(target);
    }
}

struct NullTarget;

impl RenderTarget for NullTarget {
    fn clear(&mut self, _color: Color) {}
    fn draw(&mut self, _vertices: &[Vertex], _primitive: Primitive, _states: &RenderStates) {}
    fn view(&self) -> arceus::host::ViewRect {
        Default::default()
    }
    fn set_view(&mut self, _view: arceus::host::ViewRect) {}
    fn display(&mut self) {}
}
