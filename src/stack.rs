//! A layered application state machine with deferred mutations.
//!
//! States are registered as factories keyed by id and live on a stack.
//! Three flavors of layer exist: plain states, *blocking* states that
//! disable every layer beneath them while on top, and *overlays* that
//! always sit above the plain states and never block. All stack
//! mutations are queued and applied between frames, never in the middle
//! of a dispatch walk.

use ahash::AHashMap;
use crossbeam::channel;

use crate::host::{Event, RenderTarget};
use crate::math::Time;
use crate::messages::{Message, MessagePoster};

use downcast::{downcast, Any};

pub type StateId = u32;

/// One layer of the application: typically the owner of a
/// [`Scene`](crate::scene::Scene), plus whatever bookkeeping the layer
/// needs.
///
/// Event propagation is not short-circuited: every active layer sees
/// every event, in stack order from the first active layer upward.
pub trait State: Any {
    /// Called once, when the layer is created, before it lands on the
    /// stack.
    fn init(&mut self, _ctx: &mut StateContext) {}

    fn handle_event(&mut self, event: &Event, ctx: &mut StateContext);

    fn handle_message(&mut self, message: &dyn Message, ctx: &mut StateContext);

    fn update(&mut self, ctx: &mut StateContext);

    fn pre_render(&mut self, _target: &mut dyn RenderTarget) {}

    fn render(&mut self, target: &mut dyn RenderTarget);

    fn post_render(&mut self, _target: &mut dyn RenderTarget) {}
}
downcast!(dyn State);

/// What a state sees during dispatch: the message poster and the ability
/// to request stack changes, which apply between frames.
pub struct StateContext<'a> {
    pub messages: &'a MessagePoster,
    pub dt: Time,
    requests: &'a channel::Sender<StackRequest>,
}

impl<'a> StateContext<'a> {
    pub fn push(&self, id: StateId) {
        self.requests.send(StackRequest::Push(id)).unwrap();
    }

    /// Push a state that disables every layer currently beneath it until
    /// it is popped.
    pub fn push_blocking(&self, id: StateId) {
        self.requests.send(StackRequest::PushBlocking(id)).unwrap();
    }

    pub fn push_overlay(&self, id: StateId) {
        self.requests.send(StackRequest::PushOverlay(id)).unwrap();
    }

    pub fn pop(&self) {
        self.requests.send(StackRequest::Pop).unwrap();
    }

    pub fn pop_overlay(&self) {
        self.requests.send(StackRequest::PopOverlay).unwrap();
    }

    pub fn clear(&self) {
        self.requests.send(StackRequest::Clear).unwrap();
    }
}

enum StackRequest {
    Push(StateId),
    PushBlocking(StateId),
    PushOverlay(StateId),
    Pop,
    PopOverlay,
    Clear,
}

type StateFactory = Box<dyn Fn() -> Box<dyn State>>;

struct Layer {
    state: Box<dyn State>,
    /// For blocking layers: the `active_begin` to restore on pop. Stored
    /// on the layer itself so arbitrary pop orders stay consistent.
    prev_active_begin: Option<usize>,
}

pub struct StateStack {
    layers: Vec<Layer>,
    /// Index of the first layer that receives dispatch.
    active_begin: usize,
    /// One past the last non-overlay layer; overlays live above this.
    last_index: usize,

    factories: AHashMap<StateId, StateFactory>,
    request_tx: channel::Sender<StackRequest>,
    request_rx: channel::Receiver<StackRequest>,
    poster: MessagePoster,
    delta: Time,
}

impl StateStack {
    pub fn new(poster: MessagePoster) -> Self {
        let (request_tx, request_rx) = channel::unbounded();
        Self {
            layers: Vec::new(),
            active_begin: 0,
            last_index: 0,
            factories: AHashMap::new(),
            request_tx,
            request_rx,
            poster,
            delta: Time::ZERO,
        }
    }

    /// Register the factory that builds states for `id`, replacing any
    /// prior registration.
    pub fn register(&mut self, id: StateId, factory: impl Fn() -> Box<dyn State> + 'static) {
        self.factories.insert(id, Box::new(factory));
    }

    // The public mutators mirror StateContext: everything is queued and
    // applied by `apply_pending` between frames.

    pub fn push(&self, id: StateId) {
        self.request_tx.send(StackRequest::Push(id)).unwrap();
    }

    pub fn push_blocking(&self, id: StateId) {
        self.request_tx.send(StackRequest::PushBlocking(id)).unwrap();
    }

    pub fn push_overlay(&self, id: StateId) {
        self.request_tx.send(StackRequest::PushOverlay(id)).unwrap();
    }

    pub fn pop(&self) {
        self.request_tx.send(StackRequest::Pop).unwrap();
    }

    pub fn pop_overlay(&self) {
        self.request_tx.send(StackRequest::PopOverlay).unwrap();
    }

    pub fn clear(&self) {
        self.request_tx.send(StackRequest::Clear).unwrap();
    }

    /// Apply every queued stack change. The engine calls this once per
    /// tick, after messages and before `update`.
    pub fn apply_pending(&mut self) {
        let requests: Vec<StackRequest> = self.request_rx.try_iter().collect();
        for request in requests {
            match request {
                StackRequest::Push(id) => {
                    if let Some(state) = self.create_state(id) {
                        self.layers.insert(
                            self.last_index,
                            Layer {
                                state,
                                prev_active_begin: None,
                            },
                        );
                        self.last_index += 1;
                    }
                }
                StackRequest::PushBlocking(id) => {
                    if let Some(state) = self.create_state(id) {
                        self.layers.insert(
                            self.last_index,
                            Layer {
                                state,
                                prev_active_begin: Some(self.active_begin),
                            },
                        );
                        self.last_index += 1;
                        self.active_begin = self.last_index - 1;
                    }
                }
                StackRequest::PushOverlay(id) => {
                    if let Some(state) = self.create_state(id) {
                        self.layers.push(Layer {
                            state,
                            prev_active_begin: None,
                        });
                    }
                }
                StackRequest::Pop => {
                    if self.last_index == 0 {
                        tracing::warn!("pop requested on a stack with no states");
                        continue;
                    }
                    let layer = self.layers.remove(self.last_index - 1);
                    if let Some(prev) = layer.prev_active_begin {
                        self.active_begin = prev;
                    }
                    self.last_index -= 1;
                }
                StackRequest::PopOverlay => {
                    if self.last_index < self.layers.len() {
                        self.layers.pop();
                    }
                }
                StackRequest::Clear => {
                    self.layers.clear();
                    self.last_index = 0;
                    self.active_begin = 0;
                }
            }
        }
    }

    pub fn handle_event(&mut self, event: &Event) {
        let mut ctx = StateContext {
            messages: &self.poster,
            dt: self.delta,
            requests: &self.request_tx,
        };
        for layer in self.layers[self.active_begin..].iter_mut() {
            layer.state.handle_event(event, &mut ctx);
        }
    }

    pub fn handle_message(&mut self, message: &dyn Message) {
        let mut ctx = StateContext {
            messages: &self.poster,
            dt: self.delta,
            requests: &self.request_tx,
        };
        for layer in self.layers[self.active_begin..].iter_mut() {
            layer.state.handle_message(message, &mut ctx);
        }
    }

    pub fn update(&mut self, dt: Time) {
        self.delta = dt;
        let mut ctx = StateContext {
            messages: &self.poster,
            dt,
            requests: &self.request_tx,
        };
        for layer in self.layers[self.active_begin..].iter_mut() {
            layer.state.update(&mut ctx);
        }
    }

    pub fn pre_render(&mut self, target: &mut dyn RenderTarget) {
        for layer in self.layers[self.active_begin..].iter_mut() {
            layer.state.pre_render(target);
        }
    }

    pub fn render(&mut self, target: &mut dyn RenderTarget) {
        for layer in self.layers[self.active_begin..].iter_mut() {
            layer.state.render(target);
        }
    }

    pub fn post_render(&mut self, target: &mut dyn RenderTarget) {
        for layer in self.layers[self.active_begin..].iter_mut() {
            layer.state.post_render(target);
        }
    }

    /// Total layers, overlays included.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn create_state(&mut self, id: StateId) -> Option<Box<dyn State>> {
        let Some(factory) = self.factories.get(&id) else {
            tracing::error!("didn't find a registered state with id {}", id);
            return None;
        };
        let mut state = factory();
        let mut ctx = StateContext {
            messages: &self.poster,
            dt: self.delta,
            requests: &self.request_tx,
        };
        state.init(&mut ctx);
        Some(state)
    }
}
