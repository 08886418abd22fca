//! Per-frame logic units and the manager that dispatches them.
//!
//! Systems run in the order they were added; that ordering is part of the
//! contract, so callers that need one system to see the world before
//! another simply register them in that order. A system that also renders
//! says so by overriding [`System::renderer`], which enrolls it in the
//! pre/render/post passes.

use downcast::{downcast, Any};

use crate::host::{Event, RenderTarget};
use crate::math::Time;
use crate::messages::{Message, MessagePoster};
use crate::meta::TypeKey;
use crate::registry::Registry;

/// What a system sees while it runs: the scene's registry, a handle to
/// post messages for next frame, and the tick's timestep.
pub struct RunContext<'a> {
    pub registry: &'a mut Registry,
    pub messages: &'a MessagePoster,
    pub dt: Time,
}

/// A unit of per-frame logic.
///
/// Only [`System::update`] is required; everything else defaults to
/// a no-op.
pub trait System: Any {
    /// Called once, when the system is added to a manager.
    fn init(&mut self, _ctx: &mut RunContext) {}

    /// Called for every host event, in the order the host produced them.
    fn handle_event(&mut self, _event: &Event, _ctx: &mut RunContext) {}

    /// Called once per message drained from the bus; downcast to the
    /// message types you care about.
    fn handle_message(&mut self, _message: &dyn Message, _ctx: &mut RunContext) {}

    fn update(&mut self, ctx: &mut RunContext);

    /// Return `Some(self)` to take part in the render passes.
    fn renderer(&mut self) -> Option<&mut dyn Renderer> {
        None
    }
}
downcast!(dyn System);

/// The render capability of a [`System`]. Passes walk renderers in system
/// insertion order.
pub trait Renderer {
    fn pre_render(&mut self, _target: &mut dyn RenderTarget) {}

    fn render(&mut self, target: &mut dyn RenderTarget);

    fn post_render(&mut self, _target: &mut dyn RenderTarget) {}
}

struct SystemSlot {
    tid: TypeKey,
    system: Box<dyn System>,
    active: bool,
    /// Cached `renderer().is_some()` from add time.
    renders: bool,
}

/// Owns an ordered list of systems and runs the per-frame dispatch.
pub struct SystemManager {
    systems: Vec<SystemSlot>,
}

impl SystemManager {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    /// Add a system, initialize it, and start it active. Idempotent by
    /// type: adding a second instance of the same type returns the one
    /// already there.
    pub fn add_system<S: System>(&mut self, system: S, ctx: &mut RunContext) -> &mut S {
        let tid = TypeKey::of::<S>();
        if let Some(index) = self.index_of(tid) {
            tracing::warn!("system {} was already added", tid.type_name());
            let slot = &mut self.systems[index];
            // SAFETY: the slot was stored under S's type id.
            return unsafe { slot.system.downcast_mut().unwrap_unchecked() };
        }

        let mut system = system;
        let renders = system.renderer().is_some();
        let mut slot = SystemSlot {
            tid,
            system: Box::new(system),
            active: true,
            renders,
        };
        slot.system.init(ctx);
        self.systems.push(slot);

        let slot = self.systems.last_mut().unwrap();
        // SAFETY: just stored an S here.
        unsafe { slot.system.downcast_mut().unwrap_unchecked() }
    }

    pub fn get<S: System>(&self) -> Option<&S> {
        let tid = TypeKey::of::<S>();
        let index = self.index_of(tid)?;
        // SAFETY: slots are keyed by type id.
        Some(unsafe { self.systems[index].system.downcast_ref().unwrap_unchecked() })
    }

    pub fn get_mut<S: System>(&mut self) -> Option<&mut S> {
        let tid = TypeKey::of::<S>();
        let index = self.index_of(tid)?;
        // SAFETY: slots are keyed by type id.
        Some(unsafe { self.systems[index].system.downcast_mut().unwrap_unchecked() })
    }

    pub fn has_system<S: System>(&self) -> bool {
        self.index_of(TypeKey::of::<S>()).is_some()
    }

    pub fn remove_system<S: System>(&mut self) {
        let tid = TypeKey::of::<S>();
        self.systems.retain(|slot| slot.tid != tid);
    }

    /// Gate a system in or out of dispatch (and the render passes, if it
    /// renders). Setting the state it already has is a no-op.
    pub fn set_active<S: System>(&mut self, active: bool) {
        let tid = TypeKey::of::<S>();
        match self.index_of(tid) {
            Some(index) => self.systems[index].active = active,
            None => tracing::warn!("set_active on unknown system {}", tid.type_name()),
        }
    }

    pub fn is_active<S: System>(&self) -> bool {
        self.index_of(TypeKey::of::<S>())
            .map_or(false, |index| self.systems[index].active)
    }

    pub fn handle_event(&mut self, event: &Event, ctx: &mut RunContext) {
        for slot in self.systems.iter_mut().filter(|s| s.active) {
            slot.system.handle_event(event, ctx);
        }
    }

    pub fn handle_message(&mut self, message: &dyn Message, ctx: &mut RunContext) {
        for slot in self.systems.iter_mut().filter(|s| s.active) {
            slot.system.handle_message(message, ctx);
        }
    }

    pub fn update(&mut self, ctx: &mut RunContext) {
        for slot in self.systems.iter_mut().filter(|s| s.active) {
            slot.system.update(ctx);
        }
    }

    pub fn pre_render(&mut self, target: &mut dyn RenderTarget) {
        self.each_renderer(|renderer| renderer.pre_render(target));
    }

    pub fn render(&mut self, target: &mut dyn RenderTarget) {
        self.each_renderer(|renderer| renderer.render(target));
    }

    pub fn post_render(&mut self, target: &mut dyn RenderTarget) {
        self.each_renderer(|renderer| renderer.post_render(target));
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    fn each_renderer(&mut self, mut f: impl FnMut(&mut dyn Renderer)) {
        for slot in self
            .systems
            .iter_mut()
            .filter(|s| s.active && s.renders)
        {
            if let Some(renderer) = slot.system.renderer() {
                f(renderer);
            }
        }
    }

    fn index_of(&self, tid: TypeKey) -> Option<usize> {
        self.systems.iter().position(|slot| slot.tid == tid)
    }
}

impl Default for SystemManager {
    fn default() -> Self {
        Self::new()
    }
}
