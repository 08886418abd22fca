//! One self-contained slice of the game: a registry plus the systems that
//! run over it.
//!
//! A typical [`State`](crate::stack::State) owns exactly one `Scene` and
//! forwards its per-frame calls here. The scene's only real job is
//! building the [`RunContext`] so systems see the registry and the
//! message poster together.

use crate::host::{Event, RenderTarget};
use crate::math::Time;
use crate::messages::{Message, MessagePoster};
use crate::registry::{Entity, Registry};
use crate::system::{RunContext, System, SystemManager};

pub struct Scene {
    pub registry: Registry,
    pub systems: SystemManager,
    poster: MessagePoster,
    /// Timestep of the tick currently running, fed in by `update`.
    delta: Time,
}

impl Scene {
    pub fn new(poster: MessagePoster) -> Self {
        Self {
            registry: Registry::new(),
            systems: SystemManager::new(),
            poster,
            delta: Time::ZERO,
        }
    }

    pub fn create_entity(&mut self) -> Entity {
        self.registry.create()
    }

    pub fn destroy_entity(&mut self, entity: Entity) {
        self.registry.destroy(entity);
    }

    pub fn clone_entity(&mut self, entity: Entity) -> Entity {
        self.registry.clone_entity(entity)
    }

    pub fn add_system<S: System>(&mut self, system: S) -> &mut S {
        let mut ctx = RunContext {
            registry: &mut self.registry,
            messages: &self.poster,
            dt: self.delta,
        };
        self.systems.add_system(system, &mut ctx)
    }

    pub fn set_system_active<S: System>(&mut self, active: bool) {
        self.systems.set_active::<S>(active);
    }

    pub fn handle_event(&mut self, event: &Event) {
        let mut ctx = RunContext {
            registry: &mut self.registry,
            messages: &self.poster,
            dt: self.delta,
        };
        self.systems.handle_event(event, &mut ctx);
    }

    pub fn handle_message(&mut self, message: &dyn Message) {
        let mut ctx = RunContext {
            registry: &mut self.registry,
            messages: &self.poster,
            dt: self.delta,
        };
        self.systems.handle_message(message, &mut ctx);
    }

    pub fn update(&mut self, dt: Time) {
        self.delta = dt;
        let mut ctx = RunContext {
            registry: &mut self.registry,
            messages: &self.poster,
            dt,
        };
        self.systems.update(&mut ctx);
    }

    pub fn pre_render(&mut self, target: &mut dyn RenderTarget) {
        self.systems.pre_render(target);
    }

    pub fn render(&mut self, target: &mut dyn RenderTarget) {
        self.systems.render(target);
    }

    pub fn post_render(&mut self, target: &mut dyn RenderTarget) {
        self.systems.post_render(target);
    }
}
