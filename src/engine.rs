//! The outermost driver: fixed-step updates, event ingress, render
//! pacing.
//!
//! Per iteration the engine accumulates the frame delta into a lag
//! counter and runs one *tick* per elapsed fixed step: pump host events
//! into the state stack, drain the message bus into it, apply pending
//! stack changes, update. If at least one tick ran, one render frame
//! follows. With the `delta-time` feature the loop instead runs exactly
//! one tick per iteration and passes the raw delta through.

use std::time::Instant;

use crate::host::{Event, GraphicsHost};
use crate::math::{Color, Time};
use crate::messages::MessageBus;
use crate::stack::StateStack;

pub struct Engine<H: GraphicsHost> {
    host: H,
    bus: MessageBus,
    stack: StateStack,
    fixed_step: Time,
    clear_color: Color,
}

impl<H: GraphicsHost> Engine<H> {
    pub fn new(host: H, fixed_step: Time) -> Self {
        let bus = MessageBus::new();
        let stack = StateStack::new(bus.poster());
        Self {
            host,
            bus,
            stack,
            fixed_step,
            clear_color: Color::BLACK,
        }
    }

    /// The state stack, for registering state factories and pushing the
    /// initial state before [`Engine::run`].
    pub fn stack(&mut self) -> &mut StateStack {
        &mut self.stack
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn host(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    /// Drive the engine until the host closes.
    pub fn run(&mut self) {
        let mut clock = Instant::now();
        #[cfg(not(feature = "delta-time"))]
        let mut lag = Time::ZERO;

        while self.host.is_open() {
            let delta = Time::from_duration(clock.elapsed());
            clock = Instant::now();

            #[cfg(feature = "delta-time")]
            {
                self.tick(delta);
                self.render_frame();
            }

            #[cfg(not(feature = "delta-time"))]
            {
                lag += delta;
                let mut ticked = false;
                while lag >= self.fixed_step {
                    lag -= self.fixed_step;
                    self.tick(self.fixed_step);
                    ticked = true;
                }
                if ticked {
                    self.render_frame();
                }
            }
        }
        tracing::info!("host closed, engine loop exiting");
    }

    /// One engine tick: events, messages, pending stack changes, update.
    pub fn tick(&mut self, dt: Time) {
        while let Some(event) = self.host.poll_event() {
            if matches!(event, Event::Closed) {
                self.host.close();
            }
            self.stack.handle_event(&event);
        }

        let stack = &mut self.stack;
        self.bus.drain(|message| stack.handle_message(message));

        self.stack.apply_pending();
        self.stack.update(dt);
    }

    /// One render frame: clear, pre/render/post down the stack, present.
    pub fn render_frame(&mut self) {
        let target = self.host.target();
        target.clear(self.clear_color);
        self.stack.pre_render(target);
        self.stack.render(target);
        self.stack.post_render(target);
        target.display();
    }
}
