#![doc = include_str!("../README.md")]

pub mod component;
pub mod engine;
pub mod host;
pub mod math;
pub mod messages;
pub mod meta;
pub mod query;
pub mod registry;
pub mod resources;
pub mod scene;
pub mod serde;
pub mod signal;
pub mod stack;
pub mod system;

pub mod prelude {
    pub use crate::component::{Component, MetaBuilder};
    pub use crate::engine::Engine;
    pub use crate::host::{
        Event, GraphicsHost, KeyCode, MouseButton, Primitive, RenderStates, RenderTarget, Vertex,
    };
    pub use crate::math::{Color, Rect, Time, Vector2};
    pub use crate::messages::{Message, MessageBus, MessagePoster};
    pub use crate::meta::{CompTypeId, ComponentMask, TypeKey, MAX_COMPONENT_TYPES};
    pub use crate::query::{Query, View};
    pub use crate::registry::{Entity, Registry};
    pub use crate::resources::Resources;
    pub use crate::scene::Scene;
    pub use crate::signal::{Connection, ScopedConnection, Signal};
    pub use crate::stack::{State, StateContext, StateId, StateStack};
    pub use crate::system::{Renderer, RunContext, System, SystemManager};
}
