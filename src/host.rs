//! The graphics host interface the engine consumes: an event stream and a
//! render sink.
//!
//! The engine core never talks to a windowing library directly. A host
//! implements [`GraphicsHost`] over whatever backend it likes (a real
//! window, a terminal, a headless buffer for tests) and hands it to
//! [`Engine`](crate::engine::Engine).

use crate::math::{Color, Vector2};

/// One input event produced by the host, delivered to every active state
/// layer in production order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The host wants to shut down. The engine closes the host in
    /// response and exits its loop on the next iteration.
    Closed,
    Resized {
        width: u32,
        height: u32,
    },
    KeyPressed {
        code: KeyCode,
    },
    KeyReleased {
        code: KeyCode,
    },
    MouseButtonPressed {
        button: MouseButton,
        x: i32,
        y: i32,
    },
    MouseButtonReleased {
        button: MouseButton,
        x: i32,
        y: i32,
    },
    MouseMoved {
        x: i32,
        y: i32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    Num0,
    Num1,
    Num2,
    Num3,
    Num4,
    Num5,
    Num6,
    Num7,
    Num8,
    Num9,
    Escape,
    Space,
    Enter,
    Backspace,
    Tab,
    Left,
    Right,
    Up,
    Down,
    LShift,
    RShift,
    LControl,
    RControl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// One point of a drawn primitive.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub position: Vector2<f32>,
    pub color: Color,
    pub tex_coords: Vector2<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Alpha,
    Add,
    Multiply,
    Replace,
}

/// Extra state applied to a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStates {
    pub blend: BlendMode,
}

/// The world-space window a target shows.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewRect {
    pub center: Vector2<f32>,
    pub size: Vector2<f32>,
}

/// Where render passes draw to.
pub trait RenderTarget {
    fn clear(&mut self, color: Color);
    fn draw(&mut self, vertices: &[Vertex], primitive: Primitive, states: &RenderStates);
    fn view(&self) -> ViewRect;
    fn set_view(&mut self, view: ViewRect);
    /// Present everything drawn since the last clear.
    fn display(&mut self);
}

/// Event source plus render sink, owned by the engine for its lifetime.
pub trait GraphicsHost {
    /// Next pending input event, if any. The engine pumps this dry once
    /// per tick.
    fn poll_event(&mut self) -> Option<Event>;

    /// The engine's loop runs while this is true.
    fn is_open(&self) -> bool;

    fn close(&mut self);

    fn target(&mut self) -> &mut dyn RenderTarget;
}
