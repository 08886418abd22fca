//! A tiny complete game: balls bounce around an ASCII arena, a scripted
//! "player" spawns more by mashing space, and a score counter listens
//! for bounce messages.
//!
//! The host here is a terminal toy that runs a fixed number of frames and
//! quits, so `cargo run --example game` terminates on its own.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use arceus::host::ViewRect;
use arceus::prelude::*;

const ARENA_W: f32 = 60.0;
const ARENA_H: f32 = 16.0;
const PLAY: StateId = 1;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Mash space a few times, then quit.
    let script = vec![
        Event::KeyPressed {
            code: KeyCode::Space,
        },
        Event::KeyPressed {
            code: KeyCode::Space,
        },
        Event::KeyPressed {
            code: KeyCode::Space,
        },
    ];

    let mut engine = Engine::new(TermHost::new(200, script), Time::from_millis(16.0));
    let poster = engine.bus().poster();
    engine
        .stack()
        .register(PLAY, move || Box::new(PlayState::new(poster.clone())));
    engine.stack().push(PLAY);
    engine.run();
}

// --- components & messages ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Ball {
    position: Vector2<f32>,
    velocity: Vector2<f32>,
}

impl Component for Ball {
    fn bind(builder: MetaBuilder<Self>) -> MetaBuilder<Self>
    where
        Self: Sized,
    {
        builder.clone_ctor().serde()
    }
}

struct Bounced;
impl Message for Bounced {}

// --- systems ---

/// Integrates positions and bounces balls off the arena walls.
struct PhysicsSystem;

impl System for PhysicsSystem {
    fn update(&mut self, ctx: &mut RunContext) {
        let dt = ctx.dt.as_seconds();
        for (_, mut ball) in ctx.registry.view::<&mut Ball>().iter() {
            let step = ball.velocity * dt;
            ball.position += step;

            let mut bounced = false;
            if ball.position.x < 0.0 || ball.position.x >= ARENA_W {
                ball.velocity.x = -ball.velocity.x;
                bounced = true;
            }
            if ball.position.y < 0.0 || ball.position.y >= ARENA_H {
                ball.velocity.y = -ball.velocity.y;
                bounced = true;
            }
            if bounced {
                let velocity = ball.velocity;
                ball.position += velocity * dt;
                ctx.messages.post(Bounced);
            }
        }
    }
}

/// Spawns a ball whenever the player presses space.
struct SpawnSystem {
    next_angle: f32,
}

impl System for SpawnSystem {
    fn handle_event(&mut self, event: &Event, ctx: &mut RunContext) {
        if let Event::KeyPressed {
            code: KeyCode::Space,
        } = event
        {
            self.next_angle += 2.39996;
            let e = ctx.registry.create();
            ctx.registry.add(
                e,
                Ball {
                    position: Vector2::new(ARENA_W / 2.0, ARENA_H / 2.0),
                    velocity: Vector2::new(
                        self.next_angle.cos() * 9.0,
                        self.next_angle.sin() * 5.0,
                    ),
                },
            );
        }
    }

    fn update(&mut self, _ctx: &mut RunContext) {}
}

/// Tallies bounce messages; they arrive one frame after the bounce.
struct ScoreSystem {
    bounces: usize,
}

impl System for ScoreSystem {
    fn handle_message(&mut self, message: &dyn Message, _ctx: &mut RunContext) {
        if message.downcast_ref::<Bounced>().is_ok() {
            self.bounces += 1;
            tracing::info!("bounce #{}", self.bounces);
        }
    }

    fn update(&mut self, _ctx: &mut RunContext) {}
}

/// Caches ball positions during update and draws them as points.
struct DrawSystem {
    vertices: Vec<Vertex>,
}

impl System for DrawSystem {
    fn update(&mut self, ctx: &mut RunContext) {
        self.vertices.clear();
        for (_, ball) in ctx.registry.view::<&Ball>().iter() {
            self.vertices.push(Vertex {
                position: ball.position,
                color: Color::WHITE,
                tex_coords: Vector2::default(),
            });
        }
    }

    fn renderer(&mut self) -> Option<&mut dyn Renderer> {
        Some(self)
    }
}

impl Renderer for DrawSystem {
    fn render(&mut self, target: &mut dyn RenderTarget) {
        target.draw(&self.vertices, Primitive::Points, &RenderStates::default());
    }
}

// --- the one state ---

struct PlayState {
    scene: Scene,
}

impl PlayState {
    fn new(poster: MessagePoster) -> Self {
        let mut scene = Scene::new(poster);
        scene.add_system(SpawnSystem { next_angle: 0.0 });
        scene.add_system(PhysicsSystem);
        scene.add_system(ScoreSystem { bounces: 0 });
        scene.add_system(DrawSystem {
            vertices: Vec::new(),
        });

        // One ball to start with, plus its clone going the other way.
        let seed = scene.create_entity();
        scene.registry.add(
            seed,
            Ball {
                position: Vector2::new(10.0, 5.0),
                velocity: Vector2::new(11.0, 3.0),
            },
        );
        let twin = scene.clone_entity(seed);
        scene.registry.get::<&mut Ball>(twin).velocity = Vector2::new(-7.0, 4.5);

        Self { scene }
    }
}

impl State for PlayState {
    fn handle_event(&mut self, event: &Event, _ctx: &mut StateContext) {
        self.scene.handle_event(event);
    }

    fn handle_message(&mut self, message: &dyn Message, _ctx: &mut StateContext) {
        self.scene.handle_message(message);
    }

    fn update(&mut self, ctx: &mut StateContext) {
        self.scene.update(ctx.dt);
    }

    fn render(&mut self, target: &mut dyn RenderTarget) {
        self.scene.render(target);
    }
}

// --- a toy terminal host ---

struct TermHost {
    frames_left: u32,
    open: bool,
    events: VecDeque<Event>,
    target: TermTarget,
}

impl TermHost {
    fn new(frames: u32, script: Vec<Event>) -> Self {
        Self {
            frames_left: frames,
            open: true,
            events: script.into(),
            target: TermTarget::new(),
        }
    }
}

impl GraphicsHost for TermHost {
    fn poll_event(&mut self) -> Option<Event> {
        if self.frames_left == 0 {
            self.open = false;
            return None;
        }
        self.frames_left -= 1;
        // One scripted event every 20 frames.
        if self.frames_left % 20 == 0 {
            self.events.pop_front()
        } else {
            None
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn target(&mut self) -> &mut dyn RenderTarget {
        &mut self.target
    }
}

struct TermTarget {
    grid: Vec<char>,
    view: ViewRect,
}

impl TermTarget {
    fn new() -> Self {
        Self {
            grid: vec![' '; (ARENA_W as usize) * (ARENA_H as usize)],
            view: ViewRect {
                center: Vector2::new(ARENA_W / 2.0, ARENA_H / 2.0),
                size: Vector2::new(ARENA_W, ARENA_H),
            },
        }
    }
}

impl RenderTarget for TermTarget {
    fn clear(&mut self, _color: Color) {
        self.grid.fill(' ');
    }

    fn draw(&mut self, vertices: &[Vertex], _primitive: Primitive, _states: &RenderStates) {
        for vertex in vertices {
            let x = vertex.position.x as isize;
            let y = vertex.position.y as isize;
            if (0..ARENA_W as isize).contains(&x) && (0..ARENA_H as isize).contains(&y) {
                self.grid[y as usize * ARENA_W as usize + x as usize] = 'o';
            }
        }
    }

    fn view(&self) -> ViewRect {
        self.view
    }

    fn set_view(&mut self, view: ViewRect) {
        self.view = view;
    }

    fn display(&mut self) {
        let mut out = String::with_capacity(self.grid.len() + ARENA_H as usize);
        for row in self.grid.chunks(ARENA_W as usize) {
            out.extend(row);
            out.push('\n');
        }
        print!("\x1b[H\x1b[2J{}", out);
    }
}
