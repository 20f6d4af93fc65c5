use crate::engine::input::Keyboard;
use crate::engine::physics::{ArcadeWorld, Body};
use crate::engine::texture::Textures;
use crate::engine::tilemap::TilemapLayer;
use crate::engine::{Point, Rect, Renderer, Size};
use crate::sprite::state::{CatContext, CatState, IsFalling, IsLanded, BODY_OFFSET};
use crate::sprite::{
    Airborne, Facing, Idle, SpriteState, Walking, CAT_FRAME_SIZE, CAT_SHEET_KEY,
};

const LEFT_KEYS: [&str; 2] = ["ArrowLeft", "A"];
const RIGHT_KEYS: [&str; 2] = ["ArrowRight", "D"];
const JUMP_KEYS: [&str; 3] = ["ArrowUp", "W", "Space"];
// drawn when the sheet failed to load
const FALLBACK_COLOR: &str = "#f59e0b";

/// ELI5:
/// ┌──────────────── State Transition Flow ──────────────────┐
/// │  From State  →  Event        →  To State                │
/// ├─────────────────────────────────────────────────────────┤
/// │  Idle        →  Walk(facing) →  Walking                 │
/// │  Idle        →  Jump         →  Airborne (on floor)     │
/// │  Walking     →  Stop         →  Idle                    │
/// │  Walking     →  Jump         →  Airborne (on floor)     │
/// │  Airborne    →  Walk / Stop  →  Airborne (steering)     │
/// │  -------        ------                                  │
/// │  Idle/Walk   →  Update       →  Airborne (lost floor)   │
/// │  Airborne    →  Update       →  Idle/Walking (landed)   │
/// └─────────────────────────────────────────────────────────┘
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    Walk(Facing),
    Stop,
    Jump,
}

#[derive(Debug, Copy, Clone)]
enum CatStateMachine {
    Idle(CatState<Idle>),
    Walking(CatState<Walking>),
    Airborne(CatState<Airborne>),
}

impl From<CatState<Idle>> for CatStateMachine {
    fn from(state: CatState<Idle>) -> Self {
        CatStateMachine::Idle(state)
    }
}

impl From<CatState<Walking>> for CatStateMachine {
    fn from(state: CatState<Walking>) -> Self {
        CatStateMachine::Walking(state)
    }
}

impl From<CatState<Airborne>> for CatStateMachine {
    fn from(state: CatState<Airborne>) -> Self {
        CatStateMachine::Airborne(state)
    }
}

impl<S> From<IsFalling<S>> for CatStateMachine
where
    CatState<S>: Into<CatStateMachine>,
{
    fn from(is_falling: IsFalling<S>) -> Self {
        match is_falling {
            IsFalling::Standing(state) => state.into(),
            IsFalling::Falling(state) => state.into(),
        }
    }
}

impl From<IsLanded> for CatStateMachine {
    fn from(is_landed: IsLanded) -> Self {
        match is_landed {
            IsLanded::Idle(state) => state.into(),
            IsLanded::Walking(state) => state.into(),
            IsLanded::InAir(state) => state.into(),
        }
    }
}

impl CatStateMachine {
    // CONSUMING self: the old state can't be used after a transition
    fn transition(self, event: Event) -> Self {
        use CatStateMachine::*;
        match (self, event) {
            (Idle(state), Event::Walk(facing)) => state.walk(facing).into(),
            (Walking(state), Event::Walk(facing)) => state.walk(facing).into(),
            (Walking(state), Event::Stop) => state.stop().into(),
            (Idle(state), Event::Jump) if state.context().body.on_floor => state.jump().into(),
            (Walking(state), Event::Jump) if state.context().body.on_floor => state.jump().into(),
            (Airborne(state), Event::Walk(facing)) => state.steer(Some(facing)).into(),
            (Airborne(state), Event::Stop) => state.steer(None).into(),
            // everything else (Jump mid air, Stop while idle) keeps the state
            _ => self,
        }
    }

    fn update(self, world: &ArcadeWorld, layer: &TilemapLayer, delta_ms: f64) -> Self {
        use CatStateMachine::*;
        match self {
            Idle(state) => state.update(world, layer, delta_ms).into(),
            Walking(state) => state.update(world, layer, delta_ms).into(),
            Airborne(state) => state.update(world, layer, delta_ms).into(),
        }
    }

    fn context(&self) -> &CatContext {
        use CatStateMachine::*;
        match self {
            Idle(state) => state.context(),
            Walking(state) => state.context(),
            Airborne(state) => state.context(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            CatStateMachine::Idle(_) => self::Idle::name(),
            CatStateMachine::Walking(_) => self::Walking::name(),
            CatStateMachine::Airborne(_) => self::Airborne::name(),
        }
    }

    fn frame(&self) -> u32 {
        let context = self.context();
        let metadata = match self {
            CatStateMachine::Idle(_) => self::Idle::metadata(context.facing),
            CatStateMachine::Walking(_) => self::Walking::metadata(context.facing),
            CatStateMachine::Airborne(_) => self::Airborne::metadata(context.facing),
        };
        metadata.frame_at(context.elapsed_ms)
    }
}

/// The player
pub struct Cat {
    state: CatStateMachine,
}

impl Cat {
    /// `spawn` is the center of the collision box
    pub fn new(spawn: Point) -> Self {
        Cat {
            state: CatState::new(spawn).into(),
        }
    }

    pub fn handle(&mut self, event: Event) {
        self.state = self.state.transition(event);
    }

    /// Arrows or WASD to walk; up, W or Space to jump
    pub fn handle_input(&mut self, keyboard: &Keyboard) {
        let walk = if keyboard.any_pressed(&LEFT_KEYS) {
            Event::Walk(Facing::Left)
        } else if keyboard.any_pressed(&RIGHT_KEYS) {
            Event::Walk(Facing::Right)
        } else {
            Event::Stop
        };
        self.handle(walk);
        if keyboard.any_pressed(&JUMP_KEYS) {
            self.handle(Event::Jump);
        }
    }

    pub fn update(&mut self, world: &ArcadeWorld, layer: &TilemapLayer, delta_ms: f64) {
        self.state = self.state.update(world, layer, delta_ms);
    }

    // Law of Demeter: callers ask the cat, not its state's context
    pub fn body(&self) -> &Body {
        &self.state.context().body
    }

    pub fn center(&self) -> Point {
        self.body().center()
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn current_frame(&self) -> u32 {
        self.state.frame()
    }

    pub fn draw(&self, renderer: &Renderer, textures: &Textures) {
        let body = self.body();
        let destination = Rect::new(
            Point {
                x: body.position.x - BODY_OFFSET,
                y: body.position.y - BODY_OFFSET,
            },
            Size {
                width: CAT_FRAME_SIZE,
                height: CAT_FRAME_SIZE,
            },
        );
        let Some(sheet) = textures.get(CAT_SHEET_KEY) else {
            renderer.fill_rect(&body.bounds(), FALLBACK_COLOR);
            return;
        };
        let columns = (sheet.width() / CAT_FRAME_SIZE as u32).max(1);
        let frame = self.current_frame();
        let source = Rect::new(
            Point {
                x: (frame % columns) as f32 * CAT_FRAME_SIZE,
                y: (frame / columns) as f32 * CAT_FRAME_SIZE,
            },
            destination.size,
        );
        renderer.draw_texture(sheet, &source, &destination);
    }
}
