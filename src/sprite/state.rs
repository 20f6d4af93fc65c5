//! All code relating to individual states lives behind this module and
//! makes invalid transitions unrepresentable: a state can only be left
//! through the methods defined for it here.
//! - PUBLIC  : CatState and CatContext
//! - PRIVATE : context mutators
use crate::engine::physics::{ArcadeWorld, Body};
use crate::engine::tilemap::TilemapLayer;
use crate::engine::{Point, Size};
use crate::sprite::{Airborne, Facing, Idle, Walking};

// physics consts, pixels per second
const WALK_SPEED: f32 = 200.0;
const JUMP_SPEED: f32 = -550.0; // negative because top left is origin
// collision box inside the 64x64 sheet cell
const BODY_SIZE: f32 = 32.0;
pub const BODY_OFFSET: f32 = 16.0;

pub enum IsFalling<S> {
    Standing(CatState<S>),
    Falling(CatState<Airborne>),
}

pub enum IsLanded {
    Idle(CatState<Idle>),
    Walking(CatState<Walking>),
    InAir(CatState<Airborne>),
}

#[derive(Debug, Copy, Clone)]
/// Shared data for :
/// - physics : arcade body (position + velocity)
/// - display : facing + time spent in the current animation
pub struct CatContext {
    pub body: Body,
    pub facing: Facing,
    pub elapsed_ms: f64,
}

#[derive(Debug, Copy, Clone)]
pub struct CatState<S> {
    context: CatContext,
    // type-level marker only, never read
    _state: S,
}

impl<S> CatState<S> {
    pub fn context(&self) -> &CatContext {
        &self.context
    }
}

impl CatState<Idle> {
    /// Cat standing with its body centered on `spawn`
    pub fn new(spawn: Point) -> Self {
        let half = BODY_SIZE / 2.0;
        CatState {
            context: CatContext {
                body: Body::new(
                    Point {
                        x: spawn.x - half,
                        y: spawn.y - half,
                    },
                    Size {
                        width: BODY_SIZE,
                        height: BODY_SIZE,
                    },
                ),
                facing: Facing::Right,
                elapsed_ms: 0.0,
            },
            _state: Idle,
        }
    }

    pub fn walk(self, facing: Facing) -> CatState<Walking> {
        CatState {
            context: self
                .context
                .on_state_transition()
                .facing(facing)
                .with_horizontal_velocity(facing),
            _state: Walking,
        }
    }

    pub fn jump(self) -> CatState<Airborne> {
        CatState {
            context: self
                .context
                .on_state_transition()
                .set_vertical_velocity(JUMP_SPEED),
            _state: Airborne,
        }
    }

    pub fn update(
        self,
        world: &ArcadeWorld,
        layer: &TilemapLayer,
        delta_ms: f64,
    ) -> IsFalling<Idle> {
        let context = self.context.step(world, layer, delta_ms);
        if context.body.on_floor {
            IsFalling::Standing(CatState { context, ..self })
        } else {
            IsFalling::Falling(CatState {
                context: context.on_state_transition(),
                _state: Airborne,
            })
        }
    }
}

impl CatState<Walking> {
    pub fn walk(self, facing: Facing) -> Self {
        let context = if facing == self.context.facing {
            self.context
        } else {
            self.context.on_state_transition().facing(facing)
        };
        CatState {
            context: context.with_horizontal_velocity(facing),
            ..self
        }
    }

    pub fn stop(self) -> CatState<Idle> {
        CatState {
            context: self.context.on_state_transition().halt(),
            _state: Idle,
        }
    }

    pub fn jump(self) -> CatState<Airborne> {
        CatState {
            context: self
                .context
                .on_state_transition()
                .set_vertical_velocity(JUMP_SPEED),
            _state: Airborne,
        }
    }

    pub fn update(
        self,
        world: &ArcadeWorld,
        layer: &TilemapLayer,
        delta_ms: f64,
    ) -> IsFalling<Walking> {
        let context = self.context.step(world, layer, delta_ms);
        if context.body.on_floor {
            IsFalling::Standing(CatState { context, ..self })
        } else {
            IsFalling::Falling(CatState {
                context,
                _state: Airborne,
            })
        }
    }
}

impl CatState<Airborne> {
    /// Air control: steering keeps working while jumping
    pub fn steer(self, facing: Option<Facing>) -> Self {
        let context = match facing {
            Some(facing) => self.context.facing(facing).with_horizontal_velocity(facing),
            None => self.context.halt(),
        };
        CatState { context, ..self }
    }

    pub fn update(self, world: &ArcadeWorld, layer: &TilemapLayer, delta_ms: f64) -> IsLanded {
        let context = self.context.step(world, layer, delta_ms);
        if !context.body.on_floor {
            return IsLanded::InAir(CatState { context, ..self });
        }
        let context = context.on_state_transition();
        if context.body.velocity.x == 0.0 {
            IsLanded::Idle(CatState {
                context,
                _state: Idle,
            })
        } else {
            IsLanded::Walking(CatState {
                context,
                _state: Walking,
            })
        }
    }
}

impl CatContext {
    /// ::step per update
    /// - physics moves the body and resolves tile collisions
    /// - animation clock advances
    fn step(mut self, world: &ArcadeWorld, layer: &TilemapLayer, delta_ms: f64) -> Self {
        world.step(&mut self.body, layer, (delta_ms / 1000.0) as f32);
        self.elapsed_ms += delta_ms;
        self
    }

    /// restart the animation, every state has its own frame range
    fn on_state_transition(mut self) -> Self {
        self.elapsed_ms = 0.0;
        self
    }

    fn facing(mut self, facing: Facing) -> Self {
        self.facing = facing;
        self
    }

    fn with_horizontal_velocity(mut self, facing: Facing) -> Self {
        self.body.velocity.x = match facing {
            Facing::Left => -WALK_SPEED,
            Facing::Right => WALK_SPEED,
        };
        self
    }

    fn halt(mut self) -> Self {
        self.body.velocity.x = 0.0;
        self
    }

    fn set_vertical_velocity(mut self, y: f32) -> Self {
        self.body.velocity.y = y;
        self
    }
}
