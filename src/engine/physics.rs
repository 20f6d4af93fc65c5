use crate::engine::tilemap::TilemapLayer;
use crate::engine::{Point, Rect, Renderer, Size};

// Keep the debug graphic above every other layer
pub const DEBUG_DEPTH: i32 = 10_000;
const DEBUG_BODY_COLOR: &str = "#ff00ff";
const DEBUG_VELOCITY_COLOR: &str = "#00ff00";
const MAX_FALL_SPEED: f32 = 900.0;

/// Axis-aligned arcade body; `position` is the top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub position: Point,
    pub size: Size,
    pub velocity: Point,
    pub on_floor: bool,
}

impl Body {
    pub fn new(position: Point, size: Size) -> Self {
        Body {
            position,
            size,
            velocity: Point { x: 0.0, y: 0.0 },
            on_floor: false,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.position, self.size)
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.position.x + self.size.width / 2.0,
            y: self.position.y + self.size.height / 2.0,
        }
    }
}

/// Inclusive range of tile coordinates covered by [start, start + length)
fn tile_span(start: f32, length: f32, tile: f32) -> std::ops::RangeInclusive<i32> {
    let first = (start / tile).floor() as i32;
    let last = ((start + length - 0.001) / tile).floor() as i32;
    first..=last
}

/// Gravity + tile collisions for a handful of bodies
#[derive(Debug, Clone, PartialEq)]
pub struct ArcadeWorld {
    pub gravity_y: f32,
    /// horizontal limits bodies are clamped to; falling out the bottom is allowed
    pub bounds: Rect,
}

impl ArcadeWorld {
    pub fn new(gravity_y: f32, bounds: Rect) -> Self {
        ArcadeWorld { gravity_y, bounds }
    }

    /// Integrate one step, resolving x then y against solid tiles.
    pub fn step(&self, body: &mut Body, layer: &TilemapLayer, delta_secs: f32) {
        body.velocity.y = (body.velocity.y + self.gravity_y * delta_secs).min(MAX_FALL_SPEED);

        body.position.x += body.velocity.x * delta_secs;
        self.resolve_x(body, layer);

        body.position.y += body.velocity.y * delta_secs;
        body.on_floor = false;
        self.resolve_y(body, layer);
    }

    fn resolve_x(&self, body: &mut Body, layer: &TilemapLayer) {
        let tile = layer.tile_size() as f32;
        let rows = tile_span(body.position.y, body.size.height, tile);
        let columns = tile_span(body.position.x, body.size.width, tile);
        for y in rows {
            for x in columns.clone() {
                if !layer.is_solid(x, y) {
                    continue;
                }
                if body.velocity.x > 0.0 {
                    body.position.x = x as f32 * tile - body.size.width;
                } else if body.velocity.x < 0.0 {
                    body.position.x = (x + 1) as f32 * tile;
                }
                body.velocity.x = 0.0;
            }
        }

        let min_x = self.bounds.x();
        let max_x = self.bounds.right() - body.size.width;
        body.position.x = body.position.x.clamp(min_x, max_x.max(min_x));
    }

    fn resolve_y(&self, body: &mut Body, layer: &TilemapLayer) {
        let tile = layer.tile_size() as f32;
        let rows = tile_span(body.position.y, body.size.height, tile);
        let columns = tile_span(body.position.x, body.size.width, tile);
        for y in rows {
            for x in columns.clone() {
                if !layer.is_solid(x, y) {
                    continue;
                }
                if body.velocity.y > 0.0 {
                    body.position.y = y as f32 * tile - body.size.height;
                    body.on_floor = true;
                } else if body.velocity.y < 0.0 {
                    body.position.y = (y + 1) as f32 * tile;
                }
                body.velocity.y = 0.0;
            }
        }
    }

    pub fn overlaps(a: &Rect, b: &Rect) -> bool {
        a.intersects(b)
    }
}

/// Shapes drawn on top of the scene while physics debugging is on
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DebugGraphic {
    depth: i32,
    visible: bool,
    bodies: Vec<(Rect, Point)>,
}

impl DebugGraphic {
    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn set_depth(&mut self, depth: i32) {
        self.depth = depth;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
    }

    pub fn shape_count(&self) -> usize {
        self.bodies.len()
    }

    fn draw(&self, renderer: &Renderer) {
        for (bounds, velocity) in &self.bodies {
            renderer.stroke_rect(bounds, DEBUG_BODY_COLOR);
            let center = Point {
                x: bounds.x() + bounds.width() / 2.0,
                y: bounds.y() + bounds.height() / 2.0,
            };
            let tip = Point {
                x: center.x + velocity.x * 0.1,
                y: center.y + velocity.y * 0.1,
            };
            renderer.line(center, tip, DEBUG_VELOCITY_COLOR);
        }
    }
}

/// Physics debug state of one scene: the arming flag plus the lazily
/// created graphic it draws into.
#[derive(Debug, Default)]
pub struct DebugLayer {
    pub draw_debug: bool,
    graphic: Option<DebugGraphic>,
    created: u32,
}

impl DebugLayer {
    pub fn graphic(&self) -> Option<&DebugGraphic> {
        self.graphic.as_ref()
    }

    pub fn graphic_mut(&mut self) -> Option<&mut DebugGraphic> {
        self.graphic.as_mut()
    }

    /// Returns the graphic, creating it on first use
    pub fn create_graphic(&mut self) -> &mut DebugGraphic {
        if self.graphic.is_none() {
            self.created += 1;
        }
        self.graphic.get_or_insert_with(DebugGraphic::default)
    }

    /// How many graphics were ever created; stays at 1 however often the
    /// overlay is toggled.
    pub fn graphics_created(&self) -> u32 {
        self.created
    }

    /// Start a new frame of debug shapes (no-op while disarmed)
    pub fn begin_frame(&mut self) {
        if !self.draw_debug {
            return;
        }
        if let Some(graphic) = self.graphic.as_mut() {
            graphic.clear();
        }
    }

    pub fn record(&mut self, body: &Body) {
        if !self.draw_debug {
            return;
        }
        if let Some(graphic) = self.graphic.as_mut() {
            graphic.bodies.push((body.bounds(), body.velocity));
        }
    }

    pub fn draw(&self, renderer: &Renderer) {
        if let Some(graphic) = self.graphic.as_ref().filter(|graphic| graphic.visible) {
            graphic.draw(renderer);
        }
    }
}
