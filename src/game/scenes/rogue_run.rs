use super::preloader::CATFOOD_BOWL_KEY;
use crate::config::GameConfig;
use crate::engine::input::Keyboard;
use crate::engine::physics::{ArcadeWorld, DebugLayer};
use crate::engine::scene::{Scene, SceneContext, SceneEvents, SceneKey};
use crate::engine::texture::{TextureStore, Textures};
use crate::engine::tilemap::TilemapLayer;
use crate::engine::time::{Clock, TimerHandle};
use crate::engine::{Point, Rect, Renderer, Size, TextAlign};
use crate::game::atlas::{build_tileset, AtlasOptions, INDUSTRIAL_TILESET_KEY};
use crate::game::debug_toggle::{DebugToggle, DebugToggleOptions};
use crate::game::level::{generate_level, LevelOptions, COLLISION_TILES};
use crate::game::water::{install_water_animation, WaterOptions};
use crate::game::RunState;
use crate::sprite::cat::Cat;
use anyhow::{Context, Result};
use std::cell::RefCell;
use std::rc::Rc;

const CAMERA_LERP: f32 = 0.08;
const GOAL_BODY_SIZE: f32 = 44.0;
const GOAL_DISPLAY_SIZE: f32 = 64.0;
// how far below the map the cat may drop before the life is lost
const FALL_MARGIN: f32 = 64.0;
const GOAL_FALLBACK_COLOR: &str = "#22c55e";
const HUD_FONT: &str = "bold 18px monospace";

/// What one fixed step of the run led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Playing,
    Cleared,
    Fell,
}

fn centered_rect(center: Point, side: f32) -> Rect {
    Rect::new(
        Point {
            x: center.x - side / 2.0,
            y: center.y - side / 2.0,
        },
        Size {
            width: side,
            height: side,
        },
    )
}

/// Ease `camera` toward `target` (top-left of the wanted view), then keep the
/// view inside the world.
fn follow(camera: Point, target: Point, view: Size, world: Size) -> Point {
    let clamp = |value: f32, view: f32, world: f32| value.clamp(0.0, (world - view).max(0.0));
    Point {
        x: clamp(camera.x + (target.x - camera.x) * CAMERA_LERP, view.width, world.width),
        y: clamp(camera.y + (target.y - camera.y) * CAMERA_LERP, view.height, world.height),
    }
}

/// Everything one floor of a run owns. Dropping it cancels the water timer
/// and removes the debug key listener.
struct Run {
    state: RunState,
    layer: Rc<RefCell<TilemapLayer>>,
    world: ArcadeWorld,
    cat: Cat,
    goal: Rect,
    camera: Point,
    view: Size,
    atlas_columns: u32,
    debug: Rc<RefCell<DebugLayer>>,
    _debug_toggle: DebugToggle,
    _water: TimerHandle,
}

impl Run {
    fn new(
        config: &GameConfig,
        state: RunState,
        time: &Clock,
        keyboard: &Keyboard,
        events: &SceneEvents,
    ) -> Result<Self> {
        let level = generate_level(&LevelOptions {
            tile_size: config.tile_size,
            ..LevelOptions::new(&state.seed, state.floor)
        });
        let mut layer = TilemapLayer::from_rows(&level.data, level.tile_size)?;
        layer.set_collision(&COLLISION_TILES);
        let world = ArcadeWorld::new(
            config.gravity_y,
            Rect::new(Point::default(), layer.size_in_pixels()),
        );
        let layer = Rc::new(RefCell::new(layer));

        let water = install_water_animation(time, Rc::clone(&layer), WaterOptions::from_config(config));

        let debug = Rc::new(RefCell::new(DebugLayer::default()));
        let mut debug_toggle = DebugToggle::default();
        debug_toggle.install(
            keyboard,
            events,
            Rc::clone(&debug),
            &DebugToggleOptions {
                key: config.debug_key.clone(),
                enabled_by_default: config.debug,
            },
        )?;

        let view = Size {
            width: config.width as f32,
            height: config.height as f32,
        };
        let cat = Cat::new(level.spawn.player);
        let camera = follow(
            Point::default(),
            Point {
                x: cat.center().x - view.width / 2.0,
                y: cat.center().y - view.height / 2.0,
            },
            view,
            world.bounds.size,
        );
        log::info!(
            "floor {} of run '{}' : {}x{} tiles",
            state.floor,
            state.seed,
            level.width_tiles,
            level.height_tiles
        );

        Ok(Run {
            state,
            layer,
            world,
            cat,
            goal: centered_rect(level.spawn.goal, GOAL_BODY_SIZE),
            camera,
            view,
            atlas_columns: config.atlas_columns,
            debug,
            _debug_toggle: debug_toggle,
            _water: water,
        })
    }

    fn step(&mut self, keyboard: &Keyboard, delta_ms: f64) -> Outcome {
        self.cat.handle_input(keyboard);
        self.cat.update(&self.world, &self.layer.borrow(), delta_ms);
        {
            let mut debug = self.debug.borrow_mut();
            debug.begin_frame();
            debug.record(self.cat.body());
        }

        let center = self.cat.center();
        self.camera = follow(
            self.camera,
            Point {
                x: center.x - self.view.width / 2.0,
                y: center.y - self.view.height / 2.0,
            },
            self.view,
            self.world.bounds.size,
        );

        if ArcadeWorld::overlaps(&self.cat.body().bounds(), &self.goal) {
            Outcome::Cleared
        } else if self.cat.body().position.y > self.world.bounds.bottom() + FALL_MARGIN {
            Outcome::Fell
        } else {
            Outcome::Playing
        }
    }

    fn draw_goal(&self, renderer: &Renderer, textures: &Textures) {
        let Some(bowl) = textures.get(CATFOOD_BOWL_KEY) else {
            renderer.fill_rect(&self.goal, GOAL_FALLBACK_COLOR);
            return;
        };
        let center = Point {
            x: self.goal.x() + self.goal.width() / 2.0,
            y: self.goal.y() + self.goal.height() / 2.0,
        };
        let frame = Rect::new(
            Point::default(),
            Size {
                width: bowl.width() as f32,
                height: bowl.height() as f32,
            },
        );
        renderer.draw_texture(bowl, &frame, &centered_rect(center, GOAL_DISPLAY_SIZE));
    }

    fn draw(&self, renderer: &Renderer, textures: &Textures) {
        renderer.save();
        renderer.translate(-self.camera.x, -self.camera.y);
        if let Some(atlas) = textures.get(INDUSTRIAL_TILESET_KEY) {
            let view = Rect::new(self.camera, self.view);
            self.layer
                .borrow()
                .draw(renderer, atlas, self.atlas_columns, &view);
        }
        self.draw_goal(renderer, textures);
        self.cat.draw(renderer, textures);
        self.debug.borrow().draw(renderer);
        renderer.restore();

        renderer.fill_text(
            &format!(
                "Floor {}   Lives {}   Score {}",
                self.state.floor, self.state.lives, self.state.score
            ),
            Point { x: 16.0, y: 28.0 },
            HUD_FONT,
            super::TEXT_COLOR,
            TextAlign::Left,
        );
    }
}

/// One floor of the roguelike run. Restarted for every floor and every lost
/// life, so all per-floor state lives in `run` and is rebuilt on create.
#[derive(Default)]
pub struct RogueRun {
    run: Option<Run>,
}

impl Scene for RogueRun {
    fn key(&self) -> SceneKey {
        super::ROGUE_RUN
    }

    fn create(&mut self, ctx: &mut SceneContext) -> Result<()> {
        if !ctx.textures.exists(INDUSTRIAL_TILESET_KEY) {
            let layout = build_tileset(
                &mut *ctx.textures,
                INDUSTRIAL_TILESET_KEY,
                &AtlasOptions::from_config(ctx.config),
            )
            .context("Could not build the industrial tileset")?;
            log::debug!("tileset atlas {}x{}", layout.width(), layout.height());
        }
        let state = RunState::load(ctx.registry);
        self.run = Some(Run::new(ctx.config, state, ctx.time, ctx.keyboard, ctx.events)?);
        Ok(())
    }

    fn update(&mut self, ctx: &mut SceneContext, delta_ms: f64) -> Result<()> {
        let Some(run) = self.run.as_mut() else {
            return Ok(());
        };
        match run.step(ctx.keyboard, delta_ms) {
            Outcome::Playing => {}
            Outcome::Cleared => {
                run.state.next_floor();
                run.state.store(ctx.registry);
                ctx.restart();
            }
            Outcome::Fell => {
                let alive = run.state.lose_life();
                run.state.store(ctx.registry);
                if alive {
                    ctx.restart();
                } else {
                    ctx.start(super::GAME_OVER);
                }
            }
        }
        Ok(())
    }

    fn draw(&self, renderer: &Renderer, textures: &Textures) {
        if let Some(run) = &self.run {
            run.draw(renderer, textures);
        }
    }

    fn shutdown(&mut self) {
        self.run = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scene::{SceneEvent, SceneManager};
    use approx::assert_relative_eq;

    struct Fixture {
        time: Clock,
        keyboard: Keyboard,
        events: SceneEvents,
        run: Run,
    }

    fn fixture(state: RunState) -> Fixture {
        let time = Clock::new();
        let keyboard = Keyboard::new();
        let events = SceneEvents::default();
        let run = Run::new(&GameConfig::default(), state, &time, &keyboard, &events).unwrap();
        Fixture {
            time,
            keyboard,
            events,
            run,
        }
    }

    #[test]
    fn create_without_tile_textures_names_the_missing_tile() {
        let mut scenes = SceneManager::new(
            Rc::new(GameConfig::default()),
            vec![Box::new(RogueRun::default())],
            Keyboard::new(),
        );
        let err = scenes.boot().unwrap_err();
        assert!(format!("{err:#}").contains("industrialTile1"));
    }

    #[test]
    fn floor_installs_water_and_debug_key() {
        let fixture = fixture(RunState::new("abc"));
        assert_eq!(fixture.time.active_timers(), 1);
        assert_eq!(fixture.keyboard.listener_count("O"), 1);

        fixture.events.emit(SceneEvent::Shutdown);
        drop(fixture.run);
        assert_eq!(fixture.keyboard.listener_count("O"), 0);
        assert_eq!(fixture.time.active_timers(), 0);
    }

    #[test]
    fn cat_starts_on_the_ground_and_keeps_playing() {
        let mut fixture = fixture(RunState::new("abc"));
        for _ in 0..60 {
            assert_eq!(fixture.run.step(&fixture.keyboard, 1000.0 / 60.0), Outcome::Playing);
        }
        assert!(fixture.run.cat.body().on_floor);
    }

    #[test]
    fn touching_the_bowl_clears_the_floor() {
        let mut fixture = fixture(RunState::new("abc"));
        let goal = fixture.run.goal;
        fixture.run.cat = Cat::new(Point {
            x: goal.x() + goal.width() / 2.0,
            y: goal.y() + goal.height() / 2.0,
        });
        assert_eq!(fixture.run.step(&fixture.keyboard, 16.0), Outcome::Cleared);
    }

    #[test]
    fn dropping_below_the_map_loses_the_floor() {
        let mut fixture = fixture(RunState::new("abc"));
        let bottom = fixture.run.world.bounds.bottom();
        fixture.run.cat = Cat::new(Point {
            x: 100.0,
            y: bottom + 200.0,
        });
        assert_eq!(fixture.run.step(&fixture.keyboard, 16.0), Outcome::Fell);
    }

    #[test]
    fn camera_eases_toward_the_target_and_stays_in_the_world() {
        let view = Size {
            width: 800.0,
            height: 600.0,
        };
        let world = Size {
            width: 2880.0,
            height: 640.0,
        };
        let eased = follow(Point::default(), Point { x: 1000.0, y: 20.0 }, view, world);
        assert_relative_eq!(eased.x, 80.0);
        assert_relative_eq!(eased.y, 1.6);

        let clamped = follow(Point { x: 2070.0, y: 0.0 }, Point { x: 5000.0, y: -500.0 }, view, world);
        assert_relative_eq!(clamped.x, 2080.0);
        assert_relative_eq!(clamped.y, 0.0);
    }
}
