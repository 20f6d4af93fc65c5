use crate::config::{ConfigError, GameConfig};
use crate::engine::scene::{Scene, SceneContext, SceneKey};
use crate::engine::texture::{LoadQueue, Textures};
use crate::engine::{Point, Rect, Renderer, Size, TextAlign};
use crate::game::atlas::{industrial_tile_numbers, tile_key, tile_url};
use crate::sprite::CAT_SHEET_KEY;
use anyhow::Result;

pub const CATFOOD_BOWL_KEY: &str = "catfoodBowl";
const CAT_SHEET_PATH: &str = "/assets/game/cat.png";
const CATFOOD_BOWL_PATH: &str = "/assets/game/3-Objects/Catfood-Bowl.png";

const BAR_WIDTH: f32 = 320.0;
const BAR_HEIGHT: f32 = 24.0;
const BAR_COLOR: &str = "#facc15";
const BAR_TRACK_COLOR: &str = "#1e293b";

/// Loads every image the game needs, showing a progress bar meanwhile
#[derive(Debug, Default)]
pub struct Preloader {
    expected: Vec<String>,
}

fn queue_assets(queue: &mut LoadQueue, config: &GameConfig) -> Result<(), ConfigError> {
    for number in industrial_tile_numbers() {
        queue.image(tile_key(*number), tile_url(config, *number)?);
    }
    queue.image(CAT_SHEET_KEY, config.with_base_path(CAT_SHEET_PATH)?);
    queue.image(CATFOOD_BOWL_KEY, config.with_base_path(CATFOOD_BOWL_PATH)?);
    Ok(())
}

impl Scene for Preloader {
    fn key(&self) -> SceneKey {
        super::PRELOADER
    }

    fn preload(&mut self, queue: &mut LoadQueue, config: &GameConfig) {
        if let Err(err) = queue_assets(queue, config) {
            log::error!("Could not queue game assets : {err}");
        }
        self.expected = queue.keys().map(str::to_string).collect();
    }

    fn create(&mut self, ctx: &mut SceneContext) -> Result<()> {
        let missing = self
            .expected
            .iter()
            .filter(|key| ctx.textures.get(key).is_none())
            .count();
        if missing > 0 {
            log::warn!("{missing} of {} assets did not load", self.expected.len());
        }
        ctx.start(super::MAIN_MENU);
        Ok(())
    }

    fn draw(&self, renderer: &Renderer, textures: &Textures) {
        let loaded = self
            .expected
            .iter()
            .filter(|key| textures.get(key).is_some())
            .count();
        let progress = if self.expected.is_empty() {
            1.0
        } else {
            loaded as f32 / self.expected.len() as f32
        };

        let screen = renderer.size();
        let origin = Point {
            x: (screen.width - BAR_WIDTH) / 2.0,
            y: (screen.height - BAR_HEIGHT) / 2.0,
        };
        renderer.fill_rect(
            &Rect::new(
                origin,
                Size {
                    width: BAR_WIDTH,
                    height: BAR_HEIGHT,
                },
            ),
            BAR_TRACK_COLOR,
        );
        renderer.fill_rect(
            &Rect::new(
                origin,
                Size {
                    width: BAR_WIDTH * progress,
                    height: BAR_HEIGHT,
                },
            ),
            BAR_COLOR,
        );
        renderer.fill_text(
            &format!("Loading {:.0}%", progress * 100.0),
            Point {
                x: screen.width / 2.0,
                y: origin.y - 16.0,
            },
            super::BODY_FONT,
            super::TEXT_COLOR,
            TextAlign::Center,
        );
    }
}
