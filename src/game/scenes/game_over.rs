use super::KeyLatch;
use crate::engine::scene::{Scene, SceneContext, SceneKey};
use crate::engine::texture::Textures;
use crate::engine::{Point, Renderer, TextAlign};
use crate::game::{start_new_run, RunState};
use anyhow::Result;

const RESTART_KEYS: [&str; 2] = ["Enter", "Space"];
const GAME_OVER_COLOR: &str = "#ef4444";

#[derive(Debug, Default)]
pub struct GameOver {
    restart: Option<KeyLatch>,
    final_run: Option<RunState>,
}

impl Scene for GameOver {
    fn key(&self) -> SceneKey {
        super::GAME_OVER
    }

    fn create(&mut self, ctx: &mut SceneContext) -> Result<()> {
        let run = RunState::load(ctx.registry);
        log::info!("run '{}' over on floor {} with {} points", run.seed, run.floor, run.score);
        self.final_run = Some(run);
        self.restart = Some(KeyLatch::listen(ctx.keyboard, ctx.events, &RESTART_KEYS));
        Ok(())
    }

    fn update(&mut self, ctx: &mut SceneContext, _delta_ms: f64) -> Result<()> {
        if self.restart.as_ref().is_some_and(KeyLatch::take) {
            start_new_run(ctx.registry);
            ctx.start(super::ROGUE_RUN);
        }
        Ok(())
    }

    fn draw(&self, renderer: &Renderer, _textures: &Textures) {
        let screen = renderer.size();
        let at = |y: f32| Point {
            x: screen.width / 2.0,
            y,
        };
        renderer.fill_text(
            "Game Over",
            at(screen.height * 0.4),
            super::TITLE_FONT,
            GAME_OVER_COLOR,
            TextAlign::Center,
        );
        if let Some(run) = &self.final_run {
            renderer.fill_text(
                &format!("Floor {}  Score {}", run.floor, run.score),
                at(screen.height * 0.5),
                super::BODY_FONT,
                super::TEXT_COLOR,
                TextAlign::Center,
            );
        }
        renderer.fill_text(
            "Press Enter for New Run",
            at(screen.height * 0.6),
            super::BODY_FONT,
            super::MUTED_COLOR,
            TextAlign::Center,
        );
    }

    fn shutdown(&mut self) {
        self.restart = None;
        self.final_run = None;
    }
}
