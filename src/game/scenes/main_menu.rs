use super::KeyLatch;
use crate::engine::scene::{Scene, SceneContext, SceneKey};
use crate::engine::texture::Textures;
use crate::engine::{Point, Renderer, TextAlign};
use crate::game::start_new_run;
use anyhow::Result;

const START_KEYS: [&str; 2] = ["Enter", "Space"];

#[derive(Debug, Default)]
pub struct MainMenu {
    start: Option<KeyLatch>,
}

impl Scene for MainMenu {
    fn key(&self) -> SceneKey {
        super::MAIN_MENU
    }

    fn create(&mut self, ctx: &mut SceneContext) -> Result<()> {
        self.start = Some(KeyLatch::listen(ctx.keyboard, ctx.events, &START_KEYS));
        Ok(())
    }

    fn update(&mut self, ctx: &mut SceneContext, _delta_ms: f64) -> Result<()> {
        if self.start.as_ref().is_some_and(KeyLatch::take) {
            start_new_run(ctx.registry);
            ctx.start(super::ROGUE_RUN);
        }
        Ok(())
    }

    fn draw(&self, renderer: &Renderer, _textures: &Textures) {
        let screen = renderer.size();
        let center = screen.width / 2.0;
        let line = |text: &str, y: f32, font: &str, color: &str| {
            renderer.fill_text(text, Point { x: center, y }, font, color, TextAlign::Center)
        };
        line("Cat Adventure", screen.height * 0.35, super::TITLE_FONT, super::TEXT_COLOR);
        line(
            "Press Enter to start a run",
            screen.height * 0.55,
            super::BODY_FONT,
            super::TEXT_COLOR,
        );
        line(
            "Procedural roguelike run. New layout every floor.",
            screen.height * 0.62,
            super::BODY_FONT,
            super::MUTED_COLOR,
        );
    }

    fn shutdown(&mut self) {
        self.start = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::engine::input::Keyboard;
    use crate::engine::scene::SceneManager;
    use crate::game::RunState;
    use std::rc::Rc;

    /// Stands in for the run so the test needs no textures
    struct Run;

    impl Scene for Run {
        fn key(&self) -> SceneKey {
            super::super::ROGUE_RUN
        }

        fn create(&mut self, _ctx: &mut SceneContext) -> Result<()> {
            Ok(())
        }

        fn draw(&self, _renderer: &Renderer, _textures: &Textures) {}
    }

    #[test]
    fn enter_starts_a_fresh_run() {
        let keyboard = Keyboard::new();
        let mut scenes = SceneManager::new(
            Rc::new(GameConfig::default()),
            vec![Box::new(MainMenu::default()), Box::new(Run)],
            keyboard.clone(),
        );
        scenes.boot().unwrap();
        scenes.update(16.0).unwrap();
        assert_eq!(scenes.active_key(), Some("MainMenu"));

        keyboard.key_down("Enter", false);
        scenes.update(16.0).unwrap();
        assert_eq!(scenes.active_key(), Some("RogueRun"));
        assert_eq!(keyboard.listener_count("Enter"), 0);

        let run = RunState::load(scenes.registry());
        assert_eq!((run.floor, run.lives, run.score), (1, 3, 0));
        assert_eq!(run.seed.len(), 8);
    }
}
