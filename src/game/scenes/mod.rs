use crate::engine::input::Keyboard;
use crate::engine::scene::{Scene, SceneEvent, SceneEvents, SceneKey};
use std::cell::Cell;
use std::rc::Rc;

mod boot;
mod game_over;
mod main_menu;
mod preloader;
mod rogue_run;

pub use boot::Boot;
pub use game_over::GameOver;
pub use main_menu::MainMenu;
pub use preloader::Preloader;
pub use rogue_run::RogueRun;

pub const BOOT: SceneKey = "Boot";
pub const PRELOADER: SceneKey = "Preloader";
pub const MAIN_MENU: SceneKey = "MainMenu";
pub const ROGUE_RUN: SceneKey = "RogueRun";
pub const GAME_OVER: SceneKey = "GameOver";

const TITLE_FONT: &str = "bold 48px monospace";
const BODY_FONT: &str = "20px monospace";
const TEXT_COLOR: &str = "#ffffff";
const MUTED_COLOR: &str = "#94a3b8";

/// Every scene of the game in boot order, the first one boots
pub fn scenes() -> Vec<Box<dyn Scene>> {
    vec![
        Box::new(Boot),
        Box::new(Preloader::default()),
        Box::new(MainMenu::default()),
        Box::new(RogueRun::default()),
        Box::new(GameOver::default()),
    ]
}

/// Latches when one of `keys` goes down; the listeners live as long as the
/// scene instance that created it.
#[derive(Debug, Default)]
struct KeyLatch {
    fired: Rc<Cell<bool>>,
}

impl KeyLatch {
    fn listen(keyboard: &Keyboard, events: &SceneEvents, keys: &[&str]) -> Self {
        let fired = Rc::new(Cell::new(false));
        for key in keys {
            let latch = Rc::clone(&fired);
            let id = keyboard.on_key_down(key, move || latch.set(true));
            for event in [SceneEvent::Shutdown, SceneEvent::Destroy] {
                let keyboard = keyboard.clone();
                events.once(event, move || {
                    keyboard.off(id);
                });
            }
        }
        KeyLatch { fired }
    }

    fn take(&self) -> bool {
        self.fired.replace(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_order_starts_with_boot() {
        let keys: Vec<SceneKey> = scenes().iter().map(|scene| scene.key()).collect();
        assert_eq!(keys, [BOOT, PRELOADER, MAIN_MENU, ROGUE_RUN, GAME_OVER]);
    }

    #[test]
    fn latch_fires_once_and_lets_go_on_shutdown() {
        let keyboard = Keyboard::new();
        let events = SceneEvents::default();
        let latch = KeyLatch::listen(&keyboard, &events, &["Enter", "Space"]);

        keyboard.key_down("Space", false);
        assert!(latch.take());
        assert!(!latch.take());

        events.emit(SceneEvent::Shutdown);
        assert_eq!(keyboard.listener_count("Enter"), 0);
        keyboard.key_down("Enter", false);
        assert!(!latch.take());
    }
}
