// ==================== Imports ====================
use crate::bridge::{Bridge, DiagnosticHandle, Phase};
use crate::browser::{js_error, BrowserSpawner};
use crate::config::GameConfig;
use crate::engine::WebLoader;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use web_sys::{Element, HtmlElement};

pub mod bridge;
pub mod browser;
pub mod config;
pub mod engine;
pub mod game;
pub mod sprite;

const FAILURE_HEADING: &str = "Game failed to start";
const FAILURE_MESSAGE_MAX_CHARS: usize = 240;

// ==================== Main Functions ====================
/// Main entry for Webassembly module
/// - better panic messages
/// - console logging
///
/// The game itself only boots once the host calls `CatAdventure.start()`.
#[wasm_bindgen(start)]
pub fn main_js() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    browser::init_logging();
    log::debug!("cat-adventure module ready");
    Ok(())
}

/// Handle the host page keeps for the lifetime of its game container.
///
/// ```js
/// const game = CatAdventure.withConfig({ assetBasePath: "/portfolio" });
/// game.start(document.getElementById("game-container"));
/// // on unmount
/// game.stop();
/// ```
#[wasm_bindgen]
pub struct CatAdventure {
    config: Rc<GameConfig>,
    bridge: Bridge<WebLoader, BrowserSpawner>,
    failure_panel: Rc<RefCell<Option<Element>>>,
}

impl CatAdventure {
    fn from_config(config: GameConfig) -> Self {
        let config = Rc::new(config);
        let bridge = Bridge::new(
            WebLoader::new(Rc::clone(&config), game::scenes),
            BrowserSpawner,
            DiagnosticHandle::new(),
        );

        let failure_panel: Rc<RefCell<Option<Element>>> = Rc::default();
        let panel_slot = Rc::clone(&failure_panel);
        bridge.on_failure(move |mount, err| {
            let message = err.truncated_message(FAILURE_MESSAGE_MAX_CHARS);
            match browser::render_failure_panel(mount, FAILURE_HEADING, &message) {
                Ok(panel) => {
                    if let Some(previous) = panel_slot.borrow_mut().replace(panel) {
                        previous.remove();
                    }
                }
                Err(render_err) => log::error!("{render_err:#}"),
            }
        });

        CatAdventure {
            config,
            bridge,
            failure_panel,
        }
    }

    fn remove_failure_panel(&self) {
        if let Some(panel) = self.failure_panel.borrow_mut().take() {
            panel.remove();
        }
    }
}

#[wasm_bindgen]
impl CatAdventure {
    #[wasm_bindgen(constructor)]
    pub fn new() -> CatAdventure {
        CatAdventure::from_config(GameConfig::default())
    }

    /// Build from a plain JS object, missing fields take their defaults
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(config: JsValue) -> Result<CatAdventure, JsValue> {
        let config: GameConfig = serde_wasm_bindgen::from_value(config).map_err(js_error)?;
        config.validate().map_err(js_error)?;
        Ok(CatAdventure::from_config(config))
    }

    /// Boot the game inside `mount`, or inside the configured container
    /// when no element is given. Rejected while a game is booting or running.
    pub fn start(&self, mount: Option<HtmlElement>) -> Result<(), JsValue> {
        let mount = match mount {
            Some(mount) => mount,
            None => browser::element_by_id(&self.config.container_id).map_err(js_error)?,
        };
        self.remove_failure_panel();
        self.bridge.start(mount).map_err(js_error)
    }

    /// Tear the game down; safe to call at any time, any number of times
    pub fn stop(&self) {
        self.bridge.stop();
        self.remove_failure_panel();
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.bridge.phase() == Phase::Running
    }

    #[wasm_bindgen(js_name = isSceneActive)]
    pub fn is_scene_active(&self, key: &str) -> bool {
        self.bridge.diagnostics().is_scene_active(key)
    }

    #[wasm_bindgen(js_name = activeScenes)]
    pub fn active_scenes(&self) -> js_sys::Array {
        self.bridge
            .diagnostics()
            .active_scenes()
            .into_iter()
            .map(JsValue::from)
            .collect()
    }

    /// Message of the last failed boot, if any
    #[wasm_bindgen(js_name = bootError)]
    pub fn boot_error(&self) -> Option<String> {
        self.bridge.boot_error().map(|err| err.to_string())
    }
}

impl Default for CatAdventure {
    fn default() -> Self {
        CatAdventure::new()
    }
}
