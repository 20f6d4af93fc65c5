//! Browser end-to-end checks, run with `wasm-pack test --headless --chrome`
#![cfg(target_arch = "wasm32")]

use cat_adventure::CatAdventure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::HtmlElement;

wasm_bindgen_test_configure!(run_in_browser);

// polling budget for the boot: 200 x 50ms
const POLL_INTERVAL_MS: i32 = 50;
const MAX_POLLS: usize = 200;

async fn sleep(ms: i32) {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        web_sys::window()
            .unwrap()
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
            .unwrap();
    });
    JsFuture::from(promise).await.unwrap();
}

fn container(id: &str) -> HtmlElement {
    let document = web_sys::window().unwrap().document().unwrap();
    let element = document
        .create_element("div")
        .unwrap()
        .dyn_into::<HtmlElement>()
        .unwrap();
    element.set_id(id);
    document.body().unwrap().append_child(&element).unwrap();
    element
}

fn canvas_count(mount: &HtmlElement) -> u32 {
    mount.query_selector_all("canvas").unwrap().length()
}

#[wasm_bindgen_test]
async fn boots_into_the_main_menu() {
    let mount = container("game-container-boot");
    let game = CatAdventure::new();
    game.start(Some(mount.clone())).unwrap();
    // the boot is deferred, nothing is mounted synchronously
    assert_eq!(canvas_count(&mount), 0);

    let mut polls = 0;
    while !(game.is_running() && game.is_scene_active("MainMenu")) {
        assert!(polls < MAX_POLLS, "MainMenu never became active");
        sleep(POLL_INTERVAL_MS).await;
        polls += 1;
    }
    assert_eq!(canvas_count(&mount), 1);
    assert!(game.start(Some(mount.clone())).is_err());

    game.stop();
    assert!(!game.is_running());
    assert!(!game.is_scene_active("MainMenu"));
    assert_eq!(canvas_count(&mount), 0);
}

#[wasm_bindgen_test]
async fn stop_before_boot_never_mounts() {
    let mount = container("game-container-stop");
    let game = CatAdventure::new();
    game.start(Some(mount.clone())).unwrap();
    game.stop();

    sleep(500).await;
    assert_eq!(canvas_count(&mount), 0);
    assert!(!game.is_running());
    assert_eq!(game.boot_error(), None);
}

#[wasm_bindgen_test]
fn invalid_config_is_rejected() {
    let config = js_sys::Object::new();
    js_sys::Reflect::set(&config, &JsValue::from_str("width"), &JsValue::from(0)).unwrap();
    assert!(CatAdventure::with_config(config.into()).is_err());
}
