use anyhow::{anyhow, Result};
use futures::channel::oneshot::channel;
use futures::future::LocalFutureObj;
use futures::task::{LocalSpawn, SpawnError};
use std::future::Future;
use wasm_bindgen::closure::{Closure, WasmClosureFnOnce};
use wasm_bindgen::{JsCast, JsValue};

#[rustfmt::skip]
use web_sys::{
    CanvasRenderingContext2d,
    Document,
    Element,
    HtmlCanvasElement,
    HtmlElement,
    HtmlImageElement,
    Window,
};

// ==================== Constants ====================
// Constants related to HTML elements
mod html {
    pub const CANVAS_TAG: &str = "canvas";
    pub const CONTEXT_2D: &str = "2d";
    pub const FAILURE_PANEL_CLASS: &str = "game-boot-failure";
}

pub type LoopClosure = Closure<dyn FnMut(f64)>;

pub fn window() -> Result<Window> {
    web_sys::window().ok_or_else(|| anyhow!("Window not found"))
}

pub fn document() -> Result<Document> {
    window()?
        .document()
        .ok_or_else(|| anyhow!("No Document Found"))
}

pub fn element_by_id(id: &str) -> Result<HtmlElement> {
    document()?
        .get_element_by_id(id)
        .ok_or_else(|| anyhow!("No element found with ID : '{id}'"))?
        .dyn_into::<HtmlElement>()
        .map_err(|element| anyhow!("Error converting {:#?} to HtmlElement", element))
}

pub fn new_image() -> Result<HtmlImageElement> {
    HtmlImageElement::new().map_err(|err| anyhow!("Could not create image element : {:#?}", err))
}

/// Creates a detached canvas of the given size.
/// - attached to the mount point by the engine
/// - kept detached for runtime textures (tileset atlas)
pub fn create_canvas(width: u32, height: u32) -> Result<HtmlCanvasElement> {
    let canvas = document()?
        .create_element(html::CANVAS_TAG)
        .map_err(|err| anyhow!("Could not create canvas element : {:#?}", err))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|element| anyhow!("Error converting {:#?} to HtmlCanvasElement", element))?;
    canvas.set_width(width);
    canvas.set_height(height);
    Ok(canvas)
}

pub fn context(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d> {
    canvas
        .get_context(html::CONTEXT_2D)
        // Result<Option<Object>, JsValue> -> anyhow error, then None -> error
        .map_err(|js_value| anyhow!("Error getting context : {:#?}", js_value))?
        .ok_or_else(|| anyhow!("No 2d context found"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|element| {
            anyhow!(
                "Error converting {:#?} to CanvasRenderingContext2d",
                element
            )
        })
}

pub fn closure_once<F, A, R>(f: F) -> Closure<F::FnMut>
where
    F: 'static + WasmClosureFnOnce<A, R>,
{
    Closure::once(f)
}

pub fn create_raf_closure(f: impl FnMut(f64) + 'static) -> LoopClosure {
    Closure::wrap(Box::new(f) as Box<dyn FnMut(f64)>)
}

pub fn request_animation_frame(callback: &LoopClosure) -> Result<i32> {
    window()?
        .request_animation_frame(callback.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("Cannot request animation frame {:#?}", err))
}

pub fn cancel_animation_frame(handle: i32) -> Result<()> {
    window()?
        .cancel_animation_frame(handle)
        .map_err(|err| anyhow!("Cannot cancel animation frame {:#?}", err))
}

pub fn now() -> Result<f64> {
    Ok(window()?
        .performance()
        .ok_or_else(|| anyhow!("Performance object not found"))?
        .now())
}

pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

/// Resolves on the next macrotask, after the browser had a chance to paint.
/// The engine boot waits on this so the host page renders first.
pub async fn yield_to_host() -> Result<()> {
    let (tx, rx) = channel::<()>();
    let callback = closure_once(move || {
        let _ = tx.send(());
    });
    window()?
        .set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            0,
        )
        .map_err(|err| anyhow!("Cannot schedule timeout {:#?}", err))?;
    // callback must outlive the timeout, so it is only dropped after it fired
    rx.await
        .map_err(|_| anyhow!("Timeout callback dropped before firing"))?;
    drop(callback);
    Ok(())
}

/// Spawner backed by the browser's microtask queue
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserSpawner;

impl LocalSpawn for BrowserSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}

/// Appends the boot failure panel to the mount point.
/// The host owns the page; this only fills the area reserved for the game.
pub fn render_failure_panel(mount: &HtmlElement, heading: &str, message: &str) -> Result<Element> {
    let document = document()?;
    let create = |tag: &str| {
        document
            .create_element(tag)
            .map_err(|err| anyhow!("Could not create <{tag}> : {:#?}", err))
    };

    let panel = create("div")?;
    panel.set_class_name(html::FAILURE_PANEL_CLASS);
    panel
        .set_attribute("role", "alert")
        .map_err(|err| anyhow!("Could not set role : {:#?}", err))?;

    let title = create("h2")?;
    title.set_text_content(Some(heading));
    let detail = create("pre")?;
    detail.set_text_content(Some(message));

    panel
        .append_child(&title)
        .and_then(|_| panel.append_child(&detail))
        .and_then(|_| mount.append_child(&panel))
        .map_err(|err| anyhow!("Could not attach failure panel : {:#?}", err))?;
    Ok(panel)
}

pub fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

// ==================== Logging ====================
/// `log` backend writing to the browser console
/// - Error -> console.error
/// - Warn  -> console.warn
/// - rest  -> console.log
pub struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!(
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        ));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&line),
            log::Level::Warn => web_sys::console::warn_1(&line),
            _ => web_sys::console::log_1(&line),
        }
    }

    fn flush(&self) {}
}

/// Install the console logger once; later calls are ignored.
pub fn init_logging() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if cfg!(debug_assertions) {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        });
    }
}
