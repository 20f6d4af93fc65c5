use crate::bridge::{EngineInstance, EngineLoader, SceneProbe};
use crate::browser;
use crate::config::GameConfig;
use anyhow::{anyhow, Context, Error, Result};
// ELI5: web assembly is a single threaded environment, so Rc RefCell > Mutex
use async_trait::async_trait;
use futures::channel::oneshot::channel;
use futures::stream::{FuturesUnordered, StreamExt};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlElement, HtmlImageElement};

pub mod input;
pub mod physics;
pub mod scene;
pub mod texture;
pub mod tilemap;
pub mod time;

use self::input::{Keyboard, KeyboardBinding};
use self::scene::{Scene, SceneKey, SceneManager, SceneStatusBoard};
use self::texture::{LoadQueue, Texture};

// ==================== Geometry ====================
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub position: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(position: Point, size: Size) -> Self {
        Rect { position, size }
    }

    pub fn x(&self) -> f32 {
        self.position.x
    }

    pub fn y(&self) -> f32 {
        self.position.y
    }

    pub fn width(&self) -> f32 {
        self.size.width
    }

    pub fn height(&self) -> f32 {
        self.size.height
    }

    pub fn right(&self) -> f32 {
        self.x() + self.width()
    }

    pub fn bottom(&self) -> f32 {
        self.y() + self.height()
    }

    /// Touching edges do not count as an intersection
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x() < other.right()
            && self.right() > other.x()
            && self.y() < other.bottom()
            && self.bottom() > other.y()
    }
}

// ==================== Renderer ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
}

pub struct Renderer {
    context: CanvasRenderingContext2d,
    size: Size,
}

impl Renderer {
    pub fn new(context: CanvasRenderingContext2d, size: Size) -> Self {
        context.set_image_smoothing_enabled(false);
        Renderer { context, size }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn clear(&self, color: &str) {
        self.fill_rect(&Rect::new(Point::default(), self.size), color);
    }

    pub fn fill_rect(&self, rect: &Rect, color: &str) {
        self.context.set_fill_style_str(color);
        self.context.fill_rect(
            rect.x().into(),
            rect.y().into(),
            rect.width().into(),
            rect.height().into(),
        );
    }

    pub fn stroke_rect(&self, rect: &Rect, color: &str) {
        self.context.set_stroke_style_str(color);
        self.context.stroke_rect(
            rect.x().into(),
            rect.y().into(),
            rect.width().into(),
            rect.height().into(),
        );
    }

    pub fn line(&self, from: Point, to: Point, color: &str) {
        self.context.set_stroke_style_str(color);
        self.context.begin_path();
        self.context.move_to(from.x.into(), from.y.into());
        self.context.line_to(to.x.into(), to.y.into());
        self.context.stroke();
    }

    pub fn fill_text(&self, text: &str, at: Point, font: &str, color: &str, align: TextAlign) {
        self.context.set_font(font);
        self.context.set_fill_style_str(color);
        self.context.set_text_align(match align {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
        });
        if let Err(err) = self.context.fill_text(text, at.x.into(), at.y.into()) {
            log::warn!("Could not draw text '{text}' : {:#?}", err);
        }
    }

    /// Draw `frame` of `texture` into `destination`. A failing draw is logged
    /// and skipped, one bad frame must not take the loop down.
    pub fn draw_texture(&self, texture: &Texture, frame: &Rect, destination: &Rect) {
        let drawn = match texture {
            Texture::Image(image) => self
                .context
                .draw_image_with_html_image_element_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
                    image,
                    frame.x().into(),
                    frame.y().into(),
                    frame.width().into(),
                    frame.height().into(),
                    destination.x().into(),
                    destination.y().into(),
                    destination.width().into(),
                    destination.height().into(),
                ),
            Texture::Canvas(canvas) => self
                .context
                .draw_image_with_html_canvas_element_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
                    canvas,
                    frame.x().into(),
                    frame.y().into(),
                    frame.width().into(),
                    frame.height().into(),
                    destination.x().into(),
                    destination.y().into(),
                    destination.width().into(),
                    destination.height().into(),
                ),
        };
        if let Err(err) = drawn {
            log::error!("Drawing texture failed : {:#?}", err);
        }
    }

    pub fn save(&self) {
        self.context.save();
    }

    pub fn restore(&self) {
        self.context.restore();
    }

    pub fn translate(&self, x: f32, y: f32) {
        if let Err(err) = self.context.translate(x.into(), y.into()) {
            log::warn!("Could not translate context : {:#?}", err);
        }
    }
}

// ==================== Assets ====================
/// Asynchronously load an image from a given source path
/// # Returns
/// * `Ok(HtmlImageElement)` - on load success
/// * `Err` - on load fail
pub async fn load_image(source: &str) -> Result<HtmlImageElement> {
    let image = browser::new_image()?;
    let (tx, rx) = channel::<Result<(), Error>>();
    let success_tx = Rc::new(RefCell::new(Some(tx)));
    let error_tx = success_tx.clone();

    let success_callback = browser::closure_once(move || {
        if let Some(tx) = success_tx.borrow_mut().take() {
            let _ = tx.send(Ok(()));
        }
    });

    let url = source.to_string();
    let error_callback = browser::closure_once(move |err: JsValue| {
        if let Some(tx) = error_tx.borrow_mut().take() {
            let _ = tx.send(Err(anyhow!("Error loading image '{url}' : {:#?}", err)));
        }
    });

    image.set_onload(Some(success_callback.as_ref().unchecked_ref()));
    image.set_onerror(Some(error_callback.as_ref().unchecked_ref()));
    image.set_src(source);

    // ?? - Result<Result<(), Error>, oneshot::Canceled>
    // - outer : channel result
    // - inner : image load result
    let loaded = rx
        .await
        .map_err(|_| anyhow!("Image '{source}' callbacks dropped"))?;

    // callbacks stay alive until one fired, then are released with the handlers
    image.set_onload(None);
    image.set_onerror(None);
    drop(success_callback);
    drop(error_callback);

    loaded.map(|_| image)
}

/// Load every queued image for `scene`, caching each one as it arrives, then
/// let the manager create the scene. Holds only a `Weak` so a destroyed engine
/// just drops late results.
fn spawn_asset_load(manager: Weak<RefCell<SceneManager>>, scene: SceneKey, queue: LoadQueue) {
    browser::spawn_local(async move {
        let mut pending: FuturesUnordered<_> = queue
            .into_requests()
            .into_iter()
            .map(|request| async move {
                let loaded = load_image(&request.url).await;
                (request.key, loaded)
            })
            .collect();

        while let Some((key, loaded)) = pending.next().await {
            let Some(manager) = manager.upgrade() else {
                log::debug!("engine destroyed before '{scene}' assets arrived");
                return;
            };
            match loaded {
                Ok(image) => manager.borrow_mut().textures_mut().insert_image(&key, image),
                // keep going, whoever needs the texture reports it by key
                Err(err) => log::warn!("Asset '{key}' failed : {err:#}"),
            }
        }

        if let Some(manager) = manager.upgrade() {
            if let Err(err) = manager.borrow_mut().complete_load(scene) {
                log::error!("{err:#}");
            }
        }
    });
}

// ==================== Game loop ====================
// length of a frame in milliseconds
const FRAME_SIZE: f64 = 1.0 / 60.0 * 1000.0;
// a backgrounded tab resumes with a huge delta, don't replay all of it
const MAX_FRAME_GAP: f64 = 250.0;

type SharedLoopClosure = Rc<RefCell<Option<browser::LoopClosure>>>;

struct GameLoop {
    last_frame: f64,
    accumulated_delta: f64,
}

/// Cancels the animation frame loop on `stop()` or drop
pub struct LoopHandle {
    running: Rc<Cell<bool>>,
    frame_id: Rc<Cell<Option<i32>>>,
    closure: SharedLoopClosure,
}

impl LoopHandle {
    pub fn stop(&self) {
        if !self.running.replace(false) {
            return;
        }
        if let Some(id) = self.frame_id.take() {
            if let Err(err) = browser::cancel_animation_frame(id) {
                log::warn!("{err:#}");
            }
        }
        // breaks the closure -> Rc -> closure cycle
        self.closure.borrow_mut().take();
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl GameLoop {
    pub fn start(
        scenes: Rc<RefCell<SceneManager>>,
        renderer: Renderer,
        background: String,
    ) -> Result<LoopHandle> {
        let mut game_loop = GameLoop {
            last_frame: browser::now()?,
            accumulated_delta: 0.0,
        };
        let running = Rc::new(Cell::new(true));
        let frame_id = Rc::new(Cell::new(None));

        let f: SharedLoopClosure = Rc::new(RefCell::new(None));
        let g = f.clone();
        let (alive, next_id) = (running.clone(), frame_id.clone());
        *g.borrow_mut() = Some(browser::create_raf_closure(move |perf: f64| {
            if !alive.get() {
                return;
            }
            game_loop.accumulated_delta += (perf - game_loop.last_frame).min(MAX_FRAME_GAP);
            game_loop.last_frame = perf;
            {
                let mut manager = scenes.borrow_mut();
                while game_loop.accumulated_delta > FRAME_SIZE {
                    if let Err(err) = manager.update(FRAME_SIZE) {
                        log::error!("{err:#}");
                    }
                    game_loop.accumulated_delta -= FRAME_SIZE;
                }
                if let Some((scene, queue)) = manager.take_load_request() {
                    spawn_asset_load(Rc::downgrade(&scenes), scene, queue);
                }
                renderer.clear(&background);
                manager.draw(&renderer);
            }
            if let Some(callback) = f.borrow().as_ref() {
                match browser::request_animation_frame(callback) {
                    Ok(id) => next_id.set(Some(id)),
                    Err(err) => log::error!("{err:#}"),
                }
            }
        }));

        let id = browser::request_animation_frame(
            g.borrow()
                .as_ref()
                .ok_or_else(|| anyhow!("GameLoop: Loop is None"))?,
        )?;
        frame_id.set(Some(id));

        Ok(LoopHandle {
            running,
            frame_id,
            closure: g,
        })
    }
}

// ==================== Engine ====================
/// One running game: canvas in the mount point, keyboard wiring, scenes and
/// the frame loop driving them.
pub struct Engine {
    canvas: HtmlCanvasElement,
    scenes: Rc<RefCell<SceneManager>>,
    board: SceneStatusBoard,
    game_loop: Option<LoopHandle>,
    binding: Option<KeyboardBinding>,
}

impl Engine {
    pub fn boot(
        mount: &HtmlElement,
        config: Rc<GameConfig>,
        scenes: Vec<Box<dyn Scene>>,
    ) -> Result<Self> {
        config.validate()?;
        let canvas = browser::create_canvas(config.width, config.height)?;
        mount
            .append_child(&canvas)
            .map_err(|err| anyhow!("Could not mount canvas : {:#?}", err))?;

        Self::assemble(canvas.clone(), config, scenes).map_err(|err| {
            canvas.remove();
            err
        })
    }

    fn assemble(
        canvas: HtmlCanvasElement,
        config: Rc<GameConfig>,
        scenes: Vec<Box<dyn Scene>>,
    ) -> Result<Self> {
        let renderer = Renderer::new(
            browser::context(&canvas)?,
            Size {
                width: config.width as f32,
                height: config.height as f32,
            },
        );
        let keyboard = Keyboard::new();
        let binding = KeyboardBinding::attach(&keyboard)?;
        let background = config.background_color.clone();

        let manager = Rc::new(RefCell::new(SceneManager::new(config, scenes, keyboard)));
        manager.borrow_mut().boot().context("Scene boot failed")?;
        let board = manager.borrow().board();
        let game_loop = GameLoop::start(Rc::clone(&manager), renderer, background)?;
        log::info!("engine running");

        Ok(Engine {
            canvas,
            scenes: manager,
            board,
            game_loop: Some(game_loop),
            binding: Some(binding),
        })
    }
}

impl EngineInstance for Engine {
    fn probe(&self) -> Rc<dyn SceneProbe> {
        Rc::new(self.board.clone())
    }

    fn destroy(&mut self) -> Result<()> {
        if let Some(game_loop) = self.game_loop.take() {
            game_loop.stop();
        }
        self.binding.take();
        self.scenes
            .try_borrow_mut()
            .map_err(|_| anyhow!("Scenes busy during destroy"))?
            .destroy();
        self.canvas.remove();
        log::info!("engine destroyed");
        Ok(())
    }
}

// ==================== Loader ====================
/// The engine "module": what the deferred boot hands to `construct`.
pub struct EngineModule {
    scenes: fn() -> Vec<Box<dyn Scene>>,
}

/// Browser loader: waits one macrotask so the host page paints first, then
/// boots an [`Engine`] in the mount point.
pub struct WebLoader {
    config: Rc<GameConfig>,
    scenes: fn() -> Vec<Box<dyn Scene>>,
}

impl WebLoader {
    pub fn new(config: Rc<GameConfig>, scenes: fn() -> Vec<Box<dyn Scene>>) -> Self {
        WebLoader { config, scenes }
    }
}

#[async_trait(?Send)]
impl EngineLoader for WebLoader {
    type Mount = HtmlElement;
    type Module = EngineModule;
    type Instance = Engine;

    async fn load(&self) -> Result<EngineModule> {
        browser::yield_to_host().await?;
        Ok(EngineModule {
            scenes: self.scenes,
        })
    }

    fn construct(&self, module: EngineModule, mount: &HtmlElement) -> Result<Engine> {
        Engine::boot(mount, Rc::clone(&self.config), (module.scenes)())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f32, y: f32, width: f32, height: f32) -> Rect {
        Rect::new(Point { x, y }, Size { width, height })
    }

    #[test]
    fn rect_edges() {
        let r = rect(10.0, 20.0, 30.0, 40.0);
        assert_eq!(r.right(), 40.0);
        assert_eq!(r.bottom(), 60.0);
    }

    #[test]
    fn touching_rects_do_not_intersect() {
        let a = rect(0.0, 0.0, 32.0, 32.0);
        assert!(!a.intersects(&rect(32.0, 0.0, 32.0, 32.0)));
        assert!(a.intersects(&rect(31.0, 31.0, 32.0, 32.0)));
    }
}
