use crate::browser;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

// ==================== Seams ====================
/// A drawable texture under construction (runtime-composited sheet).
pub trait TileSurface {
    type Source;

    /// Reset every pixel to transparent.
    fn clear(&mut self);

    /// Draw `source` scaled to a `size` x `size` square at (x, y).
    fn draw_tile(&mut self, source: &Self::Source, x: u32, y: u32, size: u32) -> Result<()>;

    /// Commit the drawing so later draw calls see the final pixels.
    fn refresh(&mut self) -> Result<()>;
}

/// Keyed texture registry, the engine's texture manager.
pub trait TextureStore {
    type Source: Clone;
    type Surface: TileSurface<Source = Self::Source>;

    fn exists(&self, key: &str) -> bool;

    /// Returns false when nothing was registered under `key`.
    fn remove(&mut self, key: &str) -> bool;

    /// Source image of an already loaded texture.
    fn source(&self, key: &str) -> Option<Self::Source>;

    fn create_surface(&mut self, width: u32, height: u32) -> Result<Self::Surface>;

    fn add_surface(&mut self, key: &str, surface: Self::Surface);
}

// ==================== Browser textures ====================
#[derive(Debug, Clone)]
pub enum Texture {
    Image(HtmlImageElement),
    Canvas(HtmlCanvasElement),
}

impl Texture {
    pub fn width(&self) -> u32 {
        match self {
            Texture::Image(image) => image.natural_width(),
            Texture::Canvas(canvas) => canvas.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Texture::Image(image) => image.natural_height(),
            Texture::Canvas(canvas) => canvas.height(),
        }
    }
}

/// Canvas backed [`TileSurface`]
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    drawn: usize,
}

impl CanvasSurface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let canvas = browser::create_canvas(width, height)?;
        let context = browser::context(&canvas)?;
        // pixel art: keep tiles crisp when scaled
        context.set_image_smoothing_enabled(false);
        Ok(CanvasSurface {
            canvas,
            context,
            drawn: 0,
        })
    }
}

impl TileSurface for CanvasSurface {
    type Source = Texture;

    fn clear(&mut self) {
        self.context.clear_rect(
            0.0,
            0.0,
            self.canvas.width().into(),
            self.canvas.height().into(),
        );
    }

    fn draw_tile(&mut self, source: &Texture, x: u32, y: u32, size: u32) -> Result<()> {
        let (x, y, size) = (f64::from(x), f64::from(y), f64::from(size));
        let drawn = match source {
            Texture::Image(image) => self
                .context
                .draw_image_with_html_image_element_and_dw_and_dh(image, x, y, size, size),
            Texture::Canvas(canvas) => self
                .context
                .draw_image_with_html_canvas_element_and_dw_and_dh(canvas, x, y, size, size),
        };
        drawn.map_err(|err| anyhow!("Could not draw tile at ({x}, {y}) : {:#?}", err))?;
        self.drawn += 1;
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        // 2d canvas draws are immediate; only validate the result is usable
        if self.canvas.width() == 0 || self.canvas.height() == 0 {
            return Err(anyhow!("Runtime texture has an empty canvas"));
        }
        log::debug!(
            "runtime texture committed ({} tiles, {}x{})",
            self.drawn,
            self.canvas.width(),
            self.canvas.height()
        );
        Ok(())
    }
}

/// Texture cache shared by every scene of one engine instance
#[derive(Debug, Default)]
pub struct Textures {
    entries: HashMap<String, Texture>,
}

impl Textures {
    pub fn insert_image(&mut self, key: &str, image: HtmlImageElement) {
        self.entries.insert(key.to_string(), Texture::Image(image));
    }

    pub fn get(&self, key: &str) -> Option<&Texture> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl TextureStore for Textures {
    type Source = Texture;
    type Surface = CanvasSurface;

    fn exists(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn source(&self, key: &str) -> Option<Texture> {
        self.entries.get(key).cloned()
    }

    fn create_surface(&mut self, width: u32, height: u32) -> Result<CanvasSurface> {
        CanvasSurface::new(width, height)
    }

    fn add_surface(&mut self, key: &str, surface: CanvasSurface) {
        self.entries
            .insert(key.to_string(), Texture::Canvas(surface.canvas));
    }
}

// ==================== Load queue ====================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub key: String,
    pub url: String,
}

/// Images a scene wants before its `create` runs
#[derive(Debug, Default, Clone)]
pub struct LoadQueue {
    requests: Vec<AssetRequest>,
}

impl LoadQueue {
    pub fn image(&mut self, key: impl Into<String>, url: impl Into<String>) {
        self.requests.push(AssetRequest {
            key: key.into(),
            url: url.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.requests.iter().map(|request| request.key.as_str())
    }

    /// Drop requests for textures that are already cached
    pub fn retain_missing(&mut self, textures: &Textures) {
        self.requests.retain(|request| !textures.exists(&request.key));
    }

    pub fn into_requests(self) -> Vec<AssetRequest> {
        self.requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_queue_skips_cached_keys() {
        let mut queue = LoadQueue::default();
        queue.image("cat", "/assets/game/cat.png");
        queue.image("industrialTile1", "/tiles/IndustrialTile_01.png");
        assert_eq!(queue.len(), 2);

        let textures = Textures::default();
        queue.retain_missing(&textures);
        assert_eq!(queue.keys().collect::<Vec<_>>(), ["cat", "industrialTile1"]);

        let requests = queue.into_requests();
        assert_eq!(requests[0].url, "/assets/game/cat.png");
    }
}
