use crate::engine::scene::{Scene, SceneContext, SceneKey};
use crate::engine::texture::Textures;
use crate::engine::Renderer;
use anyhow::Result;

/// First scene, hands over to the preloader straight away
pub struct Boot;

impl Scene for Boot {
    fn key(&self) -> SceneKey {
        super::BOOT
    }

    fn create(&mut self, ctx: &mut SceneContext) -> Result<()> {
        ctx.start(super::PRELOADER);
        Ok(())
    }

    fn draw(&self, _renderer: &Renderer, _textures: &Textures) {}
}
