use crate::engine::texture::Texture;
use crate::engine::{Point, Rect, Renderer, Size};
use anyhow::{anyhow, Result};
use std::collections::HashSet;

/// "No tile" marker. Index 0 is the transparent atlas slot, so it is a real
/// (invisible) tile and must not be used for empty cells.
pub const EMPTY_TILE: i32 = -1;

/// Grid of tile indices into a tileset atlas, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct TilemapLayer {
    width: usize,
    height: usize,
    tile_size: u32,
    cells: Vec<i32>,
    collision: HashSet<i32>,
}

impl TilemapLayer {
    pub fn new(width: usize, height: usize, tile_size: u32) -> Self {
        TilemapLayer {
            width,
            height,
            tile_size,
            cells: vec![EMPTY_TILE; width * height],
            collision: HashSet::new(),
        }
    }

    pub fn from_rows(rows: &[Vec<i32>], tile_size: u32) -> Result<Self> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(row) = rows.iter().position(|row| row.len() != width) {
            return Err(anyhow!(
                "Tilemap row {row} has {} cells, expected {width}",
                rows[row].len()
            ));
        }
        Ok(TilemapLayer {
            width,
            height: rows.len(),
            tile_size,
            cells: rows.concat(),
            collision: HashSet::new(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn size_in_pixels(&self) -> Size {
        Size {
            width: (self.width as u32 * self.tile_size) as f32,
            height: (self.height as u32 * self.tile_size) as f32,
        }
    }

    pub fn cells(&self) -> &[i32] {
        &self.cells
    }

    pub fn get(&self, x: i32, y: i32) -> Option<i32> {
        self.index_of(x, y).map(|index| self.cells[index])
    }

    pub fn set(&mut self, x: i32, y: i32, tile: i32) -> bool {
        match self.index_of(x, y) {
            Some(index) => {
                self.cells[index] = tile;
                true
            }
            None => false,
        }
    }

    fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    pub fn for_each_tile_mut(&mut self, mut f: impl FnMut(&mut i32)) {
        self.cells.iter_mut().for_each(|cell| f(cell));
    }

    /// Rewrite every `from` cell to `to`, returns how many changed
    pub fn replace_all(&mut self, from: i32, to: i32) -> usize {
        let mut replaced = 0;
        self.for_each_tile_mut(|cell| {
            if *cell == from {
                *cell = to;
                replaced += 1;
            }
        });
        replaced
    }

    pub fn count(&self, tile: i32) -> usize {
        self.cells.iter().filter(|cell| **cell == tile).count()
    }

    pub fn set_collision(&mut self, tiles: &[i32]) {
        self.collision = tiles.iter().copied().collect();
    }

    /// Solid check in tile coordinates; outside the map is never solid
    pub fn is_solid(&self, x: i32, y: i32) -> bool {
        self.get(x, y)
            .map(|tile| self.collision.contains(&tile))
            .unwrap_or(false)
    }

    /// Draw the visible columns with tiles taken from a row-major `atlas`.
    pub fn draw(&self, renderer: &Renderer, atlas: &Texture, columns: u32, view: &Rect) {
        let size = self.tile_size as f32;
        let first = (view.x() / size).floor().max(0.0) as usize;
        let last = (((view.x() + view.width()) / size).ceil() as usize).min(self.width);
        for y in 0..self.height {
            for x in first..last {
                let tile = self.cells[y * self.width + x];
                if tile <= 0 {
                    continue;
                }
                let slot = tile as u32;
                let frame = Rect::new(
                    Point {
                        x: ((slot % columns) * self.tile_size) as f32,
                        y: ((slot / columns) * self.tile_size) as f32,
                    },
                    Size {
                        width: size,
                        height: size,
                    },
                );
                let destination = Rect::new(
                    Point {
                        x: x as f32 * size,
                        y: y as f32 * size,
                    },
                    frame.size,
                );
                renderer.draw_texture(atlas, &frame, &destination);
            }
        }
    }
}
