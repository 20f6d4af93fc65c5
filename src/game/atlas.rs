use crate::config::{ConfigError, GameConfig};
use crate::engine::texture::{TextureStore, TileSurface};
use once_cell::sync::Lazy;
use thiserror::Error;

/// Texture key the composited industrial tileset is registered under
pub const INDUSTRIAL_TILESET_KEY: &str = "industrialTiles";
pub const INDUSTRIAL_TILE_COUNT: u32 = 81;
const TILE_DIRECTORY: &str = "/assets/game/Free%20Industrial%20Zone%20Tileset/1%20Tiles";

static INDUSTRIAL_TILE_NUMBERS: Lazy<Vec<u32>> =
    Lazy::new(|| (1..=INDUSTRIAL_TILE_COUNT).collect());

/// Catalog numbers of every industrial tile, 1..=81
pub fn industrial_tile_numbers() -> &'static [u32] {
    &INDUSTRIAL_TILE_NUMBERS
}

/// Texture key of one loaded tile image
pub fn tile_key(number: u32) -> String {
    format!("industrialTile{number}")
}

/// 7 -> ".../1%20Tiles/IndustrialTile_07.png", prefixed with the base path
pub fn tile_url(config: &GameConfig, number: u32) -> Result<String, ConfigError> {
    config.with_base_path(&format!("{TILE_DIRECTORY}/IndustrialTile_{number:02}.png"))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AtlasError {
    #[error("Missing tile texture '{key}', it must be preloaded before the atlas is built")]
    MissingTile { key: String },
    #[error("Atlas needs at least one tile number")]
    NoTiles,
    #[error("Atlas columns and tile size must be positive and fit a canvas")]
    InvalidGeometry,
    #[error("Tile number 0 is reserved for the empty slot")]
    ReservedSlot,
    #[error("Could not compose atlas '{key}' : {reason}")]
    Surface { key: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasOptions {
    pub tile_numbers: Vec<u32>,
    pub columns: u32,
    pub tile_size: u32,
}

impl Default for AtlasOptions {
    fn default() -> Self {
        AtlasOptions {
            tile_numbers: industrial_tile_numbers().to_vec(),
            columns: 16,
            tile_size: 32,
        }
    }
}

impl AtlasOptions {
    pub fn from_config(config: &GameConfig) -> Self {
        AtlasOptions {
            columns: config.atlas_columns,
            tile_size: config.tile_size,
            ..Self::default()
        }
    }
}

/// Where every slot lives in the atlas. Slot n holds tile n, slot 0 stays
/// transparent.
/// ┌────┬────┬────┬─────┬────┐
/// │ 0  │ 1  │ 2  │ ... │ 15 │  row = slot / columns
/// ├────┼────┼────┼─────┼────┤  col = slot % columns
/// │ 16 │ 17 │ 18 │ ... │ 31 │
/// └────┴────┴────┴─────┴────┘
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    pub slots: u32,
    pub columns: u32,
    pub rows: u32,
    pub tile_size: u32,
}

impl AtlasLayout {
    pub fn compute(options: &AtlasOptions) -> Result<Self, AtlasError> {
        if options.columns == 0 || options.tile_size == 0 {
            return Err(AtlasError::InvalidGeometry);
        }
        let max = options
            .tile_numbers
            .iter()
            .copied()
            .max()
            .ok_or(AtlasError::NoTiles)?;
        if options.tile_numbers.contains(&0) {
            return Err(AtlasError::ReservedSlot);
        }
        let slots = max.checked_add(1).ok_or(AtlasError::InvalidGeometry)?;
        let layout = AtlasLayout {
            slots,
            columns: options.columns,
            rows: slots.div_ceil(options.columns),
            tile_size: options.tile_size,
        };
        // width() and height() rely on these never overflowing
        layout
            .columns
            .checked_mul(layout.tile_size)
            .and(layout.rows.checked_mul(layout.tile_size))
            .ok_or(AtlasError::InvalidGeometry)?;
        Ok(layout)
    }

    pub fn width(&self) -> u32 {
        self.columns * self.tile_size
    }

    pub fn height(&self) -> u32 {
        self.rows * self.tile_size
    }

    /// Top-left pixel of `slot`
    pub fn slot_origin(&self, slot: u32) -> (u32, u32) {
        (
            (slot % self.columns) * self.tile_size,
            (slot / self.columns) * self.tile_size,
        )
    }
}

/// Composite every requested tile into one texture registered under `key`.
///
/// All tile sources are looked up before anything is touched: a missing tile
/// fails the build and leaves the store as it was. An existing texture under
/// `key` is removed and rebuilt from scratch.
pub fn build_tileset<T: TextureStore>(
    store: &mut T,
    key: &str,
    options: &AtlasOptions,
) -> Result<AtlasLayout, AtlasError> {
    let layout = AtlasLayout::compute(options)?;
    let sources = options
        .tile_numbers
        .iter()
        .map(|number| {
            let tile = tile_key(*number);
            store
                .source(&tile)
                .map(|source| (*number, source))
                .ok_or(AtlasError::MissingTile { key: tile })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if store.remove(key) {
        log::debug!("rebuilding atlas '{key}'");
    }

    let surface_error = |err: anyhow::Error| AtlasError::Surface {
        key: key.to_string(),
        reason: format!("{err:#}"),
    };
    let mut surface = store
        .create_surface(layout.width(), layout.height())
        .map_err(surface_error)?;
    surface.clear();
    for (slot, source) in &sources {
        let (x, y) = layout.slot_origin(*slot);
        surface
            .draw_tile(source, x, y, layout.tile_size)
            .map_err(surface_error)?;
    }
    surface.refresh().map_err(surface_error)?;
    store.add_surface(key, surface);

    log::info!(
        "atlas '{key}' built : {} tiles, {}x{}",
        sources.len(),
        layout.width(),
        layout.height()
    );
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Sheet {
        width: u32,
        height: u32,
        cleared: bool,
        refreshed: bool,
        draws: Vec<(u32, u32, u32, u32)>,
    }

    impl TileSurface for Sheet {
        type Source = u32;

        fn clear(&mut self) {
            self.cleared = true;
        }

        fn draw_tile(&mut self, source: &u32, x: u32, y: u32, size: u32) -> Result<()> {
            self.draws.push((*source, x, y, size));
            Ok(())
        }

        fn refresh(&mut self) -> Result<()> {
            self.refreshed = true;
            Ok(())
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Entry {
        Tile(u32),
        Sheet(Sheet),
    }

    /// Texture store keeping tile ids instead of images
    #[derive(Default)]
    struct MemoryStore {
        entries: HashMap<String, Entry>,
        removed: Vec<String>,
        surfaces_created: u32,
    }

    impl MemoryStore {
        fn with_tiles(numbers: impl IntoIterator<Item = u32>) -> Self {
            let mut store = MemoryStore::default();
            for number in numbers {
                store.entries.insert(tile_key(number), Entry::Tile(number));
            }
            store
        }

        fn sheet(&self, key: &str) -> Option<&Sheet> {
            match self.entries.get(key) {
                Some(Entry::Sheet(sheet)) => Some(sheet),
                _ => None,
            }
        }
    }

    impl TextureStore for MemoryStore {
        type Source = u32;
        type Surface = Sheet;

        fn exists(&self, key: &str) -> bool {
            self.entries.contains_key(key)
        }

        fn remove(&mut self, key: &str) -> bool {
            let removed = self.entries.remove(key).is_some();
            if removed {
                self.removed.push(key.to_string());
            }
            removed
        }

        fn source(&self, key: &str) -> Option<u32> {
            match self.entries.get(key) {
                Some(Entry::Tile(number)) => Some(*number),
                _ => None,
            }
        }

        fn create_surface(&mut self, width: u32, height: u32) -> Result<Sheet> {
            self.surfaces_created += 1;
            Ok(Sheet {
                width,
                height,
                ..Sheet::default()
            })
        }

        fn add_surface(&mut self, key: &str, surface: Sheet) {
            self.entries.insert(key.to_string(), Entry::Sheet(surface));
        }
    }

    #[test]
    fn tile_keys_and_urls() {
        assert_eq!(tile_key(7), "industrialTile7");
        let config = GameConfig::default();
        assert_eq!(
            tile_url(&config, 7).unwrap(),
            "/assets/game/Free%20Industrial%20Zone%20Tileset/1%20Tiles/IndustrialTile_07.png"
        );
        assert!(tile_url(&config, 81).unwrap().ends_with("IndustrialTile_81.png"));
        assert_eq!(industrial_tile_numbers().len(), 81);
    }

    #[test]
    fn default_atlas_is_512_by_192() {
        let mut store = MemoryStore::with_tiles(1..=81);
        let layout =
            build_tileset(&mut store, INDUSTRIAL_TILESET_KEY, &AtlasOptions::default()).unwrap();

        assert_eq!(layout.slots, 82);
        assert_eq!((layout.width(), layout.height()), (512, 192));
        let sheet = store.sheet(INDUSTRIAL_TILESET_KEY).unwrap();
        assert_eq!((sheet.width, sheet.height), (512, 192));
        assert!(sheet.cleared && sheet.refreshed);
        assert_eq!(sheet.draws.len(), 81);
    }

    #[test]
    fn slots_are_row_major_and_slot_zero_stays_empty() {
        let mut store = MemoryStore::with_tiles(1..=81);
        build_tileset(&mut store, INDUSTRIAL_TILESET_KEY, &AtlasOptions::default()).unwrap();
        let draws = &store.sheet(INDUSTRIAL_TILESET_KEY).unwrap().draws;

        assert!(draws.iter().all(|(_, x, y, _)| (*x, *y) != (0, 0)));
        assert!(draws.contains(&(1, 32, 0, 32)));
        assert!(draws.contains(&(15, 480, 0, 32)));
        assert!(draws.contains(&(16, 0, 32, 32)));
        assert!(draws.contains(&(81, 32, 160, 32)));
    }

    #[test]
    fn missing_tile_fails_by_key_and_touches_nothing() {
        let mut store = MemoryStore::with_tiles((1..=81).filter(|n| *n != 40));
        let old = Sheet {
            width: 1,
            ..Sheet::default()
        };
        store.add_surface(INDUSTRIAL_TILESET_KEY, old.clone());

        let err = build_tileset(&mut store, INDUSTRIAL_TILESET_KEY, &AtlasOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            AtlasError::MissingTile {
                key: "industrialTile40".to_string()
            }
        );
        assert!(err.to_string().contains("industrialTile40"));
        assert_eq!(store.surfaces_created, 0);
        assert!(store.removed.is_empty());
        assert_eq!(store.sheet(INDUSTRIAL_TILESET_KEY), Some(&old));
    }

    #[test]
    fn rebuild_replaces_the_existing_atlas() {
        let mut store = MemoryStore::with_tiles(1..=4);
        let options = AtlasOptions {
            tile_numbers: vec![1, 2, 3, 4],
            columns: 2,
            tile_size: 16,
        };
        let first = build_tileset(&mut store, "small", &options).unwrap();
        let first_draws = store.sheet("small").unwrap().draws.clone();
        let second = build_tileset(&mut store, "small", &options).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.removed, ["small"]);
        assert_eq!(store.surfaces_created, 2);
        assert_eq!(store.sheet("small").unwrap().draws, first_draws);
        // 5 slots over 2 columns -> 3 rows
        assert_eq!((second.width(), second.height()), (32, 48));
    }

    #[test]
    fn bad_geometry_is_rejected() {
        let mut store = MemoryStore::with_tiles(1..=2);
        let options = AtlasOptions {
            columns: 0,
            ..AtlasOptions::default()
        };
        assert_eq!(
            build_tileset(&mut store, "x", &options),
            Err(AtlasError::InvalidGeometry)
        );
        let options = AtlasOptions {
            tile_numbers: Vec::new(),
            ..AtlasOptions::default()
        };
        assert_eq!(
            build_tileset(&mut store, "x", &options),
            Err(AtlasError::NoTiles)
        );
    }

    #[test]
    fn oversized_layouts_are_rejected_instead_of_overflowing() {
        let options = AtlasOptions {
            columns: 70_000,
            tile_size: 70_000,
            ..AtlasOptions::default()
        };
        assert_eq!(
            AtlasLayout::compute(&options),
            Err(AtlasError::InvalidGeometry)
        );

        let options = AtlasOptions {
            tile_numbers: vec![u32::MAX],
            ..AtlasOptions::default()
        };
        assert_eq!(
            AtlasLayout::compute(&options),
            Err(AtlasError::InvalidGeometry)
        );
    }

    #[test]
    fn tile_zero_cannot_take_the_empty_slot() {
        let mut store = MemoryStore::with_tiles(0..=2);
        let options = AtlasOptions {
            tile_numbers: vec![0, 1, 2],
            ..AtlasOptions::default()
        };
        assert_eq!(
            build_tileset(&mut store, "x", &options),
            Err(AtlasError::ReservedSlot)
        );
        assert_eq!(store.surfaces_created, 0);
    }
}
