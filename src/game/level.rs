use crate::engine::tilemap::EMPTY_TILE;
use crate::engine::Point;
use crate::game::rng::Rng;

pub const SOLID_TILE: i32 = 12;
pub const PLATFORM_TILE: i32 = 3;
/// First frame of the water cycle; gaps in the ground are flooded with it
pub const WATER_TILE: i32 = 4;
/// Tiles the player collides with
pub const COLLISION_TILES: [i32; 4] = [3, 12, 13, 14];

const SAFE_START: usize = 6;
const SAFE_END: usize = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct LevelOptions {
    pub seed: String,
    pub floor: u32,
    pub width_tiles: usize,
    pub height_tiles: usize,
    pub tile_size: u32,
}

impl LevelOptions {
    pub fn new(seed: &str, floor: u32) -> Self {
        LevelOptions {
            seed: seed.to_string(),
            floor,
            width_tiles: 90,
            height_tiles: 20,
            tile_size: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spawn {
    pub player: Point,
    pub goal: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedLevel {
    pub width_tiles: usize,
    pub height_tiles: usize,
    pub tile_size: u32,
    /// Row-major tile indices, `EMPTY_TILE` for nothing
    pub data: Vec<Vec<i32>>,
    pub spawn: Spawn,
}

impl GeneratedLevel {
    pub fn ground_row(&self) -> usize {
        self.height_tiles - 3
    }
}

/// Pixel center of a tile
fn to_px(x: usize, y: usize, tile_size: u32) -> Point {
    let size = tile_size as f32;
    Point {
        x: x as f32 * size + size / 2.0,
        y: y as f32 * size + size / 2.0,
    }
}

/// Platformer layout for one floor of a run, fully determined by
/// (seed, floor):
/// - two rows of ground with gaps, flooded with water
/// - floating platforms, more on deeper floors
/// - solid safe zones at spawn and goal
pub fn generate_level(options: &LevelOptions) -> GeneratedLevel {
    let LevelOptions {
        width_tiles: width,
        height_tiles: height,
        tile_size,
        floor,
        ..
    } = *options;
    let mut rng = Rng::new(&format!("{}::floor:{}", options.seed, floor));
    let mut data = vec![vec![EMPTY_TILE; width]; height];
    let ground = height.saturating_sub(3);

    // ground with gaps, gaps get likelier every floor
    let gap_chance = (0.06 + f64::from(floor.saturating_sub(1)) * 0.01).min(0.18);
    let mut x = 0;
    while x < width {
        let near_start = x < 10;
        let near_end = x + 12 > width;
        if !near_start && !near_end && rng.chance(gap_chance) {
            let gap = rng.int(2, 5) as usize;
            for water in x..(x + gap).min(width) {
                data[ground + 1][water] = WATER_TILE;
            }
            x += gap;
            continue;
        }
        data[ground][x] = SOLID_TILE;
        data[ground + 1][x] = SOLID_TILE;
        x += 1;
    }

    let platforms = (3 + floor / 2).min(10);
    for _ in 0..platforms {
        let px = rng.int(8, width as i64 - 12);
        let py = rng.int(ground as i64 - 8, ground as i64 - 3).max(0) as usize;
        let length = rng.int(2, 7);
        for tx in (px..px + length).filter(|tx| *tx > 1 && *tx < width as i64 - 2) {
            data[py][tx as usize] = PLATFORM_TILE;
        }
    }

    for tx in (0..SAFE_START.min(width)).chain(width.saturating_sub(SAFE_END)..width) {
        data[ground][tx] = SOLID_TILE;
        data[ground + 1][tx] = SOLID_TILE;
    }

    GeneratedLevel {
        width_tiles: width,
        height_tiles: height,
        tile_size,
        data,
        spawn: Spawn {
            player: to_px(2, ground - 1, tile_size),
            goal: to_px(width.saturating_sub(4), ground - 1, tile_size),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_and_floor_give_the_same_level() {
        let a = generate_level(&LevelOptions::new("abc", 1));
        let b = generate_level(&LevelOptions::new("abc", 1));
        assert_eq!(a, b);
    }

    #[test]
    fn next_floor_changes_the_layout() {
        let a = generate_level(&LevelOptions::new("abc", 1));
        let b = generate_level(&LevelOptions::new("abc", 2));
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn spawn_and_goal_stay_in_bounds() {
        let level = generate_level(&LevelOptions {
            width_tiles: 50,
            height_tiles: 18,
            ..LevelOptions::new("seed", 3)
        });
        let (width, height) = (
            (level.width_tiles as u32 * level.tile_size) as f32,
            (level.height_tiles as u32 * level.tile_size) as f32,
        );
        for point in [level.spawn.player, level.spawn.goal] {
            assert!(point.x >= 0.0 && point.x <= width);
            assert!(point.y >= 0.0 && point.y <= height);
        }
    }

    #[test]
    fn safe_zones_are_solid_and_water_only_fills_gaps() {
        let level = generate_level(&LevelOptions::new("water", 9));
        let ground = level.ground_row();
        for x in (0..SAFE_START).chain(level.width_tiles - SAFE_END..level.width_tiles) {
            assert_eq!(level.data[ground][x], SOLID_TILE);
            assert_eq!(level.data[ground + 1][x], SOLID_TILE);
        }
        for x in 0..level.width_tiles {
            if level.data[ground + 1][x] == WATER_TILE {
                assert_ne!(level.data[ground][x], SOLID_TILE);
            }
        }
        assert!(!COLLISION_TILES.contains(&WATER_TILE));
    }
}
