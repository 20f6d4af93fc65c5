use crate::config::GameConfig;
use crate::engine::tilemap::TilemapLayer;
use crate::engine::time::{Clock, TimerHandle};
use std::cell::RefCell;
use std::rc::Rc;

pub const WATER_FRAMES: [i32; 3] = [4, 5, 6];
pub const WATER_FRAME_MS: f64 = 180.0;

/// How one tick moves the cells of a layer through the cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CycleMode {
    /// Only cells showing the current frame move on, then the pointer moves.
    /// Cells on other frames wait for their turn.
    #[default]
    Sweep,
    /// Every cell on any frame moves to its successor at once.
    Shift,
}

/// Cyclic list of tile indices and the position reached in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCycle {
    frames: Vec<i32>,
    position: usize,
    mode: CycleMode,
}

impl FrameCycle {
    pub fn new(frames: &[i32]) -> Self {
        FrameCycle {
            frames: frames.to_vec(),
            position: 0,
            mode: CycleMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: CycleMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn current(&self) -> Option<i32> {
        self.frames.get(self.position).copied()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn successor(&self, index: usize) -> i32 {
        self.frames[(index + 1) % self.frames.len()]
    }

    /// One tick over the whole layer, returns how many cells changed.
    /// The pointer advances even when no cell matched, so the phase stays
    /// in step with the timer.
    pub fn advance(&mut self, layer: &mut TilemapLayer) -> usize {
        if self.frames.is_empty() {
            return 0;
        }
        let changed = match self.mode {
            CycleMode::Sweep => {
                let from = self.frames[self.position];
                layer.replace_all(from, self.successor(self.position))
            }
            CycleMode::Shift => {
                let mut changed = 0;
                layer.for_each_tile_mut(|cell| {
                    if let Some(index) = self.frames.iter().position(|frame| frame == cell) {
                        *cell = self.successor(index);
                        changed += 1;
                    }
                });
                changed
            }
        };
        self.position = (self.position + 1) % self.frames.len();
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaterOptions {
    pub frames: Vec<i32>,
    pub period_ms: f64,
    pub mode: CycleMode,
}

impl Default for WaterOptions {
    fn default() -> Self {
        WaterOptions {
            frames: WATER_FRAMES.to_vec(),
            period_ms: WATER_FRAME_MS,
            mode: CycleMode::default(),
        }
    }
}

impl WaterOptions {
    pub fn from_config(config: &GameConfig) -> Self {
        WaterOptions {
            period_ms: config.water_frame_ms,
            ..Self::default()
        }
    }
}

/// Animate `layer` on the scene clock. The cycle starts at the first frame
/// on every install; the timer stops when the handle is cancelled or dropped.
pub fn install_water_animation(
    clock: &Clock,
    layer: Rc<RefCell<TilemapLayer>>,
    options: WaterOptions,
) -> TimerHandle {
    let mut cycle = FrameCycle::new(&options.frames).with_mode(options.mode);
    clock.add_repeating(options.period_ms, move || {
        let changed = cycle.advance(&mut layer.borrow_mut());
        log::trace!("water tick : {changed} cells");
    })
}
