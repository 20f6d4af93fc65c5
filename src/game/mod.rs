// TABLE:
// ┌──────────────────────────────────────────────────────────────────────┐
// │                         Game modules                                 │
// ├──────────────────┬───────────────────────────────────────────────────┤
// │ atlas.rs         │ stitch loaded tile images into one tileset        │
// │ water.rs         │ cycle water tile indices on a scene timer         │
// │ debug_toggle.rs  │ key bound physics debug overlay                   │
// │ level.rs         │ seeded floor layout                               │
// │ rng.rs           │ xmur3 + mulberry32                                │
// │ scenes/          │ Boot → Preloader → MainMenu → RogueRun → GameOver │
// └──────────────────┴───────────────────────────────────────────────────┘
pub mod atlas;
pub mod debug_toggle;
pub mod level;
pub mod rng;
pub mod scenes;
pub mod water;

use crate::engine::scene::Registry;

pub use scenes::scenes;

const STARTING_LIVES: u32 = 3;
// fallback when the browser has no entropy to give
const FALLBACK_SEED: &str = "run";

mod keys {
    pub const SEED: &str = "runSeed";
    pub const FLOOR: &str = "runFloor";
    pub const LIVES: &str = "lives";
    pub const SCORE: &str = "score";
}

/// Progress of one run, persisted in the scene registry between restarts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub seed: String,
    pub floor: u32,
    pub lives: u32,
    pub score: u32,
}

impl RunState {
    pub fn new(seed: impl Into<String>) -> Self {
        RunState {
            seed: seed.into(),
            floor: 1,
            lives: STARTING_LIVES,
            score: 0,
        }
    }

    /// Missing or out of range entries fall back to a fresh run's values
    pub fn load(registry: &Registry) -> Self {
        let fresh = RunState::new(registry.text(keys::SEED).unwrap_or(FALLBACK_SEED));
        let read = |key: &str, default: u32| {
            registry
                .int(key)
                .and_then(|value| u32::try_from(value).ok())
                .unwrap_or(default)
        };
        RunState {
            floor: read(keys::FLOOR, fresh.floor).max(1),
            lives: read(keys::LIVES, fresh.lives),
            score: read(keys::SCORE, fresh.score),
            ..fresh
        }
    }

    pub fn store(&self, registry: &mut Registry) {
        registry.set(keys::SEED, self.seed.as_str());
        registry.set(keys::FLOOR, i64::from(self.floor));
        registry.set(keys::LIVES, i64::from(self.lives));
        registry.set(keys::SCORE, i64::from(self.score));
    }

    /// Returns true while the run can go on
    pub fn lose_life(&mut self) -> bool {
        self.lives = self.lives.saturating_sub(1);
        self.lives > 0
    }

    /// Reaching the goal: score the floor and go one deeper
    pub fn next_floor(&mut self) {
        self.score += 100 * self.floor;
        self.floor += 1;
    }
}

/// Reset the registry for a brand new run with a random seed
pub fn start_new_run(registry: &mut Registry) -> RunState {
    let seed = rng::new_run_seed().unwrap_or_else(|err| {
        log::warn!("{err:#}, using a fixed seed");
        FALLBACK_SEED.to_string()
    });
    let run = RunState::new(seed);
    run.store(registry);
    log::info!("new run, seed '{}'", run.seed);
    run
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_loads_a_fresh_run() {
        let run = RunState::load(&Registry::default());
        assert_eq!(run, RunState::new("run"));
        assert_eq!(run.lives, 3);
    }

    #[test]
    fn run_state_survives_the_registry() {
        let mut registry = Registry::default();
        let mut run = RunState::new("k3x9");
        run.next_floor();
        run.lose_life();
        run.store(&mut registry);

        let loaded = RunState::load(&registry);
        assert_eq!(loaded, run);
        assert_eq!((loaded.floor, loaded.lives, loaded.score), (2, 2, 100));
    }

    #[test]
    fn last_life_ends_the_run() {
        let mut run = RunState::new("seed");
        assert!(run.lose_life());
        assert!(run.lose_life());
        assert!(!run.lose_life());
        assert!(!run.lose_life());
        assert_eq!(run.lives, 0);
    }

    #[test]
    fn new_run_resets_progress() {
        let mut registry = Registry::default();
        let mut old = RunState::new("old");
        old.next_floor();
        old.store(&mut registry);

        let run = start_new_run(&mut registry);
        assert_eq!(RunState::load(&registry), run);
        assert_eq!((run.floor, run.lives, run.score), (1, 3, 0));
        assert_ne!(run.seed, "old");
    }
}
