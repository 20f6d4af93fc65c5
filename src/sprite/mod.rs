// TABLE:
// ┌──────────────────────────────────────────────────────────────────────────┐
// │                      Directory Structure Analogy                         │
// ├───────────────────┬──────────────────────────────────────────────────────┤
// │ Code Directory    │          Photoshop Equivalent                        │
// ├───────────────────┼──────────────────────────────────────────────────────┤
// │ sprite/           │ Character Asset Library                              │
// │ ├── mod.rs        │ Master Sprite Sheet Settings (.psd)                  │
// │ ├── state.rs      │ Animation Sequences (Layer Groups)                   │
// │ └── cat.rs        │ Character-Specific Settings (Layer Comps)            │
// └───────────────────┴──────────────────────────────────────────────────────┘
// ┌──────────────────────────────────────────────────────────────────────────┐
// │                      Code Structure vs Photoshop Concepts                │
// ├────────────────┬──────────────────────┬──────────────────────────────────┤
// │   Code File    │   Code Component     │         Photoshop Equivalent     │
// ├────────────────┼──────────────────────┼──────────────────────────────────┤
// │                │ SpriteState trait    │ Layer naming/organization rules  │
// │   mod.rs       │ SpriteMetadata       │ Timeline/Animation settings      │
// ├────────────────┼──────────────────────┼──────────────────────────────────┤
// │                │ CatState<Idle>       │ "Sit" layer group                │
// │   state.rs     │ CatState<Walking>    │ "Walk_Left/Right" layer groups   │
// │                │ CatState<Airborne>   │ "Jump" layer group               │
// ├────────────────┼──────────────────────┼──────────────────────────────────┤
// │   cat.rs       │ CatStateMachine, Cat │ Final composition                │
// └────────────────┴──────────────────────┴──────────────────────────────────┘
pub mod cat;
pub mod state;

/// Cat sheet cells are 64x64, 14 per row
pub const CAT_FRAME_SIZE: f32 = 64.0;
pub const CAT_SHEET_KEY: &str = "cat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

/// One looping animation on the sheet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteMetadata {
    pub first_frame: u32,
    pub frame_count: u32,
    pub frames_per_second: f64,
}

impl SpriteMetadata {
    /// Sheet frame shown `elapsed_ms` into the loop
    pub fn frame_at(&self, elapsed_ms: f64) -> u32 {
        let ticks = (elapsed_ms.max(0.0) * self.frames_per_second / 1000.0).floor() as u32;
        self.first_frame + ticks % self.frame_count.max(1)
    }
}

/// Compile-time marker for a cat state and its animation
pub trait SpriteState {
    fn name() -> &'static str;
    fn metadata(facing: Facing) -> SpriteMetadata;
}

#[derive(Debug, Clone, Copy)]
pub struct Idle;
#[derive(Debug, Clone, Copy)]
pub struct Walking;
#[derive(Debug, Clone, Copy)]
pub struct Airborne;

const WALK_LEFT: SpriteMetadata = SpriteMetadata {
    first_frame: 56,
    frame_count: 4,
    frames_per_second: 10.0,
};

const WALK_RIGHT: SpriteMetadata = SpriteMetadata {
    first_frame: 70,
    frame_count: 4,
    frames_per_second: 10.0,
};

impl SpriteState for Idle {
    fn name() -> &'static str {
        "idle"
    }

    fn metadata(_facing: Facing) -> SpriteMetadata {
        SpriteMetadata {
            first_frame: 0,
            frame_count: 3,
            frames_per_second: 5.0,
        }
    }
}

impl SpriteState for Walking {
    fn name() -> &'static str {
        "walk"
    }

    fn metadata(facing: Facing) -> SpriteMetadata {
        match facing {
            Facing::Left => WALK_LEFT,
            Facing::Right => WALK_RIGHT,
        }
    }
}

// no jump row on the sheet yet, the walk cycle reads fine mid air
impl SpriteState for Airborne {
    fn name() -> &'static str {
        "jump"
    }

    fn metadata(facing: Facing) -> SpriteMetadata {
        Walking::metadata(facing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_loop_at_their_rate() {
        let idle = Idle::metadata(Facing::Right);
        assert_eq!(idle.frame_at(0.0), 0);
        assert_eq!(idle.frame_at(199.0), 0);
        assert_eq!(idle.frame_at(200.0), 1);
        assert_eq!(idle.frame_at(600.0), 0);
    }

    #[test]
    fn walking_picks_row_by_facing() {
        assert_eq!(Walking::metadata(Facing::Left).frame_at(0.0), 56);
        assert_eq!(Walking::metadata(Facing::Right).frame_at(350.0), 73);
        assert_eq!(Airborne::metadata(Facing::Left), WALK_LEFT);
    }
}
