//! Fight Arena - A last-one-standing fighter ring simulation
//!
//! Core modules:
//! - `sim`: Simulation kernel (fighter lifecycle, physics, collisions, tick loop)
//! - `ai`: Decision pipeline (scripted policy + remote learned-policy override)
//! - `observation`: Fixed 30-float encoding of a fighter's view of the ring
//! - `reward`: Per-frame reward shaping for the external learner
//! - `backend`: HTTP seam to the training/inference service
//! - `telemetry`: Episode lifecycle and sampled frame submission
//! - `episode`: Which fighter is recorded and when the bout is over
//! - `arena`: The simulation context that ties everything together
//! - `settings`: Runtime configuration

pub mod ai;
pub mod arena;
pub mod backend;
pub mod episode;
pub mod error;
pub mod observation;
pub mod reward;
pub mod settings;
pub mod sim;
pub mod telemetry;

pub use arena::Arena;
pub use error::{BackendError, ControlError, SettingsError};
pub use settings::ArenaSettings;

use glam::Vec2;

/// Arena tuning constants
pub mod consts {
    /// Width and depth of the square ring
    pub const RING_SIZE: f32 = 160.0;
    /// Half the ring size (playable boundary on each axis)
    pub const RING_HALF: f32 = RING_SIZE / 2.0;
    /// Fighters beyond this on either axis are knocked out of the ring
    pub const ELIMINATION_DISTANCE: f32 = RING_SIZE / 1.2;

    /// Soft push-back starts this far inside the playable edge
    pub const PUSH_MARGIN: f32 = 12.0;
    /// Inward velocity added per unit of penetration into the margin
    pub const PUSH_GAIN: f32 = 5.0;
    /// Hard clamp triggers within this distance of the edge...
    pub const CLAMP_TRIGGER_INSET: f32 = 5.0;
    /// ...and moves the fighter back to this inset
    pub const CLAMP_INSET: f32 = 8.0;

    /// Multiplicative velocity damping applied every tick
    pub const FRICTION: f32 = 0.95;
    /// Largest delta time a single frame may advance (seconds)
    pub const MAX_FRAME_DT: f32 = 0.1;
    /// Nominal frame time used by headless runs (60 Hz)
    pub const FRAME_DT: f32 = 1.0 / 60.0;

    pub const MAX_HEALTH: f32 = 100.0;
    pub const KNOCKBACK_FORCE: f32 = 150.0;
    pub const KNOCKBACK_DAMAGE: f32 = 20.0;
    /// Seconds during which a struck fighter ignores further knockback
    pub const KNOCKBACK_COOLDOWN: f32 = 0.5;
    /// Length of the knockout fly-out animation (seconds)
    pub const KNOCKOUT_DURATION: f32 = 1.5;
    pub const KNOCKOUT_FLY_DISTANCE: f32 = 200.0;
    pub const KNOCKOUT_FLY_HEIGHT: f32 = 100.0;

    /// Fighters closer than this push each other apart
    pub const CONTACT_RADIUS: f32 = 20.0;
    pub const COLLISION_IMPULSE: f32 = 30.0;

    /// Scripted wander speed range (units/s)
    pub const WANDER_SPEED_MIN: f32 = 20.0;
    pub const WANDER_SPEED_MAX: f32 = 60.0;
    /// Scripted wander re-roll interval range (seconds)
    pub const WANDER_TIME_MIN: f32 = 1.0;
    pub const WANDER_TIME_MAX: f32 = 4.0;
    /// Chance a re-rolled wander heads for another fighter
    pub const WANDER_TARGET_CHANCE: f64 = 0.3;

    /// Trait ranges rolled once at spawn
    pub const AGGRESSION_MIN: f32 = 0.3;
    pub const AGGRESSION_MAX: f32 = 1.0;
    pub const ATTACK_FREQUENCY_MIN: f32 = 1.0;
    pub const ATTACK_FREQUENCY_MAX: f32 = 4.0;
    /// Attack cooldown re-roll jitter (± seconds)
    pub const ATTACK_JITTER: f32 = 1.0;

    pub const AI_ATTACK_RANGE: f32 = 100.0;
    pub const PLAYER_ATTACK_RANGE: f32 = 60.0;
    pub const PLAYER_MOVE_SPEED: f32 = 60.0;
    /// Speed of a compass-direction action
    pub const ACTION_MOVE_SPEED: f32 = 50.0;
    /// Extra velocity damping of the idle action
    pub const IDLE_DAMPING: f32 = 0.9;

    /// Spawn area as a fraction of the ring size
    pub const SPAWN_FRACTION: f32 = 0.8;

    /// Observation layout
    pub const OBS_SIZE: usize = 30;
    pub const OBS_MAX_OPPONENTS: usize = 5;
    pub const OBS_OPPONENT_FEATURES: usize = 5;
    /// Scale used to normalize opponent distances and health
    pub const OBS_SCALE: f32 = 100.0;

    /// Number of discrete policy actions
    pub const ACTION_COUNT: usize = 10;

    pub const SURVIVAL_BONUS: f32 = 0.5;
    pub const ELIMINATION_BONUS: f32 = 10.0;
    pub const DAMAGE_PENALTY_PER_HP: f32 = 0.1;
    pub const EDGE_PENALTY: f32 = 1.0;
    /// Distance from centre (fraction of ring size) beyond which the edge penalty applies
    pub const EDGE_PENALTY_FRACTION: f32 = 0.7;
}

/// Unit vector for one of the 8 compass headings (0 = north, clockwise in 45° steps)
///
/// North is +z on the ring plane, stored as +y in `Vec2`.
#[inline]
pub fn compass_direction(index: u8) -> Vec2 {
    let angle = f32::from(index % 8) * std::f32::consts::FRAC_PI_4;
    Vec2::new(angle.sin(), angle.cos())
}

/// Ease-out cubic: fast start, slow finish
#[inline]
pub fn ease_out_cubic(t: f32) -> f32 {
    let inv = 1.0 - t.clamp(0.0, 1.0);
    1.0 - inv * inv * inv
}
