//! Deterministic simulation module
//!
//! All ring logic lives here. Given the same seed, roster and inputs, a run is
//! reproducible:
//! - Seeded RNG only
//! - Stable iteration order (roster order, by fighter id)
//! - No network or rendering dependencies; remote decisions enter only through
//!   the `PolicyOverride` seam

pub mod clock;
pub mod collision;
pub mod physics;
pub mod state;
pub mod tick;

pub use clock::FrameClock;
pub use collision::{Contact, fighter_contact, resolve_collisions};
pub use physics::{BoundaryOutcome, KnockbackOutcome};
pub use state::{
    ArenaPhase, ArenaSnapshot, ArenaState, Control, Fighter, FighterToken, FighterView,
    LifecycleState, ProfileName, Traits, fighter_name_from_asset,
};
pub use tick::{TickInput, TickReport, tick};
