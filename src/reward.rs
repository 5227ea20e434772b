//! Per-frame reward shaping for the recorded fighter

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Breakdown of one frame's reward
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardComponents {
    pub survival: f32,
    pub eliminations: f32,
    pub damage: f32,
    pub edge: f32,
}

impl RewardComponents {
    pub fn total(&self) -> f32 {
        self.survival + self.eliminations + self.damage + self.edge
    }
}

/// Pure reward for one frame
///
/// `opponents_lost` is how many live opponents disappeared since the last frame,
/// `health_lost` how much health the fighter lost (gains are ignored).
pub fn frame_reward(opponents_lost: usize, health_lost: f32, pos: Vec2) -> RewardComponents {
    let edge_distance = RING_SIZE * EDGE_PENALTY_FRACTION;
    RewardComponents {
        survival: SURVIVAL_BONUS,
        eliminations: ELIMINATION_BONUS * opponents_lost as f32,
        damage: -DAMAGE_PENALTY_PER_HP * health_lost.max(0.0),
        edge: if pos.length() > edge_distance {
            -EDGE_PENALTY
        } else {
            0.0
        },
    }
}

/// Stateful shaper tracking the previous frame and the running total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardShaper {
    prev_health: f32,
    prev_opponents: Option<usize>,
    cumulative: f32,
}

impl Default for RewardShaper {
    fn default() -> Self {
        Self::new()
    }
}

impl RewardShaper {
    pub fn new() -> Self {
        Self {
            prev_health: MAX_HEALTH,
            prev_opponents: None,
            cumulative: 0.0,
        }
    }

    /// Start a new episode from the given baseline
    pub fn reset(&mut self, health: f32, live_opponents: usize) {
        self.prev_health = health;
        self.prev_opponents = Some(live_opponents);
        self.cumulative = 0.0;
    }

    pub fn cumulative(&self) -> f32 {
        self.cumulative
    }

    /// Reward for the current frame; returns `(delta, cumulative)`
    pub fn shape(&mut self, health: f32, live_opponents: usize, pos: Vec2) -> (f32, f32) {
        let prev_opponents = self.prev_opponents.unwrap_or(live_opponents);
        let lost = prev_opponents.saturating_sub(live_opponents);
        let delta = frame_reward(lost, self.prev_health - health, pos).total();

        self.prev_health = health;
        self.prev_opponents = Some(live_opponents);
        self.cumulative += delta;
        (delta, self.cumulative)
    }
}
