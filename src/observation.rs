//! Fixed-size observation vector fed to the learned policy
//!
//! Layout (30 floats):
//! - `[0..2)` own position / (ring size / 2)
//! - `[2]` own health / 100
//! - `[3..5)` own velocity, raw
//! - `[5..30)` up to 5 nearest Active opponents, 5 floats each: distance,
//!   relative x, relative z, health, threat. All divided by 100. Missing
//!   opponents are zero.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::sim::state::Fighter;

/// One encoded observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observation(pub [f32; OBS_SIZE]);

impl Observation {
    pub fn zeros() -> Self {
        Self([0.0; OBS_SIZE])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl Default for Observation {
    fn default() -> Self {
        Self::zeros()
    }
}

/// Encodes a fighter's view of the ring
#[derive(Debug, Clone, Copy)]
pub struct ObservationEncoder {
    pub ring_size: f32,
}

impl Default for ObservationEncoder {
    fn default() -> Self {
        Self {
            ring_size: RING_SIZE,
        }
    }
}

impl ObservationEncoder {
    pub fn new(ring_size: f32) -> Self {
        Self { ring_size }
    }

    /// Encode the fighter with `fighter_id`; all zeros if it is not in the roster
    pub fn encode(&self, fighters: &[Fighter], fighter_id: u32) -> Observation {
        match fighters.iter().find(|f| f.id == fighter_id) {
            Some(me) => self.encode_fighter(me, fighters),
            None => Observation::zeros(),
        }
    }

    /// Encode `me` against the roster (which may include `me`)
    pub fn encode_fighter(&self, me: &Fighter, fighters: &[Fighter]) -> Observation {
        let mut data = [0.0f32; OBS_SIZE];
        if !me.pos.is_finite() || self.ring_size <= 0.0 {
            return Observation(data);
        }

        let half = self.ring_size / 2.0;
        data[0] = me.pos.x / half;
        data[1] = me.pos.y / half;
        data[2] = me.health / MAX_HEALTH;
        data[3] = me.vel.x;
        data[4] = me.vel.y;

        let mut opponents: Vec<(f32, &Fighter)> = fighters
            .iter()
            .filter(|f| f.id != me.id && f.is_active())
            .map(|f| (me.pos.distance(f.pos), f))
            .collect();
        opponents.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (slot, (distance, opponent)) in opponents.iter().take(OBS_MAX_OPPONENTS).enumerate() {
            let base = 5 + slot * OBS_OPPONENT_FEATURES;
            let rel = opponent.pos - me.pos;
            let threat = ((MAX_HEALTH - opponent.health) + distance) / 2.0;

            data[base] = distance / OBS_SCALE;
            data[base + 1] = rel.x / OBS_SCALE;
            data[base + 2] = rel.y / OBS_SCALE;
            data[base + 3] = opponent.health / OBS_SCALE;
            data[base + 4] = threat / OBS_SCALE;
        }

        Observation(data)
    }
}
