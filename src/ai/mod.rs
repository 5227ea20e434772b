//! Decision pipeline for non-player fighters
//!
//! The scripted policy always runs and is the fallback of record. When remote
//! mode is on, a learned policy's discrete action can override it; both paths
//! execute actions through the same mapping.

pub mod remote;
pub mod scripted;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::compass_direction;
use crate::consts::*;
use crate::sim::physics::KnockbackOutcome;
use crate::sim::state::Fighter;

pub use remote::{RemoteDecision, RemoteInferenceClient};

/// Discrete policy action (wire values 0-9)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Action {
    /// Move along compass heading 0-7 (N, NE, E, SE, S, SW, W, NW)
    Move(u8),
    Idle,
    /// Strike the nearest living opponent in range
    Attack,
}

impl Action {
    pub const IDLE_INDEX: u8 = 8;
    pub const ATTACK_INDEX: u8 = 9;

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0..=7 => Some(Action::Move(index)),
            Self::IDLE_INDEX => Some(Action::Idle),
            Self::ATTACK_INDEX => Some(Action::Attack),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Action::Move(heading) => heading % 8,
            Action::Idle => Self::IDLE_INDEX,
            Action::Attack => Self::ATTACK_INDEX,
        }
    }

    /// Closest compass move for a velocity, or idle when barely moving
    pub fn from_velocity(vel: Vec2) -> Self {
        if vel.length_squared() < 0.25 {
            return Action::Idle;
        }
        // Heading measured clockwise from north (+z)
        let heading = vel.x.atan2(vel.y).rem_euclid(std::f32::consts::TAU);
        let sector = (heading / std::f32::consts::FRAC_PI_4).round() as u8 % 8;
        Action::Move(sector)
    }
}

impl TryFrom<u8> for Action {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Action::from_index(value).ok_or_else(|| format!("action {value} out of range 0-9"))
    }
}

impl From<Action> for u8 {
    fn from(action: Action) -> Self {
        action.index()
    }
}

/// A landed strike
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strike {
    pub attacker: u32,
    pub target: u32,
    pub knocked_out: bool,
}

/// Source of asynchronous decisions that may override the scripted policy
pub trait PolicyOverride {
    /// A completed decision for this fighter, if one is ready and still valid
    fn take_decision(&mut self, fighter: &Fighter) -> Option<Action>;
    /// Give the source a chance to start a new request for `fighters[index]`
    fn request(&mut self, fighters: &[Fighter], index: usize, now: f64);
    /// Drop anything pending for a fighter the source no longer drives
    fn release(&mut self, _fighter_id: u32) {}
}

/// Index of the nearest Active opponent strictly within `range`
pub fn nearest_opponent(fighters: &[Fighter], index: usize, range: f32) -> Option<usize> {
    let me = &fighters[index];
    fighters
        .iter()
        .enumerate()
        .filter(|(i, f)| *i != index && f.is_active())
        .map(|(i, f)| (i, me.pos.distance(f.pos)))
        .filter(|(_, d)| *d < range)
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
}

/// Knock back the nearest opponent within `range` of `fighters[index]`
pub fn strike_nearest(fighters: &mut [Fighter], index: usize, range: f32) -> Option<Strike> {
    if !fighters[index].is_active() {
        return None;
    }
    let target = nearest_opponent(fighters, index, range)?;
    let direction = fighters[target].pos - fighters[index].pos;
    let attacker = fighters[index].id;

    match fighters[target].knock_back(direction) {
        KnockbackOutcome::Ignored => None,
        outcome => Some(Strike {
            attacker,
            target: fighters[target].id,
            knocked_out: outcome == KnockbackOutcome::KnockedOut,
        }),
    }
}

/// Apply an action to `fighters[index]`
///
/// Shared by scripted execution and learned-policy execution.
pub fn execute_action(fighters: &mut [Fighter], index: usize, action: Action) -> Option<Strike> {
    match action {
        Action::Move(heading) => {
            // A staggered fighter keeps its knockback impulse
            if fighters[index].knockback_cooldown <= 0.0 {
                fighters[index].vel = compass_direction(heading) * ACTION_MOVE_SPEED;
            }
            None
        }
        Action::Idle => {
            fighters[index].vel *= IDLE_DAMPING;
            None
        }
        Action::Attack => strike_nearest(fighters, index, AI_ATTACK_RANGE),
    }
}
