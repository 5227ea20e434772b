//! Scripted heuristic policy
//!
//! Wander: every 1-4 s pick a random heading and a speed of 20-60 units/s,
//! with a 30% chance of heading straight for another living fighter instead.
//! Attack: an independent cooldown loop; on expiry re-roll the cooldown around
//! the fighter's attack frequency and attack with probability equal to its
//! aggression.

use glam::Vec2;
use rand::Rng;

use super::{Strike, strike_nearest};
use crate::consts::*;
use crate::sim::state::Fighter;

/// Run the wander policy for `fighters[index]`
///
/// Always leaves the fighter with a velocity; while the fighter is still
/// staggered from a knockback the impulse is kept instead of the wander speed.
pub fn wander(fighters: &mut [Fighter], index: usize, dt: f32, rng: &mut impl Rng) {
    fighters[index].wander.timer -= dt;

    if fighters[index].wander.timer <= 0.0 {
        let angle = rng.random_range(0.0..std::f32::consts::TAU);
        let mut direction = Vec2::new(angle.sin(), angle.cos());
        let speed = rng.random_range(WANDER_SPEED_MIN..=WANDER_SPEED_MAX);
        let timer = rng.random_range(WANDER_TIME_MIN..=WANDER_TIME_MAX);

        if rng.random_bool(WANDER_TARGET_CHANCE) {
            let others: Vec<usize> = fighters
                .iter()
                .enumerate()
                .filter(|(i, f)| *i != index && f.is_active())
                .map(|(i, _)| i)
                .collect();
            if !others.is_empty() {
                let target = others[rng.random_range(0..others.len())];
                let to_target = fighters[target].pos - fighters[index].pos;
                if to_target.length_squared() > f32::EPSILON {
                    direction = to_target.normalize();
                }
            }
        }

        let w = &mut fighters[index].wander;
        w.direction = direction;
        w.speed = speed;
        w.timer = timer;
    }

    let fighter = &mut fighters[index];
    if fighter.knockback_cooldown <= 0.0 {
        fighter.vel = fighter.wander.direction * fighter.wander.speed;
    }
}

/// Run the attack cooldown loop for `fighters[index]`
pub fn attack_tick(
    fighters: &mut [Fighter],
    index: usize,
    dt: f32,
    rng: &mut impl Rng,
) -> Option<Strike> {
    let fighter = &mut fighters[index];
    fighter.attack_cooldown -= dt;
    if fighter.attack_cooldown > 0.0 {
        return None;
    }

    let jitter = rng.random_range(-ATTACK_JITTER..=ATTACK_JITTER);
    fighter.attack_cooldown = fighter.traits.attack_frequency + jitter;

    let aggression = f64::from(fighter.traits.aggression.clamp(0.0, 1.0));
    if rng.random_bool(aggression) {
        strike_nearest(fighters, index, AI_ATTACK_RANGE)
    } else {
        None
    }
}
