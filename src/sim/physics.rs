//! Ring physics and the fighter lifecycle transitions
//!
//! Per Active fighter per tick: integrate velocity, apply friction, test the
//! elimination boundary against the integrated position, and only if the
//! fighter survived, apply the soft push-back and hard clamp. The hard clamp
//! keeps corrected positions well inside the elimination boundary, so testing
//! elimination afterwards would make ring-outs impossible.

use glam::Vec2;

use super::state::{Fighter, KnockoutArc, LifecycleState};
use crate::consts::*;
use crate::ease_out_cubic;

/// Result of the ring boundary check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryOutcome {
    Inside,
    /// Inside the push-back margin; inward velocity was added
    PushedBack,
    /// Past the elimination distance; knockout started
    RingOut,
}

/// Result of a knockback attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnockbackOutcome {
    /// Target not Active or still in its knockback cooldown
    Ignored,
    Hit,
    /// The hit took the last of the target's health
    KnockedOut,
}

impl Fighter {
    /// Advance one tick of ring physics for an Active fighter
    pub fn step_physics(&mut self, dt: f32) -> BoundaryOutcome {
        if !self.is_active() {
            return BoundaryOutcome::Inside;
        }

        self.integrate(dt);
        let outcome = self.check_ring_boundaries();
        self.knockback_cooldown = (self.knockback_cooldown - dt).max(0.0);
        outcome
    }

    /// Apply velocity to position, then exponential friction
    pub fn integrate(&mut self, dt: f32) {
        self.pos += self.vel * dt;
        self.vel *= FRICTION;
    }

    /// Elimination test first, then soft push-back and hard clamp
    pub fn check_ring_boundaries(&mut self) -> BoundaryOutcome {
        if !self.is_active() {
            return BoundaryOutcome::Inside;
        }

        if self.pos.x.abs() > ELIMINATION_DISTANCE || self.pos.y.abs() > ELIMINATION_DISTANCE {
            log::info!("{} (#{}) is out of the ring", self.name, self.id);
            self.begin_knockout();
            return BoundaryOutcome::RingOut;
        }

        let (push_x, clamped_x) = push_back_axis(self.pos.x);
        let (push_z, clamped_z) = push_back_axis(self.pos.y);
        self.pos = Vec2::new(clamped_x, clamped_z);

        if push_x != 0.0 || push_z != 0.0 {
            self.vel += Vec2::new(push_x, push_z);
            BoundaryOutcome::PushedBack
        } else {
            BoundaryOutcome::Inside
        }
    }

    /// Knock this fighter away along `direction`, dealing fixed damage
    pub fn knock_back(&mut self, direction: Vec2) -> KnockbackOutcome {
        if !self.is_active() || self.knockback_cooldown > 0.0 {
            return KnockbackOutcome::Ignored;
        }

        self.vel = direction.normalize_or_zero() * KNOCKBACK_FORCE;
        self.health = (self.health - KNOCKBACK_DAMAGE).clamp(0.0, MAX_HEALTH);
        self.knockback_cooldown = KNOCKBACK_COOLDOWN;

        if self.health <= 0.0 {
            self.health = 0.0;
            log::info!("{} (#{}) is knocked out", self.name, self.id);
            self.begin_knockout();
            KnockbackOutcome::KnockedOut
        } else {
            KnockbackOutcome::Hit
        }
    }

    /// `Active -> KnockoutAnimating`. No-op in any other state
    pub fn begin_knockout(&mut self) {
        if !self.is_active() {
            return;
        }
        self.state = LifecycleState::KnockoutAnimating;
        self.generation = self.generation.wrapping_add(1);
        self.knockout = Some(KnockoutArc {
            start: self.pos,
            direction: self.pos.normalize_or_zero(),
            timer: 0.0,
        });
    }

    /// Advance the fly-out arc; `KnockoutAnimating -> Eliminated` when it ends
    pub fn advance_knockout(&mut self, dt: f32) {
        if self.state != LifecycleState::KnockoutAnimating {
            return;
        }
        let Some(arc) = self.knockout.as_mut() else {
            self.state = LifecycleState::Eliminated;
            return;
        };

        arc.timer += dt;
        let progress = arc.timer / KNOCKOUT_DURATION;
        if progress >= 1.0 {
            self.pos = arc.start + arc.direction * KNOCKOUT_FLY_DISTANCE;
            self.elevation = 0.0;
            self.vel = Vec2::ZERO;
            self.state = LifecycleState::Eliminated;
            self.knockout = None;
            return;
        }

        self.pos = arc.start + arc.direction * (KNOCKOUT_FLY_DISTANCE * ease_out_cubic(progress));
        self.elevation = KNOCKOUT_FLY_HEIGHT * (progress * std::f32::consts::PI).sin();
    }
}

/// Push-back velocity and corrected coordinate for one axis
fn push_back_axis(coord: f32) -> (f32, f32) {
    let soft_edge = RING_HALF - PUSH_MARGIN;
    let hard_edge = RING_HALF - CLAMP_TRIGGER_INSET;

    if coord > soft_edge {
        let push = (soft_edge - coord) * PUSH_GAIN;
        let coord = if coord > hard_edge {
            RING_HALF - CLAMP_INSET
        } else {
            coord
        };
        (push, coord)
    } else if coord < -soft_edge {
        let push = (-soft_edge - coord) * PUSH_GAIN;
        let coord = if coord < -hard_edge {
            -RING_HALF + CLAMP_INSET
        } else {
            coord
        };
        (push, coord)
    } else {
        (0.0, coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::Traits;

    fn fighter_at(x: f32, z: f32) -> Fighter {
        let traits = Traits {
            aggression: 0.5,
            attack_frequency: 2.0,
        };
        Fighter::new(1, "TEST", Vec2::new(x, z), traits, 0)
    }

    #[test]
    fn test_integrate_applies_exponential_friction() {
        let mut f = fighter_at(0.0, 0.0);
        f.vel = Vec2::new(60.0, 0.0);
        f.integrate(0.1);
        assert!((f.pos.x - 6.0).abs() < 1e-5);
        assert!((f.vel.x - 57.0).abs() < 1e-4);
        f.integrate(0.1);
        assert!((f.vel.x - 54.15).abs() < 1e-3);
    }

    #[test]
    fn test_ring_out_at_140_starts_knockout() {
        let mut f = fighter_at(140.0, 0.0);
        let outcome = f.step_physics(FRAME_DT);
        assert_eq!(outcome, BoundaryOutcome::RingOut);
        assert_eq!(f.state, LifecycleState::KnockoutAnimating);
        assert_eq!(f.generation, 1);

        // A second check must not transition again
        assert_eq!(f.check_ring_boundaries(), BoundaryOutcome::Inside);
        f.begin_knockout();
        assert_eq!(f.generation, 1);
    }

    #[test]
    fn test_soft_push_back_inside_margin() {
        let mut f = fighter_at(70.0, 0.0);
        let outcome = f.check_ring_boundaries();
        assert_eq!(outcome, BoundaryOutcome::PushedBack);
        // 68 - 70 = -2, times gain 5
        assert!((f.vel.x + 10.0).abs() < 1e-4);
        assert_eq!(f.pos.x, 70.0);
    }

    #[test]
    fn test_hard_clamp_near_edge() {
        let mut f = fighter_at(-78.0, 77.0);
        let outcome = f.check_ring_boundaries();
        assert_eq!(outcome, BoundaryOutcome::PushedBack);
        assert_eq!(f.pos, Vec2::new(-72.0, 72.0));
        assert!(f.vel.x > 0.0 && f.vel.y < 0.0);
    }

    #[test]
    fn test_center_is_untouched() {
        let mut f = fighter_at(10.0, -20.0);
        assert_eq!(f.check_ring_boundaries(), BoundaryOutcome::Inside);
        assert_eq!(f.vel, Vec2::ZERO);
    }

    #[test]
    fn test_knockback_damage_and_cooldown() {
        let mut f = fighter_at(0.0, 0.0);
        assert_eq!(f.knock_back(Vec2::new(3.0, 4.0)), KnockbackOutcome::Hit);
        assert_eq!(f.health, 80.0);
        assert!((f.vel.length() - KNOCKBACK_FORCE).abs() < 1e-3);

        // Within the cooldown window: nothing changes
        let vel = f.vel;
        assert_eq!(f.knock_back(Vec2::X), KnockbackOutcome::Ignored);
        assert_eq!(f.health, 80.0);
        assert_eq!(f.vel, vel);

        // Cooldown elapses through physics steps
        for _ in 0..40 {
            f.step_physics(FRAME_DT);
        }
        assert_eq!(f.knockback_cooldown, 0.0);
        assert_eq!(f.knock_back(Vec2::X), KnockbackOutcome::Hit);
        assert_eq!(f.health, 60.0);
    }

    #[test]
    fn test_lethal_knockback_clamps_health() {
        let mut f = fighter_at(0.0, 0.0);
        f.health = 15.0;
        assert_eq!(f.knock_back(Vec2::Y), KnockbackOutcome::KnockedOut);
        assert_eq!(f.health, 0.0);
        assert_eq!(f.state, LifecycleState::KnockoutAnimating);
        // Mid-animation knockback is a no-op
        assert_eq!(f.knock_back(Vec2::Y), KnockbackOutcome::Ignored);
    }

    #[test]
    fn test_knockout_animation_ends_eliminated() {
        let mut f = fighter_at(30.0, 40.0);
        f.begin_knockout();

        f.advance_knockout(KNOCKOUT_DURATION / 2.0);
        assert_eq!(f.state, LifecycleState::KnockoutAnimating);
        assert!(f.pos.length() > 50.0);
        assert!((f.elevation - KNOCKOUT_FLY_HEIGHT).abs() < 1e-3);

        f.advance_knockout(KNOCKOUT_DURATION);
        assert_eq!(f.state, LifecycleState::Eliminated);
        assert_eq!(f.elevation, 0.0);

        // Terminal: nothing moves it again
        let pos = f.pos;
        f.vel = Vec2::new(100.0, 0.0);
        assert_eq!(f.step_physics(FRAME_DT), BoundaryOutcome::Inside);
        f.begin_knockout();
        assert_eq!(f.pos, pos);
        assert_eq!(f.state, LifecycleState::Eliminated);
    }
}
