//! One simulation tick
//!
//! Per Active fighter, in roster order: decision (player input, or scripted
//! wander possibly overridden by a ready remote decision), attack sub-policy,
//! physics with the elimination test, cooldown decay. Fighters already flying
//! out only advance their knockout arc. Then the collision pass and the
//! victory check.

use glam::Vec2;

use super::collision::resolve_collisions;
use super::physics::BoundaryOutcome;
use super::state::{ArenaPhase, ArenaState, LifecycleState};
use crate::ai::{Action, PolicyOverride, Strike, execute_action, scripted, strike_nearest};
use crate::consts::*;

/// Input commands for a single tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Desired movement of the player fighter on the ring plane; normalized
    pub movement: Option<Vec2>,
    /// Player attack (nearest opponent within the player's reach)
    pub attack: bool,
}

/// What happened during a tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// False when the bout is already decided and nothing moved
    pub ticked: bool,
    pub frame: u64,
    /// Clamped delta time actually simulated
    pub dt: f32,
    pub strikes: Vec<Strike>,
    /// Fighters that entered `KnockoutAnimating` this tick
    pub knockouts: Vec<u32>,
    pub contacts: usize,
    /// Set on the tick the bout was decided
    pub decided: Option<ArenaPhase>,
}

/// Advance the arena by one tick
pub fn tick(
    state: &mut ArenaState,
    input: &TickInput,
    dt: f32,
    mut overrides: Option<&mut dyn PolicyOverride>,
) -> TickReport {
    if state.phase != ArenaPhase::Fighting {
        return TickReport {
            frame: state.clock.frame,
            ..TickReport::default()
        };
    }

    let dt = state.clock.advance(dt);
    let now = state.clock.elapsed;
    let mut report = TickReport {
        ticked: true,
        frame: state.clock.frame,
        dt,
        ..TickReport::default()
    };

    let fighters = &mut state.fighters;
    let rng = &mut state.rng;

    for i in 0..fighters.len() {
        match fighters[i].state {
            LifecycleState::Eliminated => continue,
            LifecycleState::KnockoutAnimating => {
                fighters[i].advance_knockout(dt);
                continue;
            }
            LifecycleState::Active => {}
        }

        let mut strikes: Vec<Strike> = Vec::new();
        let action = if fighters[i].control.is_player() {
            if let Some(source) = overrides.as_deref_mut() {
                source.release(fighters[i].id);
            }
            if let Some(dir) = input.movement {
                let dir = dir.normalize_or_zero();
                if dir != Vec2::ZERO {
                    fighters[i].vel = dir * PLAYER_MOVE_SPEED;
                }
            }
            if input.attack {
                strikes.extend(strike_nearest(fighters, i, PLAYER_ATTACK_RANGE));
                Action::Attack
            } else {
                Action::from_velocity(fighters[i].vel)
            }
        } else {
            scripted::wander(fighters, i, dt, rng);
            let mut action = Action::from_velocity(fighters[i].vel);

            if let Some(source) = overrides.as_deref_mut() {
                if let Some(remote) = source.take_decision(&fighters[i]) {
                    strikes.extend(execute_action(fighters, i, remote));
                    action = remote;
                }
                source.request(fighters, i, now);
            }

            if let Some(strike) = scripted::attack_tick(fighters, i, dt, rng) {
                strikes.push(strike);
                action = Action::Attack;
            }
            action
        };
        fighters[i].last_action = action;

        for strike in &strikes {
            if strike.knocked_out {
                report.knockouts.push(strike.target);
            }
        }
        report.strikes.extend(strikes);

        if fighters[i].step_physics(dt) == BoundaryOutcome::RingOut {
            report.knockouts.push(fighters[i].id);
        }
    }

    report.contacts = resolve_collisions(fighters).len();

    if !fighters.is_empty() {
        let mut standing = fighters.iter().filter(|f| f.is_active());
        let decided = match (standing.next(), standing.next()) {
            (Some(champion), None) => Some(ArenaPhase::Victory {
                champion: champion.id,
            }),
            (None, _) => Some(ArenaPhase::Draw),
            _ => None,
        };
        if let Some(phase) = decided {
            if let ArenaPhase::Victory { champion } = phase {
                log::info!("Fighter #{champion} is the last one standing");
            } else {
                log::info!("No fighter left standing");
            }
            state.phase = phase;
            report.decided = Some(phase);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::Control;

    const ROSTER: [&str; 4] = ["Insert-GLBS/a.glb", "b.glb", "c.glb", "d.glb"];

    #[test]
    fn test_scripted_fighters_always_have_velocity() {
        let mut state = ArenaState::from_roster(&ROSTER, 12345);
        for _ in 0..2 {
            tick(&mut state, &TickInput::default(), FRAME_DT, None);
            for f in state.fighters.iter().filter(|f| f.is_active()) {
                assert!(f.vel.is_finite());
                assert!(f.vel.length() > 0.0, "fighter {} has no velocity", f.id);
            }
        }
    }

    #[test]
    fn test_determinism() {
        let mut state1 = ArenaState::from_roster(&ROSTER, 99999);
        let mut state2 = ArenaState::from_roster(&ROSTER, 99999);

        for _ in 0..600 {
            tick(&mut state1, &TickInput::default(), FRAME_DT, None);
            tick(&mut state2, &TickInput::default(), FRAME_DT, None);
        }

        assert_eq!(state1.clock.frame, state2.clock.frame);
        assert_eq!(state1.phase, state2.phase);
        for (a, b) in state1.fighters.iter().zip(&state2.fighters) {
            assert_eq!(a.pos, b.pos);
            assert_eq!(a.health, b.health);
            assert_eq!(a.state, b.state);
        }
    }

    #[test]
    fn test_fighter_outside_ring_knocked_out_next_tick() {
        let mut state = ArenaState::from_roster(&ROSTER, 1);
        state.fighters[0].pos = Vec2::new(140.0, 0.0);
        let report = tick(&mut state, &TickInput::default(), FRAME_DT, None);
        assert!(report.knockouts.contains(&1));
        assert_eq!(state.fighters[0].state, LifecycleState::KnockoutAnimating);
        assert_eq!(
            report.knockouts.iter().filter(|id| **id == 1).count(),
            1,
            "knocked out twice"
        );
    }

    #[test]
    fn test_last_fighter_standing_wins() {
        let mut state = ArenaState::from_roster(&ROSTER, 2);
        for f in state.fighters.iter_mut().skip(1) {
            f.state = LifecycleState::Eliminated;
        }
        let report = tick(&mut state, &TickInput::default(), FRAME_DT, None);
        assert_eq!(report.decided, Some(ArenaPhase::Victory { champion: 1 }));
        assert_eq!(state.phase, ArenaPhase::Victory { champion: 1 });

        // Decided bouts no longer tick
        let frame = state.clock.frame;
        let report = tick(&mut state, &TickInput::default(), FRAME_DT, None);
        assert!(!report.ticked);
        assert_eq!(state.clock.frame, frame);
    }

    #[test]
    fn test_player_moves_with_input() {
        let mut state = ArenaState::from_roster(&["a", "b"], 3);
        // Out of each other's reach
        state.fighters[0].pos = Vec2::new(-60.0, 0.0);
        state.fighters[1].pos = Vec2::new(60.0, 0.0);
        state.assign_player(1).unwrap();

        let input = TickInput {
            movement: Some(Vec2::new(0.0, 2.0)),
            attack: false,
        };
        tick(&mut state, &input, FRAME_DT, None);
        let player = state.fighter(1).unwrap();
        // Set to 60 then one friction step
        assert!((player.vel.y - PLAYER_MOVE_SPEED * FRICTION).abs() < 1e-3);
        assert_eq!(player.last_action, Action::Move(0));
    }

    #[test]
    fn test_player_attack_reach() {
        let mut state = ArenaState::from_roster(&["a", "b"], 3);
        state.fighters[0].pos = Vec2::new(-25.0, 0.0);
        state.fighters[1].pos = Vec2::new(25.0, 0.0);
        state.fighters[1].traits.aggression = 0.3;
        state.set_control(1, Control::PlayerControlled).unwrap();

        let input = TickInput {
            movement: None,
            attack: true,
        };
        let report = tick(&mut state, &input, FRAME_DT, None);
        assert!(
            report
                .strikes
                .iter()
                .any(|s| s.attacker == 1 && s.target == 2)
        );
        assert_eq!(state.fighter(1).unwrap().last_action, Action::Attack);
    }

    #[test]
    fn test_oversized_dt_is_clamped() {
        let mut state = ArenaState::from_roster(&ROSTER, 4);
        let report = tick(&mut state, &TickInput::default(), 5.0, None);
        assert_eq!(report.dt, MAX_FRAME_DT);
    }

    struct AlwaysIdle {
        requests: usize,
    }

    impl PolicyOverride for AlwaysIdle {
        fn take_decision(&mut self, fighter: &crate::sim::state::Fighter) -> Option<Action> {
            fighter.is_active().then_some(Action::Idle)
        }

        fn request(&mut self, _fighters: &[crate::sim::state::Fighter], _index: usize, _now: f64) {
            self.requests += 1;
        }
    }

    #[test]
    fn test_override_replaces_scripted_movement() {
        let mut state = ArenaState::from_roster(&["a", "b"], 5);
        state.fighters[0].pos = Vec2::new(-60.0, 0.0);
        state.fighters[1].pos = Vec2::new(60.0, 0.0);
        state.assign_player(2).unwrap();

        let mut source = AlwaysIdle { requests: 0 };
        tick(&mut state, &TickInput::default(), FRAME_DT, Some(&mut source));

        assert_eq!(source.requests, 1);
        let f = state.fighter(1).unwrap();
        // Wander set a velocity of at least 20; idle damped it, friction once more
        assert!(f.vel.length() < WANDER_SPEED_MAX * IDLE_DAMPING * FRICTION + 1e-3);
        assert!(matches!(f.last_action, Action::Idle | Action::Attack));
    }
}
