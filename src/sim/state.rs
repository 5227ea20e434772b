//! Arena state and core simulation types
//!
//! Fighters are spawned once per arena load and never removed: elimination is
//! a terminal lifecycle state, not deallocation.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::clock::FrameClock;
use crate::ai::Action;
use crate::consts::*;
use crate::error::ControlError;

/// Fighter lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// In the fight: physics, AI and collisions apply
    Active,
    /// Flying out of the ring; purely cosmetic
    KnockoutAnimating,
    /// Terminal. Hidden, untouched by physics or AI
    Eliminated,
}

/// Validated personality profile name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileName(String);

impl ProfileName {
    pub const MAX_LEN: usize = 64;

    pub fn new(name: &str) -> Result<Self, ControlError> {
        let trimmed = name.trim();
        let valid_chars = trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'));
        if trimmed.is_empty() || trimmed.len() > Self::MAX_LEN || !valid_chars {
            return Err(ControlError::InvalidProfile(name.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProfileName {
    type Error = ControlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<ProfileName> for String {
    fn from(value: ProfileName) -> Self {
        value.0
    }
}

/// Who decides a fighter's movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Control {
    PlayerControlled,
    #[default]
    ScriptedAi,
    NamedProfile(ProfileName),
}

impl Control {
    /// Profile selector value meaning "no named profile"
    pub const DEFAULT_SELECTION: &'static str = "default";

    /// Parse a profile selection ("default" or a profile name)
    pub fn from_selection(selection: &str) -> Result<Self, ControlError> {
        if selection.trim().eq_ignore_ascii_case(Self::DEFAULT_SELECTION) {
            Ok(Control::ScriptedAi)
        } else {
            ProfileName::new(selection).map(Control::NamedProfile)
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self, Control::PlayerControlled)
    }

    pub fn profile(&self) -> Option<&ProfileName> {
        match self {
            Control::NamedProfile(name) => Some(name),
            _ => None,
        }
    }
}

/// Fighting temperament, rolled once at spawn
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Traits {
    /// Probability of attacking when the attack cooldown expires
    pub aggression: f32,
    /// Mean seconds between attack opportunities
    pub attack_frequency: f32,
}

impl Traits {
    pub fn roll(rng: &mut impl Rng) -> Self {
        Self {
            aggression: rng.random_range(AGGRESSION_MIN..=AGGRESSION_MAX),
            attack_frequency: rng.random_range(ATTACK_FREQUENCY_MIN..=ATTACK_FREQUENCY_MAX),
        }
    }
}

/// Scripted wander intent
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Wander {
    /// Seconds until the next re-roll
    pub timer: f32,
    pub direction: Vec2,
    pub speed: f32,
}

/// Knockout fly-out animation in progress
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KnockoutArc {
    pub start: Vec2,
    /// Outward direction from ring centre
    pub direction: Vec2,
    pub timer: f32,
}

/// Identity of one incarnation of a fighter
///
/// Async work issued for a fighter carries the token it was issued under; a
/// completion is applied only if the fighter still presents the same token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FighterToken {
    pub id: u32,
    /// Arena load the fighter belongs to
    pub epoch: u32,
    /// Bumped whenever the fighter leaves `Active`
    pub generation: u32,
}

/// A fighter in the ring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fighter {
    pub id: u32,
    pub name: String,
    /// Ring-plane position (x, z)
    pub pos: Vec2,
    pub vel: Vec2,
    /// Height above the mat; only the knockout arc lifts a fighter
    pub elevation: f32,
    pub health: f32,
    pub state: LifecycleState,
    pub control: Control,
    pub traits: Traits,
    /// Seconds during which knockback is ignored
    pub knockback_cooldown: f32,
    /// Seconds until the next AI attack opportunity
    pub attack_cooldown: f32,
    pub wander: Wander,
    pub knockout: Option<KnockoutArc>,
    /// Last action taken, as the learner would encode it
    pub last_action: Action,
    pub epoch: u32,
    pub generation: u32,
}

impl Fighter {
    pub fn new(id: u32, name: impl Into<String>, pos: Vec2, traits: Traits, epoch: u32) -> Self {
        Self {
            id,
            name: name.into(),
            pos,
            vel: Vec2::ZERO,
            elevation: 0.0,
            health: MAX_HEALTH,
            state: LifecycleState::Active,
            control: Control::ScriptedAi,
            traits,
            knockback_cooldown: 0.0,
            attack_cooldown: 0.0,
            wander: Wander::default(),
            knockout: None,
            last_action: Action::Idle,
            epoch,
            generation: 0,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active
    }

    pub fn token(&self) -> FighterToken {
        FighterToken {
            id: self.id,
            epoch: self.epoch,
            generation: self.generation,
        }
    }
}

/// Display name from an asset path (`Insert-GLBS/Big+Bob.glb` -> `BIG BOB`)
pub fn fighter_name_from_asset(path: &str) -> String {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let stem = file
        .strip_suffix(".glb")
        .or_else(|| file.strip_suffix(".GLB"))
        .unwrap_or(file);
    stem.replace('+', " ").to_uppercase()
}

/// Overall bout status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArenaPhase {
    Fighting,
    /// Exactly one fighter left standing
    Victory { champion: u32 },
    /// Nobody left standing
    Draw,
}

/// Per-fighter view handed to the renderer/UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FighterView {
    pub id: u32,
    pub name: String,
    pub pos: Vec2,
    pub elevation: f32,
    pub vel: Vec2,
    pub health: f32,
    pub state: LifecycleState,
    pub control: Control,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaSnapshot {
    pub phase: ArenaPhase,
    pub frame: u64,
    pub fighters: Vec<FighterView>,
}

/// Complete arena state for one arena load
#[derive(Debug, Clone)]
pub struct ArenaState {
    /// Seed for reproducibility
    pub seed: u64,
    /// Arena load counter; survives resets
    pub epoch: u32,
    pub phase: ArenaPhase,
    pub clock: FrameClock,
    /// Roster in spawn order (sorted by id)
    pub fighters: Vec<Fighter>,
    pub(crate) rng: Pcg32,
    next_id: u32,
}

impl ArenaState {
    /// Create an empty arena with the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            epoch: 0,
            phase: ArenaPhase::Fighting,
            clock: FrameClock::new(),
            fighters: Vec::new(),
            rng: Pcg32::seed_from_u64(seed),
            next_id: 1,
        }
    }

    /// Create an arena and spawn one fighter per roster asset
    pub fn from_roster<S: AsRef<str>>(roster: &[S], seed: u64) -> Self {
        let mut state = Self::new(seed);
        for asset in roster {
            state.spawn_fighter(fighter_name_from_asset(asset.as_ref()));
        }
        state
    }

    /// A fresh arena for a full reload
    ///
    /// Ids restart at 1 but the epoch moves on, so no token issued before the
    /// reload can match a fighter after it.
    pub fn reloaded<S: AsRef<str>>(&self, roster: &[S], seed: u64) -> Self {
        let mut next = Self::new(seed);
        next.epoch = self.epoch.wrapping_add(1);
        for asset in roster {
            next.spawn_fighter(fighter_name_from_asset(asset.as_ref()));
        }
        next
    }

    /// Spawn a fighter at a random spot inside the ring, returning its id
    pub fn spawn_fighter(&mut self, name: impl Into<String>) -> u32 {
        let id = self.next_id;
        self.next_id += 1;

        let half_spawn = RING_SIZE * SPAWN_FRACTION / 2.0;
        let pos = Vec2::new(
            self.rng.random_range(-half_spawn..=half_spawn),
            self.rng.random_range(-half_spawn..=half_spawn),
        );
        let traits = Traits::roll(&mut self.rng);
        self.fighters
            .push(Fighter::new(id, name, pos, traits, self.epoch));
        id
    }

    pub fn fighter(&self, id: u32) -> Option<&Fighter> {
        self.fighters.iter().find(|f| f.id == id)
    }

    pub fn fighter_mut(&mut self, id: u32) -> Option<&mut Fighter> {
        self.fighters.iter_mut().find(|f| f.id == id)
    }

    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.fighters.iter().position(|f| f.id == id)
    }

    pub fn active_count(&self) -> usize {
        self.fighters.iter().filter(|f| f.is_active()).count()
    }

    pub fn active_ids(&self) -> Vec<u32> {
        self.fighters
            .iter()
            .filter(|f| f.is_active())
            .map(|f| f.id)
            .collect()
    }

    /// The player-controlled fighter, if any
    pub fn player_id(&self) -> Option<u32> {
        self.fighters
            .iter()
            .find(|f| f.control.is_player())
            .map(|f| f.id)
    }

    /// Hand player control to `id`; the previous player fighter reverts to scripted AI
    pub fn assign_player(&mut self, id: u32) -> Result<(), ControlError> {
        let fighter = self.fighter(id).ok_or(ControlError::UnknownFighter(id))?;
        if !fighter.is_active() {
            return Err(ControlError::FighterNotActive(id));
        }

        for fighter in &mut self.fighters {
            if fighter.control.is_player() && fighter.id != id {
                fighter.control = Control::ScriptedAi;
            }
        }
        if let Some(fighter) = self.fighter_mut(id) {
            fighter.control = Control::PlayerControlled;
        }
        Ok(())
    }

    /// Set an AI control mode. Player control goes through `assign_player`
    pub fn set_control(&mut self, id: u32, control: Control) -> Result<(), ControlError> {
        if control.is_player() {
            return self.assign_player(id);
        }
        let fighter = self.fighter_mut(id).ok_or(ControlError::UnknownFighter(id))?;
        fighter.control = control;
        Ok(())
    }

    pub fn snapshot(&self) -> ArenaSnapshot {
        ArenaSnapshot {
            phase: self.phase,
            frame: self.clock.frame,
            fighters: self
                .fighters
                .iter()
                .map(|f| FighterView {
                    id: f.id,
                    name: f.name.clone(),
                    pos: f.pos,
                    elevation: f.elevation,
                    vel: f.vel,
                    health: f.health,
                    state: f.state,
                    control: f.control.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_within_ring_and_traits_in_range() {
        let roster = ["a.glb", "b.glb", "c.glb", "d.glb", "e.glb", "f.glb"];
        let state = ArenaState::from_roster(&roster, 42);
        assert_eq!(state.fighters.len(), 6);

        let half_spawn = RING_SIZE * SPAWN_FRACTION / 2.0;
        for (i, f) in state.fighters.iter().enumerate() {
            assert_eq!(f.id, i as u32 + 1);
            assert!(f.pos.x.abs() <= half_spawn && f.pos.y.abs() <= half_spawn);
            assert!((AGGRESSION_MIN..=AGGRESSION_MAX).contains(&f.traits.aggression));
            assert!(
                (ATTACK_FREQUENCY_MIN..=ATTACK_FREQUENCY_MAX).contains(&f.traits.attack_frequency)
            );
            assert_eq!(f.health, MAX_HEALTH);
            assert!(f.is_active());
        }
    }

    #[test]
    fn test_seeded_spawn_is_reproducible() {
        let roster = ["a.glb", "b.glb", "c.glb"];
        let s1 = ArenaState::from_roster(&roster, 7);
        let s2 = ArenaState::from_roster(&roster, 7);
        for (a, b) in s1.fighters.iter().zip(&s2.fighters) {
            assert_eq!(a.pos, b.pos);
            assert_eq!(a.traits, b.traits);
        }
    }

    #[test]
    fn test_reload_moves_epoch_on() {
        let state = ArenaState::from_roster(&["a", "b"], 7);
        let old_token = state.fighters[0].token();
        let next = state.reloaded(&["x", "y", "z"], 7);

        assert_eq!(next.epoch, 1);
        assert_eq!(next.fighters.len(), 3);
        assert_eq!(next.fighters[0].id, 1);
        assert_ne!(next.fighters[0].token(), old_token);
        assert_eq!(next.clock.frame, 0);
    }

    #[test]
    fn test_fighter_name_from_asset() {
        assert_eq!(fighter_name_from_asset("Insert-GLBS/Big+Bob.glb"), "BIG BOB");
        assert_eq!(fighter_name_from_asset("rex.glb"), "REX");
        assert_eq!(fighter_name_from_asset("plain"), "PLAIN");
    }

    #[test]
    fn test_single_player_control() {
        let mut state = ArenaState::from_roster(&["a", "b", "c"], 1);
        state.assign_player(1).unwrap();
        state.assign_player(3).unwrap();

        let players: Vec<_> = state
            .fighters
            .iter()
            .filter(|f| f.control.is_player())
            .map(|f| f.id)
            .collect();
        assert_eq!(players, vec![3]);
        assert_eq!(state.fighter(1).unwrap().control, Control::ScriptedAi);
    }

    #[test]
    fn test_assign_player_rejects_inactive_and_unknown() {
        let mut state = ArenaState::from_roster(&["a", "b"], 1);
        state.fighters[1].state = LifecycleState::Eliminated;
        assert_eq!(state.assign_player(2), Err(ControlError::FighterNotActive(2)));
        assert_eq!(state.assign_player(9), Err(ControlError::UnknownFighter(9)));
        assert_eq!(state.player_id(), None);
    }

    #[test]
    fn test_profile_selection() {
        assert_eq!(Control::from_selection("default"), Ok(Control::ScriptedAi));
        let named = Control::from_selection("Berserker_v2").unwrap();
        assert_eq!(named.profile().map(ProfileName::as_str), Some("Berserker_v2"));
        assert!(Control::from_selection("").is_err());
        assert!(Control::from_selection("../etc/passwd").is_err());
        assert!(Control::from_selection(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_profile_name_deserialization_validates() {
        let ok: Result<ProfileName, _> = serde_json::from_str("\"Tank\"");
        assert!(ok.is_ok());
        let bad: Result<ProfileName, _> = serde_json::from_str("\"bad/name\"");
        assert!(bad.is_err());
    }
}
