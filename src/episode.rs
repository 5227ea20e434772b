//! Recorded bouts
//!
//! An episode follows one fighter (usually the player's) from the moment it is
//! started until exactly one fighter is left standing. The controller owns the
//! single episode of the process, shapes the recorded fighter's reward every
//! tick and produces the frame records and the final outcome.

use std::collections::BTreeSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::ai::Action;
use crate::backend::{EpisodeComplete, EpisodeCreate, EpisodeWireStatus};
use crate::consts::RING_SIZE;
use crate::error::ControlError;
use crate::observation::{Observation, ObservationEncoder};
use crate::reward::RewardShaper;
use crate::sim::state::{ArenaPhase, ArenaState, Fighter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodeStatus {
    /// Started locally; the backend has not (yet) assigned an id
    Pending,
    /// Registered with the backend
    Active,
    Completed,
}

/// How a bout ended
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeOutcome {
    pub winner_id: Option<u32>,
    pub duration_ticks: u64,
    /// Health of the recorded fighter at the end
    pub final_health: f32,
    pub player_won: bool,
}

impl EpisodeOutcome {
    pub fn to_wire(&self) -> EpisodeComplete {
        EpisodeComplete {
            status: EpisodeWireStatus::Completed,
            winner_id: self.winner_id,
            duration_frames: self.duration_ticks,
            final_health: self.final_health,
            player_won: self.player_won,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// Backend id, once assigned
    pub id: Option<u64>,
    pub controlled_fighter_id: u32,
    pub opponent_ids: BTreeSet<u32>,
    pub map_size: f32,
    pub status: EpisodeStatus,
    pub outcome: Option<EpisodeOutcome>,
    /// Ticks recorded so far
    pub ticks: u64,
}

impl Episode {
    pub fn is_open(&self) -> bool {
        self.status != EpisodeStatus::Completed
    }

    pub fn create_request(&self) -> EpisodeCreate {
        EpisodeCreate {
            fighter_id: self.controlled_fighter_id,
            opponents: self.opponent_ids.iter().copied().collect(),
            map_size: self.map_size,
        }
    }
}

/// One recorded tick of the recorded fighter
///
/// `episode_id` and `frame_number` are stamped by the telemetry client when
/// the frame is actually submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub episode_id: u64,
    pub fighter_id: u32,
    pub frame_number: u64,
    pub position: Vec2,
    pub health: f32,
    pub velocity: Vec2,
    pub observation_vector: Observation,
    pub action_taken: Action,
    pub reward_delta: f32,
    pub cumulative_reward: f32,
}

impl FrameRecord {
    pub fn capture(
        fighter: &Fighter,
        observation: Observation,
        reward_delta: f32,
        cumulative_reward: f32,
    ) -> Self {
        Self {
            episode_id: 0,
            fighter_id: fighter.id,
            frame_number: 0,
            position: fighter.pos,
            health: fighter.health,
            velocity: fighter.vel,
            observation_vector: observation,
            action_taken: fighter.last_action,
            reward_delta,
            cumulative_reward,
        }
    }
}

/// Owner of the process's single episode
#[derive(Debug, Clone, Default)]
pub struct EpisodeController {
    episode: Option<Episode>,
    shaper: RewardShaper,
}

impl EpisodeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn episode(&self) -> Option<&Episode> {
        self.episode.as_ref()
    }

    /// Whether an episode is started and not yet completed
    pub fn is_open(&self) -> bool {
        self.episode.as_ref().is_some_and(Episode::is_open)
    }

    /// Start recording `controlled_id` against every other living fighter
    pub fn begin(
        &mut self,
        state: &ArenaState,
        controlled_id: u32,
    ) -> Result<EpisodeCreate, ControlError> {
        if self.is_open() {
            return Err(ControlError::EpisodeAlreadyActive);
        }
        let fighter = state
            .fighter(controlled_id)
            .ok_or(ControlError::UnknownFighter(controlled_id))?;
        if !fighter.is_active() {
            return Err(ControlError::FighterNotActive(controlled_id));
        }

        let opponent_ids: BTreeSet<u32> = state
            .fighters
            .iter()
            .filter(|f| f.id != controlled_id && f.is_active())
            .map(|f| f.id)
            .collect();
        self.shaper.reset(fighter.health, opponent_ids.len());

        let episode = Episode {
            id: None,
            controlled_fighter_id: controlled_id,
            opponent_ids,
            map_size: RING_SIZE,
            status: EpisodeStatus::Pending,
            outcome: None,
            ticks: 0,
        };
        log::info!(
            "Episode started for fighter #{controlled_id} against {} opponents",
            episode.opponent_ids.len()
        );
        let request = episode.create_request();
        self.episode = Some(episode);
        Ok(request)
    }

    /// The backend accepted the episode
    pub fn attach_id(&mut self, id: u64) {
        if let Some(episode) = self.episode.as_mut() {
            episode.id = Some(id);
            if episode.status == EpisodeStatus::Pending {
                episode.status = EpisodeStatus::Active;
            }
        }
    }

    /// Shape this tick's reward and capture a frame for the recorded fighter
    pub fn record(&mut self, state: &ArenaState, encoder: &ObservationEncoder) -> Option<FrameRecord> {
        let episode = self.episode.as_mut().filter(|e| e.is_open())?;
        let fighter = state.fighter(episode.controlled_fighter_id)?;
        episode.ticks += 1;

        let live_opponents = state
            .fighters
            .iter()
            .filter(|f| episode.opponent_ids.contains(&f.id) && f.is_active())
            .count();
        let (delta, cumulative) = self.shaper.shape(fighter.health, live_opponents, fighter.pos);
        let observation = encoder.encode_fighter(fighter, &state.fighters);
        Some(FrameRecord::capture(fighter, observation, delta, cumulative))
    }

    /// Close the episode once the bout is won; returns the outcome exactly once
    ///
    /// A drawn bout leaves the episode open: it simply never completes.
    pub fn check_completion(&mut self, state: &ArenaState) -> Option<EpisodeOutcome> {
        let ArenaPhase::Victory { champion } = state.phase else {
            return None;
        };
        let episode = self.episode.as_mut().filter(|e| e.is_open())?;

        let final_health = state
            .fighter(episode.controlled_fighter_id)
            .map_or(0.0, |f| f.health);
        let outcome = EpisodeOutcome {
            winner_id: Some(champion),
            duration_ticks: episode.ticks,
            final_health,
            player_won: champion == episode.controlled_fighter_id,
        };
        episode.status = EpisodeStatus::Completed;
        episode.outcome = Some(outcome);
        log::info!(
            "Episode complete after {} ticks; winner #{champion}",
            episode.ticks
        );
        Some(outcome)
    }

    pub fn cumulative_reward(&self) -> f32 {
        self.shaper.cumulative()
    }

    /// Forget the episode without completing it
    pub fn clear(&mut self) {
        self.episode = None;
        self.shaper = RewardShaper::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::LifecycleState;

    fn arena() -> ArenaState {
        ArenaState::from_roster(&["a", "b", "c"], 21)
    }

    #[test]
    fn test_begin_collects_opponents() {
        let state = arena();
        let mut controller = EpisodeController::new();
        let request = controller.begin(&state, 2).unwrap();
        assert_eq!(request.fighter_id, 2);
        assert_eq!(request.opponents, vec![1, 3]);
        assert_eq!(request.map_size, RING_SIZE);
        assert_eq!(
            controller.episode().map(|e| e.status),
            Some(EpisodeStatus::Pending)
        );
    }

    #[test]
    fn test_single_open_episode() {
        let state = arena();
        let mut controller = EpisodeController::new();
        controller.begin(&state, 1).unwrap();
        assert_eq!(
            controller.begin(&state, 2),
            Err(ControlError::EpisodeAlreadyActive)
        );
        assert_eq!(
            EpisodeController::new().begin(&state, 9),
            Err(ControlError::UnknownFighter(9))
        );
    }

    #[test]
    fn test_frame_record_reflects_fighter() {
        let state = arena();
        let encoder = ObservationEncoder::default();
        let mut controller = EpisodeController::new();
        controller.begin(&state, 1).unwrap();

        let frame = controller.record(&state, &encoder).unwrap();
        let fighter = state.fighter(1).unwrap();
        assert_eq!(frame.position, fighter.pos);
        assert_eq!(frame.health, fighter.health);
        assert_eq!(frame.observation_vector, encoder.encode(&state.fighters, 1));

        // Serialized and parsed back, the record carries the same fields
        let json = serde_json::to_string(&frame).unwrap();
        let parsed: FrameRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_completion_once_on_victory() {
        let mut state = arena();
        let mut controller = EpisodeController::new();
        controller.begin(&state, 1).unwrap();
        controller.attach_id(55);
        controller.record(&state, &ObservationEncoder::default());

        assert!(controller.check_completion(&state).is_none());

        state.fighters[1].state = LifecycleState::Eliminated;
        state.fighters[2].state = LifecycleState::Eliminated;
        state.phase = ArenaPhase::Victory { champion: 1 };

        let outcome = controller.check_completion(&state).unwrap();
        assert!(outcome.player_won);
        assert_eq!(outcome.duration_ticks, 1);
        assert_eq!(outcome.to_wire().winner_id, Some(1));
        assert!(controller.check_completion(&state).is_none());
        assert!(controller.record(&state, &ObservationEncoder::default()).is_none());
        assert!(!controller.is_open());
    }

    #[test]
    fn test_draw_never_completes() {
        let mut state = arena();
        let mut controller = EpisodeController::new();
        controller.begin(&state, 3).unwrap();
        state.phase = ArenaPhase::Draw;
        assert!(controller.check_completion(&state).is_none());
        assert!(controller.is_open());
    }
}
