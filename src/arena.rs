//! The simulation context
//!
//! `Arena` owns everything one arena load needs (roster, clock and RNG, the
//! remote policy client, telemetry and the episode) and is passed explicitly
//! to whoever drives the loop. A tick never waits on the network: completed
//! requests are collected at the start of `step` and applied from there.

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::ai::{PolicyOverride, RemoteInferenceClient};
use crate::backend::ArenaBackend;
use crate::episode::{Episode, EpisodeController};
use crate::error::ControlError;
use crate::observation::ObservationEncoder;
use crate::settings::ArenaSettings;
use crate::sim::state::{ArenaSnapshot, ArenaState, Control};
use crate::sim::tick::{TickInput, TickReport, tick};
use crate::telemetry::{TelemetryClient, TelemetryEvent};

pub struct Arena {
    state: ArenaState,
    settings: ArenaSettings,
    encoder: ObservationEncoder,
    remote: RemoteInferenceClient,
    telemetry: TelemetryClient,
    episodes: EpisodeController,
}

impl Arena {
    pub fn new<S: AsRef<str>>(
        settings: ArenaSettings,
        backend: Arc<dyn ArenaBackend>,
        runtime: Handle,
        roster: &[S],
    ) -> Self {
        let seed = settings.seed.unwrap_or_else(rand::random);
        log::info!("Arena loaded with {} fighters (seed {seed})", roster.len());
        Self {
            state: ArenaState::from_roster(roster, seed),
            encoder: ObservationEncoder::default(),
            remote: RemoteInferenceClient::new(backend.clone(), runtime.clone(), &settings),
            telemetry: TelemetryClient::new(backend, runtime, &settings),
            episodes: EpisodeController::new(),
            settings,
        }
    }

    pub fn state(&self) -> &ArenaState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ArenaState {
        &mut self.state
    }

    pub fn settings(&self) -> &ArenaSettings {
        &self.settings
    }

    pub fn remote(&self) -> &RemoteInferenceClient {
        &self.remote
    }

    pub fn telemetry(&self) -> &TelemetryClient {
        &self.telemetry
    }

    pub fn episode(&self) -> Option<&Episode> {
        self.episodes.episode()
    }

    pub fn snapshot(&self) -> ArenaSnapshot {
        self.state.snapshot()
    }

    /// Probe the backend; the arena keeps running locally until it answers
    pub fn connect(&mut self) {
        self.telemetry.connect();
    }

    /// Advance one tick
    pub fn step(&mut self, input: &TickInput, dt: f32) -> TickReport {
        self.poll();

        let overrides: Option<&mut dyn PolicyOverride> = if self.remote.is_enabled() {
            Some(&mut self.remote)
        } else {
            None
        };
        let report = tick(&mut self.state, input, dt, overrides);

        if report.ticked {
            if let Some(frame) = self.episodes.record(&self.state, &self.encoder) {
                self.telemetry.record_frame(frame);
            }
        }

        if let Some(outcome) = self.episodes.check_completion(&self.state) {
            self.telemetry.complete_episode(&outcome);
            if let Some(episode) = self.episodes.episode() {
                self.telemetry.refresh_stats(episode.controlled_fighter_id);
            }
        }

        report
    }

    /// Apply every network completion that arrived since the last call
    pub fn poll(&mut self) {
        self.remote.poll();
        for event in self.telemetry.poll() {
            match event {
                TelemetryEvent::Connected => {
                    self.remote.refresh_model();
                    // An episode begun while offline gets registered now
                    if let Some(episode) = self
                        .episodes
                        .episode()
                        .filter(|e| e.is_open() && e.id.is_none())
                    {
                        self.telemetry.start_episode(episode.create_request());
                    }
                }
                TelemetryEvent::EpisodeStarted(id) => self.episodes.attach_id(id),
                TelemetryEvent::Stats { .. } => {}
            }
        }

        if self.settings.remote_ai && !self.remote.is_enabled() && self.remote.model().is_some() {
            // Cannot fail: a model is known
            let _ = self.remote.enable();
        }
    }

    /// Hand player control to `id`; starts an episode if none is running
    pub fn assign_player(&mut self, id: u32) -> Result<(), ControlError> {
        self.state.assign_player(id)?;
        if !self.episodes.is_open() {
            self.start_episode(id)?;
        }
        Ok(())
    }

    pub fn set_control(&mut self, id: u32, control: Control) -> Result<(), ControlError> {
        if control.is_player() {
            return self.assign_player(id);
        }
        self.state.set_control(id, control)
    }

    /// Apply a profile selection ("default" or a profile name)
    pub fn select_profile(&mut self, id: u32, selection: &str) -> Result<(), ControlError> {
        let control = Control::from_selection(selection)?;
        self.set_control(id, control)
    }

    /// Start recording `controlled_id`
    pub fn start_episode(&mut self, controlled_id: u32) -> Result<(), ControlError> {
        let request = self.episodes.begin(&self.state, controlled_id)?;
        self.telemetry.start_episode(request);
        Ok(())
    }

    pub fn enable_remote_ai(&mut self) -> Result<(), ControlError> {
        self.remote.enable()?;
        self.settings.remote_ai = true;
        Ok(())
    }

    pub fn disable_remote_ai(&mut self) {
        self.remote.disable();
        self.settings.remote_ai = false;
    }

    /// Full reload with a new roster
    ///
    /// The open episode is dropped without completion and every request in
    /// flight is forgotten.
    pub fn reset<S: AsRef<str>>(&mut self, roster: &[S]) {
        let seed = self.settings.seed.unwrap_or_else(rand::random);
        self.state = self.state.reloaded(roster, seed);
        self.remote.reset();
        self.telemetry.reset();
        self.episodes.clear();
        log::info!(
            "Arena reloaded with {} fighters (epoch {})",
            roster.len(),
            self.state.epoch
        );
    }
}
