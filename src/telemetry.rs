//! Episode and frame telemetry
//!
//! Everything here is best effort. Until the health probe succeeds every
//! operation is a no-op; frame submissions are fire-and-forget and failures
//! are only logged. Network calls run on the tokio runtime and report back
//! through a channel drained by `poll` at the start of each tick.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::backend::{ArenaBackend, EpisodeComplete, EpisodeCreate, EpisodeCreated, FighterStats};
use crate::episode::{EpisodeOutcome, FrameRecord};
use crate::error::BackendError;
use crate::settings::ArenaSettings;

/// Something the arena may want to react to
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// The health probe succeeded
    Connected,
    /// The backend assigned an id to the episode being started
    EpisodeStarted(u64),
    Stats { fighter_id: u32, stats: FighterStats },
}

enum Completion {
    Health(Result<(), BackendError>),
    Created {
        request: u64,
        result: Result<EpisodeCreated, BackendError>,
    },
    Stats {
        fighter_id: u32,
        result: Result<FighterStats, BackendError>,
    },
}

pub struct TelemetryClient {
    backend: Arc<dyn ArenaBackend>,
    runtime: Handle,
    sample_rate: u32,
    connected: bool,
    probing: bool,
    episode_id: Option<u64>,
    /// Ticks offered to `record_frame` since the episode started
    frame_counter: u64,
    /// Sequence number of the episode creation in flight
    pending_create: Option<u64>,
    next_request: u64,
    /// Completion requested before the backend answered the creation
    deferred_completion: Option<EpisodeComplete>,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
}

impl TelemetryClient {
    pub fn new(backend: Arc<dyn ArenaBackend>, runtime: Handle, settings: &ArenaSettings) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            backend,
            runtime,
            sample_rate: settings.sample_rate(),
            connected: false,
            probing: false,
            episode_id: None,
            frame_counter: 0,
            pending_create: None,
            next_request: 0,
            deferred_completion: None,
            tx,
            rx,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Backend id of the episode being recorded
    pub fn active_episode(&self) -> Option<u64> {
        self.episode_id
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Probe `/health`; the answer arrives through `poll`
    pub fn connect(&mut self) {
        if self.probing {
            return;
        }
        self.probing = true;
        let probe = self.backend.health();
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let _ = tx.send(Completion::Health(probe.await));
        });
    }

    /// Apply every completed network call
    pub fn poll(&mut self) -> Vec<TelemetryEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            match completion {
                Completion::Health(Ok(())) => {
                    self.probing = false;
                    if !self.connected {
                        log::info!("Backend connected");
                        self.connected = true;
                        events.push(TelemetryEvent::Connected);
                    }
                }
                Completion::Health(Err(e)) => {
                    self.probing = false;
                    self.connected = false;
                    log::warn!("Backend unavailable ({e}); running locally");
                }
                Completion::Created { request, result } => {
                    if self.pending_create != Some(request) {
                        log::debug!("Dropping stale episode creation #{request}");
                        continue;
                    }
                    self.pending_create = None;
                    match result {
                        Ok(created) => {
                            log::info!("Episode {} registered", created.id);
                            self.episode_id = Some(created.id);
                            events.push(TelemetryEvent::EpisodeStarted(created.id));
                            if let Some(body) = self.deferred_completion.take() {
                                self.send_completion(body);
                            }
                        }
                        Err(e) => {
                            log::warn!("Failed to create episode: {e}");
                            self.deferred_completion = None;
                        }
                    }
                }
                Completion::Stats { fighter_id, result } => match result {
                    Ok(stats) => {
                        log::info!(
                            "Fighter #{fighter_id}: win rate {:.1}%, avg reward {:.2} over {} episodes",
                            stats.win_rate * 100.0,
                            stats.avg_reward,
                            stats.total_episodes
                        );
                        events.push(TelemetryEvent::Stats { fighter_id, stats });
                    }
                    Err(e) => log::debug!("Could not fetch stats for #{fighter_id}: {e}"),
                },
            }
        }
        events
    }

    /// Register a new episode; returns false when offline
    pub fn start_episode(&mut self, request: EpisodeCreate) -> bool {
        if !self.connected {
            log::debug!("Backend offline; episode stays local");
            return false;
        }

        self.next_request += 1;
        let seq = self.next_request;
        self.pending_create = Some(seq);
        self.episode_id = None;
        self.deferred_completion = None;
        self.frame_counter = 0;

        let create = self.backend.create_episode(request);
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let result = create.await;
            let _ = tx.send(Completion::Created {
                request: seq,
                result,
            });
        });
        true
    }

    /// Offer one tick's frame; every Nth one is submitted
    ///
    /// Returns whether the frame was sent.
    pub fn record_frame(&mut self, mut frame: FrameRecord) -> bool {
        let Some(episode_id) = self.episode_id.filter(|_| self.connected) else {
            return false;
        };

        let slot = self.frame_counter;
        self.frame_counter += 1;
        if slot % u64::from(self.sample_rate) != 0 {
            return false;
        }

        frame.episode_id = episode_id;
        frame.frame_number = self.frame_counter;
        let submit = self.backend.submit_frame(frame);
        self.runtime.spawn(async move {
            if let Err(e) = submit.await {
                log::debug!("Frame submission failed: {e}");
            }
        });
        true
    }

    /// Report the outcome and forget the episode id
    pub fn complete_episode(&mut self, outcome: &EpisodeOutcome) {
        let body = outcome.to_wire();
        if self.episode_id.is_some() {
            self.send_completion(body);
        } else if self.pending_create.is_some() {
            log::debug!("Episode not registered yet; completion deferred");
            self.deferred_completion = Some(body);
        }
    }

    fn send_completion(&mut self, body: EpisodeComplete) {
        let Some(episode_id) = self.episode_id.take() else {
            return;
        };
        let complete = self.backend.complete_episode(episode_id, body);
        self.runtime.spawn(async move {
            match complete.await {
                Ok(()) => log::info!("Episode {episode_id} completed and saved"),
                Err(e) => log::warn!("Failed to complete episode {episode_id}: {e}"),
            }
        });
    }

    /// Fetch training progress for a fighter; logged when it arrives
    pub fn refresh_stats(&mut self, fighter_id: u32) {
        if !self.connected {
            return;
        }
        let fetch = self.backend.fighter_stats(fighter_id);
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let result = fetch.await;
            let _ = tx.send(Completion::Stats { fighter_id, result });
        });
    }

    /// Drop the episode without completing it
    pub fn reset(&mut self) {
        self.episode_id = None;
        self.pending_create = None;
        self.deferred_completion = None;
        self.frame_counter = 0;
    }
}
