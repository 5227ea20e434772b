//! Learned-policy override through the backend's inference endpoint
//!
//! Requests are issued without blocking the tick and throttled per fighter:
//! at most one in flight, and no new one within the cooldown of the last.
//! Each request carries the fighter's token; an answer is applied only on a
//! later tick and only if the fighter still presents that token and is still
//! Active. Failures of any kind leave the scripted decision in place.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use super::{Action, PolicyOverride};
use crate::backend::{ArenaBackend, InferenceRequest, InferenceResponse, ModelInfo};
use crate::error::{BackendError, ControlError};
use crate::observation::ObservationEncoder;
use crate::settings::ArenaSettings;
use crate::sim::state::{Fighter, FighterToken, ProfileName};

/// Fighter whose best model the service is asked about
const MODEL_FIGHTER_ID: u32 = 1;

/// A decision returned by the learned policy
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDecision {
    pub action: Action,
    pub probs: Vec<f32>,
    pub model_info: Option<serde_json::Value>,
}

impl From<InferenceResponse> for RemoteDecision {
    fn from(response: InferenceResponse) -> Self {
        Self {
            action: response.action,
            probs: response.action_probs,
            model_info: response.model_info,
        }
    }
}

enum RemoteEvent {
    Inference {
        token: FighterToken,
        result: Result<InferenceResponse, BackendError>,
    },
    Model(Result<Option<ModelInfo>, BackendError>),
}

pub struct RemoteInferenceClient {
    backend: Arc<dyn ArenaBackend>,
    runtime: Handle,
    enabled: bool,
    model: Option<ModelInfo>,
    cooldown: f64,
    timeout: Duration,
    default_profile: Option<ProfileName>,
    encoder: ObservationEncoder,
    /// Simulation time of each fighter's last request
    last_issued: HashMap<u32, f64>,
    in_flight: HashMap<u32, FighterToken>,
    ready: HashMap<u32, (FighterToken, RemoteDecision)>,
    tx: UnboundedSender<RemoteEvent>,
    rx: UnboundedReceiver<RemoteEvent>,
}

impl RemoteInferenceClient {
    pub fn new(backend: Arc<dyn ArenaBackend>, runtime: Handle, settings: &ArenaSettings) -> Self {
        let default_profile = settings
            .default_profile
            .as_deref()
            .and_then(|name| match ProfileName::new(name) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    log::warn!("Ignoring default profile: {e}");
                    None
                }
            });
        let (tx, rx) = unbounded_channel();
        Self {
            backend,
            runtime,
            enabled: false,
            model: None,
            cooldown: settings.inference_cooldown().as_secs_f64(),
            timeout: settings.inference_timeout(),
            default_profile,
            encoder: ObservationEncoder::default(),
            last_issued: HashMap::new(),
            in_flight: HashMap::new(),
            ready: HashMap::new(),
            tx,
            rx,
        }
    }

    /// Ask the service for its best model; the answer arrives through `poll`
    pub fn refresh_model(&mut self) {
        let fetch = self.backend.best_model(MODEL_FIGHTER_ID);
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let _ = tx.send(RemoteEvent::Model(fetch.await));
        });
    }

    /// Turn remote mode on; needs a known model
    pub fn enable(&mut self) -> Result<(), ControlError> {
        let model = self.model.as_ref().ok_or(ControlError::NoModelAvailable)?;
        if !self.enabled {
            log::info!(
                "Remote AI enabled (model v{}, win rate {:.1}%)",
                model.model_version,
                model.win_rate * 100.0
            );
        }
        self.enabled = true;
        Ok(())
    }

    pub fn disable(&mut self) {
        if self.enabled {
            log::info!("Remote AI disabled; scripted policy only");
        }
        self.enabled = false;
        self.ready.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn model(&self) -> Option<&ModelInfo> {
        self.model.as_ref()
    }

    /// Requests currently awaiting an answer
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Collect answers that arrived since the last tick
    pub fn poll(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            match event {
                RemoteEvent::Model(Ok(Some(model))) => {
                    log::info!(
                        "Trained model v{} available (win rate {:.1}%)",
                        model.model_version,
                        model.win_rate * 100.0
                    );
                    self.model = Some(model);
                }
                RemoteEvent::Model(Ok(None)) => log::info!("No trained model available yet"),
                RemoteEvent::Model(Err(e)) => log::debug!("Could not load trained model: {e}"),
                RemoteEvent::Inference { token, result } => {
                    if self.in_flight.get(&token.id) != Some(&token) {
                        log::debug!("Dropping stale inference for fighter #{}", token.id);
                        continue;
                    }
                    self.in_flight.remove(&token.id);
                    match result {
                        Ok(response) if self.enabled => {
                            self.ready.insert(token.id, (token, response.into()));
                        }
                        Ok(_) => {}
                        Err(e) => log::debug!("Inference for fighter #{} failed: {e}", token.id),
                    }
                }
            }
        }
    }

    /// Forget every request; answers still on the wire will be dropped
    pub fn reset(&mut self) {
        self.last_issued.clear();
        self.in_flight.clear();
        self.ready.clear();
    }
}

impl PolicyOverride for RemoteInferenceClient {
    fn take_decision(&mut self, fighter: &Fighter) -> Option<Action> {
        if !self.enabled {
            return None;
        }
        let (token, decision) = self.ready.remove(&fighter.id)?;
        if token != fighter.token() || !fighter.is_active() {
            log::debug!("Discarding decision for changed fighter #{}", fighter.id);
            return None;
        }
        Some(decision.action)
    }

    fn request(&mut self, fighters: &[Fighter], index: usize, now: f64) {
        if !self.enabled || self.model.is_none() {
            return;
        }
        let fighter = &fighters[index];
        if fighter.control.is_player() || !fighter.is_active() {
            return;
        }
        if self.in_flight.contains_key(&fighter.id) {
            return;
        }
        if let Some(last) = self.last_issued.get(&fighter.id) {
            if now - last < self.cooldown {
                return;
            }
        }

        let token = fighter.token();
        let request = InferenceRequest {
            observation: self.encoder.encode_fighter(fighter, fighters),
            profile_name: fighter
                .control
                .profile()
                .or(self.default_profile.as_ref())
                .map(|p| p.as_str().to_string()),
        };
        self.last_issued.insert(fighter.id, now);
        self.in_flight.insert(fighter.id, token);

        let call = self.backend.infer(fighter.id, request);
        let timeout = self.timeout;
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout),
            };
            let _ = tx.send(RemoteEvent::Inference { token, result });
        });
    }

    fn release(&mut self, fighter_id: u32) {
        self.in_flight.remove(&fighter_id);
        self.ready.remove(&fighter_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{FakeBackend, FakeConfig};
    use crate::consts::FRAME_DT;
    use crate::sim::state::{ArenaState, Control, Traits};
    use crate::sim::tick::{TickInput, tick};
    use glam::Vec2;
    use std::time::Instant;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    fn fighters() -> Vec<Fighter> {
        let traits = Traits {
            aggression: 0.5,
            attack_frequency: 2.0,
        };
        vec![
            Fighter::new(1, "A", Vec2::new(-30.0, 0.0), traits, 0),
            Fighter::new(2, "B", Vec2::new(30.0, 0.0), traits, 0),
        ]
    }

    fn connected_client(fake: &FakeBackend, rt: &tokio::runtime::Runtime) -> RemoteInferenceClient {
        let settings = ArenaSettings {
            inference_timeout_ms: 500,
            ..ArenaSettings::default()
        };
        let mut client =
            RemoteInferenceClient::new(Arc::new(fake.clone()), rt.handle().clone(), &settings);
        client.refresh_model();
        wait_until(|| {
            client.poll();
            client.model().is_some()
        });
        client
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if done() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("timed out");
    }

    #[test]
    fn test_enable_requires_model() {
        let rt = runtime();
        let fake = FakeBackend::new(FakeConfig {
            model: None,
            ..FakeConfig::default()
        });
        let mut client =
            RemoteInferenceClient::new(Arc::new(fake), rt.handle().clone(), &ArenaSettings::default());
        assert_eq!(client.enable(), Err(ControlError::NoModelAvailable));
        assert!(!client.is_enabled());
    }

    #[test]
    fn test_decision_applied_on_later_poll() {
        let rt = runtime();
        let fake = FakeBackend::default();
        fake.config().actions.push_back(Action::Move(2));
        let mut client = connected_client(&fake, &rt);
        client.enable().unwrap();

        let fighters = fighters();
        client.request(&fighters, 0, 0.0);
        assert_eq!(client.in_flight(), 1);
        // Nothing is ready on the tick the request went out
        assert_eq!(client.take_decision(&fighters[0]), None);

        wait_until(|| {
            client.poll();
            client.in_flight() == 0
        });
        assert_eq!(client.take_decision(&fighters[0]), Some(Action::Move(2)));
        assert_eq!(client.take_decision(&fighters[0]), None);
    }

    #[test]
    fn test_cooldown_and_single_in_flight() {
        let rt = runtime();
        let fake = FakeBackend::default();
        let mut client = connected_client(&fake, &rt);
        client.enable().unwrap();
        let fighters = fighters();

        client.request(&fighters, 0, 1.0);
        client.request(&fighters, 0, 1.5);
        wait_until(|| {
            client.poll();
            client.in_flight() == 0
        });
        // Answered, but still within 100 ms of the last request
        client.request(&fighters, 0, 1.05);
        assert_eq!(client.in_flight(), 0);
        client.request(&fighters, 0, 1.2);
        assert_eq!(client.in_flight(), 1);
        assert_eq!(fake.log().inferences.len(), 2);
    }

    #[test]
    fn test_stale_result_discarded_after_knockout() {
        let rt = runtime();
        let fake = FakeBackend::default();
        fake.config().actions.push_back(Action::Attack);
        let mut client = connected_client(&fake, &rt);
        client.enable().unwrap();

        let mut fighters = fighters();
        client.request(&fighters, 1, 0.0);
        fighters[1].begin_knockout();
        wait_until(|| {
            client.poll();
            client.in_flight() == 0
        });
        assert_eq!(client.take_decision(&fighters[1]), None);
    }

    #[test]
    fn test_decision_for_previous_load_discarded() {
        let rt = runtime();
        let fake = FakeBackend::default();
        fake.config().actions.push_back(Action::Move(6));
        let mut client = connected_client(&fake, &rt);
        client.enable().unwrap();

        let mut fighters = fighters();
        client.request(&fighters, 0, 0.0);
        wait_until(|| {
            client.poll();
            client.in_flight() == 0
        });
        // Same id and generation, next arena load
        fighters[0].epoch += 1;
        assert!(fighters[0].is_active());
        assert_eq!(client.take_decision(&fighters[0]), None);
    }

    #[test]
    fn test_answer_arriving_after_reset_is_ignored() {
        let rt = runtime();
        let fake = FakeBackend::new(FakeConfig {
            inference_delay: Duration::from_millis(50),
            ..FakeConfig::default()
        });
        fake.config().actions.push_back(Action::Move(6));
        let mut client = connected_client(&fake, &rt);
        client.enable().unwrap();

        let fighters = fighters();
        client.request(&fighters, 0, 0.0);
        client.reset();
        std::thread::sleep(Duration::from_millis(200));
        client.poll();
        assert_eq!(client.take_decision(&fighters[0]), None);
    }

    #[test]
    fn test_player_takeover_drops_pending_decision() {
        let rt = runtime();
        let fake = FakeBackend::default();
        fake.config().actions.push_back(Action::Move(6));
        let mut client = connected_client(&fake, &rt);
        client.enable().unwrap();

        let mut state = ArenaState::from_roster(&["a.glb", "b.glb"], 3);
        state.fighters[0].pos = Vec2::new(-60.0, 0.0);
        state.fighters[1].pos = Vec2::new(60.0, 0.0);
        client.request(&state.fighters, 1, 0.0);
        wait_until(|| {
            client.poll();
            client.in_flight() == 0
        });

        state.fighters[1].control = Control::PlayerControlled;
        tick(
            &mut state,
            &TickInput::default(),
            FRAME_DT,
            Some(&mut client as &mut dyn PolicyOverride),
        );
        state.fighters[1].control = Control::ScriptedAi;
        assert!(state.fighters[1].is_active());
        assert_eq!(client.take_decision(&state.fighters[1]), None);
    }

    #[test]
    fn test_failures_and_timeouts_fall_back_silently() {
        let rt = runtime();
        let fake = FakeBackend::new(FakeConfig {
            fail_inference: true,
            ..FakeConfig::default()
        });
        let mut client = connected_client(&fake, &rt);
        client.enable().unwrap();
        let fighters = fighters();
        client.request(&fighters, 0, 0.0);
        wait_until(|| {
            client.poll();
            client.in_flight() == 0
        });
        assert_eq!(client.take_decision(&fighters[0]), None);

        let slow = FakeBackend::new(FakeConfig {
            inference_delay: Duration::from_secs(5),
            ..FakeConfig::default()
        });
        let mut client = connected_client(&slow, &rt);
        client.enable().unwrap();
        client.request(&fighters, 0, 0.0);
        wait_until(|| {
            client.poll();
            client.in_flight() == 0
        });
        assert_eq!(client.take_decision(&fighters[0]), None);
    }

    #[test]
    fn test_profile_name_sent_with_request() {
        let rt = runtime();
        let fake = FakeBackend::default();
        let mut client = connected_client(&fake, &rt);
        client.enable().unwrap();

        let mut fighters = fighters();
        fighters[0].control = Control::from_selection("Berserker").unwrap();
        fighters[1].control = Control::PlayerControlled;
        client.request(&fighters, 0, 0.0);
        client.request(&fighters, 1, 0.0);

        let log = fake.log();
        assert_eq!(log.inferences.len(), 1);
        assert_eq!(log.inferences[0].0, 1);
        assert_eq!(log.inferences[0].1.profile_name.as_deref(), Some("Berserker"));
    }
}
