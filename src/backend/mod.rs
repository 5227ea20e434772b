//! Seam to the external training/inference service
//!
//! Every call returns a boxed `Send` future so implementations can be spawned
//! onto a tokio runtime and awaited off the tick. `HttpBackend` talks to the
//! real service; `OfflineBackend` fails every call and is what an arena runs
//! with when no service is configured.

mod http;

pub use http::HttpBackend;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::ai::Action;
use crate::episode::FrameRecord;
use crate::error::BackendError;
use crate::observation::Observation;

/// Boxed future returned by every backend call
pub type BackendFuture<T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'static>>;

/// Operations the arena needs from the training service
pub trait ArenaBackend: Send + Sync {
    /// `GET /health`
    fn health(&self) -> BackendFuture<()>;
    /// `GET /api/fighters/{id}/best-model`; `None` when nothing is trained yet
    fn best_model(&self, fighter_id: u32) -> BackendFuture<Option<ModelInfo>>;
    /// `POST /api/episodes`
    fn create_episode(&self, request: EpisodeCreate) -> BackendFuture<EpisodeCreated>;
    /// `PATCH /api/episodes/{id}`
    fn complete_episode(&self, episode_id: u64, body: EpisodeComplete) -> BackendFuture<()>;
    /// `POST /api/fight-frames`
    fn submit_frame(&self, frame: FrameRecord) -> BackendFuture<()>;
    /// `POST /api/fighters/{id}/inference`
    fn infer(&self, fighter_id: u32, request: InferenceRequest)
    -> BackendFuture<InferenceResponse>;
    /// `GET /api/fighter-profiles/{id}`
    fn list_profiles(&self, fighter_id: u32) -> BackendFuture<Vec<ProfileSummary>>;
    /// `GET /api/fighters/{id}/stats`
    fn fighter_stats(&self, fighter_id: u32) -> BackendFuture<FighterStats>;
    /// Available fighter asset paths
    fn list_assets(&self) -> BackendFuture<Vec<String>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeCreate {
    pub fighter_id: u32,
    pub opponents: Vec<u32>,
    pub map_size: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeCreated {
    pub id: u64,
}

/// Completion status; the service knows no other terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeWireStatus {
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeComplete {
    pub status: EpisodeWireStatus,
    pub winner_id: Option<u32>,
    pub duration_frames: u64,
    pub final_health: f32,
    pub player_won: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub observation: Observation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub action: Action,
    #[serde(default)]
    pub action_probs: Vec<f32>,
    #[serde(default)]
    pub model_info: Option<serde_json::Value>,
}

/// A trained model the service can serve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(alias = "version")]
    pub model_version: u32,
    #[serde(default)]
    pub win_rate: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub profile_name: String,
}

/// Training progress for one fighter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FighterStats {
    #[serde(default)]
    pub win_rate: f32,
    #[serde(default)]
    pub avg_reward: f32,
    #[serde(default)]
    pub total_episodes: u64,
    #[serde(default)]
    pub avg_episode_length: f32,
}

/// Backend used when no service is configured; every call fails with `Offline`
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineBackend;

fn offline<T: Send + 'static>() -> BackendFuture<T> {
    Box::pin(async { Err(BackendError::Offline) })
}

impl ArenaBackend for OfflineBackend {
    fn health(&self) -> BackendFuture<()> {
        offline()
    }

    fn best_model(&self, _fighter_id: u32) -> BackendFuture<Option<ModelInfo>> {
        offline()
    }

    fn create_episode(&self, _request: EpisodeCreate) -> BackendFuture<EpisodeCreated> {
        offline()
    }

    fn complete_episode(&self, _episode_id: u64, _body: EpisodeComplete) -> BackendFuture<()> {
        offline()
    }

    fn submit_frame(&self, _frame: FrameRecord) -> BackendFuture<()> {
        offline()
    }

    fn infer(
        &self,
        _fighter_id: u32,
        _request: InferenceRequest,
    ) -> BackendFuture<InferenceResponse> {
        offline()
    }

    fn list_profiles(&self, _fighter_id: u32) -> BackendFuture<Vec<ProfileSummary>> {
        offline()
    }

    fn fighter_stats(&self, _fighter_id: u32) -> BackendFuture<FighterStats> {
        offline()
    }

    fn list_assets(&self) -> BackendFuture<Vec<String>> {
        offline()
    }
}

/// In-memory backend recording every call, for tests
pub mod fake {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex, MutexGuard};
    use std::time::Duration;

    use super::*;

    /// What the fake has been asked to do
    #[derive(Debug, Default)]
    pub struct FakeLog {
        pub health_checks: usize,
        pub created: Vec<EpisodeCreate>,
        pub completed: Vec<(u64, EpisodeComplete)>,
        pub frames: Vec<FrameRecord>,
        pub inferences: Vec<(u32, InferenceRequest)>,
    }

    /// Scripted responses
    #[derive(Debug, Clone)]
    pub struct FakeConfig {
        pub online: bool,
        pub model: Option<ModelInfo>,
        pub next_episode_id: u64,
        /// Actions handed out by successive inference calls; idle when empty
        pub actions: VecDeque<Action>,
        pub inference_delay: Duration,
        pub fail_inference: bool,
        pub fail_create: bool,
        pub assets: Vec<String>,
        pub profiles: Vec<String>,
        pub stats: FighterStats,
    }

    impl Default for FakeConfig {
        fn default() -> Self {
            Self {
                online: true,
                model: Some(ModelInfo {
                    model_version: 3,
                    win_rate: 0.5,
                }),
                next_episode_id: 100,
                actions: VecDeque::new(),
                inference_delay: Duration::ZERO,
                fail_inference: false,
                fail_create: false,
                assets: Vec::new(),
                profiles: Vec::new(),
                stats: FighterStats::default(),
            }
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct FakeBackend {
        config: Arc<Mutex<FakeConfig>>,
        log: Arc<Mutex<FakeLog>>,
    }

    impl FakeBackend {
        pub fn new(config: FakeConfig) -> Self {
            Self {
                config: Arc::new(Mutex::new(config)),
                log: Arc::default(),
            }
        }

        pub fn offline() -> Self {
            Self::new(FakeConfig {
                online: false,
                ..FakeConfig::default()
            })
        }

        pub fn log(&self) -> MutexGuard<'_, FakeLog> {
            self.log.lock().unwrap_or_else(|e| e.into_inner())
        }

        pub fn config(&self) -> MutexGuard<'_, FakeConfig> {
            self.config.lock().unwrap_or_else(|e| e.into_inner())
        }

        fn online(&self) -> Result<(), BackendError> {
            if self.config().online {
                Ok(())
            } else {
                Err(BackendError::Offline)
            }
        }

        fn ready<T: Send + 'static>(&self, value: Result<T, BackendError>) -> BackendFuture<T> {
            let result = self.online().and(value);
            Box::pin(async move { result })
        }
    }

    impl ArenaBackend for FakeBackend {
        fn health(&self) -> BackendFuture<()> {
            self.log().health_checks += 1;
            self.ready(Ok(()))
        }

        fn best_model(&self, _fighter_id: u32) -> BackendFuture<Option<ModelInfo>> {
            let model = self.config().model.clone();
            self.ready(Ok(model))
        }

        fn create_episode(&self, request: EpisodeCreate) -> BackendFuture<EpisodeCreated> {
            if self.online().is_ok() {
                self.log().created.push(request);
            }
            let created = {
                let mut config = self.config();
                if config.fail_create {
                    Err(BackendError::Status {
                        status: 500,
                        body: "episode rejected".into(),
                    })
                } else {
                    let id = config.next_episode_id;
                    config.next_episode_id += 1;
                    Ok(EpisodeCreated { id })
                }
            };
            self.ready(created)
        }

        fn complete_episode(&self, episode_id: u64, body: EpisodeComplete) -> BackendFuture<()> {
            if self.online().is_ok() {
                self.log().completed.push((episode_id, body));
            }
            self.ready(Ok(()))
        }

        fn submit_frame(&self, frame: FrameRecord) -> BackendFuture<()> {
            if self.online().is_ok() {
                self.log().frames.push(frame);
            }
            self.ready(Ok(()))
        }

        fn infer(
            &self,
            fighter_id: u32,
            request: InferenceRequest,
        ) -> BackendFuture<InferenceResponse> {
            let online = self.online();
            if online.is_ok() {
                self.log().inferences.push((fighter_id, request));
            }
            let (delay, result) = {
                let mut config = self.config();
                let result = if config.fail_inference {
                    Err(BackendError::Status {
                        status: 500,
                        body: "inference failed".into(),
                    })
                } else {
                    let action = config.actions.pop_front().unwrap_or(Action::Idle);
                    Ok(InferenceResponse {
                        action,
                        action_probs: vec![0.1; crate::consts::ACTION_COUNT],
                        model_info: None,
                    })
                };
                (config.inference_delay, result)
            };
            let result = online.and(result);
            Box::pin(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            })
        }

        fn list_profiles(&self, _fighter_id: u32) -> BackendFuture<Vec<ProfileSummary>> {
            let profiles = self
                .config()
                .profiles
                .iter()
                .map(|name| ProfileSummary {
                    profile_name: name.clone(),
                })
                .collect();
            self.ready(Ok(profiles))
        }

        fn fighter_stats(&self, _fighter_id: u32) -> BackendFuture<FighterStats> {
            let stats = self.config().stats.clone();
            self.ready(Ok(stats))
        }

        fn list_assets(&self) -> BackendFuture<Vec<String>> {
            let assets = self.config().assets.clone();
            self.ready(Ok(assets))
        }
    }
}
