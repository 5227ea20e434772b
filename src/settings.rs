//! Arena runtime settings
//!
//! Persisted as JSON next to the binary. Ring geometry and combat tuning are
//! compile-time constants in `consts`; only service wiring and run control
//! live here.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Arena settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaSettings {
    // === Backend ===
    /// Base URL of the training/inference service
    pub backend_url: String,
    /// Let the learned policy drive non-player fighters when a model is available
    pub remote_ai: bool,
    /// Profile sent with inference requests for fighters without a named profile
    pub default_profile: Option<String>,
    /// Submit every Nth recorded frame
    pub frame_sample_rate: u32,
    /// Minimum gap between inference requests for one fighter
    pub inference_cooldown_ms: u64,
    /// Inference answers slower than this are dropped
    pub inference_timeout_ms: u64,
    /// Timeout for every other backend request
    pub request_timeout_ms: u64,

    // === Run control ===
    /// RNG seed; random when unset
    pub seed: Option<u64>,
    /// Pace the headless runner at 60 Hz instead of running flat out
    pub realtime: bool,
    /// Give up on a bout after this many ticks
    pub max_ticks: u64,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8001".to_string(),
            remote_ai: false,
            default_profile: None,
            frame_sample_rate: 6,
            inference_cooldown_ms: 100,
            inference_timeout_ms: 100,
            request_timeout_ms: 2000,

            seed: None,
            realtime: true,
            max_ticks: 5000,
        }
    }
}

impl ArenaSettings {
    /// Default settings file name
    pub const FILE_NAME: &'static str = "arena_settings.json";

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from `path` if it exists, otherwise defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load_from(path) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Using default settings");
                Self::default()
            }
            Err(e) => {
                log::warn!("Ignoring {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Override fields from `ARENA_*` environment variables
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override fields from a key lookup (`ARENA_BACKEND_URL`, `ARENA_REMOTE_AI`, `ARENA_SEED`)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("ARENA_BACKEND_URL").filter(|u| !u.trim().is_empty()) {
            self.backend_url = url.trim().to_string();
        }
        if let Some(flag) = lookup("ARENA_REMOTE_AI") {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.remote_ai = true,
                "0" | "false" | "no" | "off" => self.remote_ai = false,
                other => log::warn!("Ignoring ARENA_REMOTE_AI={other:?}"),
            }
        }
        if let Some(seed) = lookup("ARENA_SEED") {
            match seed.trim().parse() {
                Ok(seed) => self.seed = Some(seed),
                Err(_) => log::warn!("Ignoring ARENA_SEED={seed:?}"),
            }
        }
    }

    pub fn inference_cooldown(&self) -> Duration {
        Duration::from_millis(self.inference_cooldown_ms)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    /// Sample rate, never zero
    pub fn sample_rate(&self) -> u32 {
        self.frame_sample_rate.max(1)
    }
}
