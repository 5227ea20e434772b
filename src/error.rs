//! Error types
//!
//! None of these reach gameplay: the tick swallows backend failures and falls
//! back to scripted behaviour. They exist for callers that drive the backend
//! directly (setup, tooling, tests).

use thiserror::Error;

/// Failure talking to the training/inference backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed backend response: {0}")]
    Malformed(String),
    #[error("backend is offline")]
    Offline,
    #[error("backend request timed out")]
    Timeout,
}

/// Rejected control or episode operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("no fighter with id {0}")]
    UnknownFighter(u32),
    #[error("fighter {0} is no longer active")]
    FighterNotActive(u32),
    #[error("invalid profile name {0:?}")]
    InvalidProfile(String),
    #[error("no trained model is available")]
    NoModelAvailable,
    #[error("an episode is already active")]
    EpisodeAlreadyActive,
}

/// Failure loading or saving settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings are not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
