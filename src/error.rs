use thiserror::Error;

use crate::kernel::playback::PriorityTier;
use crate::kernel::session::TripId;

/// Rejected configuration. Fatal at trip start: no session runs with undefined pacing.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: String },

    #[error("{name} is not a valid number: {value:?}")]
    Unparseable { name: &'static str, value: String },

    #[error("{name} must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },

    #[error("unknown priority tier {value:?} for {name}")]
    UnknownTier { name: &'static str, value: String },

    #[error("{name} cannot use tier {tier:?}, it is reserved for external preemption")]
    ReservedTier { name: &'static str, tier: PriorityTier },
}

/// Failure of a remote capability (generation, synthesis, spatial audio, POI lookup, sinks).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service} timed out after {after_ms}ms")]
    Timeout { service: &'static str, after_ms: u64 },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("call cancelled")]
    Cancelled,
}

impl ServiceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ServiceError::Timeout { .. })
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("trip {0} has already ended")]
    TripEnded(TripId),
}
