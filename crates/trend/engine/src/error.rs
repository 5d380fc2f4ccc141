use thiserror::Error;
use trend_detection::DetectionError;
use trend_types::TrendId;

/// Errors surfaced by the engine and its collaborators.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid data point: {0}")]
    Validation(String),

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("invalid window: {days} days (must be positive)")]
    InvalidWindow { days: i64 },

    #[error("trend not found: {0}")]
    TrendNotFound(TrendId),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("detection error: {0}")]
    Detection(#[from] DetectionError),

    #[error("lock acquisition failed")]
    LockPoisoned,

    #[error("engine is shut down")]
    ShutDown,
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Persistence(format!("serialization failed: {e}"))
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(e: config::ConfigError) -> Self {
        EngineError::Config(e.to_string())
    }
}

/// Convenience type alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;
