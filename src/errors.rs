use thiserror::Error;

#[derive(Debug, Error)]
pub enum PvError {
    #[error("{0}")]
    Argument(String),
    #[error("invalid timeframe: {0}")]
    InvalidRange(String),
    #[error("invalid resolution '{0}' (expected one of: 1min, 10min, 20min, 30min, 1H)")]
    InvalidResolution(String),
    #[error("unknown timezone '{0}'")]
    TimezoneResolution(String),
    #[error("solar model error: {0}")]
    Model(String),
    #[error("failed to load config {path}: {reason}")]
    Config { path: String, reason: String },
    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),
}

impl PvError {
    pub fn argument(message: impl Into<String>) -> Self {
        PvError::Argument(message.into())
    }

    pub fn model(message: impl Into<String>) -> Self {
        PvError::Model(message.into())
    }
}

pub type PvResult<T> = Result<T, PvError>;
