use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimulationError>;

#[derive(Debug, Error)]
pub enum SimulationError {
    /// Malformed or missing settings, unknown run mode, bad command line.
    #[error("configuration error: {0}")]
    Config(String),

    /// Propensity bookkeeping went out of sync with the network. Never recoverable.
    #[error("internal consistency error: {0}")]
    Inconsistency(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimulationError {
    pub fn config(msg: impl Into<String>) -> Self {
        SimulationError::Config(msg.into())
    }

    pub fn inconsistency(msg: impl Into<String>) -> Self {
        SimulationError::Inconsistency(msg.into())
    }
}
