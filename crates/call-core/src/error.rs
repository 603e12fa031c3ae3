use llm_services::ServiceError;
use speech_io::{CaptureFault, SynthesisError};
use thiserror::Error;

pub type Result<T, E = CallError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
    #[error("unknown persona: {0}")]
    UnknownPersona(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Capture(#[from] CaptureFault),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error("metrics error: {0}")]
    Metrics(String),
    #[error("call runtime has shut down")]
    Closed,
}
