use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Faults reported by a capture engine through its error callback.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CaptureFault {
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("speech capture not supported on this platform")]
    NotSupported,
    #[error("capture engine error: {0}")]
    Engine(String),
}

impl CaptureFault {
    /// Fatal faults cannot be cured by restarting the engine.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaptureFault::PermissionDenied | CaptureFault::NotSupported)
    }
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis engine error: {0}")]
    Engine(String),
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}
