use thiserror::Error;

pub type Result<T, E = ServiceError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unknown persona: {0}")]
    UnknownPersona(String),
    #[error("HTTP {status}: {details}")]
    Status { status: u16, details: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Transport(err.to_string())
    }
}
