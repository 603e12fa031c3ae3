//! llm-services: the counterpart dialogue and the rubric evaluation used by the call
//! trainer
//!
//! Both services speak the OpenAI-compatible chat-completions protocol (DeepSeek by
//! default). Scripted implementations are available behind the `mock` feature.

mod error;
pub use error::{Result, ServiceError};

mod types;
pub use types::{
    ChatConfig, DialogueRequest, EvaluationBlock, EvaluationFailure, EvaluationOutcome,
    EvaluationReport, EvaluationRequest, Speaker, Turn, NON_JSON_ERROR,
};

mod traits;
pub use traits::{DialogueService, EvaluationService};

pub mod prompt;

#[cfg(feature = "http")]
pub mod chat;

#[cfg(feature = "mock")]
pub mod mock;

use catalog::Catalog;
use std::sync::Arc;

/// Initialize the dialogue services
pub fn init() -> Result<()> {
    tracing::info!("Initializing dialogue services");
    Ok(())
}

/// Create the dialogue service named by `config.backend`
#[cfg_attr(not(feature = "http"), allow(unused_variables))]
pub fn create_dialogue_service(
    config: &ChatConfig,
    catalog: Arc<Catalog>,
) -> Result<Arc<dyn DialogueService>> {
    match config.backend.as_str() {
        #[cfg(feature = "mock")]
        "mock" => Ok(Arc::new(mock::ScriptedDialogue::new(Vec::<String>::new()))),
        #[cfg(feature = "http")]
        "chat" => Ok(Arc::new(chat::ChatDialogue::new(config.clone(), catalog)?)),
        other => Err(ServiceError::Config(format!(
            "unsupported dialogue backend: {other}"
        ))),
    }
}

/// Create the evaluation service named by `config.backend`
pub fn create_evaluation_service(config: &ChatConfig) -> Result<Arc<dyn EvaluationService>> {
    match config.backend.as_str() {
        #[cfg(feature = "mock")]
        "mock" => Ok(Arc::new(mock::ScriptedEvaluator::new())),
        #[cfg(feature = "http")]
        "chat" => Ok(Arc::new(chat::ChatEvaluator::new(config.clone())?)),
        other => Err(ServiceError::Config(format!(
            "unsupported evaluation backend: {other}"
        ))),
    }
}
