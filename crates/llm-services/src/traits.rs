use crate::{DialogueRequest, EvaluationOutcome, EvaluationRequest, Result};
use async_trait::async_trait;

/// Produces the counterpart's next line.
#[async_trait]
pub trait DialogueService: Send + Sync {
    async fn reply(&self, request: &DialogueRequest) -> Result<String>;

    fn name(&self) -> &str;
}

/// Scores a transcript against the sales rubric. Failures are returned as an error
/// payload rather than raised.
#[async_trait]
pub trait EvaluationService: Send + Sync {
    async fn evaluate(&self, request: &EvaluationRequest) -> EvaluationOutcome;

    fn name(&self) -> &str;
}
