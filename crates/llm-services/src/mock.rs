//! Scripted dialogue and evaluation services for development and testing

use crate::prompt::RUBRIC;
use crate::{
    DialogueRequest, DialogueService, EvaluationBlock, EvaluationOutcome, EvaluationReport,
    EvaluationRequest, EvaluationService, Result, ServiceError, Speaker,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

const CANNED_REPLY: &str = "Понятно. А что вы можете предложить?";

/// Replies from a fixed queue, then a canned line once the queue is exhausted.
pub struct ScriptedDialogue {
    replies: Mutex<VecDeque<String>>,
    latency: Duration,
    fail_with: Option<String>,
    calls: Mutex<Vec<DialogueRequest>>,
}

impl ScriptedDialogue {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            latency: Duration::ZERO,
            fail_with: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with a transport error.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Self::new(Vec::<String>::new())
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Requests received so far.
    pub fn calls(&self) -> Vec<DialogueRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl DialogueService for ScriptedDialogue {
    async fn reply(&self, request: &DialogueRequest) -> Result<String> {
        self.calls.lock().push(request.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(reason) = &self.fail_with {
            return Err(ServiceError::Transport(reason.clone()));
        }
        let next = self.replies.lock().pop_front();
        Ok(next.unwrap_or_else(|| CANNED_REPLY.to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Deterministic evaluator: total grows with the number of trainee turns.
pub struct ScriptedEvaluator {
    outcome: Option<EvaluationOutcome>,
    latency: Duration,
    calls: Mutex<usize>,
}

impl Default for ScriptedEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self {
            outcome: None,
            latency: Duration::ZERO,
            calls: Mutex::new(0),
        }
    }

    /// Always return `outcome` instead of the computed report.
    pub fn with_outcome(mut self, outcome: EvaluationOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }

    fn report_for(request: &EvaluationRequest) -> EvaluationReport {
        let trainee_turns = request
            .transcript
            .iter()
            .filter(|t| t.speaker == Speaker::Trainee)
            .count();
        EvaluationReport {
            total: trainee_turns.min(10) as f32,
            blocks: RUBRIC
                .iter()
                .map(|item| EvaluationBlock {
                    key: item.key.to_string(),
                    title: item.title.to_string(),
                    score: 3.0,
                    what_went_well: vec![],
                    to_improve: vec![format!("Больше внимания: {}", item.focus)],
                    examples: vec![],
                })
                .collect(),
            summary: format!("Реплик продавца: {trainee_turns}"),
        }
    }
}

#[async_trait]
impl EvaluationService for ScriptedEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> EvaluationOutcome {
        *self.calls.lock() += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match &self.outcome {
            Some(outcome) => outcome.clone(),
            None => Ok(Self::report_for(request)),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EvaluationFailure, Turn};

    fn request() -> DialogueRequest {
        DialogueRequest {
            persona_id: "patient-1".to_string(),
            history: vec![Turn::trainee("Добрый день")],
        }
    }

    #[tokio::test]
    async fn scripted_dialogue_pops_then_falls_back() {
        let dialogue = ScriptedDialogue::new(["Сколько стоит?"]);
        assert_eq!(dialogue.reply(&request()).await.unwrap(), "Сколько стоит?");
        assert_eq!(dialogue.reply(&request()).await.unwrap(), CANNED_REPLY);
        assert_eq!(dialogue.calls().len(), 2);
    }

    #[tokio::test]
    async fn failing_dialogue_reports_transport_error() {
        let dialogue = ScriptedDialogue::failing("offline");
        let err = dialogue.reply(&request()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Transport(_)));
    }

    #[tokio::test]
    async fn evaluator_scores_trainee_turns() {
        let evaluator = ScriptedEvaluator::new();
        let req = EvaluationRequest {
            transcript: vec![
                Turn::trainee("Здравствуйте"),
                Turn::counterpart("Добрый день"),
                Turn::trainee("Чем могу помочь?"),
            ],
            context: String::new(),
        };
        let report = evaluator.evaluate(&req).await.unwrap();
        assert_eq!(report.total, 2.0);
        assert_eq!(report.blocks.len(), RUBRIC.len());
        assert_eq!(evaluator.calls(), 1);
    }

    #[tokio::test]
    async fn evaluator_returns_configured_failure() {
        let evaluator =
            ScriptedEvaluator::new().with_outcome(Err(EvaluationFailure::non_json("7/10")));
        let req = EvaluationRequest {
            transcript: vec![],
            context: String::new(),
        };
        assert!(evaluator.evaluate(&req).await.unwrap_err().is_non_json());
    }
}
