use crate::timers::TimerId;
use llm_services::{DialogueRequest, EvaluationOutcome, EvaluationRequest};
use speech_io::{CaptureEvent, CaptureFault, SynthesisEvent, Utterance, Voice};
use std::time::Duration;
use uuid::Uuid;

/// Everything that can happen to a call session. Engine callbacks, timer expiries,
/// service completions and trainee commands all arrive as one of these.
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// Begin a new session (tears down the previous one)
    Start,
    Stop,
    /// Dispatch typed text as if it had been spoken
    SendUtterance(String),
    /// Evaluate the current transcript without waiting for the debounce
    EvaluateNow,
    Capture(CaptureEvent),
    /// The capture engine refused to start
    CaptureStartFailed(CaptureFault),
    TimerElapsed(TimerId),
    ReplyReceived {
        session: Uuid,
        request: u64,
        result: Result<String, String>,
    },
    Synthesis(SynthesisEvent),
    EvaluationReceived {
        session: Uuid,
        seq: u64,
        outcome: EvaluationOutcome,
    },
    VoicesChanged(Vec<Voice>),
}

/// Work the session asks its driver to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartCapture,
    StopCapture,
    ArmTimer {
        id: TimerId,
        after: Duration,
    },
    RequestReply {
        session: Uuid,
        request: u64,
        payload: DialogueRequest,
    },
    RequestEvaluation {
        session: Uuid,
        seq: u64,
        payload: EvaluationRequest,
    },
    CancelSynthesis,
    Speak(Utterance),
}
