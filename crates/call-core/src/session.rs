//! The call session state machine.
//!
//! [`CallSession::handle`] applies one [`CallEvent`] to the whole session state and returns
//! the [`Effect`]s the driver must perform. Every flag lives in this one value and every
//! callback goes through `handle`, so no event observes a half-applied transition.

use crate::accumulator::TranscriptAccumulator;
use crate::checklist;
use crate::config::CallConfig;
use crate::dispatcher::{Rejected, TurnDispatcher};
use crate::endpoint::{EndpointDetector, EndpointGate, Expiry};
use crate::error::{CallError, Result};
use crate::evaluation::{Debounced, EvaluationScheduler, Received};
use crate::event::{CallEvent, Effect};
use crate::playback::PlaybackCoordinator;
use crate::timers::{TimerId, TimerKind};
use catalog::{Catalog, Objective};
use llm_services::{DialogueRequest, EvaluationOutcome, EvaluationRequest, Turn};
use serde::{Deserialize, Serialize};
use speech_io::{CaptureEvent, CaptureFault};
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Capturing,
    AwaitingReply,
    Speaking,
}

/// Running counters of one session object, across all calls it hosted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub sessions_started: u64,
    pub turns_dispatched: u64,
    pub dispatches_swallowed: u64,
    pub fallback_replies: u64,
    pub replies_discarded: u64,
    pub evaluations_requested: u64,
    pub evaluations_skipped: u64,
    pub evaluations_discarded: u64,
    pub capture_restarts: u64,
    pub capture_faults: u64,
}

/// What the UI shows.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session: Uuid,
    pub phase: Phase,
    pub listening: bool,
    pub busy: bool,
    pub evaluating: bool,
    pub counterpart_speaking: bool,
    pub capture_requested: bool,
    pub transcript: Vec<Turn>,
    pub pending_text: String,
    pub checklist: BTreeMap<String, bool>,
    pub evaluation: Option<EvaluationOutcome>,
    pub last_fault: Option<CaptureFault>,
    pub stats: SessionStats,
}

pub struct CallSession {
    session: Uuid,
    config: CallConfig,
    persona_id: String,
    objectives: Vec<Objective>,
    accumulator: TranscriptAccumulator,
    endpoint: EndpointDetector,
    dispatcher: TurnDispatcher,
    playback: PlaybackCoordinator,
    evaluation: EvaluationScheduler,
    checklist: BTreeMap<String, bool>,
    stats: SessionStats,
}

impl CallSession {
    pub fn new(config: CallConfig, persona_id: impl Into<String>, objectives: Vec<Objective>) -> Self {
        let checklist = checklist::recompute(&[], &objectives);
        Self {
            session: Uuid::nil(),
            endpoint: EndpointDetector::new(config.silence_window()),
            dispatcher: TurnDispatcher::new(config.fallback_reply.clone()),
            playback: PlaybackCoordinator::new(config.locale(), config.voice),
            evaluation: EvaluationScheduler::new(
                config.evaluation_debounce(),
                config.min_evaluation_turns,
            ),
            accumulator: TranscriptAccumulator::new(),
            persona_id: persona_id.into(),
            objectives,
            checklist,
            config,
            stats: SessionStats::default(),
        }
    }

    /// Session for `persona_id` practising the objectives of `scenario_id`.
    pub fn for_scenario(
        config: CallConfig,
        catalog: &Catalog,
        persona_id: &str,
        scenario_id: &str,
    ) -> Result<Self> {
        if catalog.persona(persona_id).is_none() {
            return Err(CallError::UnknownPersona(persona_id.to_string()));
        }
        let scenario = catalog
            .scenario(scenario_id)
            .ok_or_else(|| CallError::UnknownScenario(scenario_id.to_string()))?;
        Ok(Self::new(config, persona_id, scenario.tasks.clone()))
    }

    pub fn handle(&mut self, event: CallEvent) -> Vec<Effect> {
        let mut fx = Vec::new();
        match event {
            CallEvent::Start => self.start(&mut fx),
            CallEvent::Stop => self.stop(&mut fx),
            CallEvent::SendUtterance(text) => self.send_utterance(&text, &mut fx),
            CallEvent::EvaluateNow => self.evaluate_now(&mut fx),
            CallEvent::Capture(event) => self.on_capture(event, &mut fx),
            CallEvent::CaptureStartFailed(fault) => {
                self.stats.capture_faults += 1;
                self.playback.on_capture_start_failed(fault);
            }
            CallEvent::TimerElapsed(id) => match id.kind {
                TimerKind::Silence => self.on_silence(id, &mut fx),
                TimerKind::EvaluationDebounce => self.on_debounce(id, &mut fx),
            },
            CallEvent::ReplyReceived {
                session,
                request,
                result,
            } => self.on_reply(session, request, result, &mut fx),
            CallEvent::Synthesis(event) => fx.extend(self.playback.on_synthesis(&event)),
            CallEvent::EvaluationReceived {
                session,
                seq,
                outcome,
            } => self.on_evaluation(session, seq, outcome),
            CallEvent::VoicesChanged(voices) => self.playback.set_voices(voices),
        }
        fx
    }

    fn start(&mut self, fx: &mut Vec<Effect>) {
        self.endpoint.cancel();
        fx.extend(self.playback.release());
        self.session = Uuid::new_v4();
        self.accumulator.reset();
        self.dispatcher.reset();
        self.evaluation.reset();
        self.checklist = checklist::recompute(&[], &self.objectives);
        self.stats.sessions_started += 1;
        info!(
            "call session {} started with persona {}",
            self.session, self.persona_id
        );
        fx.extend(self.playback.request_capture());
    }

    fn stop(&mut self, fx: &mut Vec<Effect>) {
        self.endpoint.cancel();
        fx.extend(self.playback.release());
        info!("call session {} stopped", self.session);
    }

    fn on_capture(&mut self, event: CaptureEvent, fx: &mut Vec<Effect>) {
        match event {
            CaptureEvent::Result(batch) => {
                if !self.playback.listening() {
                    debug!("dropping capture result while not listening");
                    return;
                }
                if self.accumulator.apply_batch(&batch) {
                    fx.push(self.endpoint.notify_activity());
                }
            }
            CaptureEvent::Error(fault) => {
                self.stats.capture_faults += 1;
                self.playback.on_capture_error(fault);
            }
            CaptureEvent::End => fx.extend(self.playback.on_capture_end()),
        }
    }

    fn on_silence(&mut self, id: TimerId, fx: &mut Vec<Effect>) {
        let gate = EndpointGate {
            capture_requested: self.playback.capture_requested(),
            counterpart_speaking: self.playback.counterpart_speaking(),
            busy: self.dispatcher.is_busy(),
        };
        match self.endpoint.on_elapsed(id, gate) {
            Expiry::Ready => {
                let text = self.accumulator.pending_text();
                self.dispatch(&text, fx);
            }
            Expiry::Suppressed if gate.busy => self.stats.dispatches_swallowed += 1,
            Expiry::Suppressed | Expiry::Stale => {}
        }
    }

    /// Typed text goes out together with whatever was already heard. A rejected send
    /// leaves the speech and its silence window untouched.
    fn send_utterance(&mut self, typed: &str, fx: &mut Vec<Effect>) {
        let text = format!("{} {}", self.accumulator.pending_text(), typed.trim());
        self.dispatch(text.trim(), fx);
    }

    fn dispatch(&mut self, text: &str, fx: &mut Vec<Effect>) {
        let request = match self.dispatcher.dispatch(text) {
            Ok(request) => request,
            Err(Rejected::Busy) => {
                self.stats.dispatches_swallowed += 1;
                return;
            }
            Err(Rejected::Empty) => return,
        };
        self.endpoint.cancel();
        self.accumulator.reset();
        self.stats.turns_dispatched += 1;
        self.transcript_changed(fx);
        fx.push(Effect::RequestReply {
            session: self.session,
            request,
            payload: DialogueRequest {
                persona_id: self.persona_id.clone(),
                history: self.dispatcher.transcript().to_vec(),
            },
        });
    }

    fn on_reply(
        &mut self,
        session: Uuid,
        request: u64,
        result: std::result::Result<String, String>,
        fx: &mut Vec<Effect>,
    ) {
        if session != self.session {
            debug!("discarding reply of session {}", session);
            self.stats.replies_discarded += 1;
            return;
        }
        let Some(done) = self.dispatcher.complete(request, result) else {
            self.stats.replies_discarded += 1;
            return;
        };
        self.transcript_changed(fx);
        if done.fallback {
            self.stats.fallback_replies += 1;
            return;
        }
        self.endpoint.cancel();
        fx.extend(self.playback.speak(&done.text));
    }

    /// Every transcript mutation reschedules the evaluation and recomputes the checklist.
    fn transcript_changed(&mut self, fx: &mut Vec<Effect>) {
        let snapshot = self.dispatcher.transcript().to_vec();
        self.checklist = checklist::recompute(&snapshot, &self.objectives);
        fx.push(self.evaluation.schedule(snapshot));
    }

    fn on_debounce(&mut self, id: TimerId, fx: &mut Vec<Effect>) {
        match self.evaluation.on_elapsed(id) {
            Debounced::Issue { seq, transcript } => self.request_evaluation(seq, transcript, fx),
            Debounced::SkippedInFlight | Debounced::SkippedTooShort => {
                self.stats.evaluations_skipped += 1
            }
            Debounced::Stale => {}
        }
    }

    fn evaluate_now(&mut self, fx: &mut Vec<Effect>) {
        match self.evaluation.evaluate_now(self.dispatcher.transcript()) {
            Some(seq) => {
                let transcript = self.dispatcher.transcript().to_vec();
                self.request_evaluation(seq, transcript, fx);
            }
            None => debug!("manual evaluation not possible right now"),
        }
    }

    fn request_evaluation(&mut self, seq: u64, transcript: Vec<Turn>, fx: &mut Vec<Effect>) {
        self.stats.evaluations_requested += 1;
        fx.push(Effect::RequestEvaluation {
            session: self.session,
            seq,
            payload: EvaluationRequest {
                transcript,
                context: self.config.evaluation_context.clone(),
            },
        });
    }

    fn on_evaluation(&mut self, session: Uuid, seq: u64, outcome: EvaluationOutcome) {
        if session != self.session {
            self.stats.evaluations_discarded += 1;
            return;
        }
        if self.evaluation.on_result(seq, outcome) == Received::Outdated {
            debug!("evaluation {} is outdated", seq);
            self.stats.evaluations_discarded += 1;
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    pub fn persona_id(&self) -> &str {
        &self.persona_id
    }

    pub fn phase(&self) -> Phase {
        if self.playback.counterpart_speaking() {
            Phase::Speaking
        } else if !self.playback.capture_requested() {
            Phase::Idle
        } else if self.dispatcher.is_busy() {
            Phase::AwaitingReply
        } else {
            Phase::Capturing
        }
    }

    pub fn transcript(&self) -> &[Turn] {
        self.dispatcher.transcript()
    }

    pub fn pending_text(&self) -> String {
        self.accumulator.pending_text()
    }

    pub fn checklist(&self) -> &BTreeMap<String, bool> {
        &self.checklist
    }

    pub fn evaluation(&self) -> Option<&EvaluationOutcome> {
        self.evaluation.latest()
    }

    pub fn is_busy(&self) -> bool {
        self.dispatcher.is_busy()
    }

    pub fn evaluating(&self) -> bool {
        self.evaluation.in_flight()
    }

    pub fn listening(&self) -> bool {
        self.playback.listening()
    }

    pub fn counterpart_speaking(&self) -> bool {
        self.playback.counterpart_speaking()
    }

    pub fn capture_requested(&self) -> bool {
        self.playback.capture_requested()
    }

    pub fn last_fault(&self) -> Option<&CaptureFault> {
        self.playback.last_fault()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            capture_restarts: self.playback.restarts(),
            ..self.stats.clone()
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session: self.session,
            phase: self.phase(),
            listening: self.listening(),
            busy: self.is_busy(),
            evaluating: self.evaluating(),
            counterpart_speaking: self.counterpart_speaking(),
            capture_requested: self.capture_requested(),
            transcript: self.transcript().to_vec(),
            pending_text: self.pending_text(),
            checklist: self.checklist.clone(),
            evaluation: self.evaluation().cloned(),
            last_fault: self.last_fault().cloned(),
            stats: self.stats(),
        }
    }
}
