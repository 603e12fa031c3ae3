//! Deterministic driver for [`CallSession`] on a virtual clock.
//!
//! Engines and services are simulated in-process: timers fire only when the clock is
//! advanced, dialogue and evaluation requests wait until the test answers them, and
//! playback lasts until [`SimCall::finish_playback`]. Engine callbacks raised while
//! effects execute are queued and applied in order, the way the runtime's event channel
//! applies them.

use crate::event::{CallEvent, Effect};
use crate::session::{CallSession, SessionView};
use crate::timers::TimerId;
use llm_services::{DialogueRequest, EvaluationOutcome, EvaluationRequest};
use speech_io::{CaptureBatch, CaptureEvent, CaptureFault, Segment, SynthesisEvent, Utterance};
use std::collections::VecDeque;
use std::time::Duration;
use uuid::Uuid;

/// A dialogue request waiting for an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReply {
    pub at: Duration,
    pub session: Uuid,
    pub request: u64,
    pub payload: DialogueRequest,
}

/// An evaluation request the session issued.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedEvaluation {
    pub at: Duration,
    pub session: Uuid,
    pub seq: u64,
    pub payload: EvaluationRequest,
}

pub struct SimCall {
    session: CallSession,
    now: Duration,
    timers: Vec<(Duration, TimerId)>,
    queue: VecDeque<CallEvent>,
    capture_active: bool,
    capture_results: Vec<Segment>,
    capture_starts: u32,
    deny_start: Option<CaptureFault>,
    playing: Option<u64>,
    spoken: Vec<Utterance>,
    replies: VecDeque<PendingReply>,
    evaluations: Vec<IssuedEvaluation>,
    /// Set after every applied event; false means capture and playback overlapped
    exclusive: bool,
}

impl SimCall {
    pub fn new(session: CallSession) -> Self {
        Self {
            session,
            now: Duration::ZERO,
            timers: Vec::new(),
            queue: VecDeque::new(),
            capture_active: false,
            capture_results: Vec::new(),
            capture_starts: 0,
            deny_start: None,
            playing: None,
            spoken: Vec::new(),
            replies: VecDeque::new(),
            evaluations: Vec::new(),
            exclusive: true,
        }
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    pub fn view(&self) -> SessionView {
        self.session.view()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn start(&mut self) {
        self.apply(CallEvent::Start);
    }

    pub fn stop(&mut self) {
        self.apply(CallEvent::Stop);
    }

    pub fn send_utterance(&mut self, text: &str) {
        self.apply(CallEvent::SendUtterance(text.to_string()));
    }

    pub fn evaluate_now(&mut self) {
        self.apply(CallEvent::EvaluateNow);
    }

    /// Final recognition of `text`. Returns false if the microphone is not capturing.
    pub fn say(&mut self, text: &str) -> bool {
        self.hear(Segment::final_text(text))
    }

    /// Interim guess replacing the previous one.
    pub fn say_partial(&mut self, text: &str) -> bool {
        self.hear(Segment::interim(text))
    }

    fn hear(&mut self, segment: Segment) -> bool {
        if !self.capture_active {
            return false;
        }
        if self.capture_results.last().is_some_and(|s| !s.is_final) {
            self.capture_results.pop();
        }
        let index = self.capture_results.len();
        self.capture_results.push(segment);
        let batch = CaptureBatch::new(self.capture_results.clone(), index);
        self.apply(CallEvent::Capture(CaptureEvent::Result(batch)));
        true
    }

    /// The platform ends recognition on its own.
    pub fn drop_capture(&mut self) {
        if std::mem::replace(&mut self.capture_active, false) {
            self.apply(CallEvent::Capture(CaptureEvent::End));
        }
    }

    /// Engine error followed by the end of the run.
    pub fn capture_error(&mut self, fault: CaptureFault) {
        self.queue
            .push_back(CallEvent::Capture(CaptureEvent::Error(fault)));
        if std::mem::replace(&mut self.capture_active, false) {
            self.queue.push_back(CallEvent::Capture(CaptureEvent::End));
        }
        self.drain();
    }

    pub fn deny_next_start(&mut self, fault: CaptureFault) {
        self.deny_start = Some(fault);
    }

    /// Move the clock forward, firing due timers in order.
    pub fn advance(&mut self, by: Duration) {
        self.advance_to(self.now + by);
    }

    pub fn advance_to(&mut self, until: Duration) {
        loop {
            let next = self
                .timers
                .iter()
                .enumerate()
                .filter(|(_, (due, _))| *due <= until)
                .min_by_key(|(_, (due, _))| *due)
                .map(|(i, _)| i);
            let Some(i) = next else { break };
            let (due, id) = self.timers.remove(i);
            self.now = self.now.max(due);
            self.apply(CallEvent::TimerElapsed(id));
        }
        self.now = self.now.max(until);
    }

    /// Answer the oldest pending dialogue request.
    pub fn reply(&mut self, text: &str) -> bool {
        self.answer(Ok(text.to_string()))
    }

    pub fn fail_reply(&mut self, reason: &str) -> bool {
        self.answer(Err(reason.to_string()))
    }

    fn answer(&mut self, result: Result<String, String>) -> bool {
        let Some(pending) = self.replies.pop_front() else {
            return false;
        };
        self.apply(CallEvent::ReplyReceived {
            session: pending.session,
            request: pending.request,
            result,
        });
        true
    }

    pub fn pending_replies(&self) -> &VecDeque<PendingReply> {
        &self.replies
    }

    pub fn evaluations(&self) -> &[IssuedEvaluation] {
        &self.evaluations
    }

    /// Deliver the result of evaluation `seq` of `session`.
    pub fn complete_evaluation(&mut self, session: Uuid, seq: u64, outcome: EvaluationOutcome) {
        self.apply(CallEvent::EvaluationReceived {
            session,
            seq,
            outcome,
        });
    }

    /// Playback of the current utterance completes.
    pub fn finish_playback(&mut self) -> bool {
        let Some(id) = self.playing.take() else {
            return false;
        };
        self.apply(CallEvent::Synthesis(SynthesisEvent::Finished { utterance: id }));
        true
    }

    pub fn fail_playback(&mut self, reason: &str) -> bool {
        let Some(id) = self.playing.take() else {
            return false;
        };
        self.apply(CallEvent::Synthesis(SynthesisEvent::Failed {
            utterance: id,
            reason: reason.to_string(),
        }));
        true
    }

    pub fn spoken(&self) -> &[Utterance] {
        &self.spoken
    }

    pub fn is_playing(&self) -> bool {
        self.playing.is_some()
    }

    pub fn capture_active(&self) -> bool {
        self.capture_active
    }

    pub fn capture_starts(&self) -> u32 {
        self.capture_starts
    }

    /// True while capture and playback never overlapped, in the engines or in the
    /// session flags.
    pub fn channel_was_exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn apply(&mut self, event: CallEvent) {
        self.queue.push_back(event);
        self.drain();
    }

    fn drain(&mut self) {
        while let Some(event) = self.queue.pop_front() {
            let effects = self.session.handle(event);
            for effect in effects {
                self.execute(effect);
            }
            let overlap_flags = self.session.listening() && self.session.counterpart_speaking();
            let overlap_engines = self.capture_active && self.playing.is_some();
            if overlap_flags || overlap_engines {
                self.exclusive = false;
            }
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::StartCapture => {
                if let Some(fault) = self.deny_start.take() {
                    self.queue.push_back(CallEvent::CaptureStartFailed(fault));
                } else if self.capture_active {
                    self.queue
                        .push_back(CallEvent::CaptureStartFailed(CaptureFault::Engine(
                            "recognition already started".to_string(),
                        )));
                } else {
                    self.capture_active = true;
                    self.capture_results.clear();
                    self.capture_starts += 1;
                }
            }
            Effect::StopCapture => {
                if std::mem::replace(&mut self.capture_active, false) {
                    self.queue.push_back(CallEvent::Capture(CaptureEvent::End));
                }
            }
            Effect::ArmTimer { id, after } => self.timers.push((self.now + after, id)),
            Effect::RequestReply {
                session,
                request,
                payload,
            } => self.replies.push_back(PendingReply {
                at: self.now,
                session,
                request,
                payload,
            }),
            Effect::RequestEvaluation {
                session,
                seq,
                payload,
            } => self.evaluations.push(IssuedEvaluation {
                at: self.now,
                session,
                seq,
                payload,
            }),
            Effect::CancelSynthesis => {
                if let Some(id) = self.playing.take() {
                    self.queue
                        .push_back(CallEvent::Synthesis(SynthesisEvent::Failed {
                            utterance: id,
                            reason: "interrupted".to_string(),
                        }));
                }
            }
            Effect::Speak(utterance) => {
                self.playing = Some(utterance.id);
                self.spoken.push(utterance);
            }
        }
    }
}
