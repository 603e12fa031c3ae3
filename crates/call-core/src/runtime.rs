//! Tokio driver for [`CallSession`].
//!
//! One task owns the session and both engines. Engine callbacks, timer expiries and
//! service completions are funnelled into a single unbounded channel and applied in
//! arrival order; the resulting effects are executed on the same task.

use crate::error::{CallError, Result};
use crate::event::{CallEvent, Effect};
use crate::metrics::MetricsHub;
use crate::session::{CallSession, SessionView};
use crate::timers::TimerKind;
use llm_services::{DialogueService, EvaluationService};
use speech_io::{CaptureEngine, SynthesisEngine, SynthesisEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Clone)]
pub struct CallServices {
    pub dialogue: Arc<dyn DialogueService>,
    pub evaluator: Arc<dyn EvaluationService>,
}

enum Envelope {
    Event(CallEvent),
    Shutdown,
}

/// Control surface of a running call. Dropping it shuts the call down.
pub struct CallHandle {
    tx: mpsc::UnboundedSender<Envelope>,
    view: watch::Receiver<SessionView>,
    task: JoinHandle<CallSession>,
}

impl CallHandle {
    fn send(&self, event: CallEvent) -> Result<()> {
        self.tx
            .send(Envelope::Event(event))
            .map_err(|_| CallError::Closed)
    }

    pub fn start(&self) -> Result<()> {
        self.send(CallEvent::Start)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(CallEvent::Stop)
    }

    pub fn send_utterance(&self, text: impl Into<String>) -> Result<()> {
        self.send(CallEvent::SendUtterance(text.into()))
    }

    pub fn evaluate_now(&self) -> Result<()> {
        self.send(CallEvent::EvaluateNow)
    }

    /// Latest published state.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Wait until the published state satisfies `pred`.
    pub async fn wait_for(&self, pred: impl FnMut(&SessionView) -> bool) -> Result<SessionView> {
        let mut rx = self.view.clone();
        let view = rx.wait_for(pred).await.map_err(|_| CallError::Closed)?;
        Ok(view.clone())
    }

    /// Stop the call, release the engines and hand back the session.
    pub async fn shutdown(mut self) -> Result<CallSession> {
        let _ = self.tx.send(Envelope::Shutdown);
        (&mut self.task).await.map_err(|_| CallError::Closed)
    }
}

impl Drop for CallHandle {
    fn drop(&mut self) {
        // engine callbacks and timers keep the channel open, so ask explicitly
        let _ = self.tx.send(Envelope::Shutdown);
    }
}

/// Spawn the driver task for `session`. Must be called within a tokio runtime.
pub fn spawn_call(
    session: CallSession,
    mut capture: Box<dyn CaptureEngine>,
    mut synthesis: Box<dyn SynthesisEngine>,
    services: CallServices,
    metrics: Option<MetricsHub>,
) -> CallHandle {
    let (tx, rx) = mpsc::unbounded_channel();

    let capture_tx = tx.clone();
    capture.set_event_callback(Box::new(move |event| {
        let _ = capture_tx.send(Envelope::Event(CallEvent::Capture(event)));
    }));
    let synthesis_tx = tx.clone();
    synthesis.set_event_callback(Box::new(move |event| {
        let _ = synthesis_tx.send(Envelope::Event(CallEvent::Synthesis(event)));
    }));
    let _ = tx.send(Envelope::Event(CallEvent::VoicesChanged(synthesis.voices())));

    let (view_tx, view_rx) = watch::channel(session.view());
    let driver = Driver {
        session,
        capture,
        synthesis,
        services,
        metrics,
        tx: tx.clone(),
        view: view_tx,
        timers: HashMap::new(),
    };
    let task = tokio::spawn(driver.run(rx));
    CallHandle {
        tx,
        view: view_rx,
        task,
    }
}

struct Driver {
    session: CallSession,
    capture: Box<dyn CaptureEngine>,
    synthesis: Box<dyn SynthesisEngine>,
    services: CallServices,
    metrics: Option<MetricsHub>,
    tx: mpsc::UnboundedSender<Envelope>,
    view: watch::Sender<SessionView>,
    /// Latest sleep per timer kind; older ones are aborted on re-arm
    timers: HashMap<TimerKind, JoinHandle<()>>,
}

impl Driver {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Envelope>) -> CallSession {
        info!(
            "call runtime up (dialogue: {}, evaluation: {})",
            self.services.dialogue.name(),
            self.services.evaluator.name()
        );
        while let Some(envelope) = rx.recv().await {
            let Envelope::Event(event) = envelope else {
                break;
            };
            self.apply(event);
        }
        self.apply(CallEvent::Stop);
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        info!("call runtime down");
        self.session
    }

    fn apply(&mut self, event: CallEvent) {
        let effects = self.session.handle(event);
        for effect in effects {
            self.execute(effect);
        }
        if let Some(metrics) = &self.metrics {
            metrics.observe(&self.session.stats(), self.session.transcript().len());
        }
        self.view.send_replace(self.session.view());
    }

    fn feed(&self, event: CallEvent) {
        let _ = self.tx.send(Envelope::Event(event));
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::StartCapture => {
                if let Err(fault) = self.capture.start() {
                    self.feed(CallEvent::CaptureStartFailed(fault));
                }
            }
            Effect::StopCapture => self.capture.stop(),
            Effect::ArmTimer { id, after } => {
                let tx = self.tx.clone();
                let timer = tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(Envelope::Event(CallEvent::TimerElapsed(id)));
                });
                if let Some(stale) = self.timers.insert(id.kind, timer) {
                    stale.abort();
                }
            }
            Effect::RequestReply {
                session,
                request,
                payload,
            } => {
                let dialogue = self.services.dialogue.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = dialogue.reply(&payload).await.map_err(|e| e.to_string());
                    let _ = tx.send(Envelope::Event(CallEvent::ReplyReceived {
                        session,
                        request,
                        result,
                    }));
                });
            }
            Effect::RequestEvaluation {
                session,
                seq,
                payload,
            } => {
                let evaluator = self.services.evaluator.clone();
                let tx = self.tx.clone();
                debug!("evaluating {} turns (seq {})", payload.transcript.len(), seq);
                tokio::spawn(async move {
                    let outcome = evaluator.evaluate(&payload).await;
                    let _ = tx.send(Envelope::Event(CallEvent::EvaluationReceived {
                        session,
                        seq,
                        outcome,
                    }));
                });
            }
            Effect::CancelSynthesis => self.synthesis.cancel(),
            Effect::Speak(utterance) => {
                let id = utterance.id;
                if let Err(e) = self.synthesis.speak(utterance) {
                    self.feed(CallEvent::Synthesis(SynthesisEvent::Failed {
                        utterance: id,
                        reason: e.to_string(),
                    }));
                }
            }
        }
    }
}
