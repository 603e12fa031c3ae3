use llm_services::Turn;
use tracing::{debug, warn};

/// Why a ready utterance was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// Nothing but whitespace was heard
    Empty,
    /// A turn is already in flight; the utterance is dropped, not queued
    Busy,
}

/// Counterpart line recorded for a completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// True when the service failed or returned nothing
    pub fallback: bool,
}

/// Single-flight dialogue turns and the single writer of the transcript.
#[derive(Debug, Clone)]
pub struct TurnDispatcher {
    transcript: Vec<Turn>,
    busy: bool,
    request: u64,
    fallback: String,
}

impl TurnDispatcher {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            transcript: Vec::new(),
            busy: false,
            request: 0,
            fallback: fallback.into(),
        }
    }

    /// Record the trainee turn and take the lock. Returns the request id to attach to
    /// the dialogue call.
    pub fn dispatch(&mut self, text: &str) -> Result<u64, Rejected> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Rejected::Empty);
        }
        if self.busy {
            debug!("turn in flight, dropping utterance '{}'", text);
            return Err(Rejected::Busy);
        }
        self.busy = true;
        self.request += 1;
        self.transcript.push(Turn::trainee(text));
        Ok(self.request)
    }

    /// Record the counterpart turn for `request` and release the lock. Returns `None`
    /// for a result that does not belong to the turn in flight.
    pub fn complete(&mut self, request: u64, result: Result<String, String>) -> Option<Completion> {
        if !self.busy || request != self.request {
            debug!("discarding reply for request {}", request);
            return None;
        }
        self.busy = false;
        let completion = match result {
            Ok(text) if !text.trim().is_empty() => Completion {
                text: text.trim().to_string(),
                fallback: false,
            },
            Ok(_) => {
                warn!("dialogue service returned an empty reply");
                self.fallback_completion()
            }
            Err(reason) => {
                warn!("dialogue service failed: {}", reason);
                self.fallback_completion()
            }
        };
        self.transcript.push(Turn::counterpart(completion.text.clone()));
        Some(completion)
    }

    fn fallback_completion(&self) -> Completion {
        Completion {
            text: self.fallback.clone(),
            fallback: true,
        }
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Id of the most recent dispatch.
    pub fn last_request(&self) -> u64 {
        self.request
    }

    /// Clear the transcript and release the lock. Request ids keep increasing so replies
    /// to abandoned turns never match a new one.
    pub fn reset(&mut self) {
        self.transcript.clear();
        self.busy = false;
    }
}
