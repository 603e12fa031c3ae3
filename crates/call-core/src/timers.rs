use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    /// End-of-utterance silence window
    Silence,
    /// Evaluation debounce window
    EvaluationDebounce,
}

/// Token of one arming of a timer. Only the token of the latest arming is live; an
/// expiry carrying any older token is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId {
    pub kind: TimerKind,
    pub generation: u64,
}

/// A restartable one-shot timer tracked by generation.
#[derive(Debug, Clone)]
pub struct TimerSlot {
    kind: TimerKind,
    generation: u64,
    armed: bool,
}

impl TimerSlot {
    pub fn new(kind: TimerKind) -> Self {
        Self {
            kind,
            generation: 0,
            armed: false,
        }
    }

    /// Arm (or restart) the timer, invalidating any earlier token.
    pub fn arm(&mut self) -> TimerId {
        self.generation += 1;
        self.armed = true;
        TimerId {
            kind: self.kind,
            generation: self.generation,
        }
    }

    pub fn cancel(&mut self) {
        if self.armed {
            self.generation += 1;
            self.armed = false;
        }
    }

    /// Consume an expiry. True only for the live token of an armed timer.
    pub fn fire(&mut self, id: TimerId) -> bool {
        if self.armed && id.kind == self.kind && id.generation == self.generation {
            self.armed = false;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_makes_old_token_stale() {
        let mut slot = TimerSlot::new(TimerKind::Silence);
        let first = slot.arm();
        let second = slot.arm();
        assert!(!slot.fire(first));
        assert!(slot.fire(second));
        assert!(!slot.fire(second));
    }

    #[test]
    fn cancel_discards_pending_expiry() {
        let mut slot = TimerSlot::new(TimerKind::EvaluationDebounce);
        let id = slot.arm();
        slot.cancel();
        assert!(!slot.is_armed());
        assert!(!slot.fire(id));
    }

    #[test]
    fn tokens_of_other_timers_are_rejected() {
        let mut silence = TimerSlot::new(TimerKind::Silence);
        let mut debounce = TimerSlot::new(TimerKind::EvaluationDebounce);
        silence.arm();
        let id = debounce.arm();
        assert!(!silence.fire(id));
        assert!(debounce.fire(id));
    }
}
