//! Silence-based endpointing.
//!
//! Every recognition result restarts a fixed silence window. When the window runs out
//! without new speech the utterance is complete, provided the trainee still wants to
//! talk, the counterpart is quiet and no turn is being dispatched.

use crate::event::Effect;
use crate::timers::{TimerId, TimerKind, TimerSlot};
use std::time::Duration;
use tracing::debug;

/// Conditions under which an expired silence window completes an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointGate {
    pub capture_requested: bool,
    pub counterpart_speaking: bool,
    pub busy: bool,
}

impl EndpointGate {
    fn open(&self) -> bool {
        self.capture_requested && !self.counterpart_speaking && !self.busy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Not the live silence timer
    Stale,
    /// The window ran out while the gate was closed; nothing happens until new speech
    Suppressed,
    /// The utterance is complete
    Ready,
}

#[derive(Debug, Clone)]
pub struct EndpointDetector {
    window: Duration,
    timer: TimerSlot,
}

impl EndpointDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            timer: TimerSlot::new(TimerKind::Silence),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Speech was heard: restart the silence window.
    pub fn notify_activity(&mut self) -> Effect {
        Effect::ArmTimer {
            id: self.timer.arm(),
            after: self.window,
        }
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn on_elapsed(&mut self, id: TimerId, gate: EndpointGate) -> Expiry {
        if !self.timer.fire(id) {
            return Expiry::Stale;
        }
        if gate.open() {
            Expiry::Ready
        } else {
            debug!("silence window elapsed with gate closed: {:?}", gate);
            Expiry::Suppressed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: EndpointGate = EndpointGate {
        capture_requested: true,
        counterpart_speaking: false,
        busy: false,
    };

    fn armed_id(effect: Effect) -> TimerId {
        match effect {
            Effect::ArmTimer { id, .. } => id,
            other => panic!("expected ArmTimer, got {other:?}"),
        }
    }

    #[test]
    fn activity_arms_the_configured_window() {
        let mut det = EndpointDetector::new(Duration::from_millis(800));
        match det.notify_activity() {
            Effect::ArmTimer { id, after } => {
                assert_eq!(id.kind, TimerKind::Silence);
                assert_eq!(after, Duration::from_millis(800));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(det.is_pending());
    }

    #[test]
    fn only_latest_window_completes() {
        let mut det = EndpointDetector::new(Duration::from_millis(800));
        let old = armed_id(det.notify_activity());
        let live = armed_id(det.notify_activity());
        assert_eq!(det.on_elapsed(old, OPEN), Expiry::Stale);
        assert_eq!(det.on_elapsed(live, OPEN), Expiry::Ready);
    }

    #[test]
    fn closed_gate_suppresses_without_rescheduling() {
        for gate in [
            EndpointGate {
                capture_requested: false,
                ..OPEN
            },
            EndpointGate {
                counterpart_speaking: true,
                ..OPEN
            },
            EndpointGate { busy: true, ..OPEN },
        ] {
            let mut det = EndpointDetector::new(Duration::from_millis(800));
            let id = armed_id(det.notify_activity());
            assert_eq!(det.on_elapsed(id, gate), Expiry::Suppressed);
            assert!(!det.is_pending());
        }
    }

    #[test]
    fn cancel_discards_pending_window() {
        let mut det = EndpointDetector::new(Duration::from_millis(800));
        let id = armed_id(det.notify_activity());
        det.cancel();
        assert_eq!(det.on_elapsed(id, OPEN), Expiry::Stale);
    }
}
