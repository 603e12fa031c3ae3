use crate::error::{CallError, Result};
use crate::session::SessionStats;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct CallMetrics {
    pub sessions_started: IntCounter,
    pub turns_dispatched: IntCounter,
    pub dispatches_swallowed: IntCounter,
    pub fallback_replies: IntCounter,
    pub replies_discarded: IntCounter,
    pub evaluations_requested: IntCounter,
    pub evaluations_skipped: IntCounter,
    pub evaluations_discarded: IntCounter,
    pub capture_restarts: IntCounter,
    pub capture_faults: IntCounter,
    pub transcript_turns: IntGauge,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub call: CallMetrics,
}

fn counter(name: &str, help: &str) -> Result<IntCounter> {
    IntCounter::new(name, help).map_err(|e| CallError::Metrics(format!("metrics init error: {e}")))
}

impl MetricsHub {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let call = CallMetrics {
            sessions_started: counter("trainer_sessions_started", "Call sessions started")?,
            turns_dispatched: counter("trainer_turns_dispatched", "Trainee turns sent to dialogue")?,
            dispatches_swallowed: counter(
                "trainer_dispatches_swallowed",
                "Utterances dropped because a turn was in flight",
            )?,
            fallback_replies: counter(
                "trainer_fallback_replies",
                "Turns answered with the fallback line",
            )?,
            replies_discarded: counter(
                "trainer_replies_discarded",
                "Dialogue replies that arrived for an abandoned turn",
            )?,
            evaluations_requested: counter(
                "trainer_evaluations_requested",
                "Evaluation requests issued",
            )?,
            evaluations_skipped: counter(
                "trainer_evaluations_skipped",
                "Debounce windows that ended without a request",
            )?,
            evaluations_discarded: counter(
                "trainer_evaluations_discarded",
                "Evaluation results dropped as stale",
            )?,
            capture_restarts: counter(
                "trainer_capture_restarts",
                "Automatic restarts of speech capture",
            )?,
            capture_faults: counter("trainer_capture_faults", "Capture engine faults")?,
            transcript_turns: IntGauge::new(
                "trainer_transcript_turns",
                "Turns in the current transcript",
            )
            .map_err(|e| CallError::Metrics(format!("metrics init error: {e}")))?,
        };
        for c in [
            &call.sessions_started,
            &call.turns_dispatched,
            &call.dispatches_swallowed,
            &call.fallback_replies,
            &call.replies_discarded,
            &call.evaluations_requested,
            &call.evaluations_skipped,
            &call.evaluations_discarded,
            &call.capture_restarts,
            &call.capture_faults,
        ] {
            let _ = registry.register(Box::new(c.clone()));
        }
        let _ = registry.register(Box::new(call.transcript_turns.clone()));
        Ok(Self { registry, call })
    }

    /// Bring the counters up to `stats`. Counters only move forward.
    pub fn observe(&self, stats: &SessionStats, transcript_turns: usize) {
        let pairs = [
            (&self.call.sessions_started, stats.sessions_started),
            (&self.call.turns_dispatched, stats.turns_dispatched),
            (&self.call.dispatches_swallowed, stats.dispatches_swallowed),
            (&self.call.fallback_replies, stats.fallback_replies),
            (&self.call.replies_discarded, stats.replies_discarded),
            (&self.call.evaluations_requested, stats.evaluations_requested),
            (&self.call.evaluations_skipped, stats.evaluations_skipped),
            (&self.call.evaluations_discarded, stats.evaluations_discarded),
            (&self.call.capture_restarts, stats.capture_restarts),
            (&self.call.capture_faults, stats.capture_faults),
        ];
        for (counter, value) in pairs {
            let delta = value.saturating_sub(counter.get());
            if delta > 0 {
                counter.inc_by(delta);
            }
        }
        self.call
            .transcript_turns
            .set(i64::try_from(transcript_turns).unwrap_or(i64::MAX));
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_mirrors_stats() {
        let hub = MetricsHub::new().unwrap();
        let mut stats = SessionStats {
            turns_dispatched: 3,
            fallback_replies: 1,
            ..Default::default()
        };
        hub.observe(&stats, 6);
        hub.observe(&stats, 6);
        assert_eq!(hub.call.turns_dispatched.get(), 3);

        stats.turns_dispatched = 4;
        hub.observe(&stats, 8);
        assert_eq!(hub.call.turns_dispatched.get(), 4);
        assert_eq!(hub.call.transcript_turns.get(), 8);

        let text = hub.encode_text();
        assert!(text.contains("trainer_turns_dispatched 4"));
        assert!(text.contains("trainer_fallback_replies 1"));
    }
}
