//! Debounced, single-flight background scoring of the transcript.

use crate::event::Effect;
use crate::timers::{TimerId, TimerKind, TimerSlot};
use llm_services::{EvaluationOutcome, Turn};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Debounced {
    Stale,
    /// Another evaluation is still running; this window is dropped, not queued
    SkippedInFlight,
    SkippedTooShort,
    Issue { seq: u64, transcript: Vec<Turn> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    Displayed,
    /// Not newer than what is already shown
    Outdated,
}

#[derive(Debug, Clone)]
pub struct EvaluationScheduler {
    debounce: Duration,
    min_turns: usize,
    timer: TimerSlot,
    pending: Option<Vec<Turn>>,
    seq: u64,
    in_flight: Option<u64>,
    displayed_seq: Option<u64>,
    latest: Option<EvaluationOutcome>,
}

impl EvaluationScheduler {
    pub fn new(debounce: Duration, min_turns: usize) -> Self {
        Self {
            debounce,
            min_turns,
            timer: TimerSlot::new(TimerKind::EvaluationDebounce),
            pending: None,
            seq: 0,
            in_flight: None,
            displayed_seq: None,
            latest: None,
        }
    }

    /// Restart the debounce window with `snapshot` as the transcript to score.
    pub fn schedule(&mut self, snapshot: Vec<Turn>) -> Effect {
        self.pending = Some(snapshot);
        Effect::ArmTimer {
            id: self.timer.arm(),
            after: self.debounce,
        }
    }

    pub fn on_elapsed(&mut self, id: TimerId) -> Debounced {
        if !self.timer.fire(id) {
            return Debounced::Stale;
        }
        let Some(snapshot) = self.pending.take() else {
            return Debounced::Stale;
        };
        if let Some(seq) = self.in_flight {
            debug!("evaluation {} still running, skipping", seq);
            return Debounced::SkippedInFlight;
        }
        if snapshot.len() < self.min_turns {
            return Debounced::SkippedTooShort;
        }
        Debounced::Issue {
            seq: self.issue(),
            transcript: snapshot,
        }
    }

    /// Evaluate `transcript` right away, dropping any pending debounce. `None` if an
    /// evaluation is running or the transcript is too short.
    pub fn evaluate_now(&mut self, transcript: &[Turn]) -> Option<u64> {
        if self.in_flight.is_some() || transcript.len() < self.min_turns {
            return None;
        }
        self.timer.cancel();
        self.pending = None;
        Some(self.issue())
    }

    fn issue(&mut self) -> u64 {
        self.seq += 1;
        self.in_flight = Some(self.seq);
        self.seq
    }

    /// Apply a result of this session. Results are shown only if newer than the one on
    /// display.
    pub fn on_result(&mut self, seq: u64, outcome: EvaluationOutcome) -> Received {
        if self.in_flight == Some(seq) {
            self.in_flight = None;
        }
        if self.displayed_seq.is_some_and(|shown| seq <= shown) {
            return Received::Outdated;
        }
        self.displayed_seq = Some(seq);
        self.latest = Some(outcome);
        Received::Displayed
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn displayed_seq(&self) -> Option<u64> {
        self.displayed_seq
    }

    pub fn latest(&self) -> Option<&EvaluationOutcome> {
        self.latest.as_ref()
    }

    /// Forget everything of the previous session. Sequence numbers keep increasing.
    pub fn reset(&mut self) {
        self.timer.cancel();
        self.pending = None;
        self.in_flight = None;
        self.displayed_seq = None;
        self.latest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_services::{EvaluationFailure, EvaluationReport};

    fn armed(effect: Effect) -> TimerId {
        match effect {
            Effect::ArmTimer { id, .. } => id,
            other => panic!("expected ArmTimer, got {other:?}"),
        }
    }

    fn two_turns() -> Vec<Turn> {
        vec![Turn::trainee("Здравствуйте"), Turn::counterpart("Добрый день")]
    }

    fn report(total: f32) -> EvaluationOutcome {
        Ok(EvaluationReport {
            total,
            blocks: vec![],
            summary: String::new(),
        })
    }

    #[test]
    fn burst_of_schedules_issues_latest_snapshot_once() {
        let mut s = EvaluationScheduler::new(Duration::from_millis(1200), 2);
        let mut ids = Vec::new();
        for n in 1..=4 {
            let snapshot = (0..n).map(|i| Turn::trainee(format!("t{i}"))).collect();
            ids.push(armed(s.schedule(snapshot)));
        }
        for id in &ids[..3] {
            assert_eq!(s.on_elapsed(*id), Debounced::Stale);
        }
        match s.on_elapsed(ids[3]) {
            Debounced::Issue { seq, transcript } => {
                assert_eq!(seq, 1);
                assert_eq!(transcript.len(), 4);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(s.in_flight());
    }

    #[test]
    fn short_transcripts_are_skipped() {
        let mut s = EvaluationScheduler::new(Duration::from_millis(1200), 2);
        let id = armed(s.schedule(vec![Turn::trainee("алло")]));
        assert_eq!(s.on_elapsed(id), Debounced::SkippedTooShort);
        assert!(!s.in_flight());
    }

    #[test]
    fn window_during_flight_is_skipped_not_queued() {
        let mut s = EvaluationScheduler::new(Duration::from_millis(1200), 2);
        let id = armed(s.schedule(two_turns()));
        assert!(matches!(s.on_elapsed(id), Debounced::Issue { .. }));

        let id = armed(s.schedule(two_turns()));
        assert_eq!(s.on_elapsed(id), Debounced::SkippedInFlight);
        assert!(!s.is_pending());
    }

    #[test]
    fn older_results_never_replace_newer_ones() {
        let mut s = EvaluationScheduler::new(Duration::from_millis(1200), 2);
        let first = s.evaluate_now(&two_turns()).unwrap();
        assert_eq!(s.on_result(first, report(4.0)), Received::Displayed);
        let second = s.evaluate_now(&two_turns()).unwrap();
        assert_eq!(s.on_result(second, report(6.0)), Received::Displayed);

        assert_eq!(s.on_result(first, report(1.0)), Received::Outdated);
        assert_eq!(s.latest().unwrap().as_ref().unwrap().total, 6.0);
        assert_eq!(s.displayed_seq(), Some(second));
    }

    #[test]
    fn failures_are_displayed_like_reports() {
        let mut s = EvaluationScheduler::new(Duration::from_millis(1200), 2);
        let seq = s.evaluate_now(&two_turns()).unwrap();
        s.on_result(seq, Err(EvaluationFailure::non_json("7/10")));
        assert!(s.latest().unwrap().as_ref().unwrap_err().is_non_json());
        assert!(!s.in_flight());
    }

    #[test]
    fn evaluate_now_respects_single_flight_and_cancels_debounce() {
        let mut s = EvaluationScheduler::new(Duration::from_millis(1200), 2);
        assert_eq!(s.evaluate_now(&[Turn::trainee("один")]), None);

        let id = armed(s.schedule(two_turns()));
        assert!(s.evaluate_now(&two_turns()).is_some());
        assert_eq!(s.on_elapsed(id), Debounced::Stale);
        assert_eq!(s.evaluate_now(&two_turns()), None);
    }
}
