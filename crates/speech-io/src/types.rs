use crate::CaptureFault;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub locale: String,
    #[serde(default = "default_true")]
    pub interim_results: bool,
    #[serde(default = "default_true")]
    pub continuous: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            locale: "ru-RU".to_string(),
            interim_results: true,
            continuous: true,
        }
    }
}

/// One recognition hypothesis. Interim segments are partial guesses that a later
/// delivery replaces; final segments never change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub is_final: bool,
}

impl Segment {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// A result delivery. `segments` is the engine's cumulative result list for the current
/// recognition run; only entries from `result_index` on are new.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureBatch {
    pub segments: Vec<Segment>,
    pub result_index: usize,
    pub ts: Option<OffsetDateTime>,
}

impl CaptureBatch {
    pub fn new(segments: Vec<Segment>, result_index: usize) -> Self {
        Self {
            segments,
            result_index,
            ts: Some(OffsetDateTime::now_utc()),
        }
    }

    /// Segments that are new in this delivery.
    pub fn fresh(&self) -> &[Segment] {
        self.segments
            .get(self.result_index..)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    Result(CaptureBatch),
    Error(CaptureFault),
    /// The engine stopped, either on request or on its own (platform timeout).
    End,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    /// BCP 47 tag, e.g. "ru-RU"
    pub lang: String,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechParams {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// A request to speak. `id` identifies the utterance in completion events so that
/// events of a cancelled utterance can be told apart from the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub id: u64,
    pub text: String,
    pub lang: String,
    pub voice: Option<Voice>,
    pub params: SpeechParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    Finished { utterance: u64 },
    Failed { utterance: u64, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_skips_already_delivered_results() {
        let batch = CaptureBatch::new(
            vec![
                Segment::final_text("добрый день"),
                Segment::interim("как у"),
            ],
            1,
        );
        assert_eq!(batch.fresh(), &[Segment::interim("как у")]);
    }

    #[test]
    fn fresh_tolerates_cursor_past_end() {
        let batch = CaptureBatch::new(vec![Segment::final_text("a")], 5);
        assert!(batch.fresh().is_empty());
    }

    #[test]
    fn capture_config_defaults_flags() {
        let cfg: CaptureConfig = serde_json::from_str(r#"{"locale":"en-US"}"#).unwrap();
        assert!(cfg.interim_results && cfg.continuous);
    }
}
