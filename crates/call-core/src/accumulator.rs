use speech_io::{CaptureBatch, Segment};

/// Recognised speech of the utterance in progress: finalized fragments in arrival order
/// plus the engine's current interim guess.
#[derive(Debug, Clone, Default)]
pub struct TranscriptAccumulator {
    finals: Vec<String>,
    interim: String,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_segment(&mut self, text: &str, is_final: bool) {
        if is_final {
            let text = text.trim();
            if !text.is_empty() {
                self.finals.push(text.to_string());
            }
            self.interim.clear();
        } else {
            self.interim = text.to_string();
        }
    }

    /// Apply the new part of a result delivery. Interim segments of the batch form one
    /// guess that replaces the previous one. Returns true if the batch carried anything.
    pub fn apply_batch(&mut self, batch: &CaptureBatch) -> bool {
        let fresh = batch.fresh();
        if fresh.is_empty() {
            return false;
        }
        let mut guess = String::new();
        for Segment { text, is_final } in fresh {
            if *is_final {
                self.on_segment(text, true);
            } else {
                guess.push_str(text);
            }
        }
        self.on_segment(&guess, false);
        true
    }

    /// Everything heard so far, finals first, then the interim guess.
    pub fn pending_text(&self) -> String {
        format!("{} {}", self.finals.join(" "), self.interim)
            .trim()
            .to_string()
    }

    pub fn finals(&self) -> &[String] {
        &self.finals
    }

    pub fn interim(&self) -> &str {
        &self.interim
    }

    pub fn reset(&mut self) {
        self.finals.clear();
        self.interim.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interim_is_replaced_finals_are_kept() {
        let mut acc = TranscriptAccumulator::new();
        acc.on_segment("здрав", false);
        acc.on_segment("здравствуйте", false);
        assert_eq!(acc.pending_text(), "здравствуйте");

        acc.on_segment(" здравствуйте ", true);
        acc.on_segment("как у вас", false);
        assert_eq!(acc.finals(), ["здравствуйте"]);
        assert_eq!(acc.pending_text(), "здравствуйте как у вас");

        acc.on_segment("как у вас с пломбами", true);
        assert_eq!(acc.interim(), "");
        assert_eq!(acc.pending_text(), "здравствуйте как у вас с пломбами");
    }

    #[test]
    fn blank_finals_are_ignored() {
        let mut acc = TranscriptAccumulator::new();
        acc.on_segment("   ", true);
        assert!(acc.finals().is_empty());
        assert_eq!(acc.pending_text(), "");
    }

    #[test]
    fn batch_applies_from_result_index() {
        let mut acc = TranscriptAccumulator::new();
        let first = CaptureBatch::new(vec![Segment::final_text("добрый день")], 0);
        assert!(acc.apply_batch(&first));

        let second = CaptureBatch::new(
            vec![
                Segment::final_text("добрый день"),
                Segment::interim("сколько "),
                Segment::interim("стоит"),
            ],
            1,
        );
        assert!(acc.apply_batch(&second));
        assert_eq!(acc.finals(), ["добрый день"]);
        assert_eq!(acc.interim(), "сколько стоит");

        let stale = CaptureBatch::new(vec![Segment::final_text("добрый день")], 1);
        assert!(!acc.apply_batch(&stale));
        assert_eq!(acc.pending_text(), "добрый день сколько стоит");
    }

    #[test]
    fn reset_clears_everything() {
        let mut acc = TranscriptAccumulator::new();
        acc.on_segment("a", true);
        acc.on_segment("b", false);
        acc.reset();
        assert_eq!(acc.pending_text(), "");
    }
}
