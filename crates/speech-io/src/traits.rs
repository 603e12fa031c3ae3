use crate::{CaptureEvent, CaptureFault, SynthesisError, SynthesisEvent, Utterance, Voice};

pub type CaptureCallback = Box<dyn Fn(CaptureEvent) + Send + Sync>;
pub type SynthesisCallback = Box<dyn Fn(SynthesisEvent) + Send + Sync>;

/// Continuous speech-to-text engine. Results, errors and the end of a recognition run
/// are delivered through the event callback, possibly from another thread.
pub trait CaptureEngine: Send {
    fn set_event_callback(&mut self, callback: CaptureCallback);

    /// Begin a recognition run. Fails immediately when the platform cannot capture.
    fn start(&mut self) -> Result<(), CaptureFault>;

    /// Request the run to stop. The engine reports `CaptureEvent::End` once stopped.
    fn stop(&mut self);
}

/// Text-to-speech engine. Completion and failure are reported per utterance id.
pub trait SynthesisEngine: Send {
    fn set_event_callback(&mut self, callback: SynthesisCallback);

    /// Voices currently offered by the engine.
    fn voices(&self) -> Vec<Voice>;

    fn speak(&mut self, utterance: Utterance) -> Result<(), SynthesisError>;

    /// Silence the current utterance, if any.
    fn cancel(&mut self);
}
