//! speech-io: capture (speech-to-text) and synthesis (text-to-speech) engine traits with
//! mock backends

mod error;
pub use error::{CaptureFault, SynthesisError};

mod types;
pub use types::{
    CaptureBatch, CaptureConfig, CaptureEvent, Segment, SpeechParams, SynthesisEvent, Utterance,
    Voice,
};

mod traits;
pub use traits::{CaptureCallback, CaptureEngine, SynthesisCallback, SynthesisEngine};

mod voice;
pub use voice::select_voice;

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mock")]
pub use mock::{default_voices, MockCapture, MockMicrophone, MockSpeaker, MockSynthesis};
