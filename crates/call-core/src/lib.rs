//! call-core: real-time turn-taking for spoken sales-call practice
//!
//! A trainee talks to a scripted persona. This crate decides when the trainee has
//! finished an utterance, sends it to the dialogue service one turn at a time, plays the
//! reply without the microphone hearing it, keeps the objective checklist current and
//! scores the conversation in the background.
//!
//! The logic is a sans-IO state machine ([`CallSession`]) driven either by the tokio
//! runtime ([`spawn_call`]) or by the virtual-clock harness in [`sim`].

mod error;
pub use error::{CallError, Result};

mod config;
pub use config::{CallConfig, TrainerConfig};

mod timers;
pub use timers::{TimerId, TimerKind, TimerSlot};

mod event;
pub use event::{CallEvent, Effect};

mod accumulator;
pub use accumulator::TranscriptAccumulator;

mod endpoint;
pub use endpoint::{EndpointDetector, EndpointGate, Expiry};

mod dispatcher;
pub use dispatcher::{Completion, Rejected, TurnDispatcher};

mod playback;
pub use playback::{ChannelOwner, PlaybackCoordinator};

mod evaluation;
pub use evaluation::{Debounced, EvaluationScheduler, Received};

pub mod checklist;

mod session;
pub use session::{CallSession, Phase, SessionStats, SessionView};

pub mod metrics;
pub use metrics::MetricsHub;

mod runtime;
pub use runtime::{spawn_call, CallHandle, CallServices};

pub mod sim;

/// Initialize the call orchestrator
pub fn init() -> Result<()> {
    tracing::info!("Initializing call orchestrator");
    Ok(())
}
