//! Arbitration of the audio channel between capture and playback.
//!
//! The microphone and the synthesizer are one resource. [`ChannelOwner`] makes "capturing
//! while the counterpart speaks" unrepresentable: starting playback takes the channel
//! from capture, and capture only gets it back once the current utterance finished or
//! failed.

use crate::event::Effect;
use serde::{Deserialize, Serialize};
use speech_io::{select_voice, CaptureFault, SpeechParams, SynthesisEvent, Utterance, Voice};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelOwner {
    Released,
    Capture,
    Playback,
}

#[derive(Debug, Clone)]
pub struct PlaybackCoordinator {
    owner: ChannelOwner,
    /// Trainee intent to keep talking, independent of the engine state
    capture_requested: bool,
    /// A stop was issued and its `End` has not arrived yet
    stop_pending: bool,
    utterance: u64,
    voices: Vec<Voice>,
    locale: String,
    params: SpeechParams,
    last_fault: Option<CaptureFault>,
    restarts: u64,
}

impl PlaybackCoordinator {
    pub fn new(locale: impl Into<String>, params: SpeechParams) -> Self {
        Self {
            owner: ChannelOwner::Released,
            capture_requested: false,
            stop_pending: false,
            utterance: 0,
            voices: Vec::new(),
            locale: locale.into(),
            params,
            last_fault: None,
            restarts: 0,
        }
    }

    pub fn owner(&self) -> ChannelOwner {
        self.owner
    }

    pub fn listening(&self) -> bool {
        self.owner == ChannelOwner::Capture
    }

    pub fn counterpart_speaking(&self) -> bool {
        self.owner == ChannelOwner::Playback
    }

    pub fn capture_requested(&self) -> bool {
        self.capture_requested
    }

    pub fn last_fault(&self) -> Option<&CaptureFault> {
        self.last_fault.as_ref()
    }

    /// Automatic capture restarts so far.
    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    pub fn set_voices(&mut self, voices: Vec<Voice>) {
        self.voices = voices;
    }

    /// Voice for the configured locale, or `None` for the engine default.
    pub fn voice(&self) -> Option<Voice> {
        select_voice(&self.voices, &self.locale)
    }

    /// Trainee wants to talk. Capture starts now if the channel is free, otherwise once
    /// playback ends.
    pub fn request_capture(&mut self) -> Vec<Effect> {
        self.capture_requested = true;
        self.last_fault = None;
        if self.owner == ChannelOwner::Released {
            self.owner = ChannelOwner::Capture;
            vec![Effect::StartCapture]
        } else {
            vec![]
        }
    }

    /// Drop capture intent and free the channel, silencing playback too.
    pub fn release(&mut self) -> Vec<Effect> {
        self.capture_requested = false;
        match self.owner {
            ChannelOwner::Capture => {
                self.owner = ChannelOwner::Released;
                self.stop_pending = true;
                vec![Effect::StopCapture]
            }
            ChannelOwner::Playback => {
                self.owner = ChannelOwner::Released;
                vec![Effect::CancelSynthesis]
            }
            ChannelOwner::Released => vec![],
        }
    }

    /// Hand the channel to playback and speak `text`.
    pub fn speak(&mut self, text: &str) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.owner {
            ChannelOwner::Capture => {
                self.stop_pending = true;
                effects.push(Effect::StopCapture);
            }
            ChannelOwner::Playback => effects.push(Effect::CancelSynthesis),
            ChannelOwner::Released => {}
        }
        self.owner = ChannelOwner::Playback;
        self.utterance += 1;
        effects.push(Effect::Speak(Utterance {
            id: self.utterance,
            text: text.to_string(),
            lang: self.locale.clone(),
            voice: self.voice(),
            params: self.params,
        }));
        effects
    }

    /// Completion or failure of an utterance. Only the current utterance gives the
    /// channel back; events of cancelled ones are ignored.
    pub fn on_synthesis(&mut self, event: &SynthesisEvent) -> Vec<Effect> {
        let id = match event {
            SynthesisEvent::Finished { utterance } => *utterance,
            SynthesisEvent::Failed { utterance, reason } => {
                if *utterance == self.utterance {
                    warn!("synthesis of utterance {} failed: {}", utterance, reason);
                }
                *utterance
            }
        };
        if self.owner != ChannelOwner::Playback || id != self.utterance {
            debug!("ignoring synthesis event for utterance {}", id);
            return vec![];
        }
        self.owner = ChannelOwner::Released;
        if self.capture_requested {
            // an engine that was already idle never acknowledges the stop
            self.stop_pending = false;
            self.owner = ChannelOwner::Capture;
            vec![Effect::StartCapture]
        } else {
            vec![]
        }
    }

    /// The capture engine ended its run, on request or on its own.
    pub fn on_capture_end(&mut self) -> Vec<Effect> {
        if std::mem::take(&mut self.stop_pending) {
            return vec![];
        }
        if self.owner == ChannelOwner::Capture {
            self.owner = ChannelOwner::Released;
        }
        if self.owner == ChannelOwner::Released && self.capture_requested {
            info!("capture ended unexpectedly, restarting");
            self.restarts += 1;
            self.owner = ChannelOwner::Capture;
            vec![Effect::StartCapture]
        } else {
            vec![]
        }
    }

    /// An engine error ends listening. Fatal faults also drop the intent so nothing
    /// restarts until the trainee starts again.
    pub fn on_capture_error(&mut self, fault: CaptureFault) {
        if fault.is_fatal() {
            error!("capture unavailable: {}", fault);
            self.capture_requested = false;
        } else {
            warn!("capture error: {}", fault);
        }
        if self.owner == ChannelOwner::Capture {
            self.owner = ChannelOwner::Released;
        }
        self.last_fault = Some(fault);
    }

    /// `start()` was refused. Never retried automatically.
    pub fn on_capture_start_failed(&mut self, fault: CaptureFault) {
        error!("capture failed to start: {}", fault);
        self.capture_requested = false;
        if self.owner == ChannelOwner::Capture {
            self.owner = ChannelOwner::Released;
        }
        self.last_fault = Some(fault);
    }
}
