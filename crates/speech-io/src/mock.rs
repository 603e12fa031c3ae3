//! In-process capture and synthesis engines for development and tests.
//!
//! `MockCapture` is driven through a [`MockMicrophone`] handle: text "said" while the
//! engine is stopped is lost, exactly like speech into a muted microphone.
//! `MockSynthesis` finishes each utterance after a delay proportional to its length, or
//! only on demand when built with [`MockSynthesis::manual`].

use crate::{
    CaptureBatch, CaptureCallback, CaptureConfig, CaptureEngine, CaptureEvent, CaptureFault,
    Segment, SynthesisCallback, SynthesisEngine, SynthesisError, SynthesisEvent, Utterance, Voice,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type SharedCallback<E> = Arc<dyn Fn(E) + Send + Sync>;

#[derive(Default)]
struct CaptureState {
    active: bool,
    results: Vec<Segment>,
    callback: Option<SharedCallback<CaptureEvent>>,
    start_fault: Option<CaptureFault>,
    starts: u32,
    stops: u32,
}

fn emit_capture(shared: &Mutex<CaptureState>, event: CaptureEvent) {
    let callback = shared.lock().callback.clone();
    if let Some(cb) = callback {
        cb(event);
    }
}

pub struct MockCapture {
    config: CaptureConfig,
    shared: Arc<Mutex<CaptureState>>,
}

impl MockCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Mutex::new(CaptureState::default())),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Handle used to feed speech into the engine.
    pub fn microphone(&self) -> MockMicrophone {
        MockMicrophone {
            shared: self.shared.clone(),
        }
    }
}

impl CaptureEngine for MockCapture {
    fn set_event_callback(&mut self, callback: CaptureCallback) {
        self.shared.lock().callback = Some(Arc::from(callback));
    }

    fn start(&mut self) -> Result<(), CaptureFault> {
        let mut st = self.shared.lock();
        if let Some(fault) = st.start_fault.take() {
            return Err(fault);
        }
        if st.active {
            return Err(CaptureFault::Engine("recognition already started".into()));
        }
        st.active = true;
        st.results.clear();
        st.starts += 1;
        debug!("mock capture started ({})", self.config.locale);
        Ok(())
    }

    fn stop(&mut self) {
        let was_active = {
            let mut st = self.shared.lock();
            st.stops += 1;
            std::mem::replace(&mut st.active, false)
        };
        if was_active {
            emit_capture(&self.shared, CaptureEvent::End);
        }
    }
}

#[derive(Clone)]
pub struct MockMicrophone {
    shared: Arc<Mutex<CaptureState>>,
}

impl MockMicrophone {
    /// Deliver a final recognition result. Returns false when capture is not running.
    pub fn say(&self, text: &str) -> bool {
        self.deliver(Segment::final_text(text))
    }

    /// Deliver an interim guess that replaces the previous interim one.
    pub fn say_partial(&self, text: &str) -> bool {
        self.deliver(Segment::interim(text))
    }

    fn deliver(&self, segment: Segment) -> bool {
        let batch = {
            let mut st = self.shared.lock();
            if !st.active {
                debug!("mock microphone muted, dropping '{}'", segment.text);
                return false;
            }
            if st.results.last().is_some_and(|s| !s.is_final) {
                st.results.pop();
            }
            let index = st.results.len();
            st.results.push(segment);
            CaptureBatch::new(st.results.clone(), index)
        };
        emit_capture(&self.shared, CaptureEvent::Result(batch));
        true
    }

    /// Simulate the platform ending recognition on its own.
    pub fn drop_out(&self) {
        let was_active = std::mem::replace(&mut self.shared.lock().active, false);
        if was_active {
            emit_capture(&self.shared, CaptureEvent::End);
        }
    }

    /// Raise an engine error; the run ends right after, as real engines do.
    pub fn fail(&self, fault: CaptureFault) {
        emit_capture(&self.shared, CaptureEvent::Error(fault));
        self.drop_out();
    }

    /// Make the next `start()` fail with `fault`.
    pub fn deny_next_start(&self, fault: CaptureFault) {
        self.shared.lock().start_fault = Some(fault);
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock().active
    }

    pub fn starts(&self) -> u32 {
        self.shared.lock().starts
    }

    pub fn stops(&self) -> u32 {
        self.shared.lock().stops
    }
}

#[derive(Default)]
struct SynthState {
    callback: Option<SharedCallback<SynthesisEvent>>,
    current: Option<u64>,
    spoken: Vec<Utterance>,
    cancels: u32,
}

fn emit_synthesis(shared: &Mutex<SynthState>, event: SynthesisEvent) {
    let callback = shared.lock().callback.clone();
    if let Some(cb) = callback {
        cb(event);
    }
}

pub fn default_voices() -> Vec<Voice> {
    vec![
        Voice {
            name: "Samantha".to_string(),
            lang: "en-US".to_string(),
            default: true,
        },
        Voice {
            name: "Milena".to_string(),
            lang: "ru-RU".to_string(),
            default: false,
        },
    ]
}

pub struct MockSynthesis {
    voices: Vec<Voice>,
    per_char: Option<Duration>,
    shared: Arc<Mutex<SynthState>>,
}

impl MockSynthesis {
    /// Utterances finish after `per_char` for every character, clamped to 0.2–3 s.
    pub fn new(voices: Vec<Voice>, per_char: Duration) -> Self {
        Self {
            voices,
            per_char: Some(per_char),
            shared: Arc::new(Mutex::new(SynthState::default())),
        }
    }

    /// Utterances finish only through [`MockSpeaker::finish_current`].
    pub fn manual(voices: Vec<Voice>) -> Self {
        Self {
            voices,
            per_char: None,
            shared: Arc::new(Mutex::new(SynthState::default())),
        }
    }

    pub fn speaker(&self) -> MockSpeaker {
        MockSpeaker {
            shared: self.shared.clone(),
        }
    }

    fn duration_for(per_char: Duration, text: &str) -> Duration {
        let chars = text.chars().count() as u32;
        (per_char * chars).clamp(Duration::from_millis(200), Duration::from_secs(3))
    }
}

impl SynthesisEngine for MockSynthesis {
    fn set_event_callback(&mut self, callback: SynthesisCallback) {
        self.shared.lock().callback = Some(Arc::from(callback));
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&mut self, utterance: Utterance) -> Result<(), SynthesisError> {
        if utterance.text.trim().is_empty() {
            return Err(SynthesisError::Engine("nothing to speak".into()));
        }
        let id = utterance.id;
        let text = utterance.text.clone();
        {
            let mut st = self.shared.lock();
            st.current = Some(id);
            st.spoken.push(utterance);
        }
        if let Some(per_char) = self.per_char {
            let wait = Self::duration_for(per_char, &text);
            let shared = self.shared.clone();
            std::thread::spawn(move || {
                std::thread::sleep(wait);
                let still_current = {
                    let mut st = shared.lock();
                    if st.current == Some(id) {
                        st.current = None;
                        true
                    } else {
                        false
                    }
                };
                if still_current {
                    emit_synthesis(&shared, SynthesisEvent::Finished { utterance: id });
                }
            });
        }
        Ok(())
    }

    fn cancel(&mut self) {
        let cancelled = {
            let mut st = self.shared.lock();
            st.cancels += 1;
            st.current.take()
        };
        if let Some(id) = cancelled {
            emit_synthesis(
                &self.shared,
                SynthesisEvent::Failed {
                    utterance: id,
                    reason: "interrupted".to_string(),
                },
            );
        }
    }
}

#[derive(Clone)]
pub struct MockSpeaker {
    shared: Arc<Mutex<SynthState>>,
}

impl MockSpeaker {
    pub fn spoken(&self) -> Vec<Utterance> {
        self.shared.lock().spoken.clone()
    }

    pub fn is_speaking(&self) -> bool {
        self.shared.lock().current.is_some()
    }

    pub fn cancels(&self) -> u32 {
        self.shared.lock().cancels
    }

    /// Complete the current utterance. Returns its id, if one was playing.
    pub fn finish_current(&self) -> Option<u64> {
        let finished = self.shared.lock().current.take();
        if let Some(id) = finished {
            emit_synthesis(&self.shared, SynthesisEvent::Finished { utterance: id });
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn recorder<E: Send + 'static>() -> (Arc<StdMutex<Vec<E>>>, Box<dyn Fn(E) + Send + Sync>) {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sink = log.clone();
        (log, Box::new(move |e| sink.lock().unwrap().push(e)))
    }

    #[test]
    fn muted_microphone_drops_speech() {
        let mut capture = MockCapture::new(CaptureConfig::default());
        let (log, cb) = recorder();
        capture.set_event_callback(cb);
        let mic = capture.microphone();

        assert!(!mic.say("никто не слышит"));
        capture.start().unwrap();
        mic.say_partial("здравст");
        assert!(mic.say("здравствуйте"));
        capture.stop();

        let events = log.lock().unwrap();
        assert_eq!(events.len(), 3);
        match &events[1] {
            CaptureEvent::Result(batch) => {
                assert_eq!(batch.result_index, 0);
                assert_eq!(batch.fresh(), &[Segment::final_text("здравствуйте")]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(events[2], CaptureEvent::End);
    }

    #[test]
    fn denied_start_reports_fault() {
        let mut capture = MockCapture::new(CaptureConfig::default());
        capture
            .microphone()
            .deny_next_start(CaptureFault::PermissionDenied);
        assert_eq!(capture.start(), Err(CaptureFault::PermissionDenied));
        assert!(capture.start().is_ok());
    }

    #[test]
    fn cancel_reports_interrupted_utterance() {
        let mut synth = MockSynthesis::manual(default_voices());
        let (log, cb) = recorder();
        synth.set_event_callback(cb);
        let speaker = synth.speaker();

        let utterance = Utterance {
            id: 7,
            text: "Добрый день".to_string(),
            lang: "ru-RU".to_string(),
            voice: None,
            params: Default::default(),
        };
        synth.speak(utterance).unwrap();
        assert!(speaker.is_speaking());
        synth.cancel();
        assert!(!speaker.is_speaking());
        assert_eq!(speaker.finish_current(), None);

        let events = log.lock().unwrap();
        assert_eq!(
            events.as_slice(),
            &[SynthesisEvent::Failed {
                utterance: 7,
                reason: "interrupted".to_string()
            }]
        );
    }
}
