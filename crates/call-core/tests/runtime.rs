#![cfg(feature = "mock")]

use call_core::{spawn_call, CallConfig, CallHandle, CallServices, CallSession, MetricsHub, Phase};
use llm_services::mock::{ScriptedDialogue, ScriptedEvaluator};
use speech_io::{
    default_voices, CaptureConfig, CaptureFault, MockCapture, MockMicrophone, MockSpeaker,
    MockSynthesis,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out waiting for call state")
}

struct Rig {
    handle: CallHandle,
    mic: MockMicrophone,
    speaker: MockSpeaker,
    evaluator: Arc<ScriptedEvaluator>,
    metrics: MetricsHub,
}

fn rig(dialogue: ScriptedDialogue) -> Rig {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let config = CallConfig {
        silence_ms: 40,
        evaluation_debounce_ms: 60,
        ..Default::default()
    };
    let session =
        CallSession::for_scenario(config, &catalog::builtin_catalog(), "patient-1", "first")
            .unwrap();
    let capture = MockCapture::new(CaptureConfig::default());
    let mic = capture.microphone();
    let synthesis = MockSynthesis::manual(default_voices());
    let speaker = synthesis.speaker();
    let evaluator = Arc::new(ScriptedEvaluator::new());
    let metrics = MetricsHub::new().unwrap();
    let handle = spawn_call(
        session,
        Box::new(capture),
        Box::new(synthesis),
        CallServices {
            dialogue: Arc::new(dialogue),
            evaluator: evaluator.clone(),
        },
        Some(metrics.clone()),
    );
    Rig {
        handle,
        mic,
        speaker,
        evaluator,
        metrics,
    }
}

#[tokio::test]
async fn spoken_turn_is_answered_played_and_scored() {
    let rig = rig(ScriptedDialogue::new(["Добрый день, расскажите подробнее"]));
    rig.handle.start().unwrap();
    within(rig.handle.wait_for(|v| v.listening)).await.unwrap();

    assert!(rig.mic.say("здравствуйте как у вас с пломбами"));
    let view = within(rig.handle.wait_for(|v| v.counterpart_speaking))
        .await
        .unwrap();
    assert_eq!(view.transcript.len(), 2);
    assert_eq!(view.phase, Phase::Speaking);
    assert!(view.checklist["needs"]);
    assert!(!rig.mic.is_active());

    let spoken = rig.speaker.spoken();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].text, "Добрый день, расскажите подробнее");
    assert_eq!(
        spoken[0].voice.as_ref().map(|v| v.name.as_str()),
        Some("Milena")
    );

    assert!(rig.speaker.finish_current().is_some());
    within(rig.handle.wait_for(|v| v.listening)).await.unwrap();
    assert!(rig.mic.is_active());

    let view = within(rig.handle.wait_for(|v| matches!(v.evaluation, Some(Ok(_)))))
        .await
        .unwrap();
    let report = view.evaluation.unwrap().unwrap();
    assert_eq!(report.total, 1.0);
    assert_eq!(rig.evaluator.calls(), 1);

    let session = rig.handle.shutdown().await.unwrap();
    assert_eq!(session.transcript().len(), 2);
    assert!(!rig.mic.is_active());
    let text = rig.metrics.encode_text();
    assert!(text.contains("trainer_turns_dispatched 1"));
    assert!(text.contains("trainer_evaluations_requested 1"));
}

#[tokio::test]
async fn failing_dialogue_falls_back_and_keeps_listening() {
    let rig = rig(ScriptedDialogue::failing("connection refused"));
    rig.handle.start().unwrap();
    within(rig.handle.wait_for(|v| v.listening)).await.unwrap();

    rig.handle.send_utterance("Добрый день").unwrap();
    let view = within(rig.handle.wait_for(|v| v.transcript.len() == 2))
        .await
        .unwrap();
    assert_eq!(view.transcript[1].text, "(no response)");
    assert!(!view.busy);
    assert!(view.listening);
    assert!(rig.speaker.spoken().is_empty());
    assert_eq!(view.stats.fallback_replies, 1);
}

#[tokio::test]
async fn permission_denied_stops_listening() {
    let rig = rig(ScriptedDialogue::new(Vec::<String>::new()));
    rig.handle.start().unwrap();
    within(rig.handle.wait_for(|v| v.listening)).await.unwrap();

    rig.mic.fail(CaptureFault::PermissionDenied);
    let view = within(rig.handle.wait_for(|v| v.last_fault.is_some()))
        .await
        .unwrap();
    assert_eq!(view.last_fault, Some(CaptureFault::PermissionDenied));
    assert!(!view.capture_requested);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!rig.mic.is_active());
    assert_eq!(rig.mic.starts(), 1);
}

#[tokio::test]
async fn platform_timeout_restarts_capture() {
    let rig = rig(ScriptedDialogue::new(Vec::<String>::new()));
    rig.handle.start().unwrap();
    within(rig.handle.wait_for(|v| v.listening)).await.unwrap();

    rig.mic.drop_out();
    within(rig.handle.wait_for(|v| v.stats.capture_restarts == 1))
        .await
        .unwrap();
    assert!(rig.mic.is_active());
    assert_eq!(rig.mic.starts(), 2);
}

#[tokio::test]
async fn unsupported_platform_is_reported() {
    let rig = rig(ScriptedDialogue::new(Vec::<String>::new()));
    rig.mic.deny_next_start(CaptureFault::NotSupported);
    rig.handle.start().unwrap();
    let view = within(rig.handle.wait_for(|v| v.last_fault.is_some()))
        .await
        .unwrap();
    assert_eq!(view.last_fault, Some(CaptureFault::NotSupported));
    assert_eq!(view.phase, Phase::Idle);
}

#[tokio::test]
async fn dropping_the_handle_releases_the_microphone() {
    let Rig { handle, mic, .. } = rig(ScriptedDialogue::new(Vec::<String>::new()));
    handle.start().unwrap();
    within(handle.wait_for(|v| v.listening)).await.unwrap();
    assert!(mic.is_active());

    drop(handle);
    within(async {
        while mic.is_active() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert_eq!(mic.stops(), 1);
}

#[tokio::test]
async fn continuous_speech_is_sent_once_after_the_last_fragment() {
    let rig = rig(ScriptedDialogue::new(["Слушаю"]));
    rig.handle.start().unwrap();
    within(rig.handle.wait_for(|v| v.listening)).await.unwrap();

    for word in ["добрый", "день", "меня", "зовут", "Анна"] {
        assert!(rig.mic.say(word));
    }
    let view = within(rig.handle.wait_for(|v| !v.transcript.is_empty()))
        .await
        .unwrap();
    assert_eq!(view.transcript[0].text, "добрый день меня зовут Анна");

    within(rig.handle.wait_for(|v| v.counterpart_speaking))
        .await
        .unwrap();
    assert_eq!(rig.handle.view().stats.turns_dispatched, 1);
}
