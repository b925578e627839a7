//! Sentence pipeline and conversation loop integration tests
//!
//! Runs the real segmenter, pool and sequencer against scripted services and
//! a recording audio device.

use std::sync::Arc;
use std::time::Duration;

use parlance::pipeline::{SequencerState, segment};
use parlance::{
    ConversationLoop, Emotion, Error, JobStatus, LoopOptions, PlaybackSequencer, SentenceUnit,
    SynthesisWorkerPool, VoiceId, VoiceSelector,
};

mod common;

use common::{
    Event, FixedTranscriber, RecordingDevice, ScriptedGenerator, ScriptedSynth, event_log,
    position,
};

fn options(workers: usize) -> LoopOptions {
    LoopOptions {
        record_duration: Duration::from_millis(10),
        workers,
        ..LoopOptions::default()
    }
}

#[test]
fn test_scenario_two_terminated_sentences() {
    let units = segment("Hello there. How are you?");

    assert_eq!(
        units,
        vec![
            SentenceUnit::new(0, "Hello there.", true),
            SentenceUnit::new(1, "How are you?", true),
        ]
    );
    assert!(units.iter().all(|u| u.terminal));
}

#[test]
fn test_scenario_unterminated_remainder() {
    assert_eq!(
        segment("Wait, hold on"),
        vec![SentenceUnit::new(0, "Wait, hold on", false)]
    );
}

#[test]
fn test_scenario_whitespace_reply_has_no_units() {
    assert!(segment("   ").is_empty());
}

#[tokio::test]
async fn test_never_more_than_one_sentence_unplayed() {
    let events = event_log();
    let synth = Arc::new(ScriptedSynth::new(Arc::clone(&events)));
    let (mut device, log) = RecordingDevice::new(Arc::clone(&events));
    let mut pool = SynthesisWorkerPool::new(synth.clone(), 2);
    let selector = VoiceSelector::default();

    let mut sequencer = PlaybackSequencer::new(&mut pool);
    for unit in segment("One. Two. Three.") {
        sequencer
            .push(&unit, selector.state(), &mut device)
            .await
            .unwrap();
    }
    let summary = sequencer.finish(&mut device).await.unwrap();

    assert_eq!(summary.played, 3);
    assert_eq!(log.lock().unwrap().spoken(), vec!["One.", "Two.", "Three."]);

    // Sentences whose synthesis started minus sentences fully played
    let mut unplayed = 0i32;
    let mut deepest = 0i32;
    for event in events.lock().unwrap().iter() {
        match event {
            Event::SynthStart(_) => unplayed += 1,
            Event::PlayEnd(_) => unplayed -= 1,
            _ => {}
        }
        deepest = deepest.max(unplayed);
    }
    assert_eq!(deepest, 1);
    assert_eq!(unplayed, 0);

    // Two is submitted only once One has played, and plays after it resolves
    let two_started = position(&events, &Event::SynthStart("Two.".to_string()));
    assert!(two_started > position(&events, &Event::PlayEnd("One.".to_string())));
    let two_played = position(&events, &Event::PlayStart("Two.".to_string()));
    assert!(two_played > position(&events, &Event::SynthEnd("Two.".to_string())));

    pool.shutdown().await;
}

#[tokio::test]
async fn test_at_most_one_job_ahead() {
    let events = event_log();
    let synth = Arc::new(ScriptedSynth::new(Arc::clone(&events)));
    let (mut device, _log) = RecordingDevice::new(Arc::clone(&events));
    let mut pool = SynthesisWorkerPool::new(synth.clone(), 4);
    let selector = VoiceSelector::default();

    let mut sequencer = PlaybackSequencer::new(&mut pool);
    assert_eq!(sequencer.state(), SequencerState::Idle);

    for unit in segment("A one. A two. A three. A four.") {
        sequencer
            .push(&unit, selector.state(), &mut device)
            .await
            .unwrap();
        assert_eq!(sequencer.state(), SequencerState::Pipelined);
        assert_eq!(sequencer.outstanding(), 1);
        assert_eq!(sequencer.cursor(), unit.index);
    }
    sequencer.finish(&mut device).await.unwrap();

    // Four workers available, yet never more than one synthesis at a time
    assert_eq!(synth.peak(), 1);
    assert_eq!(synth.calls().len(), 4);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_playback_order_survives_uneven_synthesis() {
    let events = event_log();
    let synth = Arc::new(
        ScriptedSynth::new(Arc::clone(&events))
            .with_delay("Slow start.", Duration::from_millis(60))
            .with_delay("Quick.", Duration::from_millis(1)),
    );
    let (device, log) = RecordingDevice::new(Arc::clone(&events));
    let mut conversation = ConversationLoop::new(
        Arc::new(ScriptedGenerator::replying("unused")),
        Arc::new(FixedTranscriber::new("unused")),
        synth.clone(),
        Box::new(device),
        options(2),
    );

    let summary = conversation
        .speak("Slow start. Quick. Medium pace")
        .await
        .unwrap();

    assert_eq!(summary.played, 3);
    assert_eq!(
        log.lock().unwrap().spoken(),
        vec!["Slow start.", "Quick.", "Medium pace"]
    );

    conversation.cleanup().await;
}

#[tokio::test]
async fn test_failed_sentence_plays_silence_and_continues() {
    let events = event_log();
    let synth = Arc::new(ScriptedSynth::new(Arc::clone(&events)).failing_on("Broken."));
    let (device, log) = RecordingDevice::new(Arc::clone(&events));
    let mut conversation = ConversationLoop::new(
        Arc::new(ScriptedGenerator::replying("unused")),
        Arc::new(FixedTranscriber::new("unused")),
        synth.clone(),
        Box::new(device),
        options(2),
    );

    let summary = conversation.speak("Broken. Fine.").await.unwrap();

    assert_eq!(summary.played, 2);
    assert_eq!(summary.silent, 1);

    let log = log.lock().unwrap();
    assert_eq!(log.plays.len(), 2);
    assert!(log.plays[0].is_empty());
    assert_eq!(log.writes, 1);
    assert_eq!(log.spoken(), vec!["Fine."]);
    drop(log);

    conversation.cleanup().await;
}

#[tokio::test]
async fn test_whitespace_reply_touches_nothing() {
    let events = event_log();
    let synth = Arc::new(ScriptedSynth::new(Arc::clone(&events)));
    let (device, log) = RecordingDevice::new(Arc::clone(&events));
    let mut conversation = ConversationLoop::new(
        Arc::new(ScriptedGenerator::replying("unused")),
        Arc::new(FixedTranscriber::new("unused")),
        synth.clone(),
        Box::new(device),
        options(2),
    );

    let summary = conversation.speak("   ").await.unwrap();

    assert_eq!(summary.played, 0);
    assert!(synth.calls().is_empty());
    assert!(log.lock().unwrap().plays.is_empty());

    conversation.cleanup().await;
}

#[tokio::test]
async fn test_voice_is_fixed_at_submission() {
    let events = event_log();
    let synth = Arc::new(ScriptedSynth::new(Arc::clone(&events)));
    let (mut device, _log) = RecordingDevice::new(Arc::clone(&events));
    let mut pool = SynthesisWorkerPool::new(synth.clone(), 2);
    let mut selector = VoiceSelector::default();
    let units = segment("First one. Second one.");

    let mut sequencer = PlaybackSequencer::new(&mut pool);
    sequencer
        .push(&units[0], selector.state(), &mut device)
        .await
        .unwrap();

    // Switching voice mid-reply only affects later submissions
    assert_eq!(selector.detect("this is urgent"), Some(Emotion::Serious));

    sequencer
        .push(&units[1], selector.state(), &mut device)
        .await
        .unwrap();
    let summary = sequencer.finish(&mut device).await.unwrap();

    assert_eq!(summary.voices, vec![VoiceId::Kore, VoiceId::Charon]);
    assert_eq!(
        synth.calls(),
        vec![
            ("First one.".to_string(), VoiceId::Kore),
            ("Second one.".to_string(), VoiceId::Charon),
        ]
    );

    pool.shutdown().await;
}

#[tokio::test]
async fn test_out_of_order_unit_is_rejected() {
    let events = event_log();
    let synth = Arc::new(ScriptedSynth::new(Arc::clone(&events)));
    let (mut device, log) = RecordingDevice::new(Arc::clone(&events));
    let mut pool = SynthesisWorkerPool::new(synth.clone(), 2);
    let selector = VoiceSelector::default();

    let mut sequencer = PlaybackSequencer::new(&mut pool);
    let result = sequencer
        .push(
            &SentenceUnit::new(1, "Too early.", true),
            selector.state(),
            &mut device,
        )
        .await;

    assert!(matches!(result, Err(Error::Pipeline(_))));
    assert_eq!(sequencer.state(), SequencerState::Idle);
    drop(sequencer);

    pool.shutdown().await;
    assert!(synth.calls().is_empty());
    assert!(log.lock().unwrap().plays.is_empty());
}

#[tokio::test]
async fn test_abandon_cancels_unstarted_job() {
    let events = event_log();
    let synth = Arc::new(ScriptedSynth::new(Arc::clone(&events)));
    let (mut device, log) = RecordingDevice::new(Arc::clone(&events));
    let mut pool = SynthesisWorkerPool::new(synth.clone(), 1);
    let selector = VoiceSelector::default();

    let mut sequencer = PlaybackSequencer::new(&mut pool);
    sequencer
        .push(&SentenceUnit::new(0, "Never said.", true), selector.state(), &mut device)
        .await
        .unwrap();
    sequencer.abandon();
    assert_eq!(sequencer.state(), SequencerState::Idle);
    drop(sequencer);

    pool.shutdown().await;
    assert!(synth.calls().is_empty());
    assert!(log.lock().unwrap().plays.is_empty());
}

#[tokio::test]
async fn test_abandon_discards_running_job() {
    let events = event_log();
    let synth = Arc::new(
        ScriptedSynth::new(Arc::clone(&events)).with_delay("Cut off.", Duration::from_millis(40)),
    );
    let (mut device, log) = RecordingDevice::new(Arc::clone(&events));
    let mut pool = SynthesisWorkerPool::new(synth.clone(), 1);
    let selector = VoiceSelector::default();

    let mut sequencer = PlaybackSequencer::new(&mut pool);
    sequencer
        .push(&SentenceUnit::new(0, "Cut off.", true), selector.state(), &mut device)
        .await
        .unwrap();

    // Let the worker pick the job up
    tokio::time::sleep(Duration::from_millis(10)).await;
    sequencer.abandon();
    drop(sequencer);

    pool.shutdown().await;
    assert_eq!(synth.calls().len(), 1);
    assert!(log.lock().unwrap().plays.is_empty());
}

#[tokio::test]
async fn test_pool_closed_after_cleanup() {
    let events = event_log();
    let synth = Arc::new(ScriptedSynth::new(Arc::clone(&events)));
    let mut pool = SynthesisWorkerPool::new(synth.clone(), 2);

    pool.shutdown().await;
    assert!(!pool.is_open());

    let job = pool.submit(&SentenceUnit::new(0, "Late.", true), VoiceId::Kore);
    assert_eq!(job.status(), JobStatus::Cancelled);
    assert!(pool.resolve(job).await.is_empty());
    assert!(synth.calls().is_empty());
}

#[tokio::test]
async fn test_text_turn_selects_voice_from_emotion() {
    let events = event_log();
    let synth = Arc::new(ScriptedSynth::new(Arc::clone(&events)));
    let generator = Arc::new(ScriptedGenerator::replying("Sure thing. Let's celebrate!"));
    let (device, log) = RecordingDevice::new(Arc::clone(&events));
    let mut conversation = ConversationLoop::new(
        generator.clone(),
        Arc::new(FixedTranscriber::new("unused")),
        synth.clone(),
        Box::new(device),
        options(2),
    );

    let report = conversation.run_text_turn("I'm so excited").await.unwrap();

    assert_eq!(report.emotion, Some(Emotion::Excited));
    assert_eq!(report.voice, VoiceId::Fenrir);
    assert_eq!(conversation.voice(), VoiceId::Fenrir);
    assert_eq!(generator.received(), vec!["I'm so excited"]);
    assert!(synth.calls().iter().all(|(_, v)| *v == VoiceId::Fenrir));
    assert_eq!(
        log.lock().unwrap().spoken(),
        vec!["Sure thing.", "Let's celebrate!"]
    );

    conversation.cleanup().await;
}

#[tokio::test]
async fn test_voice_turn_flows_through_every_stage() {
    let events = event_log();
    let synth = Arc::new(ScriptedSynth::new(Arc::clone(&events)));
    let generator = Arc::new(ScriptedGenerator::replying("Hi. Nice to meet you."));
    let transcriber = Arc::new(FixedTranscriber::new("hello there"));
    let (device, log) = RecordingDevice::new(Arc::clone(&events));
    let mut conversation = ConversationLoop::new(
        generator.clone(),
        transcriber.clone(),
        synth.clone(),
        Box::new(device),
        options(2),
    );

    let report = conversation.run_turn().await.unwrap();

    assert_eq!(report.transcript, "hello there");
    assert_eq!(report.reply, "Hi. Nice to meet you.");
    assert_eq!(report.emotion, None);
    assert_eq!(report.voice, VoiceId::Kore);
    assert_eq!(report.playback.played, 2);
    assert!(report.replied());

    assert_eq!(transcriber.requests(), vec![(320, 16000, 1)]);
    assert_eq!(generator.received(), vec!["hello there"]);
    assert_eq!(log.lock().unwrap().captures, 1);

    conversation.cleanup().await;
}

#[tokio::test]
async fn test_empty_transcript_skips_reply() {
    let events = event_log();
    let synth = Arc::new(ScriptedSynth::new(Arc::clone(&events)));
    let generator = Arc::new(ScriptedGenerator::replying("unused"));
    let (device, log) = RecordingDevice::new(Arc::clone(&events));
    let mut conversation = ConversationLoop::new(
        generator.clone(),
        Arc::new(FixedTranscriber::new("  ")),
        synth.clone(),
        Box::new(device),
        options(2),
    );

    let report = conversation.run_turn().await.unwrap();

    assert!(!report.replied());
    assert!(generator.received().is_empty());
    assert!(synth.calls().is_empty());
    assert!(log.lock().unwrap().plays.is_empty());

    conversation.cleanup().await;
}

#[tokio::test]
async fn test_failed_turn_does_not_stop_the_loop() {
    let events = event_log();
    let synth = Arc::new(ScriptedSynth::new(Arc::clone(&events)));
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Err(Error::Generation("503 Service Unavailable".to_string())),
        Ok("Back again.".to_string()),
    ]));
    let (device, log) = RecordingDevice::new(Arc::clone(&events));
    let mut conversation = ConversationLoop::new(
        generator.clone(),
        Arc::new(FixedTranscriber::new("are you there")),
        synth.clone(),
        Box::new(device),
        options(2),
    );

    let summary = conversation
        .run(Some(2), std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.turns, 2);
    assert_eq!(summary.failed, 1);
    assert!(!summary.interrupted);
    assert_eq!(generator.received().len(), 2);
    assert_eq!(log.lock().unwrap().spoken(), vec!["Back again."]);
}

#[tokio::test]
async fn test_device_error_stops_the_loop() {
    let events = event_log();
    let synth = Arc::new(ScriptedSynth::new(Arc::clone(&events)));
    let generator = Arc::new(ScriptedGenerator::replying("unused"));
    let (device, _log) = RecordingDevice::new(Arc::clone(&events));
    let mut conversation = ConversationLoop::new(
        generator.clone(),
        Arc::new(FixedTranscriber::new("unused")),
        synth.clone(),
        Box::new(device.without_microphone()),
        options(2),
    );

    let result = conversation.run(None, std::future::pending()).await;

    assert!(matches!(result, Err(Error::Audio(_))));
    assert!(generator.received().is_empty());
}

#[tokio::test]
async fn test_shutdown_interrupts_and_cleans_up() {
    let events = event_log();
    let synth = Arc::new(
        ScriptedSynth::new(Arc::clone(&events)).with_delay("Long answer.", Duration::from_millis(300)),
    );
    let (device, log) = RecordingDevice::new(Arc::clone(&events));
    let mut conversation = ConversationLoop::new(
        Arc::new(ScriptedGenerator::replying("Long answer.")),
        Arc::new(FixedTranscriber::new("tell me a story")),
        synth.clone(),
        Box::new(device),
        options(1),
    );

    let summary = conversation
        .run(None, tokio::time::sleep(Duration::from_millis(30)))
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.turns, 0);
    assert!(log.lock().unwrap().plays.is_empty());
}
