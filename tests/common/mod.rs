//! Shared test utilities
//!
//! Scripted stand-ins for the external services and the audio device. They
//! append to one shared event log so tests can assert on interleaving.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use parlance::{AudioDevice, Error, Result, Synthesizer, TextGenerator, Transcriber, VoiceId};

/// Something a mock observed, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SynthStart(String),
    SynthEnd(String),
    PlayStart(String),
    PlayEnd(String),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

#[must_use]
pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Position of the first `event` in `log`
///
/// # Panics
///
/// Panics if the event never happened
#[must_use]
pub fn position(log: &EventLog, event: &Event) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("{event:?} not in log"))
}

/// Synthesizer whose audio is the UTF-8 bytes of the input text
pub struct ScriptedSynth {
    events: EventLog,
    delay: Duration,
    delays: HashMap<String, Duration>,
    failing: Vec<String>,
    calls: Mutex<Vec<(String, VoiceId)>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedSynth {
    #[must_use]
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            delay: Duration::from_millis(5),
            delays: HashMap::new(),
            failing: Vec::new(),
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Take `delay` to synthesize `text`
    #[must_use]
    pub fn with_delay(mut self, text: &str, delay: Duration) -> Self {
        self.delays.insert(text.to_string(), delay);
        self
    }

    /// Fail whenever asked to synthesize `text`
    #[must_use]
    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.push(text.to_string());
        self
    }

    /// Every synthesis request, in call order
    #[must_use]
    pub fn calls(&self) -> Vec<(String, VoiceId)> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of simultaneous synthesis calls seen
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Synthesizer for ScriptedSynth {
    async fn synthesize(&self, text: &str, voice: VoiceId) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push((text.to_string(), voice));
        self.events
            .lock()
            .unwrap()
            .push(Event::SynthStart(text.to_string()));

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.get(text).copied().unwrap_or(self.delay);
        tokio::time::sleep(delay).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap()
            .push(Event::SynthEnd(text.to_string()));

        if self.failing.iter().any(|f| f == text) {
            return Err(Error::Tts("voice service unavailable".to_string()));
        }
        Ok(text.as_bytes().to_vec())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// What a [`RecordingDevice`] saw, shared with the test after boxing
#[derive(Debug, Default)]
pub struct DeviceLog {
    /// Every play call, including empty ones
    pub plays: Vec<Vec<u8>>,

    /// Play calls that actually wrote audio
    pub writes: usize,

    pub captures: usize,
}

impl DeviceLog {
    /// Played audio decoded back to text, skipping silent calls
    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        self.plays
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .collect()
    }
}

/// Audio device that records play calls and returns canned capture audio
pub struct RecordingDevice {
    events: EventLog,
    log: Arc<Mutex<DeviceLog>>,
    capture_pcm: Vec<u8>,
    play_time: Duration,
    capture_error: bool,
}

impl RecordingDevice {
    #[must_use]
    pub fn new(events: EventLog) -> (Self, Arc<Mutex<DeviceLog>>) {
        let log = Arc::new(Mutex::new(DeviceLog::default()));
        let device = Self {
            events,
            log: Arc::clone(&log),
            capture_pcm: vec![0u8; 320],
            play_time: Duration::from_millis(20),
            capture_error: false,
        };
        (device, log)
    }

    /// Make every capture fail like an unplugged microphone
    #[must_use]
    pub const fn without_microphone(mut self) -> Self {
        self.capture_error = true;
        self
    }
}

#[async_trait(?Send)]
impl AudioDevice for RecordingDevice {
    async fn capture(&mut self, _duration: Duration) -> Result<Vec<u8>> {
        if self.capture_error {
            return Err(Error::Audio("no input device available".to_string()));
        }
        self.log.lock().unwrap().captures += 1;
        Ok(self.capture_pcm.clone())
    }

    async fn play(&mut self, pcm: &[u8]) -> Result<()> {
        self.log.lock().unwrap().plays.push(pcm.to_vec());
        if pcm.is_empty() {
            return Ok(());
        }

        let label = String::from_utf8_lossy(pcm).into_owned();
        self.events
            .lock()
            .unwrap()
            .push(Event::PlayStart(label.clone()));
        tokio::time::sleep(self.play_time).await;
        self.events.lock().unwrap().push(Event::PlayEnd(label));

        self.log.lock().unwrap().writes += 1;
        Ok(())
    }
}

/// Text generator returning scripted replies in order
pub struct ScriptedGenerator {
    replies: Mutex<Vec<Result<String>>>,
    received: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    #[must_use]
    pub fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().rev().collect()),
            received: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn replying(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    /// Messages sent so far
    #[must_use]
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn send(&self, message: &str) -> Result<String> {
        self.received.lock().unwrap().push(message.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Ok("Okay.".to_string()))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Transcriber returning a fixed transcript
pub struct FixedTranscriber {
    transcript: String,
    requests: Mutex<Vec<(usize, u32, u16)>>,
}

impl FixedTranscriber {
    #[must_use]
    pub fn new(transcript: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `(bytes, sample_rate, channels)` of each request
    #[must_use]
    pub fn requests(&self) -> Vec<(usize, u32, u16)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, pcm: &[u8], sample_rate: u32, channels: u16) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((pcm.len(), sample_rate, channels));
        Ok(self.transcript.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}
