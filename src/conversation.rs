//! Spoken conversation loop
//!
//! One turn records the user, transcribes the recording, picks a voice from
//! the transcript's emotion, asks for a reply and speaks it sentence by
//! sentence through the pipeline.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::Config;
use crate::pipeline::{
    DEFAULT_WORKERS, PlaybackSequencer, PlaybackSummary, SentenceSegmenter, SynthesisWorkerPool,
};
use crate::services::{Synthesizer, TextGenerator, Transcriber};
use crate::voice::{AudioDevice, Emotion, VoiceId, VoiceSelector};
use crate::Result;

/// Tunables for a [`ConversationLoop`]
#[derive(Debug, Clone)]
pub struct LoopOptions {
    /// Audio captured per turn
    pub record_duration: Duration,

    /// Concurrent synthesis workers
    pub workers: usize,

    /// Per-sentence synthesis timeout
    pub synthesis_timeout: Option<Duration>,

    /// Starting voice
    pub voice: VoiceId,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            record_duration: Duration::from_secs(5),
            workers: DEFAULT_WORKERS,
            synthesis_timeout: None,
            voice: VoiceId::default(),
        }
    }
}

impl From<&Config> for LoopOptions {
    fn from(config: &Config) -> Self {
        Self {
            record_duration: config.record_duration,
            workers: config.workers,
            synthesis_timeout: config.synthesis_timeout,
            voice: config.voice,
        }
    }
}

/// Outcome of one conversation turn
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub id: Uuid,

    /// What the user said (or typed)
    pub transcript: String,

    /// Generated reply; empty if nothing was heard
    pub reply: String,

    pub emotion: Option<Emotion>,

    /// Voice active when the reply was submitted for synthesis
    pub voice: VoiceId,

    pub playback: PlaybackSummary,

    pub elapsed: Duration,
}

impl TurnReport {
    /// Whether the turn produced a spoken reply
    #[must_use]
    pub fn replied(&self) -> bool {
        !self.reply.is_empty()
    }
}

/// Totals for a [`ConversationLoop::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Turns that finished, successfully or not
    pub turns: u64,

    /// Turns aborted by a service error
    pub failed: u64,

    /// Stopped by the shutdown signal
    pub interrupted: bool,
}

/// Drives capture, transcription, reply and playback
pub struct ConversationLoop {
    generator: Arc<dyn TextGenerator>,
    transcriber: Arc<dyn Transcriber>,
    device: Box<dyn AudioDevice>,
    selector: VoiceSelector,
    pool: SynthesisWorkerPool,
    segmenter: SentenceSegmenter,
    record_duration: Duration,
}

impl ConversationLoop {
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn Synthesizer>,
        device: Box<dyn AudioDevice>,
        options: LoopOptions,
    ) -> Self {
        tracing::debug!(
            generator = generator.name(),
            transcriber = transcriber.name(),
            synthesizer = synthesizer.name(),
            workers = options.workers,
            voice = %options.voice,
            "conversation loop created"
        );

        Self {
            generator,
            transcriber,
            device,
            selector: VoiceSelector::new(options.voice),
            pool: SynthesisWorkerPool::new(synthesizer, options.workers)
                .with_timeout(options.synthesis_timeout),
            segmenter: SentenceSegmenter::new(),
            record_duration: options.record_duration,
        }
    }

    /// Currently active voice
    #[must_use]
    pub const fn voice(&self) -> VoiceId {
        self.selector.current()
    }

    /// Switch voice by name; unknown names leave the voice unchanged
    pub fn set_voice(&mut self, name: &str) -> bool {
        self.selector.set_voice(name)
    }

    /// Record, transcribe and answer one utterance
    ///
    /// A silent recording (empty transcript) ends the turn without a reply.
    ///
    /// # Errors
    ///
    /// Returns error if capture, transcription, reply generation or playback fails
    pub async fn run_turn(&mut self) -> Result<TurnReport> {
        let id = Uuid::new_v4();
        let started = Instant::now();

        println!("Recording your audio...");
        let pcm = self.device.capture(self.record_duration).await?;
        let (sample_rate, channels) = self.device.capture_format();
        tracing::debug!(turn = %id, bytes = pcm.len(), "audio captured");

        let stt_started = Instant::now();
        let transcript = self
            .transcriber
            .transcribe(&pcm, sample_rate, channels)
            .await
            .inspect_err(|e| tracing::error!(turn = %id, error = %e, "transcription failed"))?;
        tracing::info!(
            turn = %id,
            elapsed_ms = stt_started.elapsed().as_millis(),
            "speech to text"
        );

        if transcript.trim().is_empty() {
            println!("Didn't catch that.");
            tracing::info!(turn = %id, "empty transcript, skipping reply");
            return Ok(TurnReport {
                id,
                transcript,
                reply: String::new(),
                emotion: None,
                voice: self.selector.current(),
                playback: PlaybackSummary::default(),
                elapsed: started.elapsed(),
            });
        }

        println!("You said: {transcript}");
        self.respond(id, transcript, started).await
    }

    /// Answer typed input, skipping capture and transcription
    ///
    /// # Errors
    ///
    /// Returns error if reply generation or playback fails
    pub async fn run_text_turn(&mut self, text: &str) -> Result<TurnReport> {
        self.respond(Uuid::new_v4(), text.trim().to_string(), Instant::now())
            .await
    }

    async fn respond(
        &mut self,
        id: Uuid,
        transcript: String,
        started: Instant,
    ) -> Result<TurnReport> {
        let emotion = self.selector.detect(&transcript);
        if let Some(emotion) = emotion {
            println!(
                "Detected emotion: {emotion} - Using voice: {}",
                self.selector.current()
            );
        }
        let voice = self.selector.current();

        let generation_started = Instant::now();
        let reply = self
            .generator
            .send(&transcript)
            .await
            .inspect_err(|e| tracing::error!(turn = %id, error = %e, "reply generation failed"))?;
        tracing::info!(
            turn = %id,
            elapsed_ms = generation_started.elapsed().as_millis(),
            "reply generation"
        );
        println!("Model response: {reply}");

        let playback = self.speak(&reply).await?;

        let elapsed = started.elapsed();
        tracing::info!(
            turn = %id,
            sentences = playback.played,
            silent = playback.silent,
            elapsed_ms = elapsed.as_millis(),
            "turn complete"
        );

        Ok(TurnReport {
            id,
            transcript,
            reply,
            emotion,
            voice,
            playback,
            elapsed,
        })
    }

    /// Speak `text` through the sentence pipeline
    ///
    /// # Errors
    ///
    /// Returns error if the device fails mid-reply
    pub async fn speak(&mut self, text: &str) -> Result<PlaybackSummary> {
        self.segmenter.reset();
        let device = self.device.as_mut();
        let mut sequencer = PlaybackSequencer::new(&mut self.pool);

        for unit in self.segmenter.feed(text) {
            sequencer.push(&unit, self.selector.state(), device).await?;
        }
        if let Some(unit) = self.segmenter.flush() {
            sequencer.push(&unit, self.selector.state(), device).await?;
        }

        sequencer.finish(device).await
    }

    /// Run turns until `turns` is reached (forever if `None`) or `shutdown` resolves
    ///
    /// Service failures end only the turn they happen in. Any other error
    /// stops the loop. Cleanup runs on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the first error that is not local to a turn
    pub async fn run<F>(&mut self, turns: Option<u64>, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut summary = RunSummary::default();

        let outcome = loop {
            if turns.is_some_and(|limit| summary.turns >= limit) {
                break Ok(());
            }

            tokio::select! {
                () = &mut shutdown => {
                    println!("Stopping speech agent...");
                    tracing::info!(turns = summary.turns, "shutdown requested");
                    summary.interrupted = true;
                    break Ok(());
                }
                result = self.run_turn() => {
                    summary.turns += 1;
                    match result {
                        Ok(report) => {
                            tracing::debug!(turn = %report.id, replied = report.replied(), "turn finished");
                        }
                        Err(e) if e.is_turn_local() => {
                            summary.failed += 1;
                            eprintln!("Turn failed: {e}");
                        }
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        self.cleanup().await;
        outcome.map(|()| summary)
    }

    /// Stop the synthesis pool; queued jobs are cancelled
    pub async fn cleanup(&mut self) {
        self.segmenter.reset();
        self.pool.shutdown().await;
        tracing::info!(
            failures = self.pool.failures(),
            "conversation cleaned up"
        );
    }
}

impl std::fmt::Debug for ConversationLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationLoop")
            .field("generator", &self.generator.name())
            .field("transcriber", &self.transcriber.name())
            .field("voice", &self.selector.current())
            .field("pool", &self.pool)
            .field("record_duration", &self.record_duration)
            .finish_non_exhaustive()
    }
}
